//! regolith-api library - backend API for the spectroscopy analysis platform
//!
//! Serves quantification job dispatch and tracking, artifact access,
//! view-state persistence, sharing and public visibility over HTTP.
//! Heavy artifacts live in object stores; user profiles, notifications
//! and activity records live in SQLite.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod config;
pub mod db;
pub mod jobs;
pub mod quant;
pub mod services;
pub mod sharing;
pub mod store;

use config::ApiConfig;
use services::{ActivityLogger, IdentityProvider, JobBus};
use store::ContentStore;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// User content store: quantification artifacts, ROIs, view states
    pub users: ContentStore,
    /// Job store: parameters, status records, per-dataset summaries
    pub jobs: ContentStore,
    /// Dataset store: per-dataset index documents
    pub datasets: ContentStore,
    pub db: SqlitePool,
    pub bus: Arc<dyn JobBus>,
    pub identity: Arc<dyn IdentityProvider>,
    pub activity: ActivityLogger,
    pub config: Arc<ApiConfig>,
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let routes = Router::new()
        // quantification jobs and artifacts
        .route("/quantification", get(api::quant::admin_list))
        .route(
            "/quantification/:dataset_id",
            post(api::quant::create).get(api::quant::list),
        )
        .route(
            "/quantification/:dataset_id/:job_id",
            get(api::quant::get_one).delete(api::quant::delete),
        )
        .route("/quantification/upload/:dataset_id", post(api::quant::upload))
        .route(
            "/quantification/combine/:dataset_id",
            post(api::quant::combine_quants),
        )
        .route(
            "/quantification/combine-list/:dataset_id",
            post(api::quant::combine_list),
        )
        .route(
            "/quantification/bless/:dataset_id/:job_id",
            post(api::quant::bless_quant),
        )
        .route(
            "/quantification/download/:dataset_id/:job_id",
            get(api::quant::download_data),
        )
        .route(
            "/quantification/download/:dataset_id/:job_id/csv",
            get(api::quant::download_csv),
        )
        .route(
            "/quantification/log/:dataset_id/:job_id/:log_name",
            get(api::quant::download_log),
        )
        .route(
            "/quantification/last/:dataset_id/:command/:kind",
            get(api::quant::download_last_run),
        )
        // view states, workspaces and collections
        .route(
            "/view-state/:dataset_id",
            get(api::viewstate::get_last).put(api::viewstate::save_last),
        )
        .route(
            "/view-state/saved/:dataset_id",
            get(api::viewstate::list_workspaces),
        )
        .route(
            "/view-state/saved/:dataset_id/:id",
            get(api::viewstate::get_workspace)
                .put(api::viewstate::save_workspace)
                .delete(api::viewstate::delete_workspace),
        )
        .route(
            "/view-state/references/:dataset_id/:id",
            get(api::viewstate::workspace_references),
        )
        .route(
            "/view-state/collections/:dataset_id",
            get(api::viewstate::list_collections),
        )
        .route(
            "/view-state/collections/:dataset_id/:id",
            get(api::viewstate::get_collection)
                .put(api::viewstate::save_collection)
                .delete(api::viewstate::delete_collection),
        )
        .route(
            "/public/collection/:dataset_id/:id",
            post(api::viewstate::make_collection_public),
        )
        // sharing
        .route("/share/roi/:dataset_id/:id", post(api::share::share_roi))
        .route("/share/expression/:id", post(api::share::share_expression))
        .route("/share/rgb-mix/:id", post(api::share::share_rgb_mix))
        .route("/share/element-set/:id", post(api::share::share_element_set))
        .route(
            "/share/quantification/:dataset_id/:id",
            post(api::share::share_quantification),
        )
        .route(
            "/share/view-state/:dataset_id/:id",
            post(api::share::share_workspace),
        )
        .route(
            "/share/view-state-collection/:dataset_id/:id",
            post(api::share::share_collection),
        )
        // reviewer access
        .route("/magiclink", post(api::share::redeem_magic_link))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::activity_middleware,
        ));

    Router::new()
        .merge(routes)
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

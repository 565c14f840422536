//! Integration tests for the HTTP API: job dispatch and listings,
//! quantification artifacts, sharing, blessing, workspaces, collections,
//! public visibility and reviewer magic links.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use regolith_api::config::ApiConfig;
use regolith_api::services::{ActivityLogger, RecordingBus, StaticIdentityProvider};
use regolith_api::store::ContentStore;
use regolith_api::{build_router, AppState};
use regolith_common::ident::SHARE_USER_ID;
use regolith_common::models::user::ObjectMeta;
use regolith_common::models::job::{JobParamsWithCount, JobStartingParameters};
use regolith_common::models::{
    DatasetIndex, DatasetLocation, JobState, JobStatus, JobSummary, JobSummaryMap, RoiItem,
    UserInfo, Workspace,
};
use regolith_common::paths;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot`

struct TestEnv {
    state: AppState,
    bus: Arc<RecordingBus>,
    identity: Arc<StaticIdentityProvider>,
}

async fn setup() -> TestEnv {
    let db = SqlitePool::connect("sqlite::memory:").await.unwrap();
    regolith_api::db::init_schema(&db).await.unwrap();

    let bus = Arc::new(RecordingBus::new());
    let identity = Arc::new(StaticIdentityProvider::new("test-token"));

    let config = ApiConfig {
        listen_address: "127.0.0.1:0".into(),
        users_root: PathBuf::from("/tmp/unused"),
        jobs_root: PathBuf::from("/tmp/unused"),
        datasets_root: PathBuf::from("/tmp/unused"),
        database_path: PathBuf::from(":memory:"),
        job_topic_url: String::new(),
        identity: Default::default(),
    };

    let state = AppState {
        users: ContentStore::memory(),
        jobs: ContentStore::memory(),
        datasets: ContentStore::memory(),
        db: db.clone(),
        bus: bus.clone(),
        identity: identity.clone(),
        activity: ActivityLogger::new(db),
        config: Arc::new(config),
    };

    TestEnv {
        state,
        bus,
        identity,
    }
}

fn app(env: &TestEnv) -> axum::Router {
    build_router(env.state.clone())
}

fn request(method: &str, uri: &str, user_id: &str, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if !user_id.is_empty() {
        builder = builder
            .header("x-user-id", user_id)
            .header("x-user-name", format!("User {}", user_id))
            .header("x-user-email", format!("{}@example.com", user_id));
    }
    match body {
        Some(value) => builder
            .header("content-type", "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn seed_dataset(env: &TestEnv, dataset_id: &str, points: i32, public: bool) {
    let index = DatasetIndex {
        dataset_id: dataset_id.to_string(),
        public,
        locations: (0..points)
            .map(|pmc| DatasetLocation {
                pmc,
                rtt: 100,
                sclk: 9000 + pmc,
            })
            .collect(),
    };
    env.state
        .datasets
        .write_json(&paths::dataset_index_path(dataset_id), &index)
        .await
        .unwrap();
}

async fn seed_roi(env: &TestEnv, user_id: &str, dataset_id: &str, roi_id: &str, indexes: Vec<i32>) {
    let key = paths::user_content_path(user_id, dataset_id, paths::ROI_FILE_NAME);
    let mut map: std::collections::BTreeMap<String, RoiItem> =
        env.state.users.read_json_or_default(&key).await.unwrap();
    map.insert(
        roi_id.to_string(),
        RoiItem {
            name: format!("Region {}", roi_id),
            location_indexes: indexes,
            description: String::new(),
            image_name: String::new(),
            meta: ObjectMeta::private(UserInfo::new(user_id, "", ""), 1000),
        },
    );
    env.state.users.write_json(&key, &map).await.unwrap();
}

fn quant_csv(fe_value: f64, pmcs: &[i32]) -> String {
    let mut csv = String::from("Test quantification\nPMC, RTT, SCLK, filename, livetime, Fe_%, Fe_err\n");
    for pmc in pmcs {
        csv.push_str(&format!(
            "{}, 100, 9000, Normal_{}.msa, 9, {}, 0.5\n",
            pmc, pmc, fe_value
        ));
    }
    csv
}

/// Upload a quantification CSV as the given user, returning the job id
async fn upload_quant(env: &TestEnv, dataset_id: &str, user_id: &str, name: &str, csv: &str) -> String {
    let response = app(env)
        .oneshot(request(
            "POST",
            &format!("/quantification/upload/{}", dataset_id),
            user_id,
            Some(json!({ "name": name, "comments": "", "csvData": csv })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    body["jobID"].as_str().unwrap().to_string()
}

// ---------------------------------------------------------------------------
// Health and auth basics
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_endpoint_responds() {
    let env = setup().await;
    let response = app(&env)
        .oneshot(request("GET", "/health", "", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "regolith-api");
}

#[tokio::test]
async fn anonymous_requests_rejected_on_private_endpoints() {
    let env = setup().await;
    let response = app(&env)
        .oneshot(request("GET", "/quantification/ds1", "", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// Job dispatch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn map_job_dispatch_publishes_and_lists() {
    let env = setup().await;
    seed_dataset(&env, "ds1", 10, false).await;

    let response = app(&env)
        .oneshot(request(
            "POST",
            "/quantification/ds1",
            "u1",
            Some(json!({
                "name": "First quant",
                "command": "map",
                "elements": ["Fe", "Ca"],
                "detectorConfig": "PIXL/v5",
                "runTimeSec": 60,
                "quantMode": "Combined"
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    let job_id = body["jobID"].as_str().unwrap().to_string();
    assert_eq!(job_id.len(), 16);

    // One start message on the topic
    let published = env.bus.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].dataset_id, "ds1");
    assert_eq!(published[0].job_id, job_id);

    // Parameters and status persisted for the external runner
    let params: Value = env
        .state
        .jobs
        .read_json(&paths::job_data_path("ds1", &job_id, "params.json"))
        .await
        .unwrap();
    assert_eq!(params["pmcsCount"], 10);
    assert_eq!(params["detectorConfig"], "DetectorConfig/PIXL/PiquantConfigs/v5");

    let status: Value = env
        .state
        .jobs
        .read_json(&paths::job_status_path("ds1", &job_id))
        .await
        .unwrap();
    assert_eq!(status["status"], "starting");

    // Once the external updater writes the per-dataset summary file the
    // job shows up as in-progress in the owner's listing
    let mut summaries = JobSummaryMap::new();
    summaries.insert(
        job_id.clone(),
        JobSummary {
            shared: false,
            params: JobParamsWithCount {
                pmcs_count: 10,
                params: JobStartingParameters {
                    name: "First quant".into(),
                    creator: UserInfo::new("u1", "User u1", "u1@example.com"),
                    ..Default::default()
                },
            },
            elements: vec![],
            status: JobStatus {
                job_id: job_id.clone(),
                status: JobState::Submitted,
                message: "Job submitted".into(),
                end_unix_time: 0,
                output_file_path: String::new(),
                piquant_log_list: vec![],
            },
        },
    );
    env.state
        .jobs
        .write_json(&paths::job_summaries_path("ds1"), &summaries)
        .await
        .unwrap();

    let response = app(&env)
        .oneshot(request("GET", "/quantification/ds1", "u1", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    let listed: Vec<&str> = body["summaries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["jobId"].as_str().unwrap())
        .collect();
    assert!(listed.contains(&job_id.as_str()));

    // Another user does not see it
    let response = app(&env)
        .oneshot(request("GET", "/quantification/ds1", "u2", None))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert!(body["summaries"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn map_job_validation() {
    let env = setup().await;
    seed_dataset(&env, "ds1", 4, false).await;

    // Missing name
    let response = app(&env)
        .oneshot(request(
            "POST",
            "/quantification/ds1",
            "u1",
            Some(json!({
                "command": "map",
                "elements": ["Fe"],
                "detectorConfig": "PIXL/v5",
                "runTimeSec": 60
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Malformed detector config
    let response = app(&env)
        .oneshot(request(
            "POST",
            "/quantification/ds1",
            "u1",
            Some(json!({
                "name": "Q",
                "command": "map",
                "elements": ["Fe"],
                "detectorConfig": "PIXL",
                "runTimeSec": 60
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Duplicate name against an existing quantification
    upload_quant(&env, "ds1", "u1", "Taken", &quant_csv(1.0, &[0, 1])).await;
    let response = app(&env)
        .oneshot(request(
            "POST",
            "/quantification/ds1",
            "u1",
            Some(json!({
                "name": "Taken",
                "command": "map",
                "elements": ["Fe"],
                "detectorConfig": "PIXL/v5",
                "runTimeSec": 60
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Quantification artifacts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn upload_get_and_conditional_download() {
    let env = setup().await;
    seed_dataset(&env, "ds1", 4, false).await;

    let job_id = upload_quant(&env, "ds1", "u1", "Uploaded", &quant_csv(2.5, &[0, 1, 2])).await;
    assert!(job_id.starts_with("upload_"));

    let response = app(&env)
        .oneshot(request(
            "GET",
            &format!("/quantification/ds1/{}", job_id),
            "u1",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["summary"]["params"]["quantMode"], "CombinedManual");
    assert_eq!(body["summary"]["status"], "complete");
    assert_eq!(body["summary"]["elements"], json!(["Fe"]));
    assert_eq!(
        body["url"],
        format!("/quantification/download/ds1/{}", job_id)
    );

    // First download: 200 with caching headers
    let response = app(&env)
        .oneshot(request(
            "GET",
            &format!("/quantification/download/ds1/{}", job_id),
            "u1",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let last_modified = response
        .headers()
        .get("last-modified")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();

    // Replay with If-Modified-Since: 304 and no body
    let req = Request::builder()
        .method("GET")
        .uri(format!("/quantification/download/ds1/{}", job_id))
        .header("x-user-id", "u1")
        .header("if-modified-since", &last_modified)
        .body(Body::empty())
        .unwrap();
    let response = app(&env).oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);

    // CSV stream is the original upload
    let response = app(&env)
        .oneshot(request(
            "GET",
            &format!("/quantification/download/ds1/{}/csv", job_id),
            "u1",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(
        String::from_utf8_lossy(&bytes),
        quant_csv(2.5, &[0, 1, 2])
    );
}

#[tokio::test]
async fn bless_shares_then_marks_latest() {
    let env = setup().await;
    seed_dataset(&env, "ds1", 4, false).await;
    let job_id = upload_quant(&env, "ds1", "u1", "To bless", &quant_csv(1.0, &[0, 1])).await;

    let response = app(&env)
        .oneshot(request(
            "POST",
            &format!("/quantification/bless/ds1/{}", job_id),
            "u1",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Implicitly shared: summary now present in the shared area
    let shared_summary = paths::quant_path(
        SHARE_USER_ID,
        "ds1",
        &paths::quant_summary_file_name(&job_id),
    );
    assert!(env.state.users.exists(&shared_summary).await.unwrap());

    // The listing surfaces the blessed pointer with its shared prefix
    let response = app(&env)
        .oneshot(request("GET", "/quantification/ds1", "u1", None))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(
        body["blessedQuant"]["jobID"],
        format!("shared-{}", job_id)
    );
    assert_eq!(body["blessedQuant"]["version"], 1);
}

#[tokio::test]
async fn delete_quant_ownership_and_cleanup() {
    let env = setup().await;
    seed_dataset(&env, "ds1", 4, false).await;
    let job_id = upload_quant(&env, "ds1", "u1", "Mine", &quant_csv(1.0, &[0])).await;

    // Share it, then another user cannot delete the shared copy
    let response = app(&env)
        .oneshot(request(
            "POST",
            &format!("/share/quantification/ds1/{}", job_id),
            "u1",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app(&env)
        .oneshot(request(
            "DELETE",
            &format!("/quantification/ds1/shared-{}", job_id),
            "u2",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // The owner deletes their private copy; summary and binary go away
    let response = app(&env)
        .oneshot(request(
            "DELETE",
            &format!("/quantification/ds1/{}", job_id),
            "u1",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let own_summary = paths::quant_path("u1", "ds1", &paths::quant_summary_file_name(&job_id));
    assert!(!env.state.users.exists(&own_summary).await.unwrap());
    let own_bin = paths::quant_path("u1", "ds1", &paths::quant_data_file_name(&job_id));
    assert!(!env.state.users.exists(&own_bin).await.unwrap());

    // Deleting again: 404
    let response = app(&env)
        .oneshot(request(
            "DELETE",
            &format!("/quantification/ds1/{}", job_id),
            "u1",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn sharing_shared_quant_rejected() {
    let env = setup().await;
    seed_dataset(&env, "ds1", 4, false).await;
    let job_id = upload_quant(&env, "ds1", "u1", "Once", &quant_csv(1.0, &[0])).await;

    let response = app(&env)
        .oneshot(request(
            "POST",
            &format!("/share/quantification/ds1/{}", job_id),
            "u1",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app(&env)
        .oneshot(request(
            "POST",
            &format!("/share/quantification/ds1/shared-{}", job_id),
            "u1",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Multi-quant combine
// ---------------------------------------------------------------------------

#[tokio::test]
async fn combine_summary_and_import() {
    let env = setup().await;
    seed_dataset(&env, "ds2", 4, false).await;
    seed_roi(&env, "u1", "ds2", "r1", vec![0, 1]).await;

    let q1 = upload_quant(&env, "ds2", "u1", "Quant one", &quant_csv(10.0, &[0, 1, 2, 3])).await;
    let q2 = upload_quant(&env, "ds2", "u1", "Quant two", &quant_csv(2.0, &[0, 1, 2, 3])).await;

    // Summary preview: r1 (on top) wins PMCs 0,1 from q1; RemainingPoints
    // fills 2,3 from q2. Fe average over the whole dataset:
    // (10 + 10 + 2 + 2) / 4
    let stack = json!([
        { "roiID": "r1", "quantID": q1 },
        { "roiID": "RemainingPoints", "quantID": q2 }
    ]);
    let response = app(&env)
        .oneshot(request(
            "POST",
            "/quantification/combine-list/ds2",
            "u1",
            Some(json!({ "roiZStack": stack.clone() })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["detectors"], json!(["Combined"]));
    assert_eq!(body["weightPercents"]["Fe"]["values"], json!([6.0]));
    assert_eq!(
        body["weightPercents"]["Fe"]["roiIDs"],
        json!(["RemainingPoints", "r1"])
    );

    // Full combine imports a new quantification
    let response = app(&env)
        .oneshot(request(
            "POST",
            "/quantification/combine/ds2",
            "u1",
            Some(json!({ "name": "Merged", "description": "", "roiZStack": stack })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    let merged_id = body["jobID"].as_str().unwrap().to_string();
    assert!(merged_id.starts_with("multi_"));

    let response = app(&env)
        .oneshot(request(
            "GET",
            &format!("/quantification/ds2/{}", merged_id),
            "u1",
            None,
        ))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["summary"]["params"]["quantMode"], "CombinedMultiQuant");
}

#[tokio::test]
async fn combine_rejects_bad_stacks() {
    let env = setup().await;
    seed_dataset(&env, "ds2", 4, false).await;

    // Single entry
    let response = app(&env)
        .oneshot(request(
            "POST",
            "/quantification/combine-list/ds2",
            "u1",
            Some(json!({ "roiZStack": [ { "roiID": "r1", "quantID": "q1" } ] })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // RemainingPoints not last
    let response = app(&env)
        .oneshot(request(
            "POST",
            "/quantification/combine-list/ds2",
            "u1",
            Some(json!({ "roiZStack": [
                { "roiID": "RemainingPoints", "quantID": "q1" },
                { "roiID": "r1", "quantID": "q2" }
            ] })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Workspaces and collections
// ---------------------------------------------------------------------------

#[tokio::test]
async fn workspace_save_conflict_and_force() {
    let env = setup().await;

    let body = json!({ "description": "", "viewState": {} });
    let response = app(&env)
        .oneshot(request(
            "PUT",
            "/view-state/saved/ds1/WS1",
            "u1",
            Some(body.clone()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app(&env)
        .oneshot(request(
            "PUT",
            "/view-state/saved/ds1/WS1",
            "u1",
            Some(body.clone()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app(&env)
        .oneshot(request(
            "PUT",
            "/view-state/saved/ds1/WS1?force=true",
            "u1",
            Some(body),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app(&env)
        .oneshot(request("GET", "/view-state/saved/ds1", "u1", None))
        .await
        .unwrap();
    let listed = extract_json(response.into_body()).await;
    assert_eq!(listed[0]["name"], "WS1");
}

#[tokio::test]
async fn workspace_share_autoshares_references() {
    let env = setup().await;
    seed_dataset(&env, "ds1", 4, false).await;
    seed_roi(&env, "u1", "ds1", "r1", vec![0, 1]).await;
    let quant_id = upload_quant(&env, "ds1", "u1", "Referenced", &quant_csv(1.0, &[0, 1])).await;

    let body = json!({
        "description": "",
        "viewState": {
            "roiQuantTables": {
                "top0": { "roi": "r1", "quantIDs": [quant_id] }
            },
            "quantification": { "appliedQuantID": quant_id }
        }
    });
    let response = app(&env)
        .oneshot(request("PUT", "/view-state/saved/ds1/WS2", "u1", Some(body)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Non-shared references block the share unless auto-share is requested
    let response = app(&env)
        .oneshot(request("POST", "/share/view-state/ds1/WS2", "u1", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app(&env)
        .oneshot(request(
            "POST",
            "/share/view-state/ds1/WS2?auto-share=true",
            "u1",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["id"], "shared-WS2");

    // The shared copy references only shared artifacts
    let response = app(&env)
        .oneshot(request("GET", "/view-state/saved/ds1/shared-WS2", "u2", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    let table = &body["viewState"]["roiQuantTables"]["top0"];
    let shared_roi = table["roi"].as_str().unwrap();
    assert!(shared_roi.starts_with("shared-"));
    assert_ne!(shared_roi, "shared-r1"); // fresh id, not a prefix slapped on
    assert_eq!(
        table["quantIDs"][0],
        format!("shared-{}", quant_id)
    );
    assert_eq!(
        body["viewState"]["quantification"]["appliedQuantID"],
        format!("shared-{}", quant_id)
    );

    // The auto-shared region exists in the shared area
    let shared_rois: std::collections::BTreeMap<String, RoiItem> = env
        .state
        .users
        .read_json(&paths::user_content_path(
            SHARE_USER_ID,
            "ds1",
            paths::ROI_FILE_NAME,
        ))
        .await
        .unwrap();
    let bare = shared_roi.trim_start_matches("shared-");
    assert!(shared_rois.contains_key(bare));
    assert!(shared_rois[bare].meta.shared);
}

#[tokio::test]
async fn workspace_reshare_overwrites_snapshot() {
    let env = setup().await;

    // No references, so no auto-share flag is needed
    let ws = json!({ "description": "first", "viewState": {} });
    app(&env)
        .oneshot(request("PUT", "/view-state/saved/ds1/WS6", "u1", Some(ws)))
        .await
        .unwrap();
    let response = app(&env)
        .oneshot(request("POST", "/share/view-state/ds1/WS6", "u1", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Edit the private copy, then re-share: the snapshot is refreshed
    // under the same id
    let ws = json!({ "description": "second", "viewState": {} });
    app(&env)
        .oneshot(request(
            "PUT",
            "/view-state/saved/ds1/WS6?force=true",
            "u1",
            Some(ws),
        ))
        .await
        .unwrap();
    let response = app(&env)
        .oneshot(request("POST", "/share/view-state/ds1/WS6", "u1", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["id"], "shared-WS6");

    let response = app(&env)
        .oneshot(request("GET", "/view-state/saved/ds1/shared-WS6", "u2", None))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["description"], "second");
}

#[tokio::test]
async fn collection_blocks_member_delete() {
    let env = setup().await;

    let ws = json!({ "description": "", "viewState": {} });
    app(&env)
        .oneshot(request("PUT", "/view-state/saved/ds1/WS3", "u1", Some(ws)))
        .await
        .unwrap();

    let collection = json!({ "description": "", "viewStateIDs": ["WS3"] });
    let response = app(&env)
        .oneshot(request(
            "PUT",
            "/view-state/collections/ds1/C1",
            "u1",
            Some(collection),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // A listed workspace cannot be deleted
    let response = app(&env)
        .oneshot(request("DELETE", "/view-state/saved/ds1/WS3", "u1", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Drop the collection first, then the workspace goes
    let response = app(&env)
        .oneshot(request("DELETE", "/view-state/collections/ds1/C1", "u1", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app(&env)
        .oneshot(request("DELETE", "/view-state/saved/ds1/WS3", "u1", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn public_collection_opens_anonymous_access() {
    let env = setup().await;
    seed_dataset(&env, "ds1", 4, true).await;

    let ws = json!({ "description": "", "viewState": {} });
    app(&env)
        .oneshot(request("PUT", "/view-state/saved/ds1/WS4", "u1", Some(ws)))
        .await
        .unwrap();
    let collection = json!({ "description": "", "viewStateIDs": ["WS4"] });
    app(&env)
        .oneshot(request(
            "PUT",
            "/view-state/collections/ds1/C2",
            "u1",
            Some(collection),
        ))
        .await
        .unwrap();

    // Anonymous sees nothing before sharing and publishing
    let response = app(&env)
        .oneshot(request("GET", "/view-state/collections/ds1", "", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listed = extract_json(response.into_body()).await;
    assert!(listed.as_array().unwrap().is_empty());

    let response = app(&env)
        .oneshot(request("GET", "/view-state/collections/ds1/C2", "", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app(&env)
        .oneshot(request(
            "POST",
            "/share/view-state-collection/ds1/C2",
            "u1",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app(&env)
        .oneshot(request("POST", "/public/collection/ds1/shared-C2", "u1", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Now the anonymous listing includes it and the body resolves with
    // the snapshots taken at share time
    let response = app(&env)
        .oneshot(request("GET", "/view-state/collections/ds1", "", None))
        .await
        .unwrap();
    let listed = extract_json(response.into_body()).await;
    // Exactly one entry: the shared copy, never a bare duplicate
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["name"], "shared-C2");

    let response = app(&env)
        .oneshot(request(
            "GET",
            "/view-state/collections/ds1/shared-C2",
            "",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert!(body["viewStates"]["WS4"].is_object());
}

// ---------------------------------------------------------------------------
// Store backends
// ---------------------------------------------------------------------------

#[tokio::test]
async fn local_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = ContentStore::local(dir.path()).unwrap();

    store
        .write_bytes("a/b/doc.json", bytes::Bytes::from_static(b"{\"v\":1}"))
        .await
        .unwrap();
    assert!(store.exists("a/b/doc.json").await.unwrap());

    let keys = store.list_keys("a/").await.unwrap();
    assert_eq!(keys, vec!["a/b/doc.json".to_string()]);

    let meta = store.head("a/b/doc.json").await.unwrap();
    assert_eq!(meta.size, 7);
}

// ---------------------------------------------------------------------------
// Reviewer magic links
// ---------------------------------------------------------------------------

#[tokio::test]
async fn magic_link_logs_reviewer_in() {
    let env = setup().await;

    // Reviewer workspace in the shared area
    let workspace = Workspace {
        name: "REV".into(),
        reviewer_id: Some("rev1".into()),
        meta: ObjectMeta::shared(UserInfo::new("u1", "", ""), 1000),
        ..Default::default()
    };
    env.state
        .users
        .write_json(&paths::workspace_path(SHARE_USER_ID, "ds1", "REV"), &workspace)
        .await
        .unwrap();

    regolith_api::db::upsert_user(
        &env.state.db,
        &regolith_api::db::DbUser {
            user_id: "rev1".into(),
            name: "Reviewer One".into(),
            email: "rev1@example.com".into(),
            non_secret_password: "pw123".into(),
            data_collection: false,
            expiration_unix_sec: 0,
        },
    )
    .await
    .unwrap();

    // Without the Reviewer role: rejected
    let response = app(&env)
        .oneshot(request(
            "POST",
            "/magiclink",
            "",
            Some(json!({ "magicLink": "ds1:shared-REV" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    env.identity.set_roles("rev1", vec!["Reviewer".into()]);
    let response = app(&env)
        .oneshot(request(
            "POST",
            "/magiclink",
            "",
            Some(json!({ "magicLink": "ds1:shared-REV" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["userId"], "rev1");
    assert_eq!(body["email"], "rev1@example.com");
    assert_eq!(body["nonSecretPassword"], "pw123");
    assert_eq!(body["token"], "test-token");
}

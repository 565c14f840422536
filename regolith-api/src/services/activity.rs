//! Fire-and-forget request telemetry.
//!
//! Records flow through a bounded channel drained by a background
//! task; when the channel is full the record is dropped and counted
//! rather than blocking the request. Only users who opted in to data
//! collection are persisted.

use crate::db;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct ActivityRecord {
    pub user_id: String,
    pub method: String,
    pub path: String,
    pub status: u16,
    pub recorded_unix_sec: i64,
}

#[derive(Clone)]
pub struct ActivityLogger {
    tx: mpsc::Sender<ActivityRecord>,
    dropped: Arc<AtomicU64>,
}

impl ActivityLogger {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_capacity(pool, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(pool: SqlitePool, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<ActivityRecord>(capacity);

        tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                match db::data_collection_enabled(&pool, &record.user_id).await {
                    Ok(true) => {
                        if let Err(err) = db::insert_activity(
                            &pool,
                            &record.user_id,
                            &record.method,
                            &record.path,
                            record.status,
                            record.recorded_unix_sec,
                        )
                        .await
                        {
                            tracing::warn!("Failed to persist activity record: {}", err);
                        }
                    }
                    Ok(false) => {}
                    Err(err) => {
                        tracing::warn!("Activity user lookup failed: {}", err);
                    }
                }
            }
        });

        ActivityLogger {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Queue a record without waiting; drops (and counts) on saturation
    pub fn record(&self, record: ActivityRecord) {
        if self.tx.try_send(record).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

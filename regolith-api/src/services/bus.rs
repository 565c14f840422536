//! Outbound job-start topic.
//!
//! The dispatcher publishes one message per job; an external runner
//! consumes the topic, executes, and writes status/output objects back
//! into the jobs store.

use async_trait::async_trait;
use regolith_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Message published when a job should start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobTriggerMessage {
    #[serde(rename = "datasetID")]
    pub dataset_id: String,
    #[serde(rename = "jobID")]
    pub job_id: String,
}

#[async_trait]
pub trait JobBus: Send + Sync {
    async fn publish(&self, msg: &JobTriggerMessage) -> Result<()>;
}

/// Publishes to an HTTP topic endpoint
pub struct HttpTopicBus {
    client: reqwest::Client,
    topic_url: String,
}

impl HttpTopicBus {
    pub fn new(topic_url: impl Into<String>) -> Self {
        HttpTopicBus {
            client: reqwest::Client::new(),
            topic_url: topic_url.into(),
        }
    }
}

#[async_trait]
impl JobBus for HttpTopicBus {
    async fn publish(&self, msg: &JobTriggerMessage) -> Result<()> {
        let resp = self.client.post(&self.topic_url).json(msg).send().await?;
        if !resp.status().is_success() {
            return Err(Error::Internal(format!(
                "Job topic publish failed: {}",
                resp.status()
            )));
        }
        tracing::info!(dataset = %msg.dataset_id, job = %msg.job_id, "published job start");
        Ok(())
    }
}

/// Records published messages; used by tests and local runs without a topic
#[derive(Default)]
pub struct RecordingBus {
    published: Mutex<Vec<JobTriggerMessage>>,
}

impl RecordingBus {
    pub fn new() -> Self {
        RecordingBus::default()
    }

    pub fn published(&self) -> Vec<JobTriggerMessage> {
        self.published.lock().map(|msgs| msgs.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl JobBus for RecordingBus {
    async fn publish(&self, msg: &JobTriggerMessage) -> Result<()> {
        tracing::debug!(dataset = %msg.dataset_id, job = %msg.job_id, "job start (recorded)");
        if let Ok(mut msgs) = self.published.lock() {
            msgs.push(msg.clone());
        }
        Ok(())
    }
}

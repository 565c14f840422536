//! Quantification job records: status, starting parameters, summaries
//! and the per-dataset bless history.
//!
//! Status records are written by the external compute fleet and are
//! read-only here. Wire names are kept compatible with records already
//! in the store.

use super::user::UserInfo;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Job lifecycle states. Serialized names match what the external
/// updater writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    #[serde(rename = "starting")]
    Submitted,
    #[serde(rename = "preparing_nodes")]
    Starting,
    #[serde(rename = "nodes_running")]
    Running,
    #[serde(rename = "gathering_results")]
    Gathering,
    #[serde(rename = "complete")]
    Complete,
    #[serde(rename = "error")]
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Complete | JobState::Failed)
    }
}

/// Externally written job status descriptor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub job_id: String,
    pub status: JobState,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub end_unix_time: i64,
    #[serde(default)]
    pub output_file_path: String,
    #[serde(default)]
    pub piquant_log_list: Vec<String>,
}

/// Quantification modes
pub mod quant_mode {
    pub const AB: &str = "AB";
    pub const COMBINED: &str = "Combined";
    pub const AB_BULK: &str = "ABBulk";
    pub const COMBINED_BULK: &str = "CombinedBulk";
    pub const AB_MANUAL: &str = "ABManual";
    pub const COMBINED_MANUAL: &str = "CombinedManual";
    pub const COMBINED_MULTI_QUANT: &str = "CombinedMultiQuant";
    pub const AB_MULTI_QUANT: &str = "ABMultiQuant";
}

/// Parameters captured at job creation time
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStartingParameters {
    pub name: String,
    #[serde(rename = "datasetID")]
    pub dataset_id: String,
    pub detector_config: String,
    pub elements: Vec<String>,
    #[serde(default)]
    pub parameters: String,
    pub run_time_sec: i32,
    #[serde(default)]
    pub cores_per_node: i32,
    pub start_unix_time: i64,
    pub creator: UserInfo,
    #[serde(default)]
    pub roi_ids: Vec<String>,
    #[serde(default)]
    pub quant_mode: String,
    #[serde(default)]
    pub comments: String,
    #[serde(default)]
    pub command: String,
}

/// Starting parameters plus the resolved point count
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobParamsWithCount {
    #[serde(rename = "pmcsCount", default)]
    pub pmcs_count: i32,
    #[serde(flatten)]
    pub params: JobStartingParameters,
}

/// All metadata stored for one job, completed or in progress
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    pub shared: bool,
    pub params: JobParamsWithCount,
    #[serde(default)]
    pub elements: Vec<String>,
    #[serde(flatten)]
    pub status: JobStatus,
}

impl JobSummary {
    /// Older persisted summaries predate the top-level element list;
    /// fall back to the elements the job was started with.
    pub fn set_missing_fields(mut self) -> Self {
        if self.elements.is_empty() {
            self.elements = self.params.params.elements.clone();
        }
        self
    }
}

/// Per-dataset summary file written by the external updater
pub type JobSummaryMap = HashMap<String, JobSummary>;

/// One endorsement in a dataset's bless history
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlessItem {
    pub version: i32,
    pub blessed_at: i64,
    pub user_id: String,
    pub user_name: String,
    #[serde(rename = "jobID")]
    pub job_id: String,
}

/// Append-only bless history, one file per dataset
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlessFile {
    pub history: Vec<BlessItem>,
}

impl BlessFile {
    /// The currently blessed entry (highest version), if any
    pub fn latest(&self) -> Option<&BlessItem> {
        self.history.iter().max_by_key(|item| item.version)
    }

    /// Version number the next bless entry should carry
    pub fn next_version(&self) -> i32 {
        self.latest().map(|item| item.version + 1).unwrap_or(1)
    }

    pub fn append(&mut self, blessed_at: i64, user: &UserInfo, job_id: &str) {
        let version = self.next_version();
        self.history.push(BlessItem {
            version,
            blessed_at,
            user_id: user.user_id.clone(),
            user_name: user.name.clone(),
            job_id: job_id.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bless_versions_monotonic() {
        let user = UserInfo::new("u1", "User One", "u1@example.com");
        let mut bless = BlessFile::default();
        assert_eq!(bless.next_version(), 1);

        bless.append(100, &user, "q1");
        bless.append(200, &user, "q2");
        bless.append(300, &user, "q3");

        let versions: Vec<i32> = bless.history.iter().map(|b| b.version).collect();
        assert_eq!(versions, vec![1, 2, 3]);
        assert_eq!(bless.latest().unwrap().job_id, "q3");
    }

    #[test]
    fn latest_survives_reordered_history() {
        let user = UserInfo::new("u1", "User One", "u1@example.com");
        let mut bless = BlessFile::default();
        bless.append(100, &user, "q1");
        bless.append(200, &user, "q2");
        bless.history.reverse();
        assert_eq!(bless.latest().unwrap().version, 2);
        assert_eq!(bless.next_version(), 3);
    }

    #[test]
    fn job_state_wire_names() {
        assert_eq!(
            serde_json::to_string(&JobState::Running).unwrap(),
            "\"nodes_running\""
        );
        let state: JobState = serde_json::from_str("\"complete\"").unwrap();
        assert!(state.is_terminal());
    }

    #[test]
    fn missing_elements_fall_back_to_params() {
        let mut params = JobParamsWithCount::default();
        params.params.elements = vec!["Fe".into(), "Ca".into()];
        let summary = JobSummary {
            shared: false,
            params,
            elements: vec![],
            status: JobStatus {
                job_id: "j1".into(),
                status: JobState::Running,
                message: String::new(),
                end_unix_time: 0,
                output_file_path: String::new(),
                piquant_log_list: vec![],
            },
        };
        let patched = summary.set_missing_fields();
        assert_eq!(patched.elements, vec!["Fe".to_string(), "Ca".to_string()]);

        // A populated list is left alone
        let mut params = JobParamsWithCount::default();
        params.params.elements = vec!["Fe".into()];
        let summary = JobSummary {
            shared: false,
            params,
            elements: vec!["Si".into()],
            status: JobStatus {
                job_id: "j2".into(),
                status: JobState::Complete,
                message: String::new(),
                end_unix_time: 0,
                output_file_path: String::new(),
                piquant_log_list: vec![],
            },
        };
        assert_eq!(summary.set_missing_fields().elements, vec!["Si".to_string()]);
    }

    #[test]
    fn summary_flattens_status() {
        let summary = JobSummary {
            shared: false,
            params: JobParamsWithCount::default(),
            elements: vec!["Fe".into()],
            status: JobStatus {
                job_id: "j1".into(),
                status: JobState::Complete,
                message: "done".into(),
                end_unix_time: 5,
                output_file_path: String::new(),
                piquant_log_list: vec![],
            },
        };
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["jobId"], "j1");
        assert_eq!(value["status"], "complete");
        assert_eq!(value["shared"], false);
    }
}

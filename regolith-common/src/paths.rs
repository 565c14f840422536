//! Object store key layout.
//!
//! Jobs bucket:
//! - `JobData/{dataset}/{job}/…` — parameters, external writer outputs
//! - `JobStatus/{dataset}/{job}-status.json` — status records
//! - `JobSummaries/{dataset}-jobs.json` — per-dataset summary files
//!
//! User content bucket:
//! - `UserContent/{user}/{dataset}/Quantification/{job}{-summary.json|.bin|.csv|-logs/…}`
//! - `UserContent/{user}/{dataset}/ROI.json`
//! - `UserContent/{user}/{dataset}/ViewState/…`
//! - `UserContent/{user}/DataExpressions.json`, `RGBMixes.json`, `ElementSets.json`
//! - `UserContent/shared/…` — mirror namespace for shared artifacts
//!
//! Datasets bucket:
//! - `Datasets/{dataset}/index.json`

pub const ROOT_JOB_DATA: &str = "JobData";
pub const ROOT_JOB_STATUS: &str = "JobStatus";
pub const ROOT_JOB_SUMMARIES: &str = "JobSummaries";
pub const ROOT_USER_CONTENT: &str = "UserContent";
pub const ROOT_DATASETS: &str = "Datasets";

pub const JOB_STATUS_SUFFIX: &str = "-status.json";
pub const JOB_SUMMARY_SUFFIX: &str = "-jobs.json";
pub const QUANT_SUMMARY_PREFIX: &str = "summary-";

/// Subdirectory of a job's data dir where the external runner writes outputs
pub const JOB_OUTPUT_DIR: &str = "output";
/// Subdirectory where the external runner writes per-node logs
pub const JOB_LOG_DIR: &str = "piquant-logs";
/// Where the most recent diagnostic command output/log is kept per dataset
pub const JOB_LAST_DIR: &str = "LastRun";

pub const QUANTIFICATION_DIR: &str = "Quantification";
pub const BLESS_FILE_NAME: &str = "blessed-quant.json";

pub const ROI_FILE_NAME: &str = "ROI.json";
pub const EXPRESSION_FILE_NAME: &str = "DataExpressions.json";
pub const RGB_MIX_FILE_NAME: &str = "RGBMixes.json";
pub const ELEMENT_SET_FILE_NAME: &str = "ElementSets.json";

pub const PUBLIC_OBJECTS_FILE: &str = "Public/public-objects.json";

/// Detector configuration layout within the configuration area
pub const DETECTOR_CONFIG_DIR: &str = "DetectorConfig";
pub const PIQUANT_CONFIG_SUB_DIR: &str = "PiquantConfigs";

// --- jobs bucket ---

pub fn job_data_path(dataset_id: &str, job_id: &str, file_name: &str) -> String {
    if file_name.is_empty() {
        format!("{}/{}/{}", ROOT_JOB_DATA, dataset_id, job_id)
    } else {
        format!("{}/{}/{}/{}", ROOT_JOB_DATA, dataset_id, job_id, file_name)
    }
}

pub fn job_status_path(dataset_id: &str, job_id: &str) -> String {
    format!(
        "{}/{}/{}{}",
        ROOT_JOB_STATUS, dataset_id, job_id, JOB_STATUS_SUFFIX
    )
}

pub fn job_summaries_path(dataset_id: &str) -> String {
    format!(
        "{}/{}{}",
        ROOT_JOB_SUMMARIES, dataset_id, JOB_SUMMARY_SUFFIX
    )
}

/// Key for the latest diagnostic command artifact (`kind` is `output` or `log`)
pub fn job_last_run_path(dataset_id: &str, command: &str, kind: &str) -> String {
    format!(
        "{}/{}/{}/{}/{}",
        ROOT_JOB_DATA, dataset_id, JOB_LAST_DIR, command, kind
    )
}

// --- user content bucket ---

pub fn user_content_path(user_id: &str, dataset_id: &str, file_name: &str) -> String {
    if file_name.is_empty() {
        format!("{}/{}/{}", ROOT_USER_CONTENT, user_id, dataset_id)
    } else {
        format!("{}/{}/{}/{}", ROOT_USER_CONTENT, user_id, dataset_id, file_name)
    }
}

pub fn user_file_path(user_id: &str, file_name: &str) -> String {
    format!("{}/{}/{}", ROOT_USER_CONTENT, user_id, file_name)
}

pub fn quant_path(user_id: &str, dataset_id: &str, file_name: &str) -> String {
    if file_name.is_empty() {
        format!(
            "{}/{}/{}/{}",
            ROOT_USER_CONTENT, user_id, dataset_id, QUANTIFICATION_DIR
        )
    } else {
        format!(
            "{}/{}/{}/{}/{}",
            ROOT_USER_CONTENT, user_id, dataset_id, QUANTIFICATION_DIR, file_name
        )
    }
}

pub fn quant_summary_file_name(job_id: &str) -> String {
    format!("{}{}.json", QUANT_SUMMARY_PREFIX, job_id)
}

pub fn quant_data_file_name(job_id: &str) -> String {
    format!("{}.bin", job_id)
}

pub fn quant_csv_file_name(job_id: &str) -> String {
    format!("{}.csv", job_id)
}

pub fn quant_log_dir_name(job_id: &str) -> String {
    format!("{}-logs", job_id)
}

pub fn bless_file_path(dataset_id: &str) -> String {
    quant_path(crate::ident::SHARE_USER_ID, dataset_id, BLESS_FILE_NAME)
}

pub fn workspace_path(user_id: &str, dataset_id: &str, workspace_id: &str) -> String {
    user_content_path(
        user_id,
        dataset_id,
        &format!("ViewState/Workspaces/{}.json", workspace_id),
    )
}

pub fn workspace_prefix(user_id: &str, dataset_id: &str) -> String {
    user_content_path(user_id, dataset_id, "ViewState/Workspaces/")
}

pub fn collection_path(user_id: &str, dataset_id: &str, collection_id: &str) -> String {
    user_content_path(
        user_id,
        dataset_id,
        &format!("ViewState/Collections/{}.json", collection_id),
    )
}

pub fn collection_prefix(user_id: &str, dataset_id: &str) -> String {
    user_content_path(user_id, dataset_id, "ViewState/Collections/")
}

pub fn last_view_state_path(user_id: &str, dataset_id: &str) -> String {
    user_content_path(user_id, dataset_id, "ViewState/LastSaved.json")
}

// --- datasets bucket ---

pub fn dataset_index_path(dataset_id: &str) -> String {
    format!("{}/{}/index.json", ROOT_DATASETS, dataset_id)
}

/// Translate a `name/version` detector reference into its configuration path
pub fn detector_config_path(name: &str, version: &str) -> String {
    format!(
        "{}/{}/{}/{}",
        DETECTOR_CONFIG_DIR, name, PIQUANT_CONFIG_SUB_DIR, version
    )
}

/// Sanitize a user-supplied name for use within an object key
pub fn make_valid_object_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            _ => c,
        })
        .filter(|c| !matches!(c, '?' | '$' | '#' | '!' | '\'' | '"'))
        .collect()
}

/// Strip directory and extension from an object key, leaving the bare name
pub fn file_stem_of_key(key: &str) -> String {
    let base = key.rsplit('/').next().unwrap_or(key);
    match base.rfind('.') {
        Some(dot) => base[..dot].to_string(),
        None => base.to_string(),
    }
}

//! Wire and persisted data models

pub mod dataset;
pub mod expression;
pub mod job;
pub mod quantdata;
pub mod roi;
pub mod user;
pub mod viewstate;
pub mod visibility;

pub use dataset::{DatasetIndex, DatasetLocation};
pub use expression::{ElementSetItem, ExpressionItem, ModuleReference, RgbMixItem};
pub use job::{BlessFile, BlessItem, JobState, JobStatus, JobSummary, JobSummaryMap};
pub use quantdata::{QuantDetector, QuantFile, QuantPoint};
pub use roi::RoiItem;
pub use user::{ObjectMeta, UserInfo};
pub use viewstate::{Collection, WholeViewState, Workspace};
pub use visibility::PublicObjects;

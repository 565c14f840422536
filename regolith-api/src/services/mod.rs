//! External collaborators: job bus, identity provider, activity telemetry

pub mod activity;
pub mod bus;
pub mod identity;

pub use activity::{ActivityLogger, ActivityRecord};
pub use bus::{HttpTopicBus, JobBus, JobTriggerMessage, RecordingBus};
pub use identity::{Auth0Provider, IdentityProvider, StaticIdentityProvider};

pub mod orchestrator;
pub mod publisher;
pub mod results;
pub mod scheduler;
pub mod timer;
pub mod tracker;

pub use orchestrator::{Orchestrator, OrchestratorOptions};
pub use publisher::{PublishPolicy, Publisher, TRUNCATED_BODY_CHARS};
pub use results::{ResultKind, ResultStore};
pub use scheduler::{missed_triggers, next_trigger, BackgroundService};
pub use timer::Pacer;
pub use tracker::MetricsTracker;

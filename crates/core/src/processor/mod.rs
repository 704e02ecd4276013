//! The post-processing pipeline: queues, the dispatcher task and the
//! handle producers talk to.

mod dispatcher;
mod postprocessor;
mod queues;
mod types;

pub use postprocessor::{Collaborators, Postprocessor};
pub use types::{DispatcherState, PipelineStatus, QueueDepths};

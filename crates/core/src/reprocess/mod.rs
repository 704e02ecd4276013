//! Offline reprocess stage (rotation, scaling, format conversion before
//! encoding).

mod coordinator;
mod traits;
mod types;

pub use coordinator::ReprocessCoordinator;
pub use traits::{ReprocessChannel, ReprocessProvider};
pub use types::{
    ReprocessCallback, ReprocessConfig, ReprocessInput, ReprocessTicket, ReprocessType,
};

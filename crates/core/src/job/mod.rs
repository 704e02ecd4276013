//! Job payloads and the correlation rules that pair them.
//!
//! Frames, metadata and settings arrive from independent producers. A frame
//! is joined with the oldest metadata and settings that correlate with it:
//! the same request id, or no id on either side (arrival order).

mod settings;
mod types;

pub use settings::{EncodeSettings, GpsCoordinates};
pub use types::{
    EncodeJob, FrameworkInput, FrameworkReprocessConfig, JobSource, PendingFrame, PostprocessJob,
};

/// Frame number of a capture request.
pub type RequestId = u32;

/// Whether two optional request ids may belong to the same request.
pub fn correlates(a: Option<RequestId>, b: Option<RequestId>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}

/// Whether `later` belongs to a request issued after `request`.
///
/// Producers submit in request order, so seeing a later id at the head of
/// a queue means the companion for `request` will never arrive.
pub fn supersedes(later: Option<RequestId>, request: Option<RequestId>) -> bool {
    matches!((later, request), (Some(later), Some(request)) if later > request)
}

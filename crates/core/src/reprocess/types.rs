//! Types exchanged with the offline reprocess channel.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::buffer::{BufferDescriptor, CaptureMetadata, Dimension, ImageFormat, RawFrame};
use crate::job::RequestId;

/// Kind of offline pass a session needs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReprocessType {
    /// Frames go straight to the encoder.
    #[default]
    None,
    /// Reprocess into the JPEG encoder's input; the channel starts with the
    /// pipeline.
    Jpeg,
    /// Reprocess into a private format; the channel starts on first use.
    Private,
}

impl ReprocessType {
    pub fn is_required(&self) -> bool {
        !matches!(self, Self::None)
    }

    pub fn starts_immediately(&self) -> bool {
        matches!(self, Self::Jpeg)
    }
}

/// Configuration of the offline reprocess channel for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReprocessConfig {
    pub reprocess_type: ReprocessType,
    pub input: Dimension,
    pub output: Dimension,
    pub format: ImageFormat,
}

/// Pipeline-assigned id correlating a reprocess submission with its result.
pub type ReprocessTicket = u64;

/// What the channel needs to run one offline pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ReprocessInput {
    pub ticket: ReprocessTicket,
    pub request_id: Option<RequestId>,
    pub source: Vec<BufferDescriptor>,
    pub metadata: Option<CaptureMetadata>,
    /// Rotation the pass must apply, in degrees.
    pub orientation: i32,
}

/// Invoked by the channel, from its own context, with the reprocessed frame.
pub type ReprocessCallback = Arc<dyn Fn(ReprocessTicket, RawFrame) + Send + Sync>;

//! Types exchanged with the hardware JPEG encoder.

use serde::Serialize;
use std::sync::Arc;

use crate::buffer::{
    BufferDescriptor, CaptureMetadata, ColorFormat, Dimension, FrameLayout, ThreeAVersion,
};
use crate::job::RequestId;
use crate::tags::TagEntrySet;

/// Handle of an opened encoder client.
pub type ClientHandle = u32;

/// Identifier of an encoder session.
pub type SessionId = u32;

/// Opaque id the encoder assigns to an accepted job.
pub type HwJobId = u32;

/// What the encoder hardware can do on its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncoderCapabilities {
    /// The encoder rotates while encoding, so frames need no pre-rotation.
    pub hardware_rotation: bool,
}

/// Outcome reported by the encoder for a finished job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum EncodeStatus {
    Done { size: usize },
    Failed,
}

impl EncodeStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Done { .. } => "done",
            Self::Failed => "failed",
        }
    }
}

/// Invoked by the encoder, from its own context, when a job finishes.
pub type JobCallback = Arc<dyn Fn(HwJobId, EncodeStatus) + Send + Sync>;

/// Geometry of the main image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageParams {
    pub src: FrameLayout,
    pub dst: Dimension,
    pub color_format: ColorFormat,
}

/// Geometry and quality of the embedded thumbnail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailParams {
    pub src: Dimension,
    pub dst: Dimension,
    pub quality: i32,
}

/// Configuration an encoder session is bound to.
///
/// Two jobs with equal parameters may share a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParams {
    pub main: ImageParams,
    pub thumbnail: Option<ThumbnailParams>,
    pub quality: i32,
    /// Rotation applied by the encoder itself, in degrees.
    pub rotation: i32,
}

/// Debug data the encoder embeds next to the EXIF entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExifDebugInfo {
    pub three_a_version: Option<ThreeAVersion>,
}

impl ExifDebugInfo {
    pub fn from_capture(capture: Option<&CaptureMetadata>) -> Self {
        Self {
            three_a_version: capture.and_then(|c| c.three_a_version),
        }
    }
}

/// One job handed to the encoder.
#[derive(Debug, Clone)]
pub struct EncodeRequest {
    pub session: SessionId,
    pub params: SessionParams,
    pub source: BufferDescriptor,
    pub output: BufferDescriptor,
    pub tags: TagEntrySet,
    pub debug: ExifDebugInfo,
    pub metadata: Option<CaptureMetadata>,
}

/// A finished JPEG handed back to the output buffer owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncodeOutput {
    pub request_id: Option<RequestId>,
    pub job_id: HwJobId,
    pub output_index: u32,
    pub status: EncodeStatus,
}

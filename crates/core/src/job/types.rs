//! Job payloads moving between the pipeline queues.

use super::{EncodeSettings, RequestId};
use crate::buffer::{CaptureMetadata, Dimension, ImageFormat, MetadataFrame, RawFrame};
use crate::queue::Release;
use crate::reprocess::ReprocessType;

/// A captured frame waiting for its metadata and settings.
#[derive(Debug)]
pub struct PendingFrame {
    pub frame: RawFrame,
    pub request_id: Option<RequestId>,
    /// Output slot overriding the one named by the settings.
    pub output_index: Option<u32>,
}

impl PendingFrame {
    pub fn new(frame: RawFrame) -> Self {
        Self {
            frame,
            request_id: None,
            output_index: None,
        }
    }
}

/// How a framework-supplied input must be processed.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameworkReprocessConfig {
    pub input: Dimension,
    pub output: Dimension,
    pub format: ImageFormat,
    pub reprocess_type: ReprocessType,
}

/// A pre-built reprocess input handed over by the camera framework.
#[derive(Debug)]
pub struct FrameworkInput {
    pub request_id: Option<RequestId>,
    pub frame: RawFrame,
    /// Capture results the framework recorded for the input.
    pub metadata: CaptureMetadata,
    pub config: FrameworkReprocessConfig,
}

/// Where a post-process job's image comes from.
#[derive(Debug)]
pub enum JobSource {
    Captured(RawFrame),
    Framework(FrameworkInput),
}

impl JobSource {
    pub fn frame(&self) -> &RawFrame {
        match self {
            Self::Captured(frame) => frame,
            Self::Framework(input) => &input.frame,
        }
    }
}

/// A request waiting for, or going through, the reprocess stage.
#[derive(Debug)]
pub struct PostprocessJob {
    pub request_id: Option<RequestId>,
    pub source: JobSource,
    pub metadata: Option<MetadataFrame>,
    pub settings: EncodeSettings,
    pub output_index: Option<u32>,
}

impl PostprocessJob {
    /// Joins a captured frame with its metadata and settings.
    pub fn captured(pending: PendingFrame, metadata: MetadataFrame, settings: EncodeSettings) -> Self {
        Self {
            request_id: pending
                .request_id
                .or(metadata.request_id())
                .or(settings.request_id),
            source: JobSource::Captured(pending.frame),
            metadata: Some(metadata),
            settings,
            output_index: pending.output_index,
        }
    }

    /// Joins a framework input with its settings.
    pub fn framework(input: FrameworkInput, settings: EncodeSettings) -> Self {
        Self {
            request_id: input.request_id.or(settings.request_id),
            source: JobSource::Framework(input),
            metadata: None,
            settings,
            output_index: None,
        }
    }

    /// Capture results the reprocess stage should see.
    pub fn capture_metadata(&self) -> Option<&CaptureMetadata> {
        match &self.source {
            JobSource::Framework(input) => Some(&input.metadata),
            JobSource::Captured(_) => self.metadata.as_ref().map(MetadataFrame::metadata),
        }
    }
}

impl Release for PostprocessJob {
    fn release(self) {
        match self.source {
            JobSource::Captured(frame) => frame.release(),
            JobSource::Framework(input) => input.release(),
        }
        if let Some(metadata) = self.metadata {
            metadata.release();
        }
    }
}

/// A request ready for, or submitted to, the JPEG encoder.
///
/// Exactly one of `src_frame` and `reproc_frame` is the image to encode.
#[derive(Debug, Default)]
pub struct EncodeJob {
    pub request_id: Option<RequestId>,
    /// Frame encoded as captured.
    pub src_frame: Option<RawFrame>,
    /// Output of a reprocess pass.
    pub reproc_frame: Option<RawFrame>,
    /// Input of the reprocess pass, held until the encode finishes.
    pub src_reproc_frame: Option<RawFrame>,
    pub metadata: Option<MetadataFrame>,
    /// Capture results of a framework input, which has no metadata buffer.
    pub framework_metadata: Option<CaptureMetadata>,
    pub settings: EncodeSettings,
    /// Destination size requested by the framework for its input.
    pub output_dim: Option<Dimension>,
    pub output_index: Option<u32>,
}

impl EncodeJob {
    /// Encodes a post-process job's frame as is.
    pub fn direct(job: PostprocessJob) -> Self {
        let mut encode = Self {
            request_id: job.request_id,
            metadata: job.metadata,
            settings: job.settings,
            output_index: job.output_index,
            ..Default::default()
        };
        match job.source {
            JobSource::Captured(frame) => encode.src_frame = Some(frame),
            JobSource::Framework(input) => {
                encode.src_frame = Some(input.frame);
                encode.framework_metadata = Some(input.metadata);
                encode.output_dim = Some(input.config.output);
            }
        }
        encode
    }

    /// Encodes the output of a finished reprocess pass.
    pub fn reprocessed(job: PostprocessJob, output: RawFrame) -> Self {
        let mut encode = Self {
            request_id: job.request_id,
            reproc_frame: Some(output),
            metadata: job.metadata,
            settings: job.settings,
            output_index: job.output_index,
            ..Default::default()
        };
        match job.source {
            JobSource::Captured(frame) => encode.src_reproc_frame = Some(frame),
            JobSource::Framework(input) => {
                encode.src_reproc_frame = Some(input.frame);
                encode.framework_metadata = Some(input.metadata);
            }
        }
        encode
    }

    /// Output slot receiving the JPEG stream.
    pub fn output_index(&self) -> u32 {
        self.output_index.unwrap_or(self.settings.out_buf_index)
    }

    /// Capture results used for tag assembly.
    pub fn capture_metadata(&self) -> Option<&CaptureMetadata> {
        self.metadata
            .as_ref()
            .map(MetadataFrame::metadata)
            .or(self.framework_metadata.as_ref())
    }
}

impl Release for EncodeJob {
    fn release(self) {
        let frames = [self.src_frame, self.reproc_frame, self.src_reproc_frame];
        for frame in frames.into_iter().flatten() {
            frame.release();
        }
        if let Some(metadata) = self.metadata {
            metadata.release();
        }
    }
}

impl Release for PendingFrame {
    fn release(self) {
        self.frame.release();
    }
}

impl Release for FrameworkInput {
    fn release(self) {
        self.frame.release();
    }
}

impl Release for MetadataFrame {
    fn release(self) {
        MetadataFrame::release(self);
    }
}

impl Release for EncodeSettings {
    fn release(self) {}
}

//! Scoped handles over buffers borrowed from a capture channel.

use std::fmt;
use std::sync::Arc;

use super::types::{BufferDescriptor, CaptureMetadata, FrameLayout};
use crate::job::RequestId;

/// The channel a borrowed buffer must be returned to.
pub trait FrameOwner: Send + Sync {
    /// Identifier of the owning channel.
    fn channel_id(&self) -> u32;

    /// Takes back the image buffers of a frame.
    fn buf_done(&self, stream_id: u32, buffers: Vec<BufferDescriptor>);

    /// Takes back a per-capture metadata buffer.
    fn metadata_buf_done(&self, buffer: BufferDescriptor);
}

/// A captured (or reprocessed) frame borrowed from its channel.
///
/// The buffers go back to the owner exactly once: through [`RawFrame::release`]
/// or, if the handle is dropped first, from `Drop`.
pub struct RawFrame {
    stream_id: u32,
    channel_id: u32,
    buffers: Vec<BufferDescriptor>,
    owner: Option<Arc<dyn FrameOwner>>,
}

impl RawFrame {
    pub fn new(stream_id: u32, buffers: Vec<BufferDescriptor>, owner: Arc<dyn FrameOwner>) -> Self {
        Self {
            stream_id,
            channel_id: owner.channel_id(),
            buffers,
            owner: Some(owner),
        }
    }

    pub fn stream_id(&self) -> u32 {
        self.stream_id
    }

    pub fn channel_id(&self) -> u32 {
        self.channel_id
    }

    pub fn buffers(&self) -> &[BufferDescriptor] {
        &self.buffers
    }

    /// The buffer carrying the main image.
    pub fn main_buffer(&self) -> Option<&BufferDescriptor> {
        self.buffers.first()
    }

    /// Layout of the main image, if the frame has any buffer.
    pub fn layout(&self) -> Option<&FrameLayout> {
        self.main_buffer().map(|b| &b.layout)
    }

    /// Returns the buffers to the owning channel.
    pub fn release(mut self) {
        self.give_back();
    }

    fn give_back(&mut self) {
        if let Some(owner) = self.owner.take() {
            owner.buf_done(self.stream_id, std::mem::take(&mut self.buffers));
        }
    }
}

impl Drop for RawFrame {
    fn drop(&mut self) {
        if self.owner.is_some() {
            tracing::debug!(
                "Returning frame from stream {} (channel {}) on drop",
                self.stream_id,
                self.channel_id
            );
        }
        self.give_back();
    }
}

impl fmt::Debug for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawFrame")
            .field("stream_id", &self.stream_id)
            .field("channel_id", &self.channel_id)
            .field("buffers", &self.buffers.len())
            .field("returned", &self.owner.is_none())
            .finish()
    }
}

/// A per-capture metadata buffer borrowed from its channel.
pub struct MetadataFrame {
    request_id: Option<RequestId>,
    buffer: Option<BufferDescriptor>,
    metadata: CaptureMetadata,
    owner: Arc<dyn FrameOwner>,
}

impl MetadataFrame {
    pub fn new(buffer: BufferDescriptor, metadata: CaptureMetadata, owner: Arc<dyn FrameOwner>) -> Self {
        Self {
            request_id: None,
            buffer: Some(buffer),
            metadata,
            owner,
        }
    }

    /// Tags the metadata with the request it was captured for.
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    pub fn request_id(&self) -> Option<RequestId> {
        self.request_id
    }

    pub fn metadata(&self) -> &CaptureMetadata {
        &self.metadata
    }

    /// Replaces the capture fields, as a reprocess pass may report new ones.
    pub fn set_metadata(&mut self, metadata: CaptureMetadata) {
        self.metadata = metadata;
    }

    pub fn buffer(&self) -> Option<&BufferDescriptor> {
        self.buffer.as_ref()
    }

    /// Returns the buffer to the owning channel.
    pub fn release(mut self) {
        self.give_back();
    }

    fn give_back(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            self.owner.metadata_buf_done(buffer);
        }
    }
}

impl Drop for MetadataFrame {
    fn drop(&mut self) {
        self.give_back();
    }
}

impl fmt::Debug for MetadataFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataFrame")
            .field("request_id", &self.request_id)
            .field("metadata", &self.metadata)
            .field("returned", &self.buffer.is_none())
            .finish()
    }
}

//! Mock buffer owners for testing.

use std::sync::{Arc, Mutex, PoisonError};

use crate::buffer::{
    BufferDescriptor, CaptureMetadata, Dimension, FrameLayout, FrameOwner, ImageFormat,
    MetadataFrame, PlaneInfo, RawFrame,
};
use crate::encoder::{EncodeOutput, OutputBuffers};

/// A 640x480 NV21 layout with a single luma plane.
pub fn default_layout() -> FrameLayout {
    layout_for(Dimension::new(640, 480))
}

/// NV21 layout with a single plane sized for `dim`.
pub fn layout_for(dim: Dimension) -> FrameLayout {
    FrameLayout::new(
        dim,
        ImageFormat::Nv21,
        vec![PlaneInfo {
            stride: dim.width,
            scanline: dim.height,
            offset: 0,
            len: (dim.width.max(0) as u32) * (dim.height.max(0) as u32),
        }],
    )
}

fn descriptor(index: u32, fd_base: i32, layout: FrameLayout) -> BufferDescriptor {
    let size = layout.planes.iter().map(|p| p.len as usize).sum::<usize>() * 3 / 2;
    BufferDescriptor {
        index,
        fd: fd_base + index as i32,
        size,
        layout,
    }
}

#[derive(Debug, Default)]
struct OwnerState {
    lent: usize,
    returned_frames: Vec<(u32, Vec<u32>)>,
    returned_metadata: Vec<u32>,
}

/// Mock capture channel that lends frames and records their return.
///
/// # Example
///
/// ```rust,ignore
/// let owner = Arc::new(MockBufferOwner::new(1));
/// let frame = owner.frame(0, 3);
/// frame.release();
/// assert_eq!(owner.returned_frames(), vec![(0, vec![3])]);
/// ```
#[derive(Debug)]
pub struct MockBufferOwner {
    channel_id: u32,
    state: Mutex<OwnerState>,
}

impl MockBufferOwner {
    pub fn new(channel_id: u32) -> Self {
        Self {
            channel_id,
            state: Mutex::new(OwnerState::default()),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, OwnerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lends a frame with the default layout.
    pub fn frame(self: &Arc<Self>, stream_id: u32, index: u32) -> RawFrame {
        self.frame_with_layout(stream_id, index, default_layout())
    }

    /// Lends a frame with a single buffer of the given layout.
    pub fn frame_with_layout(self: &Arc<Self>, stream_id: u32, index: u32, layout: FrameLayout) -> RawFrame {
        self.state().lent += 1;
        let owner: Arc<dyn FrameOwner> = Arc::clone(self) as Arc<dyn FrameOwner>;
        RawFrame::new(stream_id, vec![descriptor(index, 100, layout)], owner)
    }

    /// Lends a metadata buffer carrying `metadata`.
    pub fn metadata(self: &Arc<Self>, index: u32, metadata: CaptureMetadata) -> MetadataFrame {
        self.state().lent += 1;
        let owner: Arc<dyn FrameOwner> = Arc::clone(self) as Arc<dyn FrameOwner>;
        let buffer = descriptor(index, 300, FrameLayout::default());
        MetadataFrame::new(buffer, metadata, owner)
    }

    /// Frames returned so far as (stream id, buffer indices).
    pub fn returned_frames(&self) -> Vec<(u32, Vec<u32>)> {
        self.state().returned_frames.clone()
    }

    /// Indices of metadata buffers returned so far.
    pub fn returned_metadata(&self) -> Vec<u32> {
        self.state().returned_metadata.clone()
    }

    /// Number of frames and metadata buffers handed out.
    pub fn lent(&self) -> usize {
        self.state().lent
    }

    /// Number of returns received, counting duplicates.
    pub fn returned_count(&self) -> usize {
        let state = self.state();
        state.returned_frames.len() + state.returned_metadata.len()
    }

    /// Buffers lent and not yet returned.
    pub fn outstanding(&self) -> usize {
        self.lent().saturating_sub(self.returned_count())
    }
}

impl FrameOwner for MockBufferOwner {
    fn channel_id(&self) -> u32 {
        self.channel_id
    }

    fn buf_done(&self, stream_id: u32, buffers: Vec<BufferDescriptor>) {
        let indices: Vec<u32> = buffers.iter().map(|b| b.index).collect();
        self.state().returned_frames.push((stream_id, indices));
    }

    fn metadata_buf_done(&self, buffer: BufferDescriptor) {
        self.state().returned_metadata.push(buffer.index);
    }
}

/// Mock owner of JPEG output buffers.
#[derive(Debug, Clone)]
pub struct MockOutputBuffers {
    slots: u32,
    delivered: Arc<Mutex<Vec<EncodeOutput>>>,
}

impl MockOutputBuffers {
    /// Creates an owner with output slots `0..slots`.
    pub fn new(slots: u32) -> Self {
        Self {
            slots,
            delivered: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Outputs delivered so far, in delivery order.
    pub fn delivered(&self) -> Vec<EncodeOutput> {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn delivered_count(&self) -> usize {
        self.delivered.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl OutputBuffers for MockOutputBuffers {
    fn buffer(&self, index: u32) -> Option<BufferDescriptor> {
        (index < self.slots).then(|| descriptor(index, 500, layout_for(Dimension::new(4208, 3120))))
    }

    fn deliver(&self, output: EncodeOutput) {
        self.delivered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(output);
    }
}

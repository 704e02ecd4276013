//! Borrowed hardware buffers and the descriptors that travel with them.
//!
//! Frames and metadata buffers handed to the pipeline are owned by the channel
//! that produced them. [`RawFrame`] and [`MetadataFrame`] are scoped handles
//! that give the buffers back to that channel exactly once, either through an
//! explicit `release()` or when the handle is dropped on an error path.

mod frame;
mod types;

pub use frame::{FrameOwner, MetadataFrame, RawFrame};
pub use types::{
    BufferDescriptor, CaptureMetadata, ColorFormat, Dimension, FrameLayout, ImageFormat,
    PlaneInfo, RationalStep, ThreeAVersion,
};

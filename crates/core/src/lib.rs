pub mod buffer;
pub mod config;
pub mod encoder;
pub mod error;
pub mod job;
pub mod metrics;
pub mod processor;
pub mod queue;
pub mod reprocess;
pub mod tags;
pub mod testing;

pub use buffer::{
    BufferDescriptor, CaptureMetadata, Dimension, FrameLayout, FrameOwner, ImageFormat,
    MetadataFrame, RawFrame,
};
pub use config::{
    load_config, load_config_from_str, validate_config, ConfigError, DeviceIdentity,
    PostprocConfig, SessionPolicy,
};
pub use encoder::{EncodeOutput, EncodeStatus, JpegEncoder, OutputBuffers};
pub use error::PostprocError;
pub use job::{EncodeSettings, FrameworkInput, GpsCoordinates, RequestId};
pub use processor::{Collaborators, DispatcherState, PipelineStatus, Postprocessor, QueueDepths};
pub use reprocess::{ReprocessChannel, ReprocessConfig, ReprocessProvider, ReprocessType};

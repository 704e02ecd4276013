//! Hardware JPEG encoder seam and session management.

mod session;
mod traits;
mod types;

pub use session::EncodeSessionManager;
pub use traits::{JpegEncoder, OutputBuffers};
pub use types::{
    ClientHandle, EncodeOutput, EncodeRequest, EncodeStatus, EncoderCapabilities, ExifDebugInfo,
    HwJobId, ImageParams, JobCallback, SessionId, SessionParams, ThumbnailParams,
};

//! Testing utilities and mock implementations of the hardware collaborators.
//!
//! The mocks record every call, accept injected failures, and let a test
//! decide when the encoder or the reprocess channel reports completion, so
//! the whole pipeline can be exercised without hardware.
//!
//! # Example
//!
//! ```rust,ignore
//! use campost_core::testing::{MockBufferOwner, MockEncoder, MockOutputBuffers};
//!
//! let encoder = MockEncoder::new();
//! let outputs = MockOutputBuffers::new(4);
//! let camera = Arc::new(MockBufferOwner::new(1));
//!
//! // Hand `encoder` and `outputs` to a Postprocessor, then:
//! processor.submit_frame(camera.frame(0, 0), Some(5))?;
//! ```

mod mock_buffers;
mod mock_encoder;
mod mock_reprocess;

pub use mock_buffers::{default_layout, layout_for, MockBufferOwner, MockOutputBuffers};
pub use mock_encoder::{EncoderOp, MockEncoder, RecordedJob};
pub use mock_reprocess::{ChannelOp, MockReprocessChannel, MockReprocessProvider};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::buffer::{CaptureMetadata, RationalStep, ThreeAVersion};
    use crate::job::{EncodeSettings, GpsCoordinates};

    /// Capture results with every optional field present.
    pub fn capture_metadata() -> CaptureMetadata {
        CaptureMetadata {
            focal_length: Some(4.73),
            sensitivity: Some(100),
            exposure_time: Some(120),
            exposure_compensation: Some(0),
            ev_step: Some(RationalStep {
                numerator: 1,
                denominator: 6,
            }),
            three_a_version: Some(ThreeAVersion {
                major: 5,
                minor: 1,
                patch: 2,
                feature: 0,
            }),
        }
    }

    /// Settings for `request_id` writing into output slot `out_buf_index`.
    pub fn settings(request_id: u32, out_buf_index: u32) -> EncodeSettings {
        EncodeSettings::new(out_buf_index).with_request_id(request_id)
    }

    /// Settings carrying a GPS fix and a thumbnail.
    pub fn settings_with_gps(request_id: u32, out_buf_index: u32) -> EncodeSettings {
        EncodeSettings {
            thumbnail: crate::buffer::Dimension::new(320, 240),
            gps: Some(GpsCoordinates {
                latitude: 37.422,
                longitude: -122.084,
                altitude: 12.5,
            }),
            gps_timestamp: Some(1_700_000_000),
            gps_processing_method: Some("GPS".to_string()),
            ..settings(request_id, out_buf_index)
        }
    }
}

//! Per-request encode settings.

use serde::{Deserialize, Serialize};

use super::RequestId;
use crate::buffer::Dimension;

/// A GPS fix in signed decimal degrees and metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsCoordinates {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

/// Encode parameters supplied with a capture request.
///
/// Owned by the pipeline once submitted and consumed by at most one job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EncodeSettings {
    /// Request these settings belong to. `None` pairs by arrival order.
    pub request_id: Option<RequestId>,
    /// JPEG quality; non-positive values select the configured default.
    pub quality: i32,
    /// Thumbnail quality; non-positive values select the configured default.
    pub thumb_quality: i32,
    /// Thumbnail size. A thumbnail is encoded only if both sides are positive.
    pub thumbnail: Dimension,
    /// Clockwise orientation in degrees: 0, 90, 180 or 270.
    pub orientation: i32,
    pub gps: Option<GpsCoordinates>,
    /// GPS fix time in seconds since the Unix epoch.
    pub gps_timestamp: Option<i64>,
    pub gps_processing_method: Option<String>,
    pub image_description: Option<String>,
    /// Slot of the output buffer receiving the JPEG stream.
    pub out_buf_index: u32,
}

impl EncodeSettings {
    pub fn new(out_buf_index: u32) -> Self {
        Self {
            out_buf_index,
            ..Default::default()
        }
    }

    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Whether the encoder must rotate the image by a quarter turn.
    pub fn is_quarter_turn(&self) -> bool {
        matches!(self.orientation.rem_euclid(360), 90 | 270)
    }
}

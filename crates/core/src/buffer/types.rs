//! Plain data types describing buffers and capture results.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Width and height in pixels.
///
/// Signed because hardware descriptors report them signed; negative or zero
/// values are rejected where a real image is required.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimension {
    pub width: i32,
    pub height: i32,
}

impl Dimension {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// Both sides strictly positive.
    pub fn is_positive(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// The same dimension rotated by a quarter turn.
    pub fn swapped(&self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Layout of a single plane inside a buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlaneInfo {
    pub stride: i32,
    pub scanline: i32,
    pub offset: u32,
    pub len: u32,
}

impl PlaneInfo {
    /// Plane geometry after the image is pre-rotated by 90 or 270 degrees.
    pub fn transposed(&self) -> Self {
        Self {
            stride: self.scanline,
            scanline: self.stride,
            ..*self
        }
    }
}

/// Pixel format of a captured stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    #[default]
    Nv21,
    Nv21Venus,
    Nv21Adreno,
    Nv12,
    Nv12Venus,
    Yv12,
    Nv61,
    Nv16,
    Other,
}

/// Color layouts understood by the JPEG encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorFormat {
    YCrCbLpH2V2,
    YCbCrLpH2V2,
    YCrCbLpH2V1,
    YCbCrLpH2V1,
}

impl ImageFormat {
    /// Encoder color format for this stream format.
    ///
    /// Unknown formats are encoded as YCrCb 4:2:0.
    pub fn color_format(&self) -> ColorFormat {
        match self {
            Self::Nv21 | Self::Nv21Venus | Self::Nv21Adreno => ColorFormat::YCrCbLpH2V2,
            Self::Nv12 | Self::Nv12Venus | Self::Yv12 => ColorFormat::YCbCrLpH2V2,
            Self::Nv61 => ColorFormat::YCrCbLpH2V1,
            Self::Nv16 => ColorFormat::YCbCrLpH2V1,
            Self::Other => ColorFormat::YCrCbLpH2V2,
        }
    }
}

/// Geometry of a frame: its dimensions, pixel format and per-plane layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameLayout {
    pub dim: Dimension,
    pub format: ImageFormat,
    pub planes: Vec<PlaneInfo>,
}

impl FrameLayout {
    pub fn new(dim: Dimension, format: ImageFormat, planes: Vec<PlaneInfo>) -> Self {
        Self { dim, format, planes }
    }

    /// Layout with stride and scanline swapped on every plane.
    pub fn transposed(&self) -> Self {
        Self {
            dim: self.dim.swapped(),
            format: self.format,
            planes: self.planes.iter().map(PlaneInfo::transposed).collect(),
        }
    }
}

/// A hardware buffer: its slot index, file descriptor, size and layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BufferDescriptor {
    pub index: u32,
    pub fd: i32,
    pub size: usize,
    pub layout: FrameLayout,
}

/// An exposure-compensation step expressed as a fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RationalStep {
    pub numerator: i32,
    pub denominator: i32,
}

/// Version of the 3A (auto exposure, focus, white balance) software that
/// produced a capture's results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreeAVersion {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
    pub feature: u16,
}

/// Sensor and 3A results reported with a capture.
///
/// Every field is optional; the tag assembler emits only what is present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureMetadata {
    /// Lens focal length in millimetres.
    pub focal_length: Option<f32>,
    /// ISO sensitivity.
    pub sensitivity: Option<i32>,
    /// Raw exposure value; encoded as `1 / value`.
    pub exposure_time: Option<i64>,
    /// Exposure compensation index.
    pub exposure_compensation: Option<i32>,
    pub ev_step: Option<RationalStep>,
    pub three_a_version: Option<ThreeAVersion>,
}

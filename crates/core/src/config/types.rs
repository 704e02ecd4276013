use serde::{Deserialize, Serialize};

use crate::buffer::Dimension;

/// Root configuration of a post-processor instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PostprocConfig {
    /// Name used in logs and status snapshots.
    #[serde(default = "default_processor_name")]
    pub processor_name: String,
    /// Largest picture the encoder client must be able to handle.
    #[serde(default = "default_max_picture")]
    pub max_picture: Dimension,
    /// Destination size of the JPEG stream for captured frames.
    #[serde(default = "default_output_dimensions")]
    pub output_dimensions: Dimension,
    /// Quality used when a request does not carry a positive one.
    #[serde(default = "default_quality")]
    pub default_quality: i32,
    /// Maximum number of tag entries per encoded image.
    #[serde(default = "default_tag_capacity")]
    pub tag_capacity: usize,
    #[serde(default)]
    pub session_policy: SessionPolicy,
    #[serde(default)]
    pub device: DeviceIdentity,
}

impl Default for PostprocConfig {
    fn default() -> Self {
        Self {
            processor_name: default_processor_name(),
            max_picture: default_max_picture(),
            output_dimensions: default_output_dimensions(),
            default_quality: default_quality(),
            tag_capacity: default_tag_capacity(),
            session_policy: SessionPolicy::default(),
            device: DeviceIdentity::default(),
        }
    }
}

fn default_processor_name() -> String {
    "postproc".to_string()
}

fn default_max_picture() -> Dimension {
    Dimension::new(4208, 3120)
}

fn default_output_dimensions() -> Dimension {
    Dimension::new(4208, 3120)
}

fn default_quality() -> i32 {
    85
}

fn default_tag_capacity() -> usize {
    23
}

/// When the encoder session is torn down and rebuilt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPolicy {
    /// Destroy and recreate the session before every job.
    #[default]
    AlwaysRecreate,
    /// Keep the active session while the session parameters compare equal.
    ReuseWhenUnchanged,
}

/// Device identification strings written into every image.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct DeviceIdentity {
    #[serde(default = "default_make")]
    pub make: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_software")]
    pub software: String,
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self {
            make: default_make(),
            model: default_model(),
            software: default_software(),
        }
    }
}

fn default_make() -> String {
    "QCOM-AA".to_string()
}

fn default_model() -> String {
    "QCAM-AA".to_string()
}

fn default_software() -> String {
    "QCAM-AA".to_string()
}

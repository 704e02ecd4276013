//! Trait definitions for the reprocess module.

use async_trait::async_trait;

use super::types::{ReprocessCallback, ReprocessConfig, ReprocessInput};
use crate::error::PostprocError;
use crate::job::{EncodeSettings, FrameworkReprocessConfig};

/// Provisions offline reprocess channels.
#[async_trait]
pub trait ReprocessProvider: Send + Sync {
    /// Returns the name of this provider implementation.
    fn name(&self) -> &str;

    /// Creates a stopped offline channel for `config`.
    ///
    /// `feature_mask` carries the post-processing features the pipeline was
    /// initialised with. Reprocessed frames are handed to `callback`.
    async fn add_offline_channel(
        &self,
        config: &ReprocessConfig,
        feature_mask: u32,
        callback: ReprocessCallback,
    ) -> Result<Box<dyn ReprocessChannel>, PostprocError>;
}

/// An offline reprocess channel.
#[async_trait]
pub trait ReprocessChannel: Send + Sync {
    async fn start(&self) -> Result<(), PostprocError>;

    async fn stop(&self) -> Result<(), PostprocError>;

    /// Applies request settings to the input of a captured frame.
    async fn override_metadata(
        &self,
        input: &mut ReprocessInput,
        settings: &EncodeSettings,
    ) -> Result<(), PostprocError>;

    /// Applies the framework's own reprocess configuration to its input.
    async fn override_framework_metadata(
        &self,
        input: &mut ReprocessInput,
        config: &FrameworkReprocessConfig,
    ) -> Result<(), PostprocError>;

    /// Queues one offline pass. The result arrives through the callback.
    async fn reprocess(&self, input: ReprocessInput) -> Result<(), PostprocError>;

    /// Drops the channel's mappings of offline input buffers.
    async fn unmap_offline_buffers(&self) -> Result<(), PostprocError>;
}

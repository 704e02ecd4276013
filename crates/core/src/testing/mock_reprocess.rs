//! Mock reprocess provider and channel for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::mock_buffers::{layout_for, MockBufferOwner};
use crate::buffer::Dimension;
use crate::error::PostprocError;
use crate::job::{EncodeSettings, FrameworkReprocessConfig};
use crate::reprocess::{
    ReprocessCallback, ReprocessChannel, ReprocessConfig, ReprocessInput, ReprocessProvider,
    ReprocessTicket,
};

/// Channel operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelOp {
    Start,
    Stop,
    OverrideMetadata,
    OverrideFrameworkMetadata,
    Reprocess,
    Unmap,
}

/// Mock offline channel.
///
/// Every channel a [`MockReprocessProvider`] hands out shares this state,
/// so tests can inspect it after the pipeline took ownership.
pub struct MockReprocessChannel {
    callback: RwLock<Option<ReprocessCallback>>,
    output_dim: RwLock<Dimension>,
    running: RwLock<bool>,
    starts: RwLock<usize>,
    stops: RwLock<usize>,
    unmaps: RwLock<usize>,
    submitted: RwLock<Vec<ReprocessInput>>,
    next_errors: RwLock<HashMap<ChannelOp, PostprocError>>,
    auto_complete: RwLock<bool>,
    output_owner: Arc<MockBufferOwner>,
}

impl MockReprocessChannel {
    fn new() -> Self {
        Self {
            callback: RwLock::new(None),
            output_dim: RwLock::new(Dimension::new(640, 480)),
            running: RwLock::new(false),
            starts: RwLock::new(0),
            stops: RwLock::new(0),
            unmaps: RwLock::new(0),
            submitted: RwLock::new(Vec::new()),
            next_errors: RwLock::new(HashMap::new()),
            auto_complete: RwLock::new(false),
            output_owner: Arc::new(MockBufferOwner::new(100)),
        }
    }

    /// Configure the next call of `op` to fail with the given error.
    pub async fn set_next_error(&self, op: ChannelOp, error: PostprocError) {
        self.next_errors.write().await.insert(op, error);
    }

    /// Deliver a reprocessed frame as soon as a pass is queued.
    pub async fn set_auto_complete(&self, enabled: bool) {
        *self.auto_complete.write().await = enabled;
    }

    pub async fn start_count(&self) -> usize {
        *self.starts.read().await
    }

    pub async fn stop_count(&self) -> usize {
        *self.stops.read().await
    }

    pub async fn unmap_count(&self) -> usize {
        *self.unmaps.read().await
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Inputs queued so far.
    pub async fn submitted(&self) -> Vec<ReprocessInput> {
        self.submitted.read().await.clone()
    }

    /// Owner of the reprocessed frames this channel produces.
    pub fn output_owner(&self) -> Arc<MockBufferOwner> {
        Arc::clone(&self.output_owner)
    }

    /// Delivers a reprocessed frame for `ticket` through the callback.
    ///
    /// Returns false if no channel was provisioned yet.
    pub async fn complete(&self, ticket: ReprocessTicket) -> bool {
        let callback = self.callback.read().await.clone();
        let Some(callback) = callback else {
            return false;
        };
        let dim = *self.output_dim.read().await;
        let frame = self
            .output_owner
            .frame_with_layout(0, ticket as u32, layout_for(dim));
        callback(ticket, frame);
        true
    }

    async fn attach(&self, config: &ReprocessConfig, callback: ReprocessCallback) {
        *self.callback.write().await = Some(callback);
        *self.output_dim.write().await = config.output;
    }

    async fn take_error(&self, op: ChannelOp) -> Result<(), PostprocError> {
        match self.next_errors.write().await.remove(&op) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ReprocessChannel for MockReprocessChannel {
    async fn start(&self) -> Result<(), PostprocError> {
        self.take_error(ChannelOp::Start).await?;
        *self.starts.write().await += 1;
        *self.running.write().await = true;
        Ok(())
    }

    async fn stop(&self) -> Result<(), PostprocError> {
        self.take_error(ChannelOp::Stop).await?;
        *self.stops.write().await += 1;
        *self.running.write().await = false;
        Ok(())
    }

    async fn override_metadata(
        &self,
        input: &mut ReprocessInput,
        settings: &EncodeSettings,
    ) -> Result<(), PostprocError> {
        self.take_error(ChannelOp::OverrideMetadata).await?;
        input.orientation = settings.orientation;
        Ok(())
    }

    async fn override_framework_metadata(
        &self,
        _input: &mut ReprocessInput,
        _config: &FrameworkReprocessConfig,
    ) -> Result<(), PostprocError> {
        self.take_error(ChannelOp::OverrideFrameworkMetadata).await
    }

    async fn reprocess(&self, input: ReprocessInput) -> Result<(), PostprocError> {
        self.take_error(ChannelOp::Reprocess).await?;
        let ticket = input.ticket;
        self.submitted.write().await.push(input);
        if *self.auto_complete.read().await {
            self.complete(ticket).await;
        }
        Ok(())
    }

    async fn unmap_offline_buffers(&self) -> Result<(), PostprocError> {
        self.take_error(ChannelOp::Unmap).await?;
        *self.unmaps.write().await += 1;
        Ok(())
    }
}

/// Handle given to the pipeline; forwards to the shared mock channel.
struct SharedChannel(Arc<MockReprocessChannel>);

#[async_trait]
impl ReprocessChannel for SharedChannel {
    async fn start(&self) -> Result<(), PostprocError> {
        self.0.start().await
    }

    async fn stop(&self) -> Result<(), PostprocError> {
        self.0.stop().await
    }

    async fn override_metadata(
        &self,
        input: &mut ReprocessInput,
        settings: &EncodeSettings,
    ) -> Result<(), PostprocError> {
        self.0.override_metadata(input, settings).await
    }

    async fn override_framework_metadata(
        &self,
        input: &mut ReprocessInput,
        config: &FrameworkReprocessConfig,
    ) -> Result<(), PostprocError> {
        self.0.override_framework_metadata(input, config).await
    }

    async fn reprocess(&self, input: ReprocessInput) -> Result<(), PostprocError> {
        self.0.reprocess(input).await
    }

    async fn unmap_offline_buffers(&self) -> Result<(), PostprocError> {
        self.0.unmap_offline_buffers().await
    }
}

/// Mock implementation of the ReprocessProvider trait.
#[derive(Clone)]
pub struct MockReprocessProvider {
    channel: Arc<MockReprocessChannel>,
    added: Arc<RwLock<Vec<(ReprocessConfig, u32)>>>,
    next_error: Arc<RwLock<Option<PostprocError>>>,
}

impl Default for MockReprocessProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockReprocessProvider {
    pub fn new() -> Self {
        Self {
            channel: Arc::new(MockReprocessChannel::new()),
            added: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
        }
    }

    /// State shared by every channel this provider hands out.
    pub fn channel(&self) -> Arc<MockReprocessChannel> {
        Arc::clone(&self.channel)
    }

    /// Configs of the channels provisioned so far.
    pub async fn channels_added(&self) -> Vec<ReprocessConfig> {
        self.added.read().await.iter().map(|(c, _)| c.clone()).collect()
    }

    /// Feature masks passed with each provisioned channel.
    pub async fn feature_masks(&self) -> Vec<u32> {
        self.added.read().await.iter().map(|(_, m)| *m).collect()
    }

    /// Configure the next provisioning to fail with the given error.
    pub async fn set_next_error(&self, error: PostprocError) {
        *self.next_error.write().await = Some(error);
    }
}

#[async_trait]
impl ReprocessProvider for MockReprocessProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn add_offline_channel(
        &self,
        config: &ReprocessConfig,
        feature_mask: u32,
        callback: ReprocessCallback,
    ) -> Result<Box<dyn ReprocessChannel>, PostprocError> {
        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }
        self.added.write().await.push((config.clone(), feature_mask));
        self.channel.attach(config, callback).await;
        Ok(Box::new(SharedChannel(Arc::clone(&self.channel))))
    }
}

//! Shared harness for pipeline integration tests.
//!
//! Builds a [`Postprocessor`] wired to the mock encoder, reprocess provider
//! and buffer owners so tests can drive requests end to end and inspect
//! what every collaborator saw.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use campost_core::{
    buffer::{Dimension, ImageFormat},
    job::{EncodeSettings, FrameworkInput, FrameworkReprocessConfig, RequestId},
    testing::{
        fixtures, MockBufferOwner, MockEncoder, MockOutputBuffers, MockReprocessChannel,
        MockReprocessProvider,
    },
    Collaborators, PipelineStatus, PostprocConfig, Postprocessor, ReprocessConfig, ReprocessType,
};

pub const OUTPUT_SLOTS: u32 = 4;

/// Pipeline under test plus handles on every mock behind it.
pub struct TestHarness {
    pub processor: Postprocessor,
    pub encoder: MockEncoder,
    pub provider: MockReprocessProvider,
    pub outputs: MockOutputBuffers,
    /// Capture channel lending frames and metadata buffers.
    pub camera: Arc<MockBufferOwner>,
}

impl TestHarness {
    pub async fn new() -> Self {
        Self::with_config(PostprocConfig::default()).await
    }

    pub async fn with_encoder(encoder: MockEncoder) -> Self {
        Self::build(PostprocConfig::default(), encoder).await
    }

    pub async fn with_config(config: PostprocConfig) -> Self {
        Self::build(config, MockEncoder::new()).await
    }

    async fn build(config: PostprocConfig, encoder: MockEncoder) -> Self {
        let provider = MockReprocessProvider::new();
        let outputs = MockOutputBuffers::new(OUTPUT_SLOTS);

        let collaborators = Collaborators {
            encoder: Arc::new(encoder.clone()),
            reprocess: Some(Arc::new(provider.clone())),
            outputs: Arc::new(outputs.clone()),
        };
        let processor = Postprocessor::init(&config, collaborators, 0)
            .await
            .expect("Failed to init post-processor");

        Self {
            processor,
            encoder,
            provider,
            outputs,
            camera: Arc::new(MockBufferOwner::new(1)),
        }
    }

    pub fn channel(&self) -> Arc<MockReprocessChannel> {
        self.provider.channel()
    }

    /// Submits a frame, its metadata and its settings for `request_id`.
    ///
    /// Buffer indices follow the request id so returns can be traced.
    pub fn capture(&self, request_id: RequestId, out_buf_index: u32) {
        self.capture_with(request_id, fixtures::settings(request_id, out_buf_index));
    }

    pub fn capture_with(&self, request_id: RequestId, settings: EncodeSettings) {
        self.processor
            .submit_frame(self.camera.frame(0, request_id), Some(request_id))
            .expect("submit frame");
        self.processor
            .submit_metadata(
                self.camera
                    .metadata(request_id, fixtures::capture_metadata())
                    .with_request_id(request_id),
            )
            .expect("submit metadata");
        self.processor.submit_settings(settings).expect("submit settings");
    }

    /// Builds a framework input lent by the camera channel.
    pub fn framework_input(
        &self,
        request_id: RequestId,
        reprocess_type: ReprocessType,
        output: Dimension,
    ) -> FrameworkInput {
        FrameworkInput {
            request_id: Some(request_id),
            frame: self.camera.frame(1, request_id),
            metadata: fixtures::capture_metadata(),
            config: FrameworkReprocessConfig {
                input: Dimension::new(640, 480),
                output,
                format: ImageFormat::Nv21,
                reprocess_type,
            },
        }
    }

    /// Polls the pipeline status until `pred` holds.
    pub async fn wait_until(&self, pred: impl Fn(&PipelineStatus) -> bool) -> PipelineStatus {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let status = self.processor.status().await.expect("status");
                if pred(&status) {
                    return status;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("Timed out waiting for pipeline status")
    }

    /// Waits until nothing is queued, in flight or being reprocessed.
    pub async fn wait_idle(&self) -> PipelineStatus {
        self.wait_until(PipelineStatus::is_idle).await
    }
}

/// Reprocess configuration scaling 640x480 captures to `output`.
pub fn reprocess_config(reprocess_type: ReprocessType, output: Dimension) -> ReprocessConfig {
    ReprocessConfig {
        reprocess_type,
        input: Dimension::new(640, 480),
        output,
        format: ImageFormat::Nv21,
    }
}

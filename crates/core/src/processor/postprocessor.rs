//! Public handle of a post-processing pipeline.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::dispatcher::Dispatcher;
use super::queues::PipelineQueues;
use super::types::{Command, PipelineStatus};
use crate::buffer::{MetadataFrame, RawFrame};
use crate::config::{validate_config, PostprocConfig};
use crate::encoder::{EncodeSessionManager, JobCallback, JpegEncoder, OutputBuffers};
use crate::error::PostprocError;
use crate::job::{EncodeSettings, FrameworkInput, PendingFrame, RequestId};
use crate::metrics;
use crate::reprocess::{ReprocessCallback, ReprocessConfig, ReprocessCoordinator, ReprocessProvider};

/// External components a pipeline drives.
#[derive(Clone)]
pub struct Collaborators {
    pub encoder: Arc<dyn JpegEncoder>,
    /// Source of offline reprocess channels; `None` when the platform has
    /// no reprocess support.
    pub reprocess: Option<Arc<dyn ReprocessProvider>>,
    pub outputs: Arc<dyn OutputBuffers>,
}

/// A running post-processor.
///
/// Producers submit frames, metadata, settings and framework inputs from
/// any thread. A dispatcher task pairs them, routes them through the
/// reprocess channel when one is configured, and encodes one job at a
/// time. Every submitted buffer goes back to its owner exactly once.
pub struct Postprocessor {
    name: String,
    queues: Arc<PipelineQueues>,
    tx: mpsc::UnboundedSender<Command>,
    worker: Option<JoinHandle<()>>,
}

impl Postprocessor {
    /// Opens the encoder client and spawns the dispatcher.
    ///
    /// Must be called inside a tokio runtime. The pipeline starts in the
    /// stopped state.
    pub async fn init(
        config: &PostprocConfig,
        collaborators: Collaborators,
        feature_mask: u32,
    ) -> Result<Self, PostprocError> {
        validate_config(config)?;

        let (tx, rx) = mpsc::unbounded_channel();

        let encode_tx = tx.clone();
        let encoder_callback: JobCallback = Arc::new(move |job_id, status| {
            if encode_tx.send(Command::EncodeDone { job_id, status }).is_err() {
                tracing::debug!("Encoder completed job {} after shutdown", job_id);
            }
        });
        let reprocess_tx = tx.clone();
        let reprocess_callback: ReprocessCallback = Arc::new(move |ticket, frame| {
            // A failed send hands the frame back, and dropping it returns
            // the buffers.
            if reprocess_tx.send(Command::ReprocessDone { ticket, frame }).is_err() {
                tracing::debug!("Reprocess ticket {} finished after shutdown", ticket);
            }
        });

        let mut sessions = EncodeSessionManager::new(
            Arc::clone(&collaborators.encoder),
            Arc::clone(&collaborators.outputs),
            config,
        );
        sessions.open(config.max_picture, encoder_callback).await?;

        let reprocess = ReprocessCoordinator::new(
            collaborators.reprocess,
            feature_mask,
            reprocess_callback,
        );
        let queues = Arc::new(PipelineQueues::new());
        let dispatcher = Dispatcher::new(
            config.processor_name.clone(),
            Arc::clone(&queues),
            sessions,
            reprocess,
            collaborators.outputs,
            rx,
        );
        let worker = tokio::spawn(dispatcher.run());

        tracing::info!(
            "Post-processor {} initialized with {} encoder",
            config.processor_name,
            collaborators.encoder.name()
        );

        Ok(Self {
            name: config.processor_name.clone(),
            queues,
            tx,
            worker: Some(worker),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Activates the pipeline, provisioning a reprocess channel if
    /// `reprocess` asks for one. Starting an active pipeline is a no-op.
    pub async fn start(&self, reprocess: Option<ReprocessConfig>) -> Result<(), PostprocError> {
        self.request(|ack| Command::Start { reprocess, ack }).await
    }

    /// Aborts the job in flight, destroys the encoder session and releases
    /// everything queued. Stopping a stopped pipeline only drains queues.
    pub async fn stop(&self) -> Result<(), PostprocError> {
        self.request(|ack| Command::Stop { ack }).await
    }

    /// Releases all pending work without leaving the active state.
    pub async fn flush(&self) -> Result<(), PostprocError> {
        self.request(|ack| Command::Flush { ack }).await
    }

    pub async fn status(&self) -> Result<PipelineStatus, PostprocError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Status { reply })?;
        rx.await.map_err(|_| PostprocError::NotRunning)
    }

    /// Queues a captured frame. Its request id, if known, selects which
    /// metadata and settings it pairs with.
    pub fn submit_frame(
        &self,
        frame: RawFrame,
        request_id: Option<RequestId>,
    ) -> Result<(), PostprocError> {
        self.enqueue_frame(PendingFrame {
            request_id,
            ..PendingFrame::new(frame)
        })
    }

    /// Queues a captured frame that must be encoded into `output_index`
    /// instead of the slot named by its settings.
    pub fn submit_frame_with_output(
        &self,
        frame: RawFrame,
        request_id: Option<RequestId>,
        output_index: u32,
    ) -> Result<(), PostprocError> {
        self.enqueue_frame(PendingFrame {
            request_id,
            output_index: Some(output_index),
            ..PendingFrame::new(frame)
        })
    }

    pub fn submit_metadata(&self, metadata: MetadataFrame) -> Result<(), PostprocError> {
        self.ensure_running()?;
        {
            let _guard = self.queues.pairing_lock();
            self.queues.metadata.enqueue(metadata);
        }
        self.send(Command::Advance)
    }

    pub fn submit_settings(&self, settings: EncodeSettings) -> Result<(), PostprocError> {
        self.ensure_running()?;
        self.queues.settings.enqueue(settings);
        self.send(Command::Advance)
    }

    /// Queues an input owned by the framework, encoded with the settings
    /// carrying the same request id.
    pub fn submit_framework_input(&self, input: FrameworkInput) -> Result<(), PostprocError> {
        self.ensure_running()?;
        self.queues.framework.enqueue(input);
        self.send(Command::Advance)
    }

    /// Stops the pipeline, closes the encoder client and waits for the
    /// dispatcher to exit.
    pub async fn deinit(mut self) -> Result<(), PostprocError> {
        let (ack, rx) = oneshot::channel();
        let result = match self.tx.send(Command::Exit { ack: Some(ack) }) {
            Ok(()) => rx.await.unwrap_or(Err(PostprocError::NotRunning)),
            Err(_) => Err(PostprocError::NotRunning),
        };
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                tracing::error!("Post-processor {} dispatcher panicked: {}", self.name, e);
            }
        }
        tracing::info!("Post-processor {} deinitialized", self.name);
        result
    }

    fn enqueue_frame(&self, pending: PendingFrame) -> Result<(), PostprocError> {
        self.ensure_running()?;
        {
            let _guard = self.queues.pairing_lock();
            self.queues.frames.enqueue(pending);
        }
        metrics::FRAMES_RECEIVED.inc();
        self.send(Command::Advance)
    }

    fn ensure_running(&self) -> Result<(), PostprocError> {
        if self.tx.is_closed() {
            return Err(PostprocError::NotRunning);
        }
        Ok(())
    }

    fn send(&self, command: Command) -> Result<(), PostprocError> {
        self.tx.send(command).map_err(|_| PostprocError::NotRunning)
    }

    async fn request(
        &self,
        command: impl FnOnce(oneshot::Sender<Result<(), PostprocError>>) -> Command,
    ) -> Result<(), PostprocError> {
        let (ack, rx) = oneshot::channel();
        self.send(command(ack))?;
        rx.await.map_err(|_| PostprocError::NotRunning)?
    }
}

impl Drop for Postprocessor {
    fn drop(&mut self) {
        if self.worker.is_some() {
            let _ = self.tx.send(Command::Exit { ack: None });
        }
    }
}

//! The dispatcher task: the only place queue items are paired, submitted
//! or released.

use std::sync::Arc;
use tokio::sync::mpsc;

use super::queues::PipelineQueues;
use super::types::{Command, DispatcherState, PipelineStatus};
use crate::buffer::MetadataFrame;
use crate::encoder::{EncodeOutput, EncodeSessionManager, EncodeStatus, HwJobId, OutputBuffers};
use crate::error::PostprocError;
use crate::job::{
    correlates, supersedes, EncodeJob, EncodeSettings, PendingFrame, PostprocessJob, RequestId,
};
use crate::metrics;
use crate::queue::Release;
use crate::reprocess::{ReprocessConfig, ReprocessCoordinator, ReprocessType};

/// The encode job currently owned by the hardware encoder.
struct InFlight {
    job_id: HwJobId,
    job: EncodeJob,
}

/// Outcome of looking at the head of the captured-frame queue.
enum Pairing {
    Ready(PendingFrame, MetadataFrame, EncodeSettings),
    /// The frame's metadata or settings will never arrive.
    Orphaned(PendingFrame, &'static str),
    Waiting,
}

#[derive(Debug, Default)]
struct Totals {
    encoded: u64,
    dropped: u64,
    aborted: u64,
}

pub(crate) struct Dispatcher {
    name: String,
    state: DispatcherState,
    queues: Arc<PipelineQueues>,
    sessions: EncodeSessionManager,
    reprocess: ReprocessCoordinator,
    outputs: Arc<dyn OutputBuffers>,
    in_flight: Option<InFlight>,
    totals: Totals,
    rx: mpsc::UnboundedReceiver<Command>,
}

impl Dispatcher {
    pub(crate) fn new(
        name: String,
        queues: Arc<PipelineQueues>,
        sessions: EncodeSessionManager,
        reprocess: ReprocessCoordinator,
        outputs: Arc<dyn OutputBuffers>,
        rx: mpsc::UnboundedReceiver<Command>,
    ) -> Self {
        Self {
            name,
            state: DispatcherState::Stopped,
            queues,
            sessions,
            reprocess,
            outputs,
            in_flight: None,
            totals: Totals::default(),
            rx,
        }
    }

    /// Runs until an exit command arrives or every sender is gone.
    pub(crate) async fn run(mut self) {
        tracing::info!("Post-processor {} dispatcher started", self.name);

        while let Some(command) = self.rx.recv().await {
            tracing::trace!("{} handling {}", self.name, command.name());
            match command {
                Command::Start { reprocess, ack } => {
                    let result = self.start(reprocess.as_ref()).await;
                    let _ = ack.send(result);
                    self.advance().await;
                }
                Command::Stop { ack } => {
                    let result = self.stop().await;
                    let _ = ack.send(result);
                }
                Command::Flush { ack } => {
                    self.flush().await;
                    let _ = ack.send(Ok(()));
                }
                Command::Advance => self.advance().await,
                Command::EncodeDone { job_id, status } => {
                    if let Err(e) = self.encode_done(job_id, status) {
                        tracing::debug!("Ignoring encoder completion: {}", e);
                    }
                    self.advance().await;
                }
                Command::ReprocessDone { ticket, frame } => {
                    match self.reprocess.complete(ticket, frame) {
                        Ok(job) => self.queues.encode.enqueue(job),
                        Err(e) => tracing::debug!("Ignoring reprocess result: {}", e),
                    }
                    self.advance().await;
                }
                Command::Status { reply } => {
                    let _ = reply.send(self.status());
                }
                Command::Exit { ack } => {
                    let result = self.shutdown().await;
                    if let Some(ack) = ack {
                        let _ = ack.send(result);
                    }
                    tracing::info!("Post-processor {} dispatcher exited", self.name);
                    return;
                }
            }
        }

        if let Err(e) = self.shutdown().await {
            tracing::warn!("Post-processor {} shutdown failed: {}", self.name, e);
        }
    }

    async fn start(&mut self, reprocess: Option<&ReprocessConfig>) -> Result<(), PostprocError> {
        if self.state == DispatcherState::Active {
            tracing::debug!("Post-processor {} already active", self.name);
            return Ok(());
        }
        self.queues.init_all();
        self.reprocess.start(reprocess).await?;
        self.state = DispatcherState::Active;
        tracing::info!(
            "Post-processor {} active (reprocess: {:?})",
            self.name,
            reprocess.map(|c| c.reprocess_type).unwrap_or(ReprocessType::None)
        );
        Ok(())
    }

    /// Aborts in-flight work, destroys the session and drains every queue.
    ///
    /// Teardown always runs to completion; the first failure is reported.
    async fn stop(&mut self) -> Result<(), PostprocError> {
        if self.state == DispatcherState::Stopped {
            self.queues.flush_all();
            return Ok(());
        }

        self.abort_in_flight().await;
        let destroyed = self.sessions.destroy_session().await;
        if let Err(e) = &destroyed {
            tracing::error!("Failed to destroy encoder session: {}", e);
        }
        let released = self.queues.flush_all();
        let stopped = self.reprocess.stop().await;
        if let Err(e) = &stopped {
            tracing::error!("Failed to stop reprocess channel: {}", e);
        }
        self.state = DispatcherState::Stopped;
        self.queues.publish_depths();
        tracing::info!(
            "Post-processor {} stopped, released {} queued items",
            self.name,
            released
        );
        destroyed.and(stopped)
    }

    /// Drops all pending work but stays active.
    async fn flush(&mut self) {
        self.abort_in_flight().await;
        let released = self.queues.flush_all() + self.reprocess.flush_ongoing();
        self.reprocess.unmap().await;
        self.queues.publish_depths();
        tracing::info!("Post-processor {} flushed {} items", self.name, released);
    }

    async fn shutdown(&mut self) -> Result<(), PostprocError> {
        let stopped = self.stop().await;
        let closed = self.sessions.close().await;
        if let Err(e) = &closed {
            tracing::error!("Failed to close encoder client: {}", e);
        }
        stopped.and(closed)
    }

    async fn abort_in_flight(&mut self) {
        if let Some(InFlight { job_id, job }) = self.in_flight.take() {
            tracing::info!("Aborting encode job {} for request {:?}", job_id, job.request_id);
            self.sessions.abort(job_id).await;
            job.release();
            self.totals.aborted += 1;
            metrics::JOBS_ABORTED.inc();
        }
    }

    fn encode_done(&mut self, job_id: HwJobId, status: EncodeStatus) -> Result<(), PostprocError> {
        let Some(InFlight { job_id, job }) = self.in_flight.take_if(|f| f.job_id == job_id) else {
            return Err(PostprocError::not_found(format!("encode job {}", job_id)));
        };
        if status == EncodeStatus::Failed {
            tracing::warn!("Encoder failed job {} for request {:?}", job_id, job.request_id);
        }
        self.outputs.deliver(EncodeOutput {
            request_id: job.request_id,
            job_id,
            output_index: job.output_index(),
            status,
        });
        job.release();
        self.totals.encoded += 1;
        metrics::JOBS_ENCODED
            .with_label_values(&[status.label()])
            .inc();
        Ok(())
    }

    fn status(&self) -> PipelineStatus {
        PipelineStatus {
            name: self.name.clone(),
            state: self.state,
            queues: self.queues.depths(),
            in_flight: self.in_flight.as_ref().map(|f| f.job_id),
            ongoing_reprocess: self.reprocess.ongoing_count(),
            reprocess_channel: self.reprocess.has_channel(),
            session: self.sessions.session_id(),
            encoded: self.totals.encoded,
            dropped: self.totals.dropped,
            aborted: self.totals.aborted,
        }
    }

    /// Moves every queue forward as far as it can go.
    async fn advance(&mut self) {
        if self.state == DispatcherState::Stopped {
            let released = self.queues.flush_inputs();
            if released > 0 {
                tracing::debug!("Released {} items submitted while stopped", released);
            }
            return;
        }

        loop {
            let mut progressed = self.submit_next_encode().await;
            progressed |= self.pair_framework_input().await;
            progressed |= self.pair_captured_frame().await;
            if !progressed {
                break;
            }
        }
        self.queues.publish_depths();
    }

    async fn submit_next_encode(&mut self) -> bool {
        if self.in_flight.is_some() {
            return false;
        }
        let Some(job) = self.queues.encode.dequeue() else {
            return false;
        };
        match self.sessions.submit(&job).await {
            Ok(job_id) => self.in_flight = Some(InFlight { job_id, job }),
            Err(e) => {
                tracing::warn!("Encode submission failed for request {:?}: {}", job.request_id, e);
                self.drop_item(job, e.kind());
            }
        }
        true
    }

    async fn pair_framework_input(&mut self) -> bool {
        let Some(request_id) = self.queues.framework.peek_with(|f| f.request_id) else {
            return false;
        };
        let Some(settings) = self
            .queues
            .settings
            .dequeue_first(|s| correlates(request_id, s.request_id))
        else {
            return self.drop_framework_if_orphaned(request_id);
        };
        let Some(input) = self.queues.framework.dequeue() else {
            self.drop_item(settings, "missing_input");
            return true;
        };

        let queues = Arc::clone(&self.queues);
        self.drop_stale_settings(&queues, request_id);

        let reprocess_type = input.config.reprocess_type;
        let job = PostprocessJob::framework(input, settings);
        if reprocess_type.is_required() {
            self.send_to_reprocess(job).await;
        } else {
            self.queues.encode.enqueue(EncodeJob::direct(job));
        }
        true
    }

    fn drop_framework_if_orphaned(&mut self, request_id: Option<RequestId>) -> bool {
        if !self
            .queues
            .settings
            .contains(|s| supersedes(s.request_id, request_id))
        {
            return false;
        }
        match self.queues.framework.dequeue() {
            Some(input) => {
                tracing::warn!("No settings for framework request {:?}, dropping", request_id);
                self.drop_item(input, "missing_settings");
                true
            }
            None => false,
        }
    }

    async fn pair_captured_frame(&mut self) -> bool {
        match self.take_captured_pair() {
            Pairing::Ready(pending, metadata, settings) => {
                let job = PostprocessJob::captured(pending, metadata, settings);
                if self.reprocess.has_channel() {
                    self.send_to_reprocess(job).await;
                } else {
                    self.queues.encode.enqueue(EncodeJob::direct(job));
                }
                true
            }
            Pairing::Orphaned(pending, reason) => {
                tracing::warn!("Dropping frame for request {:?}: {}", pending.request_id, reason);
                self.drop_item(pending, reason);
                true
            }
            Pairing::Waiting => false,
        }
    }

    /// Checks the head frame for companions and dequeues all three at once.
    fn take_captured_pair(&mut self) -> Pairing {
        let queues = Arc::clone(&self.queues);
        let _guard = queues.pairing_lock();

        let Some(request_id) = queues.frames.peek_with(|f| f.request_id) else {
            return Pairing::Waiting;
        };
        let has_metadata = queues
            .metadata
            .contains(|m| correlates(request_id, m.request_id()));
        let has_settings = queues
            .settings
            .contains(|s| correlates(request_id, s.request_id));

        let reason = if !has_metadata
            && queues.metadata.contains(|m| supersedes(m.request_id(), request_id))
        {
            Some("missing_metadata")
        } else if !has_settings
            && queues.settings.contains(|s| supersedes(s.request_id, request_id))
        {
            Some("missing_settings")
        } else {
            None
        };
        if let Some(reason) = reason {
            // Companions that did arrive go with the frame.
            if let Some(metadata) = queues.metadata.dequeue_first(|m| m.request_id() == request_id) {
                metadata.release();
            }
            if let Some(settings) = queues.settings.dequeue_first(|s| s.request_id == request_id) {
                settings.release();
            }
            return match queues.frames.dequeue() {
                Some(pending) => Pairing::Orphaned(pending, reason),
                None => Pairing::Waiting,
            };
        }
        if !(has_metadata && has_settings) {
            return Pairing::Waiting;
        }

        let pending = queues.frames.dequeue();
        let metadata = queues
            .metadata
            .dequeue_first(|m| correlates(request_id, m.request_id()));
        let settings = queues
            .settings
            .dequeue_first(|s| correlates(request_id, s.request_id));
        match (pending, metadata, settings) {
            (Some(pending), Some(metadata), Some(settings)) => {
                self.drop_stale_metadata(&queues, request_id);
                self.drop_stale_settings(&queues, request_id);
                Pairing::Ready(pending, metadata, settings)
            }
            (pending, metadata, settings) => {
                tracing::error!("Pairing for request {:?} lost a companion", request_id);
                pending.into_iter().for_each(|p| self.drop_item(p, "pairing"));
                metadata.into_iter().for_each(Release::release);
                settings.into_iter().for_each(Release::release);
                Pairing::Waiting
            }
        }
    }

    /// Releases metadata for requests older than `request_id`; their frames
    /// can no longer arrive.
    fn drop_stale_metadata(&mut self, queues: &PipelineQueues, request_id: Option<RequestId>) {
        while let Some(stale) = queues
            .metadata
            .dequeue_first(|m| supersedes(request_id, m.request_id()))
        {
            tracing::debug!("Releasing stale metadata for request {:?}", stale.request_id());
            stale.release();
        }
    }

    /// Drops settings for requests older than `request_id` that no queued
    /// frame or framework input is still waiting on.
    fn drop_stale_settings(&mut self, queues: &PipelineQueues, request_id: Option<RequestId>) {
        while let Some(stale) = queues.settings.dequeue_first(|s| {
            supersedes(request_id, s.request_id)
                && !queues.frames.contains(|f| f.request_id == s.request_id)
                && !queues.framework.contains(|f| f.request_id == s.request_id)
        }) {
            tracing::warn!("No frame for settings of request {:?}, dropping", stale.request_id);
            self.drop_item(stale, "missing_frame");
        }
    }

    async fn send_to_reprocess(&mut self, job: PostprocessJob) {
        if let Err(e) = self.reprocess.submit(job).await {
            self.totals.dropped += 1;
            metrics::JOBS_DROPPED.with_label_values(&[e.kind()]).inc();
        }
    }

    fn drop_item<T: Release>(&mut self, item: T, reason: &str) {
        item.release();
        self.totals.dropped += 1;
        metrics::JOBS_DROPPED.with_label_values(&[reason]).inc();
    }
}

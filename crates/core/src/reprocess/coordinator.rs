//! Ownership of the offline reprocess channel and its in-flight jobs.

use std::collections::HashMap;
use std::sync::Arc;

use super::traits::{ReprocessChannel, ReprocessProvider};
use super::types::{ReprocessCallback, ReprocessConfig, ReprocessInput, ReprocessTicket};
use crate::buffer::RawFrame;
use crate::error::PostprocError;
use crate::job::{EncodeJob, JobSource, PostprocessJob};
use crate::metrics;
use crate::queue::Release;

struct ActiveChannel {
    channel: Box<dyn ReprocessChannel>,
    config: ReprocessConfig,
    started: bool,
}

/// Routes post-process jobs through the offline channel.
///
/// Jobs handed to the channel are tracked by ticket until their
/// reprocessed frame comes back or the pipeline drops them.
pub struct ReprocessCoordinator {
    provider: Option<Arc<dyn ReprocessProvider>>,
    feature_mask: u32,
    callback: ReprocessCallback,
    active: Option<ActiveChannel>,
    ongoing: HashMap<ReprocessTicket, PostprocessJob>,
    next_ticket: ReprocessTicket,
}

impl ReprocessCoordinator {
    pub fn new(
        provider: Option<Arc<dyn ReprocessProvider>>,
        feature_mask: u32,
        callback: ReprocessCallback,
    ) -> Self {
        Self {
            provider,
            feature_mask,
            callback,
            active: None,
            ongoing: HashMap::new(),
            next_ticket: 1,
        }
    }

    /// Provisions the channel for a new session.
    ///
    /// A channel left from an earlier session is stopped and replaced. No
    /// channel is created when `config` needs no reprocessing.
    pub async fn start(&mut self, config: Option<&ReprocessConfig>) -> Result<(), PostprocError> {
        if self.active.is_some() {
            tracing::warn!("Replacing reprocess channel left from a previous session");
            if let Err(e) = self.stop().await {
                tracing::warn!("Failed to stop previous reprocess channel: {}", e);
            }
        }

        let Some(config) = config.filter(|c| c.reprocess_type.is_required()) else {
            return Ok(());
        };
        let provider = self
            .provider
            .as_ref()
            .ok_or_else(|| PostprocError::unsupported("no reprocess provider configured"))?;

        let channel = provider
            .add_offline_channel(config, self.feature_mask, Arc::clone(&self.callback))
            .await?;
        let started = config.reprocess_type.starts_immediately();
        if started {
            channel.start().await?;
        }
        tracing::info!(
            "Reprocess channel ready ({:?}, {} -> {}, started: {})",
            config.reprocess_type,
            config.input,
            config.output,
            started
        );
        self.active = Some(ActiveChannel {
            channel,
            config: config.clone(),
            started,
        });
        Ok(())
    }

    /// Releases tracked jobs, then stops and drops the channel.
    pub async fn stop(&mut self) -> Result<(), PostprocError> {
        self.flush_ongoing();
        let Some(active) = self.active.take() else {
            return Ok(());
        };
        if active.started {
            active.channel.stop().await?;
        }
        tracing::debug!("Reprocess channel stopped");
        Ok(())
    }

    pub fn has_channel(&self) -> bool {
        self.active.is_some()
    }

    pub fn config(&self) -> Option<&ReprocessConfig> {
        self.active.as_ref().map(|a| &a.config)
    }

    pub fn ongoing_count(&self) -> usize {
        self.ongoing.len()
    }

    /// Hands `job` to the channel.
    ///
    /// If the channel does not accept it, the job is released on the spot
    /// and the error returned; nothing is retried.
    pub async fn submit(&mut self, job: PostprocessJob) -> Result<ReprocessTicket, PostprocError> {
        let Some(active) = self.active.as_mut() else {
            return Err(reject(job, PostprocError::unsupported("no reprocess channel")));
        };

        if !active.started {
            if let Err(e) = active.channel.start().await {
                return Err(reject(job, e));
            }
            active.started = true;
        }

        let ticket = self.next_ticket;
        self.next_ticket += 1;

        let mut input = ReprocessInput {
            ticket,
            request_id: job.request_id,
            source: job.source.frame().buffers().to_vec(),
            metadata: job.capture_metadata().cloned(),
            orientation: job.settings.orientation,
        };
        let overridden = match &job.source {
            JobSource::Captured(_) => {
                active
                    .channel
                    .override_metadata(&mut input, &job.settings)
                    .await
            }
            JobSource::Framework(framework) => {
                if let Err(e) = active
                    .channel
                    .override_framework_metadata(&mut input, &framework.config)
                    .await
                {
                    tracing::warn!("Framework metadata override failed for ticket {}: {}", ticket, e);
                }
                Ok(())
            }
        };
        if let Err(e) = overridden {
            return Err(reject(job, e));
        }

        if let Err(e) = active.channel.reprocess(input).await {
            return Err(reject(job, e));
        }

        metrics::REPROCESS_SUBMISSIONS
            .with_label_values(&["accepted"])
            .inc();
        tracing::debug!("Reprocess ticket {} for request {:?}", ticket, job.request_id);
        self.ongoing.insert(ticket, job);
        Ok(ticket)
    }

    /// Turns a finished pass into an encode job.
    ///
    /// An unknown ticket returns the frame to its owner and reports
    /// `NotFound`.
    pub fn complete(
        &mut self,
        ticket: ReprocessTicket,
        output: RawFrame,
    ) -> Result<EncodeJob, PostprocError> {
        match self.ongoing.remove(&ticket) {
            Some(job) => Ok(EncodeJob::reprocessed(job, output)),
            None => {
                output.release();
                Err(PostprocError::not_found(format!("reprocess ticket {}", ticket)))
            }
        }
    }

    /// Releases every job still waiting on the channel.
    pub fn flush_ongoing(&mut self) -> usize {
        let count = self.ongoing.len();
        for (_, job) in self.ongoing.drain() {
            job.release();
        }
        count
    }

    /// Asks the channel to drop its offline buffer mappings.
    pub async fn unmap(&self) {
        if let Some(active) = &self.active {
            if let Err(e) = active.channel.unmap_offline_buffers().await {
                tracing::warn!("Failed to unmap offline buffers: {}", e);
            }
        }
    }
}

fn reject(job: PostprocessJob, error: PostprocError) -> PostprocError {
    tracing::warn!("Reprocess rejected request {:?}: {}", job.request_id, error);
    metrics::REPROCESS_SUBMISSIONS
        .with_label_values(&["rejected"])
        .inc();
    job.release();
    error
}

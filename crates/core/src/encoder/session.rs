//! Encoder client and session ownership, and per-job parameter building.

use std::sync::Arc;

use super::traits::{JpegEncoder, OutputBuffers};
use super::types::{
    ClientHandle, EncodeRequest, ExifDebugInfo, HwJobId, ImageParams, JobCallback, SessionId,
    SessionParams, ThumbnailParams,
};
use crate::buffer::{Dimension, RawFrame};
use crate::config::{PostprocConfig, SessionPolicy};
use crate::error::PostprocError;
use crate::job::EncodeJob;
use crate::metrics;
use crate::tags::MetadataAssembler;

#[derive(Debug)]
struct ActiveSession {
    id: SessionId,
    params: SessionParams,
}

/// Owns the encoder client handle and the current session.
///
/// One instance per pipeline; nothing here is process-wide.
pub struct EncodeSessionManager {
    encoder: Arc<dyn JpegEncoder>,
    outputs: Arc<dyn OutputBuffers>,
    assembler: MetadataAssembler,
    policy: SessionPolicy,
    output_dimensions: Dimension,
    default_quality: i32,
    client: Option<ClientHandle>,
    session: Option<ActiveSession>,
}

impl EncodeSessionManager {
    pub fn new(
        encoder: Arc<dyn JpegEncoder>,
        outputs: Arc<dyn OutputBuffers>,
        config: &PostprocConfig,
    ) -> Self {
        Self {
            encoder,
            outputs,
            assembler: MetadataAssembler::new(config.tag_capacity, config.device.clone()),
            policy: config.session_policy,
            output_dimensions: config.output_dimensions,
            default_quality: config.default_quality,
            client: None,
            session: None,
        }
    }

    /// Opens the encoder client. Opening twice returns the existing handle.
    pub async fn open(
        &mut self,
        max_picture: Dimension,
        callback: JobCallback,
    ) -> Result<ClientHandle, PostprocError> {
        if let Some(client) = self.client {
            return Ok(client);
        }
        let client = self.encoder.open(max_picture, callback).await?;
        tracing::debug!("Opened {} encoder client {}", self.encoder.name(), client);
        self.client = Some(client);
        Ok(client)
    }

    /// Destroys the session, if any, then closes the client.
    pub async fn close(&mut self) -> Result<(), PostprocError> {
        let destroyed = self.destroy_session().await;
        if let Some(client) = self.client.take() {
            self.encoder.close(client).await?;
            tracing::debug!("Closed encoder client {}", client);
        }
        destroyed
    }

    pub fn is_open(&self) -> bool {
        self.client.is_some()
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id)
    }

    /// Destroys the active session. The id is forgotten even if the
    /// encoder reports a failure.
    pub async fn destroy_session(&mut self) -> Result<(), PostprocError> {
        let Some(active) = self.session.take() else {
            return Ok(());
        };
        tracing::debug!("Destroying encoder session {}", active.id);
        self.encoder.destroy_session(active.id).await
    }

    /// Builds the parameters for `job` and starts it on the encoder.
    pub async fn submit(&mut self, job: &EncodeJob) -> Result<HwJobId, PostprocError> {
        let client = self
            .client
            .ok_or_else(|| PostprocError::hardware_failure("start_job", "encoder client is not open"))?;

        let source = source_frame(job)?;
        let source_buffer = source
            .main_buffer()
            .cloned()
            .ok_or_else(|| PostprocError::invalid_argument("source frame has no buffers"))?;
        let output_index = job.output_index();
        let output = self.outputs.buffer(output_index).ok_or_else(|| {
            PostprocError::invalid_argument(format!("no output buffer at index {}", output_index))
        })?;

        let params = self.session_params(job, source)?;
        let tags = self.assembler.assemble(job.capture_metadata(), &job.settings)?;
        let debug = ExifDebugInfo::from_capture(job.capture_metadata());
        let metadata = job.capture_metadata().cloned();

        let session = self.ensure_session(client, &params).await?;
        let request = EncodeRequest {
            session,
            params,
            source: source_buffer,
            output,
            tags,
            debug,
            metadata,
        };
        let job_id = self.encoder.start_job(request).await?;
        tracing::debug!(
            "Started encode job {} for request {:?} in session {}",
            job_id,
            job.request_id,
            session
        );
        Ok(job_id)
    }

    /// Aborts a job. Safe to call for jobs that already finished.
    pub async fn abort(&self, job_id: HwJobId) {
        if let Err(e) = self.encoder.abort_job(job_id).await {
            tracing::warn!("Failed to abort encode job {}: {}", job_id, e);
        }
    }

    /// Main image then thumbnail geometry for `job`.
    pub fn session_params(
        &self,
        job: &EncodeJob,
        source: &RawFrame,
    ) -> Result<SessionParams, PostprocError> {
        let settings = &job.settings;
        let hardware_rotation = self.encoder.capabilities().hardware_rotation;
        let pre_rotate = !hardware_rotation && settings.is_quarter_turn();

        let src = source
            .layout()
            .cloned()
            .ok_or_else(|| PostprocError::invalid_argument("source frame has no layout"))?;
        let dst = if job.reproc_frame.is_some() {
            src.dim
        } else {
            job.output_dim.unwrap_or(self.output_dimensions)
        };
        if !src.dim.is_positive() || !dst.is_positive() {
            return Err(PostprocError::invalid_argument(format!(
                "invalid main image dimensions {} -> {}",
                src.dim, dst
            )));
        }
        let color_format = src.format.color_format();
        let main = if pre_rotate {
            ImageParams {
                src: src.transposed(),
                dst: dst.swapped(),
                color_format,
            }
        } else {
            ImageParams {
                src: src.clone(),
                dst,
                color_format,
            }
        };

        let thumbnail = settings.thumbnail.is_positive().then(|| {
            let (src, dst) = if pre_rotate {
                (src.dim.swapped(), settings.thumbnail.swapped())
            } else {
                (src.dim, settings.thumbnail)
            };
            ThumbnailParams {
                src,
                dst,
                quality: self.quality_or_default(settings.thumb_quality),
            }
        });

        Ok(SessionParams {
            main,
            thumbnail,
            quality: self.quality_or_default(settings.quality),
            rotation: if hardware_rotation { settings.orientation } else { 0 },
        })
    }

    fn quality_or_default(&self, quality: i32) -> i32 {
        if quality > 0 {
            quality
        } else {
            self.default_quality
        }
    }

    async fn ensure_session(
        &mut self,
        client: ClientHandle,
        params: &SessionParams,
    ) -> Result<SessionId, PostprocError> {
        if let Some(active) = &self.session {
            if self.policy == SessionPolicy::ReuseWhenUnchanged && active.params == *params {
                return Ok(active.id);
            }
            self.destroy_session().await?;
        }

        let id = self.encoder.create_session(client, params).await?;
        metrics::SESSIONS_CREATED.inc();
        tracing::debug!("Created encoder session {}", id);
        self.session = Some(ActiveSession {
            id,
            params: params.clone(),
        });
        Ok(id)
    }
}

/// The single image to encode: a captured frame or a reprocessed one.
fn source_frame(job: &EncodeJob) -> Result<&RawFrame, PostprocError> {
    match (&job.src_frame, &job.reproc_frame) {
        (Some(frame), None) | (None, Some(frame)) => Ok(frame),
        (Some(_), Some(_)) => Err(PostprocError::invalid_argument(
            "both captured and reprocessed frames present",
        )),
        (None, None) => Err(PostprocError::invalid_argument("no source frame")),
    }
}

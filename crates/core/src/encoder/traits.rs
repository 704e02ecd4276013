//! Trait definitions for the encoder module.

use async_trait::async_trait;

use super::types::{
    ClientHandle, EncodeOutput, EncodeRequest, EncoderCapabilities, HwJobId, JobCallback,
    SessionId, SessionParams,
};
use crate::buffer::{BufferDescriptor, Dimension};
use crate::error::PostprocError;

/// A hardware JPEG encoder service.
#[async_trait]
pub trait JpegEncoder: Send + Sync {
    /// Returns the name of this encoder implementation.
    fn name(&self) -> &str;

    fn capabilities(&self) -> EncoderCapabilities;

    /// Opens a client able to encode pictures up to `max_picture`.
    ///
    /// `callback` receives every job completion for this client.
    async fn open(
        &self,
        max_picture: Dimension,
        callback: JobCallback,
    ) -> Result<ClientHandle, PostprocError>;

    async fn create_session(
        &self,
        client: ClientHandle,
        params: &SessionParams,
    ) -> Result<SessionId, PostprocError>;

    /// Starts a job. Completion is reported asynchronously via the callback.
    async fn start_job(&self, request: EncodeRequest) -> Result<HwJobId, PostprocError>;

    /// Aborts a job. Aborting a job that already finished is a no-op.
    async fn abort_job(&self, job_id: HwJobId) -> Result<(), PostprocError>;

    async fn destroy_session(&self, session: SessionId) -> Result<(), PostprocError>;

    async fn close(&self, client: ClientHandle) -> Result<(), PostprocError>;
}

/// Owner of the output buffers JPEG streams are written into.
pub trait OutputBuffers: Send + Sync {
    /// Buffer for an output slot, if the slot exists.
    fn buffer(&self, index: u32) -> Option<BufferDescriptor>;

    /// Takes back a filled (or failed) output buffer.
    fn deliver(&self, output: EncodeOutput);
}

//! Mock JPEG encoder for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::buffer::Dimension;
use crate::encoder::{
    ClientHandle, EncodeRequest, EncodeStatus, EncoderCapabilities, HwJobId, JobCallback,
    JpegEncoder, SessionId, SessionParams,
};
use crate::error::PostprocError;

/// Encoder operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncoderOp {
    Open,
    CreateSession,
    StartJob,
    AbortJob,
    DestroySession,
    Close,
}

/// A job accepted by the mock encoder.
#[derive(Debug, Clone)]
pub struct RecordedJob {
    pub job_id: HwJobId,
    pub request: EncodeRequest,
}

/// Mock implementation of the JpegEncoder trait.
///
/// Provides controllable behavior for testing:
/// - Record sessions and jobs for assertions
/// - Inject a failure into the next call of any operation
/// - Complete jobs on demand, or as soon as they start
/// - Track how many jobs were in flight at once
///
/// # Example
///
/// ```rust,ignore
/// let encoder = MockEncoder::new();
/// // ... run the pipeline until a job starts ...
/// let job = encoder.started_jobs().await.remove(0);
/// encoder.complete(job.job_id, EncodeStatus::Done { size: 1024 }).await;
/// ```
#[derive(Clone)]
pub struct MockEncoder {
    capabilities: EncoderCapabilities,
    callback: Arc<RwLock<Option<JobCallback>>>,
    jobs: Arc<RwLock<Vec<RecordedJob>>>,
    in_flight: Arc<RwLock<HashSet<HwJobId>>>,
    max_in_flight: Arc<RwLock<usize>>,
    aborted: Arc<RwLock<Vec<HwJobId>>>,
    sessions_created: Arc<RwLock<Vec<(SessionId, SessionParams)>>>,
    sessions_destroyed: Arc<RwLock<Vec<SessionId>>>,
    open_clients: Arc<RwLock<usize>>,
    next_errors: Arc<RwLock<HashMap<EncoderOp, PostprocError>>>,
    auto_complete: Arc<RwLock<bool>>,
    next_id: Arc<AtomicU32>,
}

impl Default for MockEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEncoder {
    /// Create a mock encoder without hardware rotation.
    pub fn new() -> Self {
        Self::with_capabilities(EncoderCapabilities::default())
    }

    pub fn with_capabilities(capabilities: EncoderCapabilities) -> Self {
        Self {
            capabilities,
            callback: Arc::new(RwLock::new(None)),
            jobs: Arc::new(RwLock::new(Vec::new())),
            in_flight: Arc::new(RwLock::new(HashSet::new())),
            max_in_flight: Arc::new(RwLock::new(0)),
            aborted: Arc::new(RwLock::new(Vec::new())),
            sessions_created: Arc::new(RwLock::new(Vec::new())),
            sessions_destroyed: Arc::new(RwLock::new(Vec::new())),
            open_clients: Arc::new(RwLock::new(0)),
            next_errors: Arc::new(RwLock::new(HashMap::new())),
            auto_complete: Arc::new(RwLock::new(false)),
            next_id: Arc::new(AtomicU32::new(1)),
        }
    }

    /// Configure the next call of `op` to fail with the given error.
    pub async fn set_next_error(&self, op: EncoderOp, error: PostprocError) {
        self.next_errors.write().await.insert(op, error);
    }

    /// Complete every job with `Done` as soon as it starts.
    pub async fn set_auto_complete(&self, enabled: bool) {
        *self.auto_complete.write().await = enabled;
    }

    /// Jobs accepted so far.
    pub async fn started_jobs(&self) -> Vec<RecordedJob> {
        self.jobs.read().await.clone()
    }

    pub async fn aborted(&self) -> Vec<HwJobId> {
        self.aborted.read().await.clone()
    }

    pub async fn sessions_created(&self) -> Vec<(SessionId, SessionParams)> {
        self.sessions_created.read().await.clone()
    }

    pub async fn sessions_destroyed(&self) -> Vec<SessionId> {
        self.sessions_destroyed.read().await.clone()
    }

    /// Clients opened and not yet closed.
    pub async fn open_clients(&self) -> usize {
        *self.open_clients.read().await
    }

    /// Highest number of jobs that were started and not yet finished.
    pub async fn max_in_flight(&self) -> usize {
        *self.max_in_flight.read().await
    }

    /// Reports a job as finished through the client callback.
    ///
    /// Works for any id, including aborted or unknown ones, so late
    /// completions can be simulated. Returns false if no client is open.
    pub async fn complete(&self, job_id: HwJobId, status: EncodeStatus) -> bool {
        self.in_flight.write().await.remove(&job_id);
        let callback = self.callback.read().await.clone();
        match callback {
            Some(callback) => {
                callback(job_id, status);
                true
            }
            None => false,
        }
    }

    async fn take_error(&self, op: EncoderOp) -> Result<(), PostprocError> {
        match self.next_errors.write().await.remove(&op) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl JpegEncoder for MockEncoder {
    fn name(&self) -> &str {
        "mock"
    }

    fn capabilities(&self) -> EncoderCapabilities {
        self.capabilities
    }

    async fn open(
        &self,
        _max_picture: Dimension,
        callback: JobCallback,
    ) -> Result<ClientHandle, PostprocError> {
        self.take_error(EncoderOp::Open).await?;
        *self.callback.write().await = Some(callback);
        let mut clients = self.open_clients.write().await;
        *clients += 1;
        Ok(*clients as ClientHandle)
    }

    async fn create_session(
        &self,
        _client: ClientHandle,
        params: &SessionParams,
    ) -> Result<SessionId, PostprocError> {
        self.take_error(EncoderOp::CreateSession).await?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.sessions_created.write().await.push((id, params.clone()));
        Ok(id)
    }

    async fn start_job(&self, request: EncodeRequest) -> Result<HwJobId, PostprocError> {
        self.take_error(EncoderOp::StartJob).await?;
        let job_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let size = request.source.size / 10;
        self.jobs.write().await.push(RecordedJob { job_id, request });
        {
            let mut in_flight = self.in_flight.write().await;
            in_flight.insert(job_id);
            let mut max = self.max_in_flight.write().await;
            *max = (*max).max(in_flight.len());
        }

        if *self.auto_complete.read().await {
            self.complete(job_id, EncodeStatus::Done { size }).await;
        }
        Ok(job_id)
    }

    async fn abort_job(&self, job_id: HwJobId) -> Result<(), PostprocError> {
        self.take_error(EncoderOp::AbortJob).await?;
        self.aborted.write().await.push(job_id);
        self.in_flight.write().await.remove(&job_id);
        Ok(())
    }

    async fn destroy_session(&self, session: SessionId) -> Result<(), PostprocError> {
        self.take_error(EncoderOp::DestroySession).await?;
        self.sessions_destroyed.write().await.push(session);
        Ok(())
    }

    async fn close(&self, _client: ClientHandle) -> Result<(), PostprocError> {
        self.take_error(EncoderOp::Close).await?;
        let mut clients = self.open_clients.write().await;
        *clients = clients.saturating_sub(1);
        Ok(())
    }
}

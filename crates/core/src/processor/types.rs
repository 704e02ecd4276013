//! Types for the processor module.

use serde::Serialize;
use tokio::sync::oneshot;

use crate::buffer::RawFrame;
use crate::encoder::{EncodeStatus, HwJobId, SessionId};
use crate::error::PostprocError;
use crate::reprocess::{ReprocessConfig, ReprocessTicket};

/// Lifecycle state of the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatcherState {
    Stopped,
    Active,
}

/// Items waiting in each queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueDepths {
    pub frames: usize,
    pub metadata: usize,
    pub framework: usize,
    pub settings: usize,
    pub encode: usize,
}

impl QueueDepths {
    pub fn total(&self) -> usize {
        self.frames + self.metadata + self.framework + self.settings + self.encode
    }
}

/// Snapshot of a post-processor.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatus {
    pub name: String,
    pub state: DispatcherState,
    pub queues: QueueDepths,
    /// Encoder job currently in flight.
    pub in_flight: Option<HwJobId>,
    /// Jobs handed to the reprocess channel and not yet back.
    pub ongoing_reprocess: usize,
    pub reprocess_channel: bool,
    pub session: Option<SessionId>,
    /// Jobs the encoder finished, successfully or not.
    pub encoded: u64,
    /// Requests dropped with their resources released.
    pub dropped: u64,
    /// In-flight jobs aborted by stop or flush.
    pub aborted: u64,
}

impl PipelineStatus {
    /// Nothing queued, in flight or at the reprocess stage.
    pub fn is_idle(&self) -> bool {
        self.queues.total() == 0 && self.in_flight.is_none() && self.ongoing_reprocess == 0
    }
}

pub(crate) type Ack = oneshot::Sender<Result<(), PostprocError>>;

/// Messages driving the dispatcher task.
pub(crate) enum Command {
    Start {
        reprocess: Option<ReprocessConfig>,
        ack: Ack,
    },
    Stop {
        ack: Ack,
    },
    Flush {
        ack: Ack,
    },
    /// Re-scan the queues. Posting it more than once is harmless.
    Advance,
    EncodeDone {
        job_id: HwJobId,
        status: EncodeStatus,
    },
    ReprocessDone {
        ticket: ReprocessTicket,
        frame: RawFrame,
    },
    Status {
        reply: oneshot::Sender<PipelineStatus>,
    },
    Exit {
        ack: Option<Ack>,
    },
}

impl Command {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Stop { .. } => "stop",
            Self::Flush { .. } => "flush",
            Self::Advance => "advance",
            Self::EncodeDone { .. } => "encode_done",
            Self::ReprocessDone { .. } => "reprocess_done",
            Self::Status { .. } => "status",
            Self::Exit { .. } => "exit",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status() -> PipelineStatus {
        PipelineStatus {
            name: "postproc".to_string(),
            state: DispatcherState::Active,
            queues: QueueDepths::default(),
            in_flight: None,
            ongoing_reprocess: 0,
            reprocess_channel: false,
            session: Some(3),
            encoded: 2,
            dropped: 1,
            aborted: 0,
        }
    }

    #[test]
    fn test_idle_requires_empty_pipeline() {
        let mut status = status();
        assert!(status.is_idle());

        status.queues.settings = 1;
        assert!(!status.is_idle());

        status.queues = QueueDepths::default();
        status.in_flight = Some(7);
        assert!(!status.is_idle());

        status.in_flight = None;
        status.ongoing_reprocess = 1;
        assert!(!status.is_idle());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_value(status()).unwrap();
        assert_eq!(json["state"], "active");
        assert_eq!(json["queues"]["frames"], 0);
        assert_eq!(json["session"], 3);
        assert!(json["in_flight"].is_null());
    }

    #[test]
    fn test_queue_depth_total() {
        let depths = QueueDepths {
            frames: 1,
            metadata: 2,
            framework: 0,
            settings: 3,
            encode: 1,
        };
        assert_eq!(depths.total(), 7);
    }
}

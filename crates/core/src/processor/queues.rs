//! The set of queues shared by producers and the dispatcher.

use std::sync::{Mutex, MutexGuard, PoisonError};

use super::types::QueueDepths;
use crate::buffer::MetadataFrame;
use crate::job::{EncodeJob, EncodeSettings, FrameworkInput, PendingFrame};
use crate::metrics;
use crate::queue::JobQueue;

pub(crate) struct PipelineQueues {
    pub frames: JobQueue<PendingFrame>,
    pub metadata: JobQueue<MetadataFrame>,
    pub framework: JobQueue<FrameworkInput>,
    pub settings: JobQueue<EncodeSettings>,
    pub encode: JobQueue<EncodeJob>,
    /// Held across the frame/metadata check-and-dequeue and by the
    /// producers of either queue.
    pairing: Mutex<()>,
}

impl PipelineQueues {
    pub fn new() -> Self {
        Self {
            frames: JobQueue::new("frames"),
            metadata: JobQueue::new("metadata"),
            framework: JobQueue::new("framework"),
            settings: JobQueue::new("settings"),
            encode: JobQueue::new("encode"),
            pairing: Mutex::new(()),
        }
    }

    pub fn pairing_lock(&self) -> MutexGuard<'_, ()> {
        self.pairing.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn init_all(&self) {
        self.frames.init();
        self.metadata.init();
        self.framework.init();
        self.settings.init();
        self.encode.init();
    }

    /// Releases everything producers queued. Returns the number of items.
    pub fn flush_inputs(&self) -> usize {
        let _guard = self.pairing_lock();
        self.frames.flush() + self.metadata.flush() + self.framework.flush() + self.settings.flush()
    }

    /// Releases every queued item, encode-ready jobs included.
    pub fn flush_all(&self) -> usize {
        self.flush_inputs() + self.encode.flush()
    }

    pub fn depths(&self) -> QueueDepths {
        QueueDepths {
            frames: self.frames.len(),
            metadata: self.metadata.len(),
            framework: self.framework.len(),
            settings: self.settings.len(),
            encode: self.encode.len(),
        }
    }

    pub fn publish_depths(&self) {
        let depths = self.depths();
        for (queue, depth) in [
            (self.frames.name(), depths.frames),
            (self.metadata.name(), depths.metadata),
            (self.framework.name(), depths.framework),
            (self.settings.name(), depths.settings),
            (self.encode.name(), depths.encode),
        ] {
            metrics::QUEUE_DEPTH
                .with_label_values(&[queue])
                .set(depth as i64);
        }
    }
}

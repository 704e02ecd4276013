//! Typed FIFO job queues with per-item release routines.
//!
//! Producers enqueue from any thread; only the dispatcher dequeues. Items left
//! in a queue when it is flushed or dropped are handed to their [`Release`]
//! routine so borrowed buffers always find their way home.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Gives back everything an item borrowed.
pub trait Release {
    fn release(self);
}

/// A FIFO queue whose unconsumed items are released on flush and on drop.
pub struct JobQueue<T: Release> {
    name: &'static str,
    items: Mutex<VecDeque<T>>,
}

impl<T: Release> JobQueue<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            items: Mutex::new(VecDeque::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resets the queue for a new session, releasing anything left behind.
    pub fn init(&self) {
        let leftover = self.flush();
        if leftover > 0 {
            tracing::warn!("Queue {} still held {} items at init", self.name, leftover);
        }
    }

    /// Appends an item. Safe to call from any thread.
    pub fn enqueue(&self, item: T) {
        self.lock().push_back(item);
    }

    /// Removes the oldest item.
    pub fn dequeue(&self) -> Option<T> {
        self.lock().pop_front()
    }

    /// Removes the oldest item matching `pred`, leaving the rest in order.
    pub fn dequeue_first(&self, mut pred: impl FnMut(&T) -> bool) -> Option<T> {
        let mut items = self.lock();
        let position = items.iter().position(|item| pred(item))?;
        items.remove(position)
    }

    /// Whether any queued item matches `pred`.
    pub fn contains(&self, pred: impl FnMut(&T) -> bool) -> bool {
        self.lock().iter().any(pred)
    }

    /// Applies `f` to the oldest item without removing it.
    pub fn peek_with<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.lock().front().map(f)
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Drains every item through its release routine and returns how many
    /// were released.
    pub fn flush(&self) -> usize {
        // Release outside the lock: release routines may enqueue elsewhere.
        let drained: Vec<T> = self.lock().drain(..).collect();
        let count = drained.len();
        for item in drained {
            item.release();
        }
        count
    }
}

impl<T: Release> Drop for JobQueue<T> {
    fn drop(&mut self) {
        let items = self.items.get_mut().unwrap_or_else(PoisonError::into_inner);
        for item in items.drain(..) {
            item.release();
        }
    }
}

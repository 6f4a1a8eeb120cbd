//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Bounded event buffer shared between a stream's producer and consumer.

use super::StreamEvent;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// A read-only view of a queue's occupancy at one instant.
///
/// Policies receive a snapshot per invocation; they never hold a reference
/// into the queue's internals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferSnapshot {
    /// Number of buffered events.
    pub len: usize,
    /// Total capacity of the buffer.
    pub capacity: usize,
    /// Remaining free slots.
    pub remaining: usize,
}

impl BufferSnapshot {
    /// Current occupancy as a percentage of capacity (0-100).
    #[must_use]
    pub fn fill_grade_percent(&self) -> u32 {
        if self.capacity == 0 {
            return 0;
        }
        ((self.len * 100 / self.capacity) as u32).min(100)
    }
}

/// Bounded FIFO buffer of [`StreamEvent`]s.
///
/// One producer path and one consumer path share a queue per stream
/// instance. Admission policies observe it (`len`/`remaining_capacity`) and
/// perform inserts; the consumer drains it. Admission order is FIFO — a
/// policy may delay an insert but never reorders.
///
/// Terminal events bypass the capacity limit via [`push_control`] so a full
/// buffer can never stall shutdown.
///
/// [`push_control`]: EventQueue::push_control
pub struct EventQueue<T> {
    events: Mutex<VecDeque<StreamEvent<T>>>,
    capacity: usize,
    closed: AtomicBool,
    /// Wakes the consumer when an event arrives.
    readable: Notify,
    /// Wakes blocked producers when a slot frees up.
    writable: Notify,
}

impl<T> EventQueue<T> {
    /// Creates a queue with the given capacity.
    ///
    /// # Panics
    ///
    /// Panics if capacity is 0.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than 0");
        Self {
            events: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            closed: AtomicBool::new(false),
            readable: Notify::new(),
            writable: Notify::new(),
        }
    }

    /// Number of buffered events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().expect("event queue lock poisoned").len()
    }

    /// Returns `true` when no events are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Remaining free slots.
    #[must_use]
    pub fn remaining_capacity(&self) -> usize {
        self.capacity.saturating_sub(self.len())
    }

    /// Occupancy snapshot for policy evaluation.
    #[must_use]
    pub fn snapshot(&self) -> BufferSnapshot {
        let len = self.len();
        BufferSnapshot {
            len,
            capacity: self.capacity,
            remaining: self.capacity.saturating_sub(len),
        }
    }

    /// Returns `true` once the queue has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Attempts an immediate insert, handing the event back when the buffer
    /// is full or closed.
    pub fn try_push(&self, event: StreamEvent<T>) -> Result<(), StreamEvent<T>> {
        if self.is_closed() {
            return Err(event);
        }
        let mut events = self.events.lock().expect("event queue lock poisoned");
        if events.len() >= self.capacity {
            return Err(event);
        }
        events.push_back(event);
        drop(events);
        self.readable.notify_one();
        Ok(())
    }

    /// Inserts the event, waiting for a free slot when the buffer is full.
    ///
    /// Only the calling producer task is suspended. Returns `false` if the
    /// queue closed while waiting — the event is dropped and the caller is
    /// expected to log the loss.
    pub async fn push_wait(&self, event: StreamEvent<T>) -> bool {
        let mut event = event;
        loop {
            if self.is_closed() {
                return false;
            }
            match self.try_push(event) {
                Ok(()) => return true,
                Err(e) => event = e,
            }
            self.writable.notified().await;
        }
    }

    /// Enqueues a terminal event regardless of capacity.
    ///
    /// Close and error signals must never be throttled by the data path.
    /// Silently dropped once the queue is closed.
    pub fn push_control(&self, event: StreamEvent<T>) {
        if self.is_closed() {
            return;
        }
        self.events
            .lock()
            .expect("event queue lock poisoned")
            .push_back(event);
        self.readable.notify_one();
    }

    /// Removes and returns the oldest buffered event, if any.
    ///
    /// Used by eviction policies to free a slot for a newer event.
    pub fn evict_oldest(&self) -> Option<StreamEvent<T>> {
        let evicted = self
            .events
            .lock()
            .expect("event queue lock poisoned")
            .pop_front();
        if evicted.is_some() {
            self.writable.notify_one();
        }
        evicted
    }

    /// Removes and returns the next event, waiting for one to arrive.
    ///
    /// Returns `None` once the queue is closed and drained.
    pub async fn pop_wait(&self) -> Option<StreamEvent<T>> {
        loop {
            let popped = self
                .events
                .lock()
                .expect("event queue lock poisoned")
                .pop_front();
            if let Some(event) = popped {
                self.writable.notify_one();
                return Some(event);
            }
            if self.is_closed() {
                return None;
            }
            self.readable.notified().await;
        }
    }

    /// Closes the queue and wakes every waiter.
    ///
    /// Buffered events remain drainable via [`pop_wait`]; blocked producers
    /// observe the closure and abort their insert.
    ///
    /// [`pop_wait`]: EventQueue::pop_wait
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        // Stored permits catch waiters that registered during the store.
        self.readable.notify_one();
        self.writable.notify_one();
        self.readable.notify_waiters();
        self.writable.notify_waiters();
    }
}

impl<T> std::fmt::Debug for EventQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::StreamError;
    use std::sync::Arc;
    use std::time::Duration;

    fn data(n: i32) -> StreamEvent<i32> {
        StreamEvent::Data(n)
    }

    #[test]
    fn test_try_push_and_snapshot() {
        let queue = EventQueue::new(4);
        assert!(queue.try_push(data(1)).is_ok());
        assert!(queue.try_push(data(2)).is_ok());

        let snapshot = queue.snapshot();
        assert_eq!(snapshot.len, 2);
        assert_eq!(snapshot.capacity, 4);
        assert_eq!(snapshot.remaining, 2);
        assert_eq!(snapshot.fill_grade_percent(), 50);
    }

    #[test]
    fn test_try_push_full() {
        let queue = EventQueue::new(1);
        assert!(queue.try_push(data(1)).is_ok());
        assert!(queue.try_push(data(2)).is_err());
    }

    #[test]
    #[should_panic(expected = "Capacity must be greater than 0")]
    fn test_zero_capacity() {
        EventQueue::<i32>::new(0);
    }

    #[test]
    fn test_control_push_ignores_capacity() {
        let queue = EventQueue::new(1);
        assert!(queue.try_push(data(1)).is_ok());
        queue.push_control(StreamEvent::Close);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_evict_oldest() {
        let queue = EventQueue::new(2);
        assert!(queue.try_push(data(1)).is_ok());
        assert!(queue.try_push(data(2)).is_ok());
        let evicted = queue.evict_oldest();
        assert!(matches!(evicted, Some(StreamEvent::Data(1))));
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_push_wait_unblocks_on_pop() {
        let queue = Arc::new(EventQueue::new(1));
        assert!(queue.try_push(data(1)).is_ok());

        let pusher = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.push_wait(data(2)).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(matches!(queue.pop_wait().await, Some(StreamEvent::Data(1))));

        assert!(pusher.await.unwrap());
        assert!(matches!(queue.pop_wait().await, Some(StreamEvent::Data(2))));
    }

    #[tokio::test]
    async fn test_push_wait_aborts_on_close() {
        let queue = Arc::new(EventQueue::new(1));
        assert!(queue.try_push(data(1)).is_ok());

        let pusher = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.push_wait(data(2)).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.close();
        assert!(!pusher.await.unwrap());
    }

    #[tokio::test]
    async fn test_pop_wait_drains_after_close() {
        let queue = EventQueue::new(2);
        assert!(queue.try_push(data(1)).is_ok());
        queue.push_control(StreamEvent::Error(StreamError::message("boom")));
        queue.close();

        assert!(matches!(queue.pop_wait().await, Some(StreamEvent::Data(1))));
        assert!(matches!(queue.pop_wait().await, Some(StreamEvent::Error(_))));
        assert!(queue.pop_wait().await.is_none());
    }
}

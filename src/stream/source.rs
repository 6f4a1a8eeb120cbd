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

//! Single-connection push event source.

use super::queue::EventQueue;
use super::{StreamError, StreamEvent};
use crate::policy::QueuePolicy;
use crate::relay::RelayError;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{error, warn};

/// The consumer attachment of an open source.
struct Connection<T> {
    queue: Arc<EventQueue<T>>,
    policy: Arc<dyn QueuePolicy<T>>,
}

impl<T> Clone for Connection<T> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
            policy: Arc::clone(&self.policy),
        }
    }
}

struct SourceInner<T> {
    connection: Mutex<Option<Connection<T>>>,
    connected: AtomicBool,
    terminated: AtomicBool,
    connect_watcher: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

/// A push event source that a single consumer stream can attach to.
///
/// Producers call [`publish`] to emit data and [`complete`] / [`fail`] to
/// terminate the stream. Every published event is admitted through the
/// attached queue policy, which may delay the calling producer task.
///
/// A source supports exactly one concurrent consumer attachment; attaching a
/// second consumer while one is open is a programming error.
///
/// # Example
///
/// ```rust,no_run
/// use flowbridge::stream::EventSource;
///
/// # async fn example() {
/// let source = EventSource::<u32>::new();
/// // ... build and start a stream from the source, then:
/// source.publish(1).await;
/// source.publish(2).await;
/// source.complete();
/// # }
/// ```
///
/// [`publish`]: EventSource::publish
/// [`complete`]: EventSource::complete
/// [`fail`]: EventSource::fail
pub struct EventSource<T> {
    inner: Arc<SourceInner<T>>,
}

impl<T> Clone for EventSource<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for EventSource<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> EventSource<T> {
    /// Creates a disconnected source.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SourceInner {
                connection: Mutex::new(None),
                connected: AtomicBool::new(false),
                terminated: AtomicBool::new(false),
                connect_watcher: Mutex::new(None),
            }),
        }
    }

    /// Returns `true` while a consumer is attached and the source has not
    /// been terminated.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire) && !self.inner.terminated.load(Ordering::Acquire)
    }

    /// Registers a watcher invoked once when a consumer attaches.
    ///
    /// # Errors
    ///
    /// Fails with [`RelayError::HandlerAlreadySet`] when a watcher has
    /// already been registered.
    pub fn on_connect<F>(&self, watcher: F) -> Result<(), RelayError>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut slot = self
            .inner
            .connect_watcher
            .lock()
            .expect("connect watcher lock poisoned");
        if slot.is_some() {
            return Err(RelayError::HandlerAlreadySet { handler: "connect" });
        }
        *slot = Some(Box::new(watcher));
        Ok(())
    }

    /// Attaches a consumer queue and its admission policy.
    ///
    /// Fires the connect watcher, if any. Called by the stream's terminal
    /// operation, not by user code.
    ///
    /// # Errors
    ///
    /// Fails with [`RelayError::AlreadyOpen`] when a consumer is already
    /// attached.
    pub(crate) fn open(
        &self,
        queue: Arc<EventQueue<T>>,
        policy: Arc<dyn QueuePolicy<T>>,
    ) -> Result<(), RelayError> {
        {
            let mut connection = self
                .inner
                .connection
                .lock()
                .expect("source connection lock poisoned");
            if connection.is_some() {
                return Err(RelayError::AlreadyOpen);
            }
            *connection = Some(Connection { queue, policy });
        }
        self.inner.connected.store(true, Ordering::Release);
        let watcher = self
            .inner
            .connect_watcher
            .lock()
            .expect("connect watcher lock poisoned")
            .take();
        if let Some(watcher) = watcher {
            watcher();
        }
        Ok(())
    }

    /// Detaches the consumer. Called by the pump when the stream terminates.
    pub(crate) fn mark_disconnected(&self) {
        self.inner.connected.store(false, Ordering::Release);
        self.inner
            .connection
            .lock()
            .expect("source connection lock poisoned")
            .take();
    }

    fn connection(&self) -> Option<Connection<T>> {
        self.inner
            .connection
            .lock()
            .expect("source connection lock poisoned")
            .clone()
    }
}

impl<T: Send + 'static> EventSource<T> {
    /// Publishes a data event through the attached queue policy.
    ///
    /// The policy may suspend the calling producer task before the event is
    /// admitted. Returns `false` when the event was not delivered — either
    /// no consumer is attached (surfaced as an error, since it indicates
    /// data loss) or the policy dropped the event.
    pub async fn publish(&self, item: T) -> bool {
        let Some(connection) = self.connection() else {
            error!("event source is not connected, published data is lost");
            return false;
        };
        let delivered = connection
            .policy
            .offer(&connection.queue, StreamEvent::Data(item))
            .await;
        if !delivered {
            warn!(
                policy = connection.policy.name(),
                "queue policy did not deliver the event, data is lost"
            );
        }
        delivered
    }

    /// Terminates the stream gracefully with a close event.
    ///
    /// Idempotent; calls after the first are no-ops.
    pub fn complete(&self) {
        if self.inner.terminated.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(connection) = self.connection() {
            connection.queue.push_control(StreamEvent::Close);
        }
    }

    /// Terminates the stream with an error event.
    ///
    /// The error is delivered to the stream's error handler, followed by a
    /// close. Idempotent; calls after the first are no-ops.
    pub fn fail(&self, error: StreamError) {
        if self.inner.terminated.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(connection) = self.connection() {
            connection.queue.push_control(StreamEvent::Error(error));
        }
    }
}

impl<T> fmt::Debug for EventSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSource")
            .field("connected", &self.inner.connected.load(Ordering::Relaxed))
            .field("terminated", &self.inner.terminated.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::BlockingQueuePolicy;

    fn attach(source: &EventSource<i32>, capacity: usize) -> Arc<EventQueue<i32>> {
        let queue = Arc::new(EventQueue::new(capacity));
        source
            .open(Arc::clone(&queue), Arc::new(BlockingQueuePolicy::new()))
            .unwrap();
        queue
    }

    #[tokio::test]
    async fn test_publish_without_consumer_is_lost() {
        let source = EventSource::new();
        assert!(!source.publish(1).await);
    }

    #[tokio::test]
    async fn test_publish_flows_into_queue() {
        let source = EventSource::new();
        let queue = attach(&source, 4);
        assert!(source.publish(1).await);
        assert!(source.publish(2).await);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_double_open_fails() {
        let source = EventSource::<i32>::new();
        attach(&source, 4);
        let queue = Arc::new(EventQueue::new(4));
        let result = source.open(queue, Arc::new(BlockingQueuePolicy::new()));
        assert_eq!(result, Err(RelayError::AlreadyOpen));
    }

    #[test]
    fn test_connect_watcher_fires_once() {
        let source = EventSource::<i32>::new();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        source
            .on_connect(move || flag.store(true, Ordering::SeqCst))
            .unwrap();
        assert!(source.on_connect(|| ()).is_err());

        attach(&source, 4);
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_complete_is_idempotent() {
        let source = EventSource::new();
        let queue = attach(&source, 4);
        source.complete();
        source.complete();
        assert_eq!(queue.len(), 1);
        assert!(!source.is_connected());
    }

    #[tokio::test]
    async fn test_fail_enqueues_error() {
        let source = EventSource::new();
        let queue = attach(&source, 4);
        source.fail(StreamError::message("boom"));
        assert!(matches!(
            queue.pop_wait().await,
            Some(StreamEvent::Error(_))
        ));
    }
}

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

//! Consumption side of a push stream.

use super::queue::EventQueue;
use super::source::EventSource;
use super::{StreamError, StreamEvent};
use crate::config::StreamConfig;
use crate::policy::{BlockingQueuePolicy, PolicyError, PushbackPolicy, QueuePolicy};
use crate::relay::RelayError;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;

/// Buffer capacity used when neither the builder nor the configuration
/// specifies one.
pub const DEFAULT_BUFFER_SIZE: usize = 32;

type CloseHandler = Box<dyn FnOnce() + Send>;
type ErrorHandler = Box<dyn FnOnce(StreamError) + Send>;

struct FlowInner<T> {
    source: EventSource<T>,
    queue: Arc<EventQueue<T>>,
    queue_policy: Arc<dyn QueuePolicy<T>>,
    pushback: Option<Arc<dyn PushbackPolicy>>,
    on_close: Mutex<Option<CloseHandler>>,
    on_error: Mutex<Option<ErrorHandler>>,
    started: AtomicBool,
    closed: AtomicBool,
}

impl<T> FlowInner<T> {
    fn fire_error(&self, error: StreamError) {
        let handler = self
            .on_error
            .lock()
            .expect("error handler lock poisoned")
            .take();
        match handler {
            Some(handler) => handler(error),
            None => debug!(error = %error, "stream error without a registered handler"),
        }
    }

    fn fire_close(&self) {
        let handler = self
            .on_close
            .lock()
            .expect("close handler lock poisoned")
            .take();
        if let Some(handler) = handler {
            handler();
        }
    }
}

/// A push stream consuming one [`EventSource`].
///
/// A `FlowStream` holds the bounded event buffer between the source and the
/// consumer, the admission policy applied on publish, and the pushback
/// policy applied between deliveries. Consumption begins with a terminal
/// operation ([`for_each`] / [`for_each_event`]) which attaches the stream
/// to its source and spawns the delivery task.
///
/// Close and error handlers are single registration slots: the handler for
/// a signal fires at most once, and registering a second handler for the
/// same signal is a programming error.
///
/// Cloning is shallow; all clones drive the same stream.
///
/// [`for_each`]: FlowStream::for_each
/// [`for_each_event`]: FlowStream::for_each_event
pub struct FlowStream<T> {
    inner: Arc<FlowInner<T>>,
}

impl<T> Clone for FlowStream<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + 'static> FlowStream<T> {
    /// Registers the close handler.
    ///
    /// The handler fires exactly once when the stream closes, whether the
    /// close was graceful or followed an error.
    ///
    /// # Errors
    ///
    /// Fails with [`RelayError::HandlerAlreadySet`] on a second registration.
    pub fn on_close<F>(&self, handler: F) -> Result<&Self, RelayError>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut slot = self
            .inner
            .on_close
            .lock()
            .expect("close handler lock poisoned");
        if slot.is_some() {
            return Err(RelayError::HandlerAlreadySet { handler: "close" });
        }
        *slot = Some(Box::new(handler));
        Ok(self)
    }

    /// Registers the error handler.
    ///
    /// The handler fires at most once, when the stream terminates with an
    /// error; the close handler fires afterwards.
    ///
    /// # Errors
    ///
    /// Fails with [`RelayError::HandlerAlreadySet`] on a second registration.
    pub fn on_error<F>(&self, handler: F) -> Result<&Self, RelayError>
    where
        F: FnOnce(StreamError) + Send + 'static,
    {
        let mut slot = self
            .inner
            .on_error
            .lock()
            .expect("error handler lock poisoned");
        if slot.is_some() {
            return Err(RelayError::HandlerAlreadySet { handler: "error" });
        }
        *slot = Some(Box::new(handler));
        Ok(self)
    }

    /// Terminal operation delivering every data item to `consumer`.
    ///
    /// Control events are routed to the registered close/error handlers.
    ///
    /// # Errors
    ///
    /// Fails when the stream is already being consumed or the source already
    /// has another consumer attached.
    pub fn for_each<F>(&self, mut consumer: F) -> Result<JoinHandle<()>, RelayError>
    where
        F: FnMut(T) + Send + 'static,
    {
        self.for_each_event(move |event| {
            if let StreamEvent::Data(item) = event {
                consumer(item);
            }
            Ok(())
        })
    }

    /// Terminal operation delivering every event to `consumer`.
    ///
    /// Returning an `Err` from the consumer fails the stream as a pipeline
    /// error: the error event is delivered back to the consumer once, the
    /// error handler fires, then the close handler fires.
    ///
    /// # Errors
    ///
    /// Fails when the stream is already being consumed or the source already
    /// has another consumer attached.
    pub fn for_each_event<F>(&self, consumer: F) -> Result<JoinHandle<()>, RelayError>
    where
        F: FnMut(StreamEvent<T>) -> Result<(), StreamError> + Send + 'static,
    {
        if self.inner.started.swap(true, Ordering::AcqRel) {
            return Err(RelayError::AlreadyConnected);
        }
        if let Err(error) = self.inner.source.open(
            Arc::clone(&self.inner.queue),
            Arc::clone(&self.inner.queue_policy),
        ) {
            self.inner.started.store(false, Ordering::Release);
            return Err(error);
        }
        let inner = Arc::clone(&self.inner);
        Ok(tokio::spawn(pump(inner, consumer)))
    }

    /// Closes the stream.
    ///
    /// The close signal is delivered in arrival order after any buffered
    /// events. Idempotent.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.queue.push_control(StreamEvent::Close);
    }

    /// The source this stream consumes.
    #[must_use]
    pub fn source(&self) -> &EventSource<T> {
        &self.inner.source
    }

    /// Occupancy snapshot of the stream's buffer.
    #[must_use]
    pub fn snapshot(&self) -> super::BufferSnapshot {
        self.inner.queue.snapshot()
    }
}

async fn pump<T, F>(inner: Arc<FlowInner<T>>, mut consumer: F)
where
    T: Send + 'static,
    F: FnMut(StreamEvent<T>) -> Result<(), StreamError> + Send + 'static,
{
    loop {
        let Some(event) = inner.queue.pop_wait().await else {
            // Queue closed underneath the stream; treat as a close signal.
            let _ = consumer(StreamEvent::Close);
            inner.fire_close();
            break;
        };
        match event {
            StreamEvent::Data(item) => {
                if let Err(error) = consumer(StreamEvent::Data(item)) {
                    debug!(error = %error, "event consumer raised an error, failing the stream");
                    let _ = consumer(StreamEvent::Error(error.clone()));
                    inner.fire_error(error);
                    let _ = consumer(StreamEvent::Close);
                    inner.fire_close();
                    break;
                }
                if let Some(pushback) = &inner.pushback {
                    let pause = pushback.pushback(&inner.queue.snapshot());
                    if !pause.is_zero() {
                        tokio::time::sleep(pause).await;
                    }
                }
            }
            StreamEvent::Error(error) => {
                let _ = consumer(StreamEvent::Error(error.clone()));
                inner.fire_error(error);
                let _ = consumer(StreamEvent::Close);
                inner.fire_close();
                break;
            }
            StreamEvent::Close => {
                let _ = consumer(StreamEvent::Close);
                inner.fire_close();
                break;
            }
        }
    }
    inner.closed.store(true, Ordering::Release);
    inner.queue.close();
    inner.source.mark_disconnected();
}

impl<T> fmt::Debug for FlowStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowStream")
            .field("queue", &self.inner.queue)
            .field("started", &self.inner.started.load(Ordering::Relaxed))
            .field("closed", &self.inner.closed.load(Ordering::Relaxed))
            .finish()
    }
}

/// Builder assembling a [`FlowStream`] from a source.
///
/// # Example
///
/// ```rust,no_run
/// use flowbridge::config::StreamConfig;
/// use flowbridge::stream::{EventSource, StreamBuilder};
///
/// # fn example() -> Result<(), flowbridge::policy::PolicyError> {
/// let config = StreamConfig {
///     buffer_size: Some(256),
///     queue_policy: Some("GRADUAL_BREAKING_POLICY_60_256_5".to_string()),
///     ..StreamConfig::default()
/// };
/// let source = EventSource::<String>::new();
/// let stream = StreamBuilder::new(source).config(&config)?.build();
/// # let _ = stream;
/// # Ok(())
/// # }
/// ```
pub struct StreamBuilder<T> {
    source: EventSource<T>,
    buffer_size: usize,
    queue_policy: Option<Arc<dyn QueuePolicy<T>>>,
    pushback: Option<Arc<dyn PushbackPolicy>>,
}

impl<T: Send + 'static> StreamBuilder<T> {
    /// Starts a builder for a stream consuming `source`.
    #[must_use]
    pub fn new(source: EventSource<T>) -> Self {
        Self {
            source,
            buffer_size: DEFAULT_BUFFER_SIZE,
            queue_policy: None,
            pushback: None,
        }
    }

    /// Sets the buffer capacity.
    #[must_use]
    pub fn buffer_size(mut self, capacity: usize) -> Self {
        self.buffer_size = capacity;
        self
    }

    /// Installs the admission policy applied on publish.
    #[must_use]
    pub fn queue_policy(mut self, policy: Arc<dyn QueuePolicy<T>>) -> Self {
        self.queue_policy = Some(policy);
        self
    }

    /// Installs the pushback policy applied between deliveries.
    #[must_use]
    pub fn pushback_policy(mut self, policy: Arc<dyn PushbackPolicy>) -> Self {
        self.pushback = Some(policy);
        self
    }

    /// Applies a [`StreamConfig`], resolving policy names through the
    /// registry.
    ///
    /// # Errors
    ///
    /// Surfaces configuration errors (unknown policy name, malformed
    /// parameter, missing paired wait time) synchronously.
    pub fn config(mut self, config: &StreamConfig) -> Result<Self, PolicyError> {
        if let Some(capacity) = config.buffer_size {
            self.buffer_size = capacity;
        }
        if let Some(policy) = config.resolve_queue_policy::<T>()? {
            self.queue_policy = Some(policy);
        }
        if let Some(policy) = config.resolve_pushback_policy()? {
            self.pushback = Some(policy);
        }
        Ok(self)
    }

    /// Builds the stream.
    ///
    /// Without an explicit queue policy, plain bounded blocking admission is
    /// used.
    #[must_use]
    pub fn build(self) -> FlowStream<T> {
        let queue_policy = self
            .queue_policy
            .unwrap_or_else(|| Arc::new(BlockingQueuePolicy::new()));
        FlowStream {
            inner: Arc::new(FlowInner {
                source: self.source,
                queue: Arc::new(EventQueue::new(self.buffer_size)),
                queue_policy,
                pushback: self.pushback,
                on_close: Mutex::new(None),
                on_error: Mutex::new(None),
                started: AtomicBool::new(false),
                closed: AtomicBool::new(false),
            }),
        }
    }
}

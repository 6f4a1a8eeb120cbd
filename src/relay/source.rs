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

//! Client side of a stream relay.

use super::callback::HandlerSlot;
use super::error::RelayError;
use super::stream::RelayStream;
use crate::config::StreamConfig;
use crate::error::FlowbridgeError;
use crate::stream::{EventSource, StreamError};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tracing::error;

type ConnectFn = Box<dyn FnOnce() + Send>;
type CloseFn = Box<dyn FnOnce() + Send>;
type ErrorFn = Box<dyn FnOnce(StreamError) + Send>;

pub(crate) struct RelaySourceInner<T> {
    source: EventSource<T>,
    connect: HandlerSlot<ConnectFn>,
    close: HandlerSlot<CloseFn>,
    error: HandlerSlot<ErrorFn>,
    /// Armed by [`RelaySource::inject_error`]; consumed by the next error
    /// event arriving from the stream, suppressing the local handler once.
    pending_error: Mutex<Option<StreamError>>,
    /// Armed by external close or error injection; consumed by the next
    /// close event arriving from the stream.
    pending_close: AtomicBool,
}

impl<T> RelaySourceInner<T> {
    /// Close arrived from the stream pipeline.
    ///
    /// Consumes the suppression flag when the close was externally injected;
    /// otherwise the registered close handler fires, once.
    pub(crate) fn handle_close(&self) {
        if self.pending_close.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(handler) = self.close.take() {
            handler();
        }
    }

    /// Error arrived from the stream pipeline.
    ///
    /// Consumes the suppression flag when the error was externally injected;
    /// otherwise the registered error handler fires, once.
    pub(crate) fn handle_error(&self, error: StreamError) {
        if self
            .pending_error
            .lock()
            .expect("pending error lock poisoned")
            .take()
            .is_some()
        {
            return;
        }
        if let Some(handler) = self.error.take() {
            handler(error);
        }
    }

    fn handle_connect(&self) {
        if let Some(handler) = self.connect.take() {
            handler();
        }
    }
}

/// The client endpoint of a relay: a freshly owned event source that mirrors
/// a remote ("servant") stream.
///
/// A `RelaySource` owns an [`EventSource`] and distinguishes, per signal
/// kind, whether a terminal event originated *inside* the stream built from
/// it (the registered handler fires, once) or was *injected externally* via
/// [`inject_close`] / [`inject_error`] (the would-be duplicate handler
/// invocation is suppressed exactly once). This suppression is what keeps a
/// pair of bridged endpoints from echoing close and error signals back and
/// forth forever.
///
/// Handlers are registered once per signal kind; the registration methods
/// chain:
///
/// ```rust,no_run
/// # fn example(consumer: flowbridge::relay::RelayConsumer<String>)
/// #     -> Result<(), flowbridge::relay::RelayError> {
/// let source = flowbridge::relay::RelaySource::<String>::new();
/// source
///     .on_connect({
///         let consumer = consumer.clone();
///         move || { let _ = consumer.connect(); }
///     })?
///     .on_close({
///         let consumer = consumer.clone();
///         move || consumer.inject_close()
///     })?;
/// # Ok(())
/// # }
/// ```
///
/// [`inject_close`]: RelaySource::inject_close
/// [`inject_error`]: RelaySource::inject_error
pub struct RelaySource<T> {
    inner: Arc<RelaySourceInner<T>>,
}

impl<T> Clone for RelaySource<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + 'static> Default for RelaySource<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> RelaySource<T> {
    /// Creates a relay source over a fresh [`EventSource`].
    #[must_use]
    pub fn new() -> Self {
        Self::from_source(EventSource::new())
            .expect("a fresh event source cannot have a connect watcher")
    }

    /// Creates a relay source over an existing event source.
    ///
    /// # Errors
    ///
    /// Fails when the source already has a connect watcher registered.
    pub fn from_source(source: EventSource<T>) -> Result<Self, RelayError> {
        let inner = Arc::new(RelaySourceInner {
            source,
            connect: HandlerSlot::new(),
            close: HandlerSlot::new(),
            error: HandlerSlot::new(),
            pending_error: Mutex::new(None),
            pending_close: AtomicBool::new(false),
        });
        let watcher: Weak<RelaySourceInner<T>> = Arc::downgrade(&inner);
        inner.source.on_connect(move || {
            if let Some(inner) = watcher.upgrade() {
                inner.handle_connect();
            }
        })?;
        Ok(Self { inner })
    }

    /// Registers the handler invoked once when a consumer attaches to the
    /// source (a terminal operation starts on the client stream).
    ///
    /// # Errors
    ///
    /// Fails with [`RelayError::HandlerAlreadySet`] on a second
    /// registration.
    pub fn on_connect<F>(&self, handler: F) -> Result<&Self, RelayError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.connect.set(Box::new(handler), "connect")?;
        Ok(self)
    }

    /// Registers the handler invoked once when the client stream closes
    /// from the inside (not via [`inject_close`]).
    ///
    /// # Errors
    ///
    /// Fails with [`RelayError::HandlerAlreadySet`] on a second
    /// registration.
    ///
    /// [`inject_close`]: RelaySource::inject_close
    pub fn on_close<F>(&self, handler: F) -> Result<&Self, RelayError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.close.set(Box::new(handler), "close")?;
        Ok(self)
    }

    /// Registers the handler invoked once when the client stream errors
    /// from the inside (not via [`inject_error`]).
    ///
    /// # Errors
    ///
    /// Fails with [`RelayError::HandlerAlreadySet`] on a second
    /// registration.
    ///
    /// [`inject_error`]: RelaySource::inject_error
    pub fn on_error<F>(&self, handler: F) -> Result<&Self, RelayError>
    where
        F: FnOnce(StreamError) + Send + 'static,
    {
        self.inner.error.set(Box::new(handler), "error")?;
        Ok(self)
    }

    /// Injects an external error into the source.
    ///
    /// The error propagates through the client stream naturally, ending in a
    /// close; both the resulting error and close events are recognized as
    /// expected and the local handlers are not invoked for them. Idempotent:
    /// calls after the first are no-ops.
    pub fn inject_error(&self, error: StreamError) {
        {
            let mut pending = self
                .inner
                .pending_error
                .lock()
                .expect("pending error lock poisoned");
            if pending.is_some() {
                return;
            }
            *pending = Some(error.clone());
        }
        self.inner.pending_close.store(true, Ordering::Release);
        self.inner.source.fail(error);
    }

    /// Injects an external close into the source.
    ///
    /// The close propagates through the client stream; the resulting close
    /// event is recognized as expected and the local close handler is not
    /// invoked for it. Idempotent: calls after the first are no-ops.
    pub fn inject_close(&self) {
        if self
            .inner
            .pending_close
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.inner.source.complete();
        }
    }

    /// Publishes externally received data into the source.
    ///
    /// Publishing while the source is not connected indicates data loss and
    /// is surfaced as an error log; the item is dropped and `false` is
    /// returned.
    pub async fn inject_publish(&self, item: T) -> bool {
        if !self.inner.source.is_connected() {
            error!("the underlying event source is not connected, relayed data is lost");
            return false;
        }
        self.inner.source.publish(item).await
    }

    /// The wrapped event source.
    #[must_use]
    pub fn source(&self) -> &EventSource<T> {
        &self.inner.source
    }

    /// Builds the client stream over this source.
    ///
    /// The returned [`RelayStream`] feeds internal close and error events
    /// back into this relay source, where the suppression flags decide
    /// whether the registered handlers fire.
    ///
    /// # Errors
    ///
    /// Surfaces configuration errors from `config` synchronously.
    pub fn create_stream(
        &self,
        config: Option<&StreamConfig>,
    ) -> Result<RelayStream<T>, FlowbridgeError> {
        let close_side: Weak<RelaySourceInner<T>> = Arc::downgrade(&self.inner);
        let error_side: Weak<RelaySourceInner<T>> = Arc::downgrade(&self.inner);
        RelayStream::build(
            self.inner.source.clone(),
            config,
            Box::new(move || {
                if let Some(inner) = close_side.upgrade() {
                    inner.handle_close();
                }
            }),
            Box::new(move |error| {
                if let Some(inner) = error_side.upgrade() {
                    inner.handle_error(error);
                }
            }),
        )
    }
}

impl<T> fmt::Debug for RelaySource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelaySource")
            .field("source", &self.inner.source)
            .field(
                "pending_close",
                &self.inner.pending_close.load(Ordering::Relaxed),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_handler_registration_is_set_once() {
        let source = RelaySource::<i32>::new();
        source.on_close(|| ()).unwrap();
        assert_eq!(
            source.on_close(|| ()).unwrap_err(),
            RelayError::HandlerAlreadySet { handler: "close" }
        );
        source.on_error(|_| ()).unwrap();
        assert!(source.on_error(|_| ()).is_err());
        source.on_connect(|| ()).unwrap();
        assert!(source.on_connect(|| ()).is_err());
    }

    #[test]
    fn test_internal_close_fires_handler_once() {
        let source = RelaySource::<i32>::new();
        let closes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&closes);
        source
            .on_close(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        source.inner.handle_close();
        source.inner.handle_close();
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_external_close_suppresses_handler() {
        let source = RelaySource::<i32>::new();
        let closes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&closes);
        source
            .on_close(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        source.inject_close();
        // The close event coming back from the stream consumes the flag.
        source.inner.handle_close();
        assert_eq!(closes.load(Ordering::SeqCst), 0);

        // A later internal close is a genuine one again.
        source.inner.handle_close();
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_external_error_suppresses_error_and_close() {
        let source = RelaySource::<i32>::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let error_counter = Arc::clone(&fired);
        let close_counter = Arc::clone(&fired);
        source
            .on_error(move |_| {
                error_counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        source
            .on_close(move || {
                close_counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        let boom = StreamError::message("boom");
        source.inject_error(boom.clone());
        source.inject_error(boom.clone());

        source.inner.handle_error(boom);
        source.inner.handle_close();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_publish_disconnected_reports_loss() {
        let source = RelaySource::<i32>::new();
        assert!(!source.inject_publish(1).await);
    }
}

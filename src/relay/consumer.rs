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

//! Servant side of a stream relay.

use super::callback::HandlerSlot;
use super::error::RelayError;
use crate::stream::{FlowStream, StreamError, StreamEvent};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

type CloseFn = Box<dyn FnOnce() + Send>;
type ErrorFn = Box<dyn FnOnce(StreamError) + Send>;
type AcceptFn<T> = Box<dyn FnMut(T) + Send>;

struct ConsumerInner<T> {
    stream: FlowStream<T>,
    close: HandlerSlot<CloseFn>,
    error: HandlerSlot<ErrorFn>,
    accept: HandlerSlot<AcceptFn<T>>,
    /// Armed by [`RelayConsumer::inject_error`]; raised into the stream on
    /// the next data event and consumed by the resulting error event.
    pending_error: Mutex<Option<StreamError>>,
    /// Armed by [`RelayConsumer::inject_close`]; consumed by the resulting
    /// close event.
    pending_close: AtomicBool,
    connected: AtomicBool,
}

impl<T> ConsumerInner<T> {
    fn handle_close(&self) {
        if self.pending_close.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(handler) = self.close.take() {
            handler();
        }
    }

    fn handle_error(&self, error: StreamError) {
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

    fn handle_accept(&self, item: T) {
        // No registered handler means no interest; the event is dropped.
        let mut item = Some(item);
        self.accept.with_mut(|handler| {
            if let Some(item) = item.take() {
                handler(item);
            }
        });
    }
}

/// The servant endpoint of a relay: attaches to a caller-owned stream and
/// forwards its events to registered callbacks.
///
/// In the other direction, external commands — [`inject_close`] and
/// [`inject_error`] — are delegated into the wrapped stream, and the
/// terminal events they cause are recognized as expected: the registered
/// close/error handlers are suppressed exactly once, which prevents a
/// bridged endpoint pair from echoing signals back and forth.
///
/// Consumption starts with [`connect`], exactly once. Afterwards every
/// accepted data event reaches the accept handler, a genuine internal close
/// fires the close handler once, and a genuine pipeline error fires the
/// error handler once followed by the close handler.
///
/// [`connect`]: RelayConsumer::connect
/// [`inject_close`]: RelayConsumer::inject_close
/// [`inject_error`]: RelayConsumer::inject_error
pub struct RelayConsumer<T> {
    inner: Arc<ConsumerInner<T>>,
}

impl<T> Clone for RelayConsumer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + 'static> RelayConsumer<T> {
    /// Wraps a caller-owned stream.
    ///
    /// The stream must not have a terminal operation running yet; the
    /// consumer installs its own on [`connect`].
    ///
    /// [`connect`]: RelayConsumer::connect
    #[must_use]
    pub fn new(stream: FlowStream<T>) -> Self {
        Self {
            inner: Arc::new(ConsumerInner {
                stream,
                close: HandlerSlot::new(),
                error: HandlerSlot::new(),
                accept: HandlerSlot::new(),
                pending_error: Mutex::new(None),
                pending_close: AtomicBool::new(false),
                connected: AtomicBool::new(false),
            }),
        }
    }

    /// Registers the handler fired once on a genuine internal close.
    ///
    /// # Errors
    ///
    /// Fails with [`RelayError::HandlerAlreadySet`] on a second
    /// registration.
    pub fn on_close<F>(&self, handler: F) -> Result<&Self, RelayError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.close.set(Box::new(handler), "close")?;
        Ok(self)
    }

    /// Registers the handler fired once on a genuine pipeline error.
    ///
    /// # Errors
    ///
    /// Fails with [`RelayError::HandlerAlreadySet`] on a second
    /// registration.
    pub fn on_error<F>(&self, handler: F) -> Result<&Self, RelayError>
    where
        F: FnOnce(StreamError) + Send + 'static,
    {
        self.inner.error.set(Box::new(handler), "error")?;
        Ok(self)
    }

    /// Registers the handler fired for every accepted data event.
    ///
    /// Without a registered handler, data events are silently dropped — no
    /// handler means no interest.
    ///
    /// # Errors
    ///
    /// Fails with [`RelayError::HandlerAlreadySet`] on a second
    /// registration.
    pub fn on_accept<F>(&self, handler: F) -> Result<&Self, RelayError>
    where
        F: FnMut(T) + Send + 'static,
    {
        self.inner.accept.set(Box::new(handler), "accept")?;
        Ok(self)
    }

    /// Starts consuming the wrapped stream.
    ///
    /// # Errors
    ///
    /// Fails with [`RelayError::AlreadyConnected`] on a second call, and
    /// propagates the stream's own connection errors.
    pub fn connect(&self) -> Result<(), RelayError> {
        if self.inner.connected.swap(true, Ordering::AcqRel) {
            return Err(RelayError::AlreadyConnected);
        }
        let inner = Arc::clone(&self.inner);
        let result = self.inner.stream.for_each_event(move |event| {
            if !inner.connected.load(Ordering::Acquire) {
                return Ok(());
            }
            match event {
                StreamEvent::Data(item) => {
                    // An externally injected error is raised into the
                    // pipeline before the next item is handled. The cell is
                    // not consumed here: the resulting error event consumes
                    // it, suppressing the local handler exactly once.
                    let pending = inner
                        .pending_error
                        .lock()
                        .expect("pending error lock poisoned")
                        .clone();
                    if let Some(error) = pending {
                        return Err(error);
                    }
                    inner.handle_accept(item);
                }
                StreamEvent::Error(error) => inner.handle_error(error),
                StreamEvent::Close => inner.handle_close(),
            }
            Ok(())
        });
        match result {
            Ok(_handle) => Ok(()),
            Err(error) => {
                self.inner.connected.store(false, Ordering::Release);
                Err(error)
            }
        }
    }

    /// Injects an external error to be raised inside the wrapped stream.
    ///
    /// Takes effect on the next data event after [`connect`]; the stream
    /// fails with the injected error and the consumer's own error handler is
    /// suppressed for it, exactly once.
    ///
    /// # Errors
    ///
    /// Fails with [`RelayError::ErrorAlreadyPending`] when a previously
    /// injected error has not been consumed yet.
    ///
    /// [`connect`]: RelayConsumer::connect
    pub fn inject_error(&self, error: StreamError) -> Result<(), RelayError> {
        let mut pending = self
            .inner
            .pending_error
            .lock()
            .expect("pending error lock poisoned");
        if pending.is_some() {
            return Err(RelayError::ErrorAlreadyPending);
        }
        *pending = Some(error);
        Ok(())
    }

    /// Injects an external close, closing the wrapped stream.
    ///
    /// The consumer's own close handler is suppressed for the resulting
    /// close event. Idempotent: calls after the first are no-ops.
    pub fn inject_close(&self) {
        if self
            .inner
            .pending_close
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
            && self.inner.connected.load(Ordering::Acquire)
        {
            self.inner.stream.close();
        }
    }

    /// Tears the consumer down.
    ///
    /// Clears every handler slot and suppression flag, disconnects, and
    /// closes the wrapped stream. The consumer is inert afterwards and
    /// cannot be reconnected.
    pub fn detach(&self) {
        self.inner.connected.store(false, Ordering::Release);
        self.inner.close.clear();
        self.inner.error.clear();
        self.inner.accept.clear();
        self.inner
            .pending_error
            .lock()
            .expect("pending error lock poisoned")
            .take();
        self.inner.pending_close.store(false, Ordering::Release);
        self.inner.stream.close();
    }

    /// The wrapped stream.
    #[must_use]
    pub fn stream(&self) -> &FlowStream<T> {
        &self.inner.stream
    }
}

impl<T> fmt::Debug for RelayConsumer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConsumer")
            .field("connected", &self.inner.connected.load(Ordering::Relaxed))
            .field(
                "pending_close",
                &self.inner.pending_close.load(Ordering::Relaxed),
            )
            .finish()
    }
}

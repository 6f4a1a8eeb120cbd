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

//! Relay-aware stream decorator.

use super::callback::{ChainedCloseCallback, ChainedErrorCallback, CloseFn, ErrorFn};
use super::error::RelayError;
use crate::config::StreamConfig;
use crate::error::FlowbridgeError;
use crate::stream::{EventSource, FlowStream, StreamBuilder, StreamError, StreamEvent};
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// A stream decorator that feeds terminal events to the relay *and* to the
/// user.
///
/// The wrapped [`FlowStream`] holds a single handler per terminal signal, so
/// the relay installs chained callbacks: the relay's handler fires first
/// (driving the suppression bookkeeping on the owning
/// [`RelaySource`](super::RelaySource)), then the user's handler — each at
/// most once. Only the close/error surface is decorated; everything else is
/// reachable through [`inner`].
///
/// [`inner`]: RelayStream::inner
pub struct RelayStream<T> {
    inner: FlowStream<T>,
    close_chain: Arc<ChainedCloseCallback>,
    error_chain: Arc<ChainedErrorCallback>,
}

impl<T: Send + 'static> RelayStream<T> {
    /// Builds the decorated stream over `source` and installs the relay
    /// sides of the terminal chains.
    pub(crate) fn build(
        source: EventSource<T>,
        config: Option<&StreamConfig>,
        relay_close: CloseFn,
        relay_error: ErrorFn,
    ) -> Result<Self, FlowbridgeError> {
        let mut builder = StreamBuilder::new(source);
        if let Some(config) = config {
            builder = builder.config(config)?;
        }
        let inner = builder.build();

        let close_chain = Arc::new(ChainedCloseCallback::with_relay(relay_close));
        let error_chain = Arc::new(ChainedErrorCallback::with_relay(relay_error));
        {
            let chain = Arc::clone(&close_chain);
            inner.on_close(move || chain.fire())?;
        }
        {
            let chain = Arc::clone(&error_chain);
            inner.on_error(move |error| chain.fire(error))?;
        }
        Ok(Self {
            inner,
            close_chain,
            error_chain,
        })
    }

    /// Registers the user close handler.
    ///
    /// Fires once when the stream closes, after the relay's own close
    /// bookkeeping.
    ///
    /// # Errors
    ///
    /// Fails with [`RelayError::HandlerAlreadySet`] on a second
    /// registration.
    pub fn on_close<F>(&self, handler: F) -> Result<&Self, RelayError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.close_chain.set_user(Box::new(handler))?;
        Ok(self)
    }

    /// Registers the user error handler.
    ///
    /// Fires at most once when the stream errors, after the relay's own
    /// error bookkeeping.
    ///
    /// # Errors
    ///
    /// Fails with [`RelayError::HandlerAlreadySet`] on a second
    /// registration.
    pub fn on_error<F>(&self, handler: F) -> Result<&Self, RelayError>
    where
        F: FnOnce(StreamError) + Send + 'static,
    {
        self.error_chain.set_user(Box::new(handler))?;
        Ok(self)
    }

    /// Terminal operation delivering every data item to `consumer`.
    ///
    /// Starting consumption attaches the stream to its relay source, which
    /// fires the source's connect handler.
    ///
    /// # Errors
    ///
    /// Fails when the stream is already being consumed.
    pub fn for_each<F>(&self, consumer: F) -> Result<JoinHandle<()>, RelayError>
    where
        F: FnMut(T) + Send + 'static,
    {
        self.inner.for_each(consumer)
    }

    /// Terminal operation delivering every event to `consumer`.
    ///
    /// # Errors
    ///
    /// Fails when the stream is already being consumed.
    pub fn for_each_event<F>(&self, consumer: F) -> Result<JoinHandle<()>, RelayError>
    where
        F: FnMut(StreamEvent<T>) -> Result<(), StreamError> + Send + 'static,
    {
        self.inner.for_each_event(consumer)
    }

    /// Closes the stream.
    pub fn close(&self) {
        self.inner.close();
    }

    /// The undecorated stream, for everything beyond the close/error
    /// surface.
    #[must_use]
    pub fn inner(&self) -> &FlowStream<T> {
        &self.inner
    }
}

impl<T> fmt::Debug for RelayStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayStream")
            .field("inner", &self.inner)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    fn relay_stream(
        order: Arc<Mutex<Vec<&'static str>>>,
    ) -> (EventSource<i32>, RelayStream<i32>) {
        let source = EventSource::new();
        let relay_order = Arc::clone(&order);
        let relay_errors = Arc::clone(&order);
        let stream = RelayStream::build(
            source.clone(),
            None,
            Box::new(move || relay_order.lock().unwrap().push("relay close")),
            Box::new(move |_| relay_errors.lock().unwrap().push("relay error")),
        )
        .unwrap();
        (source, stream)
    }

    #[tokio::test]
    async fn test_relay_side_fires_before_user_side() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let (source, stream) = relay_stream(Arc::clone(&order));
        let user_order = Arc::clone(&order);
        stream
            .on_close(move || user_order.lock().unwrap().push("user close"))
            .unwrap();
        let handle = stream.for_each(|_| ()).unwrap();

        source.complete();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["relay close", "user close"]);
    }

    #[tokio::test]
    async fn test_error_chain_then_close_chain() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let (source, stream) = relay_stream(Arc::clone(&order));
        let user_errors = Arc::clone(&order);
        let user_closes = Arc::clone(&order);
        stream
            .on_error(move |_| user_errors.lock().unwrap().push("user error"))
            .unwrap();
        stream
            .on_close(move || user_closes.lock().unwrap().push("user close"))
            .unwrap();
        let handle = stream.for_each(|_| ()).unwrap();

        source.fail(StreamError::message("boom"));
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            *order.lock().unwrap(),
            vec!["relay error", "user error", "relay close", "user close"]
        );
    }

    #[tokio::test]
    async fn test_user_registration_is_set_once() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let (_source, stream) = relay_stream(order);
        stream.on_close(|| ()).unwrap();
        assert_eq!(
            stream.on_close(|| ()).unwrap_err(),
            RelayError::HandlerAlreadySet { handler: "close" }
        );
        stream.on_error(|_| ()).unwrap();
        assert!(stream.on_error(|_| ()).is_err());
    }

    #[tokio::test]
    async fn test_data_flows_through_decorator() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let (source, stream) = relay_stream(order);
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let _handle = stream
            .for_each(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        for i in 0..3 {
            source.publish(i).await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        stream.close();
    }
}

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

//! Push-event stream substrate.
//!
//! This module provides the minimal push-style event machinery the rest of
//! the crate builds on: a bounded [`EventQueue`] that admission and pushback
//! policies observe, a single-connection [`EventSource`] that producers
//! publish into, and a [`FlowStream`] consumption side with set-once
//! close/error handlers and terminal `for_each` operations.
//!
//! It is intentionally *not* a stream operator library — there is no
//! map/filter/window/fork here. Streams carry events from one producer to
//! one consumer, apply the configured policies in between, and deliver
//! terminal close/error signals exactly once.
//!
//! # Event Model
//!
//! Every stream carries [`StreamEvent`]s:
//!
//! - `Data(T)` — a payload item
//! - `Close` — graceful end of stream (terminal)
//! - `Error(StreamError)` — pipeline failure (terminal; followed by close)
//!
//! # Example
//!
//! ```rust,no_run
//! use flowbridge::stream::{EventSource, StreamBuilder};
//!
//! # async fn example() {
//! let source = EventSource::<String>::new();
//! let stream = StreamBuilder::new(source.clone()).buffer_size(64).build();
//!
//! stream.on_close(|| println!("done")).unwrap();
//! let handle = stream.for_each(|item| println!("got {item}")).unwrap();
//!
//! source.publish("hello".to_string()).await;
//! source.complete();
//! handle.await.unwrap();
//! # }
//! ```

mod ack;
mod queue;
mod source;
#[allow(clippy::module_inception)]
mod stream;

pub use ack::AckEventSource;
pub use queue::{BufferSnapshot, EventQueue};
pub use source::EventSource;
pub use stream::{FlowStream, StreamBuilder, DEFAULT_BUFFER_SIZE};

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// An event flowing through a stream.
///
/// Data events carry the payload; `Close` and `Error` are terminal — after
/// either has been delivered the stream is inert.
pub enum StreamEvent<T> {
    /// A payload item.
    Data(T),
    /// Graceful end of stream.
    Close,
    /// Pipeline failure. An error is always followed by a close.
    Error(StreamError),
}

impl<T> StreamEvent<T> {
    /// Returns `true` for `Close` and `Error` events.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Close | Self::Error(_))
    }

    /// Returns `true` for `Data` events.
    #[must_use]
    pub const fn is_data(&self) -> bool {
        matches!(self, Self::Data(_))
    }
}

impl<T: fmt::Debug> fmt::Debug for StreamEvent<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data(d) => f.debug_tuple("Data").field(d).finish(),
            Self::Close => f.write_str("Close"),
            Self::Error(e) => f.debug_tuple("Error").field(e).finish(),
        }
    }
}

/// A cheaply cloneable stream failure.
///
/// Stream errors are shared between the pipeline, its handlers, and relay
/// peers, so the underlying error is reference counted. Two clones of the
/// same `StreamError` refer to the same underlying error.
#[derive(Clone)]
pub struct StreamError(Arc<dyn StdError + Send + Sync>);

impl StreamError {
    /// Wraps an arbitrary error.
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self(Arc::new(error))
    }

    /// Creates a stream error from a plain message.
    pub fn message(message: impl Into<String>) -> Self {
        Self(Arc::new(MessageError(message.into())))
    }

    /// Returns `true` if both handles refer to the same underlying error.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl StdError for StreamError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.0.as_ref())
    }
}

#[derive(Debug)]
struct MessageError(String);

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for MessageError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_is_terminal() {
        assert!(!StreamEvent::Data(1).is_terminal());
        assert!(StreamEvent::<i32>::Close.is_terminal());
        assert!(StreamEvent::<i32>::Error(StreamError::message("boom")).is_terminal());
    }

    #[test]
    fn test_stream_error_identity() {
        let a = StreamError::message("boom");
        let b = a.clone();
        let c = StreamError::message("boom");
        assert!(a.same_as(&b));
        assert!(!a.same_as(&c));
        assert_eq!(a.to_string(), "boom");
    }
}

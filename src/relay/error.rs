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

//! Error types for the relay layer.

use std::fmt;

/// Illegal-state errors raised by relay and stream objects.
///
/// These indicate programmer misuse — a contract violated at the call site,
/// not a runtime condition to recover from. They surface immediately and
/// synchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayError {
    /// A handler for this signal kind has already been registered on this
    /// object.
    ///
    /// Every signal kind (`connect`, `close`, `error`, `accept`) holds at
    /// most one handler per side.
    HandlerAlreadySet {
        /// The signal kind whose slot was already occupied.
        handler: &'static str,
    },

    /// The consumer is already connected to its stream, or the stream is
    /// already being consumed by a terminal operation.
    AlreadyConnected,

    /// The event source already has a consumer attached.
    AlreadyOpen,

    /// An externally injected error is still pending on this consumer.
    ///
    /// A second injection before the first has been consumed by the stream
    /// is a programming error.
    ErrorAlreadyPending,
}

impl RelayError {
    /// Returns `true` for a duplicate handler registration.
    #[must_use]
    pub const fn is_handler_conflict(&self) -> bool {
        matches!(self, Self::HandlerAlreadySet { .. })
    }

    /// Returns `true` for a duplicate connect or open.
    #[must_use]
    pub const fn is_connection_conflict(&self) -> bool {
        matches!(self, Self::AlreadyConnected | Self::AlreadyOpen)
    }
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HandlerAlreadySet { handler } => {
                write!(f, "A {} handler has already been set", handler)
            }
            Self::AlreadyConnected => {
                write!(f, "The consumer is already connected to the stream")
            }
            Self::AlreadyOpen => {
                write!(f, "The event source already has a consumer attached")
            }
            Self::ErrorAlreadyPending => {
                write!(f, "An external error has already been injected")
            }
        }
    }
}

impl std::error::Error for RelayError {}

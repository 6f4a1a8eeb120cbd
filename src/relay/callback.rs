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

//! Set-once handler slots and chained terminal callbacks.

use super::error::RelayError;
use crate::stream::StreamError;
use std::fmt;
use std::sync::Mutex;

/// A handler cell that is set at most once and read destructively.
///
/// The second `set` for the same slot fails fast — one handler per signal
/// kind per object. `take` consumes the handler, which is what makes every
/// single-fire guarantee in the relay hold by construction.
pub(crate) struct HandlerSlot<F> {
    cell: Mutex<Option<F>>,
}

impl<F> HandlerSlot<F> {
    pub(crate) fn new() -> Self {
        Self {
            cell: Mutex::new(None),
        }
    }

    /// Stores the handler, failing when the slot is occupied.
    pub(crate) fn set(&self, handler: F, kind: &'static str) -> Result<(), RelayError> {
        let mut cell = self.cell.lock().expect("handler slot lock poisoned");
        if cell.is_some() {
            return Err(RelayError::HandlerAlreadySet { handler: kind });
        }
        *cell = Some(handler);
        Ok(())
    }

    /// Removes and returns the handler, if set.
    pub(crate) fn take(&self) -> Option<F> {
        self.cell.lock().expect("handler slot lock poisoned").take()
    }

    /// Runs `op` on the stored handler without consuming it.
    pub(crate) fn with_mut(&self, op: impl FnOnce(&mut F)) {
        let mut cell = self.cell.lock().expect("handler slot lock poisoned");
        if let Some(handler) = cell.as_mut() {
            op(handler);
        }
    }

    /// Clears the slot without running the handler.
    pub(crate) fn clear(&self) {
        self.cell.lock().expect("handler slot lock poisoned").take();
    }
}

impl<F> Default for HandlerSlot<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F> fmt::Debug for HandlerSlot<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let set = self
            .cell
            .lock()
            .expect("handler slot lock poisoned")
            .is_some();
        f.debug_struct("HandlerSlot").field("set", &set).finish()
    }
}

pub(crate) type CloseFn = Box<dyn FnOnce() + Send>;
pub(crate) type ErrorFn = Box<dyn FnOnce(StreamError) + Send>;

/// Close callback that chains the relay's handler with the user's.
///
/// The relay side fires first, then the user side; each side fires at most
/// once ever.
#[derive(Debug)]
pub(crate) struct ChainedCloseCallback {
    relay: HandlerSlot<CloseFn>,
    user: HandlerSlot<CloseFn>,
}

impl ChainedCloseCallback {
    /// Creates a chain with the relay side pre-installed.
    pub(crate) fn with_relay(relay: CloseFn) -> Self {
        let chain = Self {
            relay: HandlerSlot::new(),
            user: HandlerSlot::new(),
        };
        // The slot is freshly created; this first set cannot conflict.
        let _ = chain.relay.set(relay, "relay close");
        chain
    }

    pub(crate) fn set_user(&self, handler: CloseFn) -> Result<(), RelayError> {
        self.user.set(handler, "close")
    }

    pub(crate) fn fire(&self) {
        if let Some(handler) = self.relay.take() {
            handler();
        }
        if let Some(handler) = self.user.take() {
            handler();
        }
    }
}

/// Error callback that chains the relay's handler with the user's.
#[derive(Debug)]
pub(crate) struct ChainedErrorCallback {
    relay: HandlerSlot<ErrorFn>,
    user: HandlerSlot<ErrorFn>,
}

impl ChainedErrorCallback {
    /// Creates a chain with the relay side pre-installed.
    pub(crate) fn with_relay(relay: ErrorFn) -> Self {
        let chain = Self {
            relay: HandlerSlot::new(),
            user: HandlerSlot::new(),
        };
        let _ = chain.relay.set(relay, "relay error");
        chain
    }

    pub(crate) fn set_user(&self, handler: ErrorFn) -> Result<(), RelayError> {
        self.user.set(handler, "error")
    }

    pub(crate) fn fire(&self, error: StreamError) {
        if let Some(handler) = self.relay.take() {
            handler(error.clone());
        }
        if let Some(handler) = self.user.take() {
            handler(error);
        }
    }
}

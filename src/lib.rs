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

#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

//! # Architecture
//!
//! Flowbridge is organized into four layers:
//!
//! - **[`stream`]**: the push-event substrate — bounded event queue,
//!   single-connection event source, and the consuming stream with its
//!   set-once terminal handlers.
//! - **[`policy`]**: fill-grade admission and pushback policies, the
//!   built-in named options, and the configuration-name resolver.
//! - **[`config`]**: configuration-driven stream construction.
//! - **[`relay`]**: the distributed event relay bridging two stream
//!   endpoints with single-fire, cycle-safe terminal signal propagation.
//!
//! # Concurrency Model
//!
//! Streams run on Tokio. A queue policy wait suspends only the calling
//! producer task; pushback pauses are performed by the stream's own
//! delivery task. All per-policy runtime state lives in atomics, and every
//! single-fire handler slot is an atomic set-once cell — a second
//! registration for the same signal kind fails immediately with
//! [`RelayError::HandlerAlreadySet`](relay::RelayError::HandlerAlreadySet).

pub mod config;
pub mod error;
pub mod policy;
pub mod relay;
pub mod stream;

pub use config::StreamConfig;
pub use error::FlowbridgeError;
pub use policy::{
    FillGradePushbackPolicy, GradualBreakingQueuePolicy, PolicyError, PolicyStatus,
    PushbackPolicy, QueuePolicy,
};
pub use relay::{bridge, RelayConsumer, RelayError, RelaySource, RelayStream};
pub use stream::{EventSource, FlowStream, StreamBuilder, StreamError, StreamEvent};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

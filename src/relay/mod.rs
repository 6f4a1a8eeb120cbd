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

//! Distributed event relay.
//!
//! This module bridges two independently owned stream endpoints so that
//! data, close, and error signals flow in both directions exactly once,
//! without feedback loops.
//!
//! # Roles
//!
//! - [`RelayConsumer`] attaches to the **servant** stream — the original,
//!   caller-owned stream being relayed. It forwards accepted data and
//!   terminal events to registered callbacks, and accepts external
//!   close/error commands for the stream.
//! - [`RelaySource`] is the **client** side — a freshly owned event source
//!   the relay publishes into. The client stream is built from it with
//!   [`RelaySource::create_stream`].
//!
//! # Cycle Safety
//!
//! Each side keeps a suppression flag per terminal signal kind. An external
//! injection (a signal that *represents the other side*) arms the flag and
//! forwards the signal into the underlying stream; when the resulting
//! stream event comes back around, the flag is consumed — a single-use
//! compare-and-clear — and the local handler is *not* invoked. A signal
//! that originates locally finds no armed flag and fires the local handler,
//! exactly once. Close and error flags are independent; a flag that is
//! never consumed simply stays armed and never fires anything later.
//!
//! # Composition
//!
//! [`bridge`] performs the canonical six-way wiring between a consumer and
//! a source:
//!
//! ```rust,no_run
//! use flowbridge::relay::{bridge, RelayConsumer, RelaySource};
//! use flowbridge::stream::{EventSource, StreamBuilder};
//!
//! # async fn example() -> Result<(), flowbridge::FlowbridgeError> {
//! // The caller-owned servant stream.
//! let servant_source = EventSource::<String>::new();
//! let servant = StreamBuilder::new(servant_source.clone()).build();
//!
//! let consumer = RelayConsumer::new(servant);
//! let source = RelaySource::new();
//! bridge(&consumer, &source)?;
//!
//! // The client stream mirrors the servant: connecting it connects the
//! // servant, and every servant item arrives here.
//! let client = source.create_stream(None)?;
//! client.for_each(|item: String| println!("{item}"))?;
//! # Ok(())
//! # }
//! ```

mod callback;
mod consumer;
mod error;
mod source;
#[allow(clippy::module_inception)]
mod stream;


pub use consumer::RelayConsumer;
pub use error::RelayError;
pub use source::RelaySource;
pub use stream::RelayStream;

use tokio::sync::mpsc;
use tracing::warn;

/// Wires a servant-side consumer and a client-side source into a
/// bidirectional bridge.
///
/// Six registrations, mirroring each direction of the relay:
///
/// - client connect → servant connect;
/// - client internal error/close → servant external injection;
/// - servant accepted data → client external publish (through an ordered
///   forwarding task);
/// - servant internal error/close → client external injection.
///
/// The composition adds no extra handler firing: every terminal signal still
/// reaches each registered handler at most once.
///
/// Must be called from within a Tokio runtime — the data direction runs on a
/// spawned forwarding task so that ordered publishing never blocks the
/// servant's delivery cycle.
///
/// # Errors
///
/// Fails when any of the six handler slots is already occupied.
pub fn bridge<T: Send + 'static>(
    consumer: &RelayConsumer<T>,
    source: &RelaySource<T>,
) -> Result<(), RelayError> {
    // Client side connecting drives the servant side.
    let servant = consumer.clone();
    source.on_connect(move || {
        if let Err(error) = servant.connect() {
            warn!(%error, "servant consumer could not be connected");
        }
    })?;
    let servant = consumer.clone();
    source.on_error(move |error| {
        if let Err(error) = servant.inject_error(error) {
            warn!(%error, "client error could not be relayed to the servant");
        }
    })?;
    let servant = consumer.clone();
    source.on_close(move || servant.inject_close())?;

    // Servant data is forwarded to the client in arrival order.
    let (forward, mut forwarded) = mpsc::unbounded_channel();
    let client = source.clone();
    tokio::spawn(async move {
        while let Some(item) = forwarded.recv().await {
            client.inject_publish(item).await;
        }
    });
    consumer.on_accept(move |item| {
        let _ = forward.send(item);
    })?;

    let client = source.clone();
    consumer.on_error(move |error| client.inject_error(error))?;
    let client = source.clone();
    consumer.on_close(move || client.inject_close())?;
    Ok(())
}

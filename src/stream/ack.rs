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

//! Acknowledging event source decorator.

use super::source::EventSource;
use super::StreamError;
use std::fmt;
use std::sync::Arc;

type AckFilter<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;
type AckCallback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// An [`EventSource`] decorator that acknowledges published data.
///
/// An optional filter predicate decides per item whether it is accepted.
/// Accepted items are published to the wrapped source and reported to the
/// acknowledge callback; rejected items are not published and are reported
/// to the negative-acknowledge callback instead.
///
/// Terminal operations delegate to the wrapped source unchanged.
///
/// # Example
///
/// ```rust,no_run
/// use flowbridge::stream::{AckEventSource, EventSource};
///
/// # async fn example() {
/// let source = EventSource::<u32>::new();
/// let acked = AckEventSource::new(source)
///     .filter(|item| item % 2 == 0)
///     .acknowledge(|item| println!("accepted {item}"))
///     .negative_acknowledge(|item| println!("rejected {item}"));
///
/// acked.publish(2).await; // published + acknowledged
/// acked.publish(3).await; // rejected, nack only
/// # }
/// ```
pub struct AckEventSource<T> {
    source: EventSource<T>,
    filter: Option<AckFilter<T>>,
    ack: Option<AckCallback<T>>,
    nack: Option<AckCallback<T>>,
}

impl<T> AckEventSource<T> {
    /// Wraps a source without filter or callbacks.
    #[must_use]
    pub fn new(source: EventSource<T>) -> Self {
        Self {
            source,
            filter: None,
            ack: None,
            nack: None,
        }
    }

    /// Sets the acknowledge filter predicate.
    #[must_use]
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Sets the callback invoked after an item was published.
    #[must_use]
    pub fn acknowledge<F>(mut self, callback: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.ack = Some(Arc::new(callback));
        self
    }

    /// Sets the callback invoked for items rejected by the filter.
    #[must_use]
    pub fn negative_acknowledge<F>(mut self, callback: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.nack = Some(Arc::new(callback));
        self
    }

    /// The wrapped source.
    #[must_use]
    pub fn source(&self) -> &EventSource<T> {
        &self.source
    }
}

impl<T: Send + 'static> AckEventSource<T> {
    /// Publishes an item through the filter.
    ///
    /// The acknowledge callback runs once the item has been accepted by the
    /// filter, immediately before it enters the wrapped source. Returns
    /// `true` when the item passed the filter and was delivered.
    pub async fn publish(&self, item: T) -> bool {
        if let Some(filter) = &self.filter {
            if !filter(&item) {
                if let Some(nack) = &self.nack {
                    nack(&item);
                }
                return false;
            }
        }
        if let Some(ack) = &self.ack {
            ack(&item);
        }
        self.source.publish(item).await
    }

    /// Terminates the stream gracefully.
    pub fn complete(&self) {
        self.source.complete();
    }

    /// Terminates the stream with an error.
    pub fn fail(&self, error: StreamError) {
        self.source.fail(error);
    }
}

impl<T> fmt::Debug for AckEventSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AckEventSource")
            .field("source", &self.source)
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::BlockingQueuePolicy;
    use crate::stream::EventQueue;
    use std::sync::Mutex;

    fn attached() -> (AckEventSource<u32>, Arc<EventQueue<u32>>) {
        let source = EventSource::new();
        let queue = Arc::new(EventQueue::new(8));
        source
            .open(Arc::clone(&queue), Arc::new(BlockingQueuePolicy::new()))
            .unwrap();
        (AckEventSource::new(source), queue)
    }

    #[tokio::test]
    async fn test_publish_without_filter_acknowledges() {
        let (source, queue) = attached();
        let acked = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&acked);
        let source = source.acknowledge(move |item| sink.lock().unwrap().push(*item));

        assert!(source.publish(7).await);
        assert_eq!(*acked.lock().unwrap(), vec![7]);
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_filter_rejection_nacks_without_publishing() {
        let (source, queue) = attached();
        let acked = Arc::new(Mutex::new(Vec::new()));
        let nacked = Arc::new(Mutex::new(Vec::new()));
        let ack_sink = Arc::clone(&acked);
        let nack_sink = Arc::clone(&nacked);
        let source = source
            .filter(|item| item % 2 == 0)
            .acknowledge(move |item| ack_sink.lock().unwrap().push(*item))
            .negative_acknowledge(move |item| nack_sink.lock().unwrap().push(*item));

        assert!(source.publish(2).await);
        assert!(!source.publish(3).await);

        assert_eq!(*acked.lock().unwrap(), vec![2]);
        assert_eq!(*nacked.lock().unwrap(), vec![3]);
        assert_eq!(queue.len(), 1);
    }
}

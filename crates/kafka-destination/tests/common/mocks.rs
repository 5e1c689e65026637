// SPDX-License-Identifier: Apache-2.0

//! Mock broker client for exercising the destination without a broker.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use kafka_destination::{
    BrokerClient, DeliveryTracker, DestinationConfig, EnqueueError, OpenError, WireMessage,
};

/// Failure to inject into the next `enqueue` call.
#[derive(Debug, Clone, Copy)]
pub enum ScriptedFailure {
    QueueFull,
    Broker,
    Encoding,
}

#[derive(Default)]
pub struct MockBrokerState {
    pub produced: Mutex<Vec<WireMessage>>,
    pub flushes: Mutex<Vec<Duration>>,
    pub polls: AtomicUsize,
    pending: AtomicUsize,
    /// One-shot failure consumed by the next `enqueue`.
    fail_next: Mutex<Option<ScriptedFailure>>,
    /// When set, `flush` forces the pending count to this value.
    pending_after_flush: Mutex<Option<usize>>,
}

/// Records every call and lets tests script enqueue failures and flush
/// outcomes. Clones share state, so tests keep a handle to the instance
/// they install into the destination.
#[derive(Clone, Default)]
pub struct MockBroker {
    pub state: Arc<MockBrokerState>,
}

impl MockBroker {
    pub fn fail_next(&self, failure: ScriptedFailure) {
        *self.state.fail_next.lock().unwrap() = Some(failure);
    }

    pub fn set_pending_after_flush(&self, pending: usize) {
        *self.state.pending_after_flush.lock().unwrap() = Some(pending);
    }

    pub fn produced(&self) -> Vec<WireMessage> {
        self.state.produced.lock().unwrap().clone()
    }

    pub fn flushes(&self) -> Vec<Duration> {
        self.state.flushes.lock().unwrap().clone()
    }
}

impl BrokerClient for MockBroker {
    fn connect(
        _config: &DestinationConfig,
        _tracker: Arc<DeliveryTracker>,
    ) -> Result<Self, OpenError> {
        Ok(MockBroker::default())
    }

    fn enqueue(&self, message: &WireMessage) -> Result<(), EnqueueError> {
        if let Some(failure) = self.state.fail_next.lock().unwrap().take() {
            return Err(match failure {
                ScriptedFailure::QueueFull => EnqueueError::QueueFull,
                ScriptedFailure::Broker => EnqueueError::Broker("Fake exception.".to_string()),
                ScriptedFailure::Encoding => {
                    EnqueueError::Encoding("Fake encoding failure.".to_string())
                }
            });
        }
        self.state.produced.lock().unwrap().push(message.clone());
        self.state.pending.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn poll_events(&self) {
        self.state.polls.fetch_add(1, Ordering::SeqCst);
    }

    fn pending(&self) -> usize {
        self.state.pending.load(Ordering::SeqCst)
    }

    fn flush(&self, timeout: Duration) {
        self.state.flushes.lock().unwrap().push(timeout);
        if let Some(after) = *self.state.pending_after_flush.lock().unwrap() {
            self.state.pending.store(after, Ordering::SeqCst);
        }
    }
}

// SPDX-License-Identifier: Apache-2.0

//! The delivery engine: in-flight accounting, threshold flushing and
//! transient-error absorption in front of a [`BrokerClient`].
//!
//! The engine deliberately almost never signals hard failure upward. A
//! hard failure makes the host runtime tear down and reopen the whole
//! destination, which is far more disruptive than a bounded pause, so
//! transient broker conditions are logged and absorbed instead.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::broker::BrokerClient;
use crate::config::DestinationConfig;
use crate::errors::EnqueueError;

/// Bounded wait for a threshold flush.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

/// Generous drain bound used at shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Fixed pause after an absorbed enqueue error.
const ERROR_PAUSE: Duration = Duration::from_secs(5);

/// One wire-ready message: rendered body plus optional routing hints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireMessage {
    pub body: String,
    pub key: Option<String>,
    pub partition: Option<i32>,
}

/// Asynchronous delivery confirmation for a previously enqueued message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Success { payload: String },
    Failure { payload: String, reason: String },
}

/// Shared in-flight bookkeeping between the calling thread and the broker
/// client's delivery callback.
///
/// The ceiling check is advisory: the load and the increment are not one
/// atomic step, and the client keeps its own internal queue, so the count
/// may briefly overshoot under callback interleaving. That is accepted by
/// contract; the ceiling bounds memory, it does not gate correctness.
pub struct DeliveryTracker {
    in_flight: AtomicU64,
    verbose: bool,
}

impl DeliveryTracker {
    pub fn new(verbose: bool) -> Self {
        DeliveryTracker {
            in_flight: AtomicU64::new(0),
            verbose,
        }
    }

    /// Current number of unconfirmed messages.
    pub fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Reserves one in-flight slot; refuses at the ceiling.
    pub fn try_acquire(&self, ceiling: u64) -> bool {
        if self.in_flight.load(Ordering::Acquire) >= ceiling {
            return false;
        }
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        true
    }

    /// Returns a reservation that never reached the client's queue.
    pub fn release(&self) {
        let _ = self
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                Some(n.saturating_sub(1))
            });
    }

    /// Books one delivery confirmation and logs it.
    ///
    /// Failures always log at error severity; successes only in verbose
    /// mode, to bound log volume in production.
    pub fn record_outcome(&self, outcome: DeliveryOutcome) {
        self.release();
        match outcome {
            DeliveryOutcome::Success { payload } => {
                if self.verbose {
                    debug!("Message produced: {payload}");
                }
            }
            DeliveryOutcome::Failure { payload, reason } => {
                error!("Failed to deliver message: {payload}: {reason}");
            }
        }
    }
}

/// Flush, backpressure and error-absorption knobs for one engine.
#[derive(Debug, Clone)]
pub struct DeliveryPolicy {
    /// Undelivered count at which a bounded flush is issued.
    pub flush_threshold: usize,
    /// Soft ceiling on in-flight messages.
    pub max_in_flight: u64,
    pub flush_timeout: Duration,
    pub drain_timeout: Duration,
    pub error_pause: Duration,
    /// Surface broker-level enqueue errors to the caller as hard failure
    /// instead of absorbing them. Off by default; turning it on hands the
    /// restart decision back to the host runtime.
    pub escalate_broker_errors: bool,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        DeliveryPolicy {
            flush_threshold: crate::config::DEFAULT_FLUSH_THRESHOLD,
            max_in_flight: crate::config::DEFAULT_MAX_IN_FLIGHT,
            flush_timeout: FLUSH_TIMEOUT,
            drain_timeout: DRAIN_TIMEOUT,
            error_pause: ERROR_PAUSE,
            escalate_broker_errors: false,
        }
    }
}

impl DeliveryPolicy {
    pub fn from_config(config: &DestinationConfig) -> Self {
        DeliveryPolicy {
            flush_threshold: config.flush_threshold,
            max_in_flight: config.max_in_flight,
            ..DeliveryPolicy::default()
        }
    }
}

/// What happened to one dispatched message, from the caller's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    /// Handed to the client, confirmation pending.
    Enqueued,
    /// Refused at the in-flight ceiling and discarded.
    DroppedAtCapacity,
    /// An enqueue error was logged and absorbed; the caller sees success.
    Absorbed,
    /// An enqueue error must be surfaced as hard failure (escalation
    /// policy only).
    Escalated,
}

/// Owns the producer handle and the in-flight counter for one open
/// destination.
pub struct DeliveryEngine<C: BrokerClient> {
    client: C,
    tracker: Arc<DeliveryTracker>,
    policy: DeliveryPolicy,
}

impl<C: BrokerClient> DeliveryEngine<C> {
    pub fn new(client: C, tracker: Arc<DeliveryTracker>, policy: DeliveryPolicy) -> Self {
        DeliveryEngine {
            client,
            tracker,
            policy,
        }
    }

    pub fn tracker(&self) -> &Arc<DeliveryTracker> {
        &self.tracker
    }

    /// Enqueues one message, then runs the guaranteed flush check.
    ///
    /// `maybe_flush` runs after every attempt, successful or not, so a
    /// long run of failures cannot starve the threshold flush.
    pub fn dispatch(&self, message: &WireMessage) -> DispatchStatus {
        let status = self.try_enqueue(message);
        self.maybe_flush();
        status
    }

    fn try_enqueue(&self, message: &WireMessage) -> DispatchStatus {
        if !self.tracker.try_acquire(self.policy.max_in_flight) {
            error!(
                "In-flight ceiling of {} reached. This message will be discarded. \
                 {} messages waiting to be delivered.",
                self.policy.max_in_flight,
                self.tracker.in_flight()
            );
            return DispatchStatus::DroppedAtCapacity;
        }

        match self.client.enqueue(message) {
            Ok(()) => {
                self.client.poll_events();
                DispatchStatus::Enqueued
            }
            Err(err) => {
                self.tracker.release();
                self.report_enqueue_error(&err)
            }
        }
    }

    /// Classifies an enqueue-stage error per policy: log once, pause
    /// briefly, report success upward — except broker-level errors under
    /// the escalation variant, which skip the pause and fail hard.
    pub fn report_enqueue_error(&self, err: &EnqueueError) -> DispatchStatus {
        match err {
            EnqueueError::QueueFull => {
                error!(
                    "Producer queue is full. This message will be discarded. \
                     {} messages waiting to be delivered.",
                    self.client.pending()
                );
            }
            EnqueueError::Broker(reason) => {
                error!("An error occurred while trying to send messages... See details: {reason}");
                if self.policy.escalate_broker_errors {
                    return DispatchStatus::Escalated;
                }
            }
            EnqueueError::Encoding(reason) => {
                error!("Could not encode the message payload... See details: {reason}");
            }
        }
        thread::sleep(self.policy.error_pause);
        DispatchStatus::Absorbed
    }

    /// Issues a bounded flush once the undelivered count reaches the
    /// threshold. A flush that does not shrink the queue is a sign the
    /// broker may be unreachable; that is logged as a warning, not
    /// treated as failure, since future sends are expected to retry.
    fn maybe_flush(&self) {
        let pending = self.client.pending();
        if pending < self.policy.flush_threshold {
            return;
        }
        debug!(
            "Flushing producer w/ a timeout of {:?}; {pending} messages undelivered...",
            self.policy.flush_timeout
        );
        self.client.flush(self.policy.flush_timeout);
        let after = self.client.pending();
        if after >= pending {
            warn!(
                "Undelivered count did not decrease after flush ({after} still pending); \
                 the broker may be unreachable."
            );
        }
    }

    /// Final drain before the handle is released. Best-effort: residue
    /// after the timeout is accepted.
    pub fn shutdown(&self) {
        debug!(
            "Flushing producer w/ a timeout of {:?}...",
            self.policy.drain_timeout
        );
        self.client.flush(self.policy.drain_timeout);
    }
}

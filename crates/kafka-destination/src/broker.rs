// SPDX-License-Identifier: Apache-2.0

//! The broker client seam.
//!
//! [`BrokerClient`] is the narrow interface the delivery engine needs from
//! a producer: hand over one message, nudge the event loop, report the
//! undelivered count, flush with a bound. [`KafkaBrokerClient`] implements
//! it on top of rdkafka's synchronous [`BaseProducer`], whose semantics
//! (`produce` + `poll(0)` + bounded `flush` + per-message delivery
//! reports from a background thread) are exactly the contract this
//! destination is written against. Tests substitute a mock.

use std::sync::Arc;
use std::time::Duration;

use rdkafka::client::ClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::message::Message;
use rdkafka::producer::{BaseProducer, BaseRecord, DeliveryResult, Producer, ProducerContext};
use tracing::warn;

use crate::config::DestinationConfig;
use crate::delivery::{DeliveryOutcome, DeliveryTracker, WireMessage};
use crate::errors::{EnqueueError, OpenError};

/// Producer-side operations the delivery engine depends on.
pub trait BrokerClient: Sized {
    /// Builds a producer handle from the resolved destination settings.
    ///
    /// The tracker is shared with the client's delivery callback so every
    /// confirmation, success or failure, is counted.
    fn connect(config: &DestinationConfig, tracker: Arc<DeliveryTracker>) -> Result<Self, OpenError>;

    /// Hands one message to the client's local delivery queue.
    fn enqueue(&self, message: &WireMessage) -> Result<(), EnqueueError>;

    /// Zero-timeout poll: serves already-completed delivery callbacks
    /// inline without blocking the caller.
    fn poll_events(&self);

    /// Number of messages enqueued but not yet confirmed.
    fn pending(&self) -> usize;

    /// Bounded-wait flush of the local queue. Best-effort; messages may
    /// remain unconfirmed when the timeout elapses.
    fn flush(&self, timeout: Duration);
}

/// Delivery-report context: translates rdkafka confirmations into tracker
/// bookkeeping. Invoked from the client's background thread.
struct DeliveryContext {
    tracker: Arc<DeliveryTracker>,
}

impl ClientContext for DeliveryContext {}

impl ProducerContext for DeliveryContext {
    type DeliveryOpaque = ();

    fn delivery(&self, delivery_result: &DeliveryResult<'_>, _: Self::DeliveryOpaque) {
        let outcome = match delivery_result {
            Ok(message) => DeliveryOutcome::Success {
                payload: payload_text(message.payload()),
            },
            Err((err, message)) => DeliveryOutcome::Failure {
                payload: payload_text(message.payload()),
                reason: err.to_string(),
            },
        };
        self.tracker.record_outcome(outcome);
    }
}

/// Lossy text rendering of a payload for log lines; the fallback covers
/// payloads that are not valid UTF-8.
fn payload_text(payload: Option<&[u8]>) -> String {
    payload
        .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
        .unwrap_or_default()
}

/// rdkafka-backed producer handle for one destination.
pub struct KafkaBrokerClient {
    producer: BaseProducer<DeliveryContext>,
    topic: String,
}

impl BrokerClient for KafkaBrokerClient {
    fn connect(
        config: &DestinationConfig,
        tracker: Arc<DeliveryTracker>,
    ) -> Result<Self, OpenError> {
        let mut client_config = ClientConfig::new();
        for (key, value) in &config.broker_settings {
            client_config.set(key.as_str(), value.as_str());
        }
        let producer = client_config
            .create_with_context(DeliveryContext { tracker })
            .map_err(|err| OpenError(err.to_string()))?;
        Ok(KafkaBrokerClient {
            producer,
            topic: config.topic.clone(),
        })
    }

    fn enqueue(&self, message: &WireMessage) -> Result<(), EnqueueError> {
        let mut record: BaseRecord<'_, str, str> =
            BaseRecord::to(&self.topic).payload(&message.body);
        if let Some(key) = &message.key {
            record = record.key(key.as_str());
        }
        if let Some(partition) = message.partition {
            record = record.partition(partition);
        }
        match self.producer.send(record) {
            Ok(()) => Ok(()),
            Err((KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull), _)) => {
                Err(EnqueueError::QueueFull)
            }
            Err((err, _)) => Err(EnqueueError::Broker(err.to_string())),
        }
    }

    fn poll_events(&self) {
        let _ = self.producer.poll(Duration::ZERO);
    }

    fn pending(&self) -> usize {
        usize::try_from(self.producer.in_flight_count()).unwrap_or(0)
    }

    fn flush(&self, timeout: Duration) {
        if let Err(err) = self.producer.flush(timeout) {
            warn!("Producer flush did not complete: {err}");
        }
    }
}

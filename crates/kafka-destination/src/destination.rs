// SPDX-License-Identifier: Apache-2.0

//! The lifecycle controller the host runtime drives.
//!
//! State machine: unconfigured → configured (`init`) → open (`open`) →
//! closed (`close`) → unconfigured (`deinit`). Each hook returns a bool
//! per the host contract: `false` from `init` signals unrecoverable
//! misconfiguration; `false` from `send` asks the host to suspend the
//! destination and retry `open` later, which by design almost never
//! happens after a successful open.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info};

use crate::broker::{BrokerClient, KafkaBrokerClient};
use crate::config::DestinationConfig;
use crate::delivery::{DeliveryEngine, DeliveryPolicy, DeliveryTracker, DispatchStatus, WireMessage};
use crate::errors::EnqueueError;
use crate::record::{normalize, render_wire_body, LogRecord};

/// Kafka destination for a syslog-style log-processing runtime.
///
/// Generic over the broker client so tests (or embedders) can substitute
/// their own; the default is the rdkafka-backed [`KafkaBrokerClient`].
pub struct KafkaDestination<C: BrokerClient = KafkaBrokerClient> {
    config: Option<DestinationConfig>,
    engine: Option<DeliveryEngine<C>>,
}

impl<C: BrokerClient> KafkaDestination<C> {
    pub fn new() -> Self {
        KafkaDestination {
            config: None,
            engine: None,
        }
    }

    /// Resolves the destination options. Called once at initialization.
    ///
    /// Returns false only on unrecoverable misconfiguration (missing
    /// `hosts` or `topic`).
    pub fn init(&mut self, args: &HashMap<String, String>) -> bool {
        match DestinationConfig::resolve(args) {
            Ok(config) => {
                self.config = Some(config);
                true
            }
            Err(err) => {
                error!("{err}...");
                false
            }
        }
    }

    /// Opens the connection to the broker.
    ///
    /// Not idempotent: a second `open` replaces the producer handle
    /// without draining the previous one. Callers must `close` first.
    pub fn open(&mut self) -> bool {
        let Some(config) = self.config.clone() else {
            error!("open() called before init()");
            return false;
        };
        info!(
            "Opening connection to the remote Kafka services at {}",
            config.hosts
        );
        // The tracker is shared: the client's delivery callback decrements
        // the same counter the engine reserves against.
        let tracker = Arc::new(DeliveryTracker::new(config.verbose));
        match C::connect(&config, Arc::clone(&tracker)) {
            Ok(client) => {
                let policy = DeliveryPolicy::from_config(&config);
                self.engine = Some(DeliveryEngine::new(client, tracker, policy));
                true
            }
            Err(err) => {
                error!("{err}");
                false
            }
        }
    }

    /// Installs an already-constructed client behind the delivery engine.
    ///
    /// For tests and embedders with a custom [`BrokerClient`]; the normal
    /// path is `open`, which also wires the client's delivery callback to
    /// the engine's tracker.
    pub fn open_with_client(&mut self, client: C) -> bool {
        let Some(config) = &self.config else {
            error!("open_with_client() called before init()");
            return false;
        };
        let policy = DeliveryPolicy::from_config(config);
        self.open_with_client_and_policy(client, policy)
    }

    /// Like [`open_with_client`](Self::open_with_client), with an explicit
    /// policy replacing the config-derived one.
    pub fn open_with_client_and_policy(&mut self, client: C, policy: DeliveryPolicy) -> bool {
        let Some(config) = &self.config else {
            error!("open_with_client_and_policy() called before init()");
            return false;
        };
        let tracker = Arc::new(DeliveryTracker::new(config.verbose));
        self.engine = Some(DeliveryEngine::new(client, tracker, policy));
        true
    }

    /// Whether the destination is able to receive messages.
    pub fn is_open(&self) -> bool {
        self.engine.is_some()
    }

    /// Drains outstanding deliveries and marks the handle inactive.
    pub fn close(&mut self) -> bool {
        debug!("KafkaDestination.close()....");
        if let Some(engine) = &self.engine {
            engine.shutdown();
        }
        true
    }

    /// Releases remaining resources. Safe without a prior `open`.
    pub fn deinit(&mut self) -> bool {
        debug!("KafkaDestination.deinit()....");
        self.engine = None;
        true
    }

    /// Forwards one record.
    ///
    /// Filtered and dropped records report success so the host never
    /// suspends the destination over them; only an unopened destination
    /// (or a broker error under the escalation policy) returns false.
    pub fn send(&self, record: &LogRecord) -> bool {
        if record.is_empty() {
            return true;
        }
        let (Some(config), Some(engine)) = (&self.config, &self.engine) else {
            error!("send() called while the destination is not open");
            return false;
        };

        if let Some(programs) = &config.programs {
            match record.get("PROGRAM") {
                Some(program) if programs.contains(program) => {}
                // Not an allowed program: accepted no-op.
                _ => return true,
            }
        }

        let msg = normalize(record);
        let body = match render_wire_body(&msg) {
            Ok(body) => body,
            Err(err) => {
                let status = engine.report_enqueue_error(&EnqueueError::Encoding(err.to_string()));
                return status != DispatchStatus::Escalated;
            }
        };

        let key = config.message_key_field.as_ref().and_then(|field| {
            msg.get(field).and_then(Value::as_str).map(str::to_string)
        });

        let message = WireMessage {
            body,
            key,
            partition: config.partition,
        };
        engine.dispatch(&message) != DispatchStatus::Escalated
    }
}

impl<C: BrokerClient> Default for KafkaDestination<C> {
    fn default() -> Self {
        Self::new()
    }
}

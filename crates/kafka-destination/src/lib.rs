// SPDX-License-Identifier: Apache-2.0

//! A Kafka destination for syslog-style log-processing runtimes.
//!
//! The host runtime drives the [`KafkaDestination`] lifecycle
//! (`init`/`open`/`send`/`close`/`deinit`) and hands over one
//! [`record::LogRecord`] per event. Records are optionally filtered by
//! originating program, normalized (date reinterpretation, structured
//! firewall/NAT field extraction), rendered to a canonical JSON body and
//! handed to the delivery engine, which owns the producer handle, the
//! in-flight ceiling and the flush/error policy.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod broker;
pub mod config;
pub mod delivery;
pub mod destination;
pub mod errors;
pub mod fields;
pub mod record;
pub mod util;

pub use broker::{BrokerClient, KafkaBrokerClient};
pub use config::DestinationConfig;
pub use delivery::{
    DeliveryEngine, DeliveryOutcome, DeliveryPolicy, DeliveryTracker, DispatchStatus, WireMessage,
};
pub use destination::KafkaDestination;
pub use errors::{ConfigError, EnqueueError, OpenError};
pub use record::LogRecord;

// SPDX-License-Identifier: Apache-2.0

//! Destination option resolution.
//!
//! The host runtime hands us a flat string-keyed option map once, at
//! initialization. Everything is resolved here into an immutable
//! [`DestinationConfig`]: the only fatal outcome is a missing `hosts` or
//! `topic`; every other malformed option falls back to its default with a
//! logged warning so a typo never keeps the destination down.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde_json::Value;
use tracing::{error, info, warn};

use crate::errors::ConfigError;
use crate::util::{parse_bool_flag, parse_str_list};

/// Default broker version fallback pin, as defined by librdkafka.
pub const DEFAULT_BROKER_VERSION_FALLBACK: &str = "0.9.0.1";

/// Undelivered-message count at which a bounded flush is issued.
pub const DEFAULT_FLUSH_THRESHOLD: usize = 10_000;

/// Soft ceiling on messages awaiting delivery confirmation.
pub const DEFAULT_MAX_IN_FLIGHT: u64 = 1_000_000;

/// Immutable, fully resolved destination options.
#[derive(Debug, Clone)]
pub struct DestinationConfig {
    pub hosts: String,
    pub topic: String,
    /// Record field whose value becomes the broker message key.
    pub message_key_field: Option<String>,
    /// Explicit partition to produce to.
    pub partition: Option<i32>,
    /// Allow-set of originating program names; `None` passes everything.
    pub programs: Option<HashSet<String>>,
    pub consumer_group_id: Option<String>,
    pub broker_version: String,
    /// Log successful deliveries too, not only failures.
    pub verbose: bool,
    pub flush_threshold: usize,
    pub max_in_flight: u64,
    /// Resolved client settings, librdkafka key style.
    pub broker_settings: BTreeMap<String, String>,
}

impl DestinationConfig {
    /// Resolves the raw option map.
    ///
    /// Fails only when `hosts` or `topic` is absent.
    pub fn resolve(args: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut broker_settings = BTreeMap::new();

        // Overrides are merged first; the required keys below are written
        // on top, so overrides cannot clobber them.
        if let Some(raw) = args.get("producer_overrides") {
            merge_producer_overrides(raw, &mut broker_settings);
        }

        let hosts = args
            .get("hosts")
            .cloned()
            .ok_or(ConfigError::MissingOption("hosts"))?;
        let topic = args
            .get("topic")
            .cloned()
            .ok_or(ConfigError::MissingOption("topic"))?;
        broker_settings.insert("bootstrap.servers".to_string(), hosts.clone());

        let message_key_field = args.get("message_key_field").cloned();
        if let Some(key_field) = &message_key_field {
            info!("Message key used will be {key_field}");
        }

        let partition = args.get("partition").and_then(|raw| match raw.parse() {
            Ok(partition) => {
                info!("Partition to produce to {partition}");
                Some(partition)
            }
            Err(_) => {
                warn!("Ignore partition={raw} because it is not an int.");
                None
            }
        });

        let programs = args.get("programs").and_then(|raw| {
            let parsed: HashSet<String> = parse_str_list(raw).into_iter().collect();
            if parsed.is_empty() {
                warn!("Empty `programs` filter; all programs will be forwarded.");
                None
            } else {
                info!("Programs to filter against {parsed:?}");
                Some(parsed)
            }
        });

        let consumer_group_id = args.get("consumer_group_id").cloned();
        if let Some(group_id) = &consumer_group_id {
            broker_settings.insert("group.id".to_string(), group_id.clone());
            info!("Broker group_id={group_id}");
        }

        let broker_version = match args.get("broker_version") {
            Some(version) => {
                let minor = version.split('.').take(2).collect::<Vec<_>>().join(".");
                if minor == "0.10" || minor == "0.11" {
                    // Recognized minors negotiate the protocol themselves.
                    broker_settings.insert("api.version.request".to_string(), "true".to_string());
                } else {
                    broker_settings
                        .insert("broker.version.fallback".to_string(), version.clone());
                    broker_settings.insert("api.version.request".to_string(), "false".to_string());
                }
                info!("Broker version={version}");
                version.clone()
            }
            None => {
                broker_settings.insert(
                    "broker.version.fallback".to_string(),
                    DEFAULT_BROKER_VERSION_FALLBACK.to_string(),
                );
                broker_settings.insert("api.version.request".to_string(), "false".to_string());
                warn!(
                    "Default broker version fallback {DEFAULT_BROKER_VERSION_FALLBACK} \
                     will be applied here."
                );
                DEFAULT_BROKER_VERSION_FALLBACK.to_string()
            }
        };

        let verbose = args
            .get("verbose")
            .map(|raw| match parse_bool_flag(raw) {
                Some(flag) => flag,
                None => {
                    warn!("Ignore verbose={raw} because it is not a boolean.");
                    false
                }
            })
            .unwrap_or(false);
        if !verbose {
            info!(
                "Verbose mode is OFF: delivery failures only. Use verbose=true in your \
                 destination options to also see successfully delivered messages in your logs."
            );
        }

        let flush_threshold = parse_numeric_option(args, "flush_after", DEFAULT_FLUSH_THRESHOLD);
        let max_in_flight = parse_numeric_option(args, "max_in_flight", DEFAULT_MAX_IN_FLIGHT);

        info!("Initialized Kafka destination config w/ settings={broker_settings:?}");

        Ok(DestinationConfig {
            hosts,
            topic,
            message_key_field,
            partition,
            programs,
            consumer_group_id,
            broker_version,
            verbose,
            flush_threshold,
            max_in_flight,
            broker_settings,
        })
    }
}

fn parse_numeric_option<T>(args: &HashMap<String, String>, option: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display + Copy,
{
    match args.get(option) {
        Some(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                warn!("Ignore {option}={raw} because it is not an int; using {default}.");
                default
            }
        },
        None => default,
    }
}

/// Shallow-merges a JSON object literal of client settings.
///
/// A malformed literal is logged and ignored, never fatal.
fn merge_producer_overrides(raw: &str, settings: &mut BTreeMap<String, String>) {
    match serde_json::from_str::<serde_json::Map<String, Value>>(raw) {
        Ok(overrides) => {
            for (key, value) in overrides {
                let rendered = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                settings.insert(key, rendered);
            }
        }
        Err(err) => {
            error!("Given producer_overrides {raw} is not a JSON object ({err}); ignoring.");
        }
    }
}

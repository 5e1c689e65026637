// SPDX-License-Identifier: Apache-2.0

//! Log record normalization: date reinterpretation, structured-message
//! extraction dispatch, and the deterministic wire rendering.

use std::collections::HashMap;

use chrono::offset::LocalResult;
use chrono::{Datelike, Local, NaiveDateTime, TimeZone};
use serde_json::{Map, Value};
use tracing::warn;

use crate::fields::{parse_firewall_msg, parse_nat_msg};

/// A single inbound log event as handed over by the host runtime.
///
/// A plain field-name → value mapping; the host is expected to supply at
/// least `FACILITY`, `PRIORITY`, `HOST`, `PROGRAM`, `DATE` and `MESSAGE`.
/// The record is read-only here; normalization builds a derived copy.
pub type LogRecord = HashMap<String, String>;

/// Syslog timestamp layout: month abbreviation, day, time, no year.
const SYSLOG_DATE_FORMAT: &str = "%Y %b %d %H:%M:%S";

/// Converts a `%b %d %H:%M:%S` date string to a Unix timestamp string.
///
/// The string carries no year, so it is reinterpreted against the current
/// local year and the local timezone of the running process. Events that
/// crossed a year boundary before reaching us are therefore attributed to
/// the wrong year; downstream consumers compensate for this, so the
/// behavior is kept.
pub fn date_str_to_timestamp(date_str: &str) -> Option<String> {
    let dated = format!("{} {}", Local::now().year(), date_str);
    let naive = NaiveDateTime::parse_from_str(&dated, SYSLOG_DATE_FORMAT).ok()?;
    match Local.from_local_datetime(&naive) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => Some(dt.timestamp().to_string()),
        LocalResult::None => None,
    }
}

/// Produces the forward-ready mapping for one record.
///
/// Field values are copied as-is, with two exceptions: a `MESSAGE` from a
/// recognized structured program (`firewall`, `nat`) is replaced by the
/// extracted field mapping, and `DATE` is rewritten to epoch seconds. A
/// date that does not parse is forwarded untouched rather than failing the
/// send path.
pub fn normalize(record: &LogRecord) -> Map<String, Value> {
    let mut msg = Map::new();
    for (name, value) in record {
        msg.insert(name.clone(), Value::String(value.clone()));
    }

    match record.get("PROGRAM").map(String::as_str) {
        Some("firewall") => {
            if let Some(raw) = record.get("MESSAGE") {
                msg.insert("MESSAGE".to_string(), Value::Object(parse_firewall_msg(raw)));
            }
        }
        Some("nat") => {
            if let Some(raw) = record.get("MESSAGE") {
                msg.insert("MESSAGE".to_string(), Value::Object(parse_nat_msg(raw)));
            }
        }
        _ => {}
    }

    if let Some(date) = record.get("DATE") {
        match date_str_to_timestamp(date) {
            Some(ts) => {
                msg.insert("DATE".to_string(), Value::String(ts));
            }
            None => {
                warn!("Could not parse DATE `{date}`; forwarding it as received");
            }
        }
    }

    msg
}

/// Renders a normalized record as the broker message body.
///
/// `serde_json`'s map is BTree-backed, so keys serialize in a canonical
/// sorted order and the rendering is reproducible.
pub fn render_wire_body(msg: &Map<String, Value>) -> Result<String, serde_json::Error> {
    serde_json::to_string(msg)
}

// SPDX-License-Identifier: Apache-2.0

//! Structured field extraction for single-line firewall and NAT messages.
//!
//! Both formats are a run of whitespace-separated `KEY=value` tokens.
//! Extraction is a pure left-to-right scan: unknown tokens are ignored,
//! malformed tokens are skipped, and when the same key appears more than
//! once the last occurrence wins. The output schema is fixed per format;
//! fields absent from the input keep a sentinel value (`-1` for
//! numeric-typed fields, `""` for string-typed fields) so callers can tell
//! "not present" apart from "zero" or "empty".

use serde_json::{json, Map, Value};

/// How a schema field is seeded when the input does not carry it.
#[derive(Clone, Copy)]
enum Sentinel {
    Text,
    Numeric,
}

/// One schema entry: input token key, output field name, sentinel kind.
type FieldSpec = (&'static str, &'static str, Sentinel);

const FIREWALL_FIELDS: &[FieldSpec] = &[
    ("OUT", "out", Sentinel::Text),
    ("MAC", "mac_address", Sentinel::Text),
    ("SRC", "src_ip", Sentinel::Text),
    ("DST", "dest_ip", Sentinel::Text),
    ("LEN", "len", Sentinel::Text),
    ("TOS", "tos", Sentinel::Text),
    ("PREC", "proc", Sentinel::Text),
    ("TTL", "ttl", Sentinel::Text),
    ("ID", "id", Sentinel::Text),
    ("PROTO", "proto", Sentinel::Text),
    ("SPT", "source_port", Sentinel::Numeric),
    ("DPT", "destination_port", Sentinel::Numeric),
    ("MARK", "mark", Sentinel::Text),
    ("CODE", "code", Sentinel::Numeric),
    ("SEQ", "seq", Sentinel::Numeric),
];

const NAT_FIELDS: &[FieldSpec] = &[
    ("DNAT_IN", "dnat_in", Sentinel::Text),
    ("OUT", "out", Sentinel::Text),
    ("MAC", "mac_address", Sentinel::Text),
    ("SRC", "src_ip", Sentinel::Text),
    ("DST", "dest_ip", Sentinel::Text),
    ("LEN", "len", Sentinel::Text),
    ("TOS", "tos", Sentinel::Text),
    ("PREC", "proc", Sentinel::Text),
    ("TTL", "ttl", Sentinel::Text),
    ("ID", "id", Sentinel::Text),
    ("PROTO", "proto", Sentinel::Text),
    ("SPT", "spt", Sentinel::Numeric),
    ("DPT", "dpt", Sentinel::Numeric),
    ("WINDOW", "window", Sentinel::Numeric),
    ("RES", "res", Sentinel::Text),
    ("URGP", "urgp", Sentinel::Numeric),
];

fn seed_schema(fields: &[FieldSpec]) -> Map<String, Value> {
    let mut out = Map::new();
    for (_, name, sentinel) in fields {
        let seed = match sentinel {
            Sentinel::Text => json!(""),
            Sentinel::Numeric => json!(-1),
        };
        out.insert((*name).to_string(), seed);
    }
    out
}

fn scan_tokens(msg: &str, fields: &[FieldSpec], out: &mut Map<String, Value>) {
    for token in msg.split_whitespace() {
        let Some((key, value)) = token.split_once('=') else {
            continue;
        };
        if let Some((_, name, _)) = fields.iter().find(|(k, _, _)| *k == key) {
            out.insert((*name).to_string(), json!(value));
        }
    }
}

/// Extracts the fixed firewall schema from a single-line firewall message.
///
/// The action is derived rather than read from a `KEY=value` token: any
/// token whose key starts with `DROP` (e.g. `DROP_131073IN=vNic_0`) marks
/// the record as a drop, otherwise the action stays `"allow"`.
pub fn parse_firewall_msg(msg: &str) -> Map<String, Value> {
    let mut out = seed_schema(FIREWALL_FIELDS);
    let dropped = msg
        .split_whitespace()
        .filter_map(|token| token.split_once('=').map(|(key, _)| key))
        .any(|key| key.starts_with("DROP"));
    out.insert(
        "action".to_string(),
        json!(if dropped { "drop" } else { "allow" }),
    );
    scan_tokens(msg, FIREWALL_FIELDS, &mut out);
    out
}

/// Extracts the fixed NAT schema from a single-line NAT message.
///
/// Bare flag tokens such as `DF` or `SYN` carry no `=` and are ignored.
pub fn parse_nat_msg(msg: &str) -> Map<String, Value> {
    let mut out = seed_schema(NAT_FIELDS);
    scan_tokens(msg, NAT_FIELDS, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_firewall_msg_udp() {
        let msg = "[69e9c2b7-ee9f-4a3e-80f0-8ffc66aac147]: DROP_131073IN=vNic_0 \
                   OUT= MAC=ff:ff:ff:ff:ff:ff:00:50:56:bd:70:59:08:00 SRC=10.11.12.53 \
                   DST=10.11.12.255 LEN=229 TOS=0x00 PREC=0x00 TTL=128 ID=13254 \
                   PROTO=UDP SPT=138 DPT=138 LEN=209 MARK=0x1";
        let parsed = parse_firewall_msg(msg);

        let expected = json!({
            "action": "drop",
            "out": "",
            "mac_address": "ff:ff:ff:ff:ff:ff:00:50:56:bd:70:59:08:00",
            "src_ip": "10.11.12.53",
            "dest_ip": "10.11.12.255",
            // LEN appears twice; the second occurrence wins.
            "len": "209",
            "tos": "0x00",
            "proc": "0x00",
            "ttl": "128",
            "id": "13254",
            "proto": "UDP",
            "source_port": "138",
            "destination_port": "138",
            "mark": "0x1",
            "code": -1,
            "seq": -1,
        });
        assert_eq!(Value::Object(parsed), expected);
    }

    #[test]
    fn test_parse_firewall_msg_icmp() {
        let msg = "[69e9c2b7-ee9f-4a3e-80f0-8ffc66aac147]: DROP_131073IN=vNic_0 \
                   OUT= MAC=00:50:56:01:43:50:00:1f:6c:3d:d7:f7:08:00 \
                   SRC=10.11.254.108 DST=10.11.12.181 LEN=84 TOS=0x00 PREC=0x00 \
                   TTL=64 ID=54643 PROTO=ICMP TYPE=8 CODE=0 ID=65299 SEQ=10047 \
                   MARK=0x1";
        let parsed = parse_firewall_msg(msg);

        let expected = json!({
            "action": "drop",
            "out": "",
            "mac_address": "00:50:56:01:43:50:00:1f:6c:3d:d7:f7:08:00",
            "src_ip": "10.11.254.108",
            "dest_ip": "10.11.12.181",
            "len": "84",
            "tos": "0x00",
            "proc": "0x00",
            "ttl": "64",
            // ID appears twice; the ICMP echo id wins.
            "id": "65299",
            "proto": "ICMP",
            "source_port": -1,
            "destination_port": -1,
            "mark": "0x1",
            "code": "0",
            "seq": "10047",
        });
        assert_eq!(Value::Object(parsed), expected);
    }

    #[test]
    fn test_parse_nat_msg() {
        let msg = "[69e9c2b7-ee9f-4a3e-80f0-8ffc66aac147]: DNAT_IN=vNic_0 OUT= \
                   MAC=00:50:56:01:35:27:00:a7:42:53:c5:c2:08:00 SRC=173.8.227.70 \
                   DST=209.143.151.73 LEN=52 TOS=0x00 PREC=0x00 TTL=122 ID=7082 DF \
                   PROTO=TCP SPT=54740 DPT=3389 WINDOW=8192 RES=0x00 SYN URGP=0 ";
        let parsed = parse_nat_msg(msg);

        let expected = json!({
            "dnat_in": "vNic_0",
            "out": "",
            "mac_address": "00:50:56:01:35:27:00:a7:42:53:c5:c2:08:00",
            "src_ip": "173.8.227.70",
            "dest_ip": "209.143.151.73",
            "len": "52",
            "tos": "0x00",
            "proc": "0x00",
            "ttl": "122",
            "id": "7082",
            "proto": "TCP",
            "spt": "54740",
            "dpt": "3389",
            "window": "8192",
            "res": "0x00",
            "urgp": "0",
        });
        assert_eq!(Value::Object(parsed), expected);
    }

    #[test]
    fn test_last_occurrence_wins_for_any_ordering() {
        let parsed = parse_nat_msg("SPT=1 SPT=2 SPT=3");
        assert_eq!(parsed["spt"], json!("3"));

        let parsed = parse_nat_msg("SPT=3 SPT=2 SPT=1");
        assert_eq!(parsed["spt"], json!("1"));
    }

    #[test]
    fn test_malformed_tokens_are_skipped() {
        let parsed = parse_nat_msg("garbage == SRC=1.2.3.4 =orphan DF");
        assert_eq!(parsed["src_ip"], json!("1.2.3.4"));
        // Everything else keeps its sentinel.
        assert_eq!(parsed["dnat_in"], json!(""));
        assert_eq!(parsed["spt"], json!(-1));
    }

    #[test]
    fn test_empty_message_yields_sentinels_only() {
        let parsed = parse_firewall_msg("");
        assert_eq!(parsed.len(), 16);
        assert_eq!(parsed["action"], json!("allow"));
        assert_eq!(parsed["source_port"], json!(-1));
        assert_eq!(parsed["src_ip"], json!(""));
    }
}

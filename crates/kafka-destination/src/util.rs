// SPDX-License-Identifier: Apache-2.0

//! Small parsing helpers for string-keyed destination options.

/// Parses a comma-separated list option into its member strings.
///
/// All whitespace is removed before splitting, so `" x , y , "` and
/// `"x,y"` resolve to the same list. Empty segments (leading, trailing or
/// doubled separators) are dropped. Order is preserved.
pub fn parse_str_list(raw: &str) -> Vec<String> {
    raw.split_whitespace()
        .collect::<String>()
        .split(',')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses a boolean-ish option string.
///
/// Accepts the spellings hosts tend to hand us (`true`/`false` in any
/// case, `1`/`0`, `yes`/`no`). Returns `None` for anything else so the
/// caller can warn and fall back to its default.
pub fn parse_bool_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

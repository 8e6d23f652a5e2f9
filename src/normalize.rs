use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;

static COUNT_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d[\d,\.]*[KMBkmb]?)").unwrap());

/// Turn display counts like "3,401", "1.2K" or "2M" into integers.
///
/// Suffixed values are parsed as floats and truncated after scaling. Anything
/// without a usable number yields `None`.
pub fn parse_count(text: Option<&str>) -> Option<u64> {
    let t = text?.replace(',', "").trim().to_uppercase();
    if t.is_empty() {
        return None;
    }

    let scaled = |prefix: &str, factor: f64| -> Option<u64> {
        let n: f64 = prefix.trim().parse().ok()?;
        if !n.is_finite() || n < 0.0 {
            return None;
        }
        Some((n * factor) as u64)
    };

    if let Some(p) = t.strip_suffix('K') {
        return scaled(p, 1_000.0);
    }
    if let Some(p) = t.strip_suffix('M') {
        return scaled(p, 1_000_000.0);
    }
    if let Some(p) = t.strip_suffix('B') {
        return scaled(p, 1_000_000_000.0);
    }

    let digits: String = t.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Pull the first count-looking token out of a label such as
/// "1.2K Followers" or "345 replies. Reply" and normalize it.
pub fn count_in(label: Option<&str>) -> Option<u64> {
    let label = label?;
    let token = COUNT_TOKEN.captures(label)?.get(1)?.as_str();
    parse_count(Some(token))
}

/// First capture group of `pattern` in `text`; the whole match when the
/// pattern has no groups.
pub fn extract_pattern(pattern: &Regex, text: Option<&str>) -> Option<String> {
    let caps = pattern.captures(text?)?;
    caps.get(1)
        .or_else(|| caps.get(0))
        .map(|m| m.as_str().to_string())
}

/// Capture instant, UTC, e.g. "2025-08-25T13:45:00+0000".
pub fn current_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%z").to_string()
}

/// Random token standing in for a post id that could not be located.
pub fn new_synthetic_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

//! Shape checks for activity, area and stratum values
//!
//! "0" is the wildcard for activity and area. Stratum 0 is only meaningful
//! for catalog discovery and must be allowed explicitly.

use std::collections::HashSet;

use tracing::warn;

const ACTIVITY_WIDTH: usize = 2;
const AREA_WIDTH: usize = 5;

fn is_digits(value: &str, width: usize) -> bool {
    value.len() == width && value.bytes().all(|b| b.is_ascii_digit())
}

/// `"0"` or exactly two ASCII digits.
pub fn validate_activity(activity: &str) -> bool {
    activity == "0" || is_digits(activity, ACTIVITY_WIDTH)
}

/// `"0"` or exactly five ASCII digits.
pub fn validate_area(area: &str) -> bool {
    area == "0" || is_digits(area, AREA_WIDTH)
}

/// 1 through 7, or 0 when `allow_zero` is set.
pub fn validate_stratum(stratum: u8, allow_zero: bool) -> bool {
    (allow_zero && stratum == 0) || (1..=7).contains(&stratum)
}

/// Parse a stratum from user input, accepting only 1 through 7.
pub fn parse_stratum(raw: &str) -> Option<u8> {
    let value: i64 = raw.trim().parse().ok()?;
    let stratum = u8::try_from(value).ok()?;
    validate_stratum(stratum, false).then_some(stratum)
}

/// Zero-pad an all-digit area of up to five digits. `"0"` stays the wildcard.
pub fn pad_area(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw == "0" {
        return Some(raw.to_string());
    }
    if !raw.is_empty() && raw.len() <= AREA_WIDTH && raw.bytes().all(|b| b.is_ascii_digit()) {
        return Some(format!("{raw:0>AREA_WIDTH$}"));
    }
    None
}

/// Pad every area, dropping malformed ones with a warning, and deduplicate
/// keeping first-seen order.
pub fn pad_areas<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut areas = Vec::new();
    for value in raw {
        let value = value.as_ref();
        match pad_area(value) {
            Some(area) => {
                if seen.insert(area.clone()) {
                    areas.push(area);
                }
            }
            None => warn!(area = value.trim(), "invalid area format, ignoring"),
        }
    }
    areas
}

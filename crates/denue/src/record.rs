//! API record shapes
//!
//! The API answers with a JSON array whose elements are either positional
//! arrays or keyed objects. The shape is decided once, at parse time.

use serde_json::{Map, Value};
use tracing::debug;

/// Key aliases that may hold an activity identifier, in priority order.
pub const ID_ALIASES: &[&str] = &[
    "AE",
    "IdActividad",
    "idActividad",
    "IDE_ACTIVIDAD_ECONOMICA",
    "actividad",
    "Id",
    "id",
];

/// Index of the count in a positional record.
pub const COUNT_POSITION: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Positional(Vec<Value>),
    Keyed(Map<String, Value>),
}

/// Outcome of parsing a response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    Records(Vec<Record>),
    /// Valid JSON whose top level is not an array.
    NotASequence(&'static str),
}

/// Parse a response body. Array elements that are neither arrays nor objects
/// are dropped.
pub fn parse_records(body: &str) -> serde_json::Result<Parsed> {
    let value: Value = serde_json::from_str(body)?;
    let items = match value {
        Value::Array(items) => items,
        other => return Ok(Parsed::NotASequence(json_type(&other))),
    };

    let records = items
        .into_iter()
        .filter_map(|item| {
            let record = Record::from_value(item);
            if record.is_none() {
                debug!("skipping scalar record");
            }
            record
        })
        .collect();
    Ok(Parsed::Records(records))
}

impl Record {
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Array(items) => Some(Record::Positional(items)),
            Value::Object(map) => Some(Record::Keyed(map)),
            _ => None,
        }
    }

    /// Establishment count carried by this record, if it coerces to an
    /// integer. Booleans count as 0 or 1; floats are truncated.
    ///
    /// Positional records hold it at `COUNT_POSITION`; keyed records under
    /// `Total`, `total` or any other casing of that name.
    pub fn count(&self) -> Option<i64> {
        match self {
            Record::Positional(items) => items.get(COUNT_POSITION).and_then(coerce_count),
            Record::Keyed(map) => total_field(map).and_then(coerce_count),
        }
    }

    /// Activity identifier: first element of a positional record, or the first
    /// non-null `ID_ALIASES` entry of a keyed record.
    pub fn extract_id(&self) -> Option<String> {
        let value = match self {
            Record::Positional(items) => items.first(),
            Record::Keyed(map) => ID_ALIASES
                .iter()
                .filter_map(|key| map.get(*key))
                .find(|v| !v.is_null()),
        }?;
        match value {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// Sum of every coercible count. Records without one are skipped; a
/// negative total is reported as zero.
pub fn sum_counts(records: &[Record]) -> u64 {
    let total = records
        .iter()
        .filter_map(Record::count)
        .fold(0i64, i64::saturating_add);
    u64::try_from(total).unwrap_or(0)
}

fn total_field(map: &Map<String, Value>) -> Option<&Value> {
    map.get("Total")
        .or_else(|| map.get("total"))
        .or_else(|| {
            map.iter()
                .find(|(key, _)| key.eq_ignore_ascii_case("total"))
                .map(|(_, value)| value)
        })
}

fn coerce_count(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

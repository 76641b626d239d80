//! Task generation
//!
//! Resolves the activity, area and stratum arguments into a `TaskPlan` whose
//! Cartesian product is the set of independent fetch tasks.

use std::fmt;

use tracing::{info, warn};

use crate::config::ALL_STRATA;
use crate::fetcher::{FetchOptions, Fetcher};
use crate::record::Record;
use crate::validate::{parse_stratum, validate_activity};

/// Activity argument that requests catalog discovery instead of a fixed list.
pub const DISCOVER_ALL: &str = "0";

/// One (activity, area, stratum) query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchTask {
    pub activity: String,
    pub area: String,
    pub stratum: u8,
}

impl FetchTask {
    pub fn new(activity: impl Into<String>, area: impl Into<String>, stratum: u8) -> Self {
        Self {
            activity: activity.into(),
            area: area.into(),
            stratum,
        }
    }

    /// Wildcard query that returns the full activity catalog.
    pub fn discovery() -> Self {
        Self::new("0", "0", 0)
    }
}

impl fmt::Display for FetchTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.activity, self.area, self.stratum)
    }
}

/// Activities × areas × strata, expanded lazily.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPlan {
    activities: Vec<String>,
    areas: Vec<String>,
    strata: Vec<u8>,
}

impl TaskPlan {
    pub fn new(activities: Vec<String>, areas: Vec<String>, strata: Vec<u8>) -> Self {
        Self {
            activities,
            areas,
            strata,
        }
    }

    /// Number of tasks the plan expands to.
    pub fn len(&self) -> usize {
        self.activities.len() * self.areas.len() * self.strata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tasks in activity, then area, then stratum order.
    pub fn iter(&self) -> impl Iterator<Item = FetchTask> + '_ {
        self.activities.iter().flat_map(move |activity| {
            self.areas.iter().flat_map(move |area| {
                self.strata
                    .iter()
                    .map(move |&stratum| FetchTask::new(activity.as_str(), area.as_str(), stratum))
            })
        })
    }
}

/// Resolve the activity argument.
///
/// `"0"` runs one discovery query and returns the distinct two-digit
/// identifiers in numeric order. Anything else is read as a comma list.
pub async fn get_activities(fetcher: &Fetcher, arg: &str) -> Vec<String> {
    let arg = arg.trim();
    if arg != DISCOVER_ALL {
        return parse_activity_list(arg);
    }

    info!("discovering activity catalog");
    let options = FetchOptions::discovery(fetcher.config());
    let records = fetcher.fetch_with(&FetchTask::discovery(), options).await;
    let activities = discovered_activities(&records);
    info!(
        records = records.len(),
        activities = activities.len(),
        "activity catalog discovered"
    );
    activities
}

/// Two-digit identifiers from catalog records, deduplicated and sorted.
pub fn discovered_activities(records: &[Record]) -> Vec<String> {
    let mut ids: Vec<String> = records
        .iter()
        .filter_map(Record::extract_id)
        .filter(|id| id.len() == 2 && id.bytes().all(|b| b.is_ascii_digit()))
        .collect();
    ids.sort_by_key(|id| id.parse::<u8>().unwrap_or(u8::MAX));
    ids.dedup();
    ids
}

/// Explicit comma list. Invalid entries are dropped; duplicates are kept.
pub fn parse_activity_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter(|s| {
            let ok = validate_activity(s);
            if !ok {
                warn!(activity = *s, "invalid activity code, ignoring");
            }
            ok
        })
        .map(str::to_owned)
        .collect()
}

/// Comma list of strata. Falls back to every stratum when none are valid.
pub fn parse_strata(list: &str) -> Vec<u8> {
    let strata: Vec<u8> = list.split(',').filter_map(parse_stratum).collect();
    if strata.is_empty() {
        warn!(list, "no valid strata given, using all");
        ALL_STRATA.to_vec()
    } else {
        strata
    }
}

//! Launch interval policy
//!
//! Validates and corrects the job-name → interval-seconds mapping read from
//! configuration. Operator mistakes that would make a job fire continuously
//! (or never) are fatal; everything else is corrected with a warning.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{error, warn};

use crate::domain::JobKind;
use crate::error::ConfigError;

/// Lowest interval any recurring job may run at, in seconds
pub const MIN_INTERVAL_SECS: u64 = 60;

/// Interval used when a configured value cannot be converted to an integer
pub const DEFAULT_INTERVAL_SECS: u64 = 60;

/// An interval exactly as written in the configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawInterval {
    Integer(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    Other(serde_json::Value),
}

impl From<u64> for RawInterval {
    fn from(secs: u64) -> Self {
        RawInterval::Integer(i64::try_from(secs).unwrap_or(i64::MAX))
    }
}

/// Validated launch intervals, in whole seconds
///
/// Every value is at least [`MIN_INTERVAL_SECS`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntervalTable(BTreeMap<String, u64>);

impl IntervalTable {
    pub fn get(&self, job: &str) -> Option<u64> {
        self.0.get(job).copied()
    }

    /// Interval of a job that is about to be scheduled
    pub fn seconds_for(&self, kind: JobKind) -> Result<u64, ConfigError> {
        self.get(kind.as_str()).ok_or_else(|| {
            error!(job = %kind, "launch_interval has no entry for an enabled job");
            ConfigError::MissingInterval {
                job: kind.as_str().to_string(),
            }
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(name, secs)| (name.as_str(), *secs))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The table as configuration input again
    pub fn to_raw(&self) -> BTreeMap<String, RawInterval> {
        self.0
            .iter()
            .map(|(name, secs)| (name.clone(), RawInterval::from(*secs)))
            .collect()
    }
}

/// Validate and correct every configured launch interval
///
/// Fails on the first entry that is empty or not greater than 1. Entries
/// that are not integers are converted (falling back to
/// [`DEFAULT_INTERVAL_SECS`]) and entries below [`MIN_INTERVAL_SECS`] are
/// raised to it; both corrections log a warning.
pub fn normalize(raw: &BTreeMap<String, RawInterval>) -> Result<IntervalTable, ConfigError> {
    let mut table = BTreeMap::new();
    for (job, value) in raw {
        table.insert(job.clone(), normalize_one(job, value)?);
    }
    Ok(IntervalTable(table))
}

/// How a raw value reads once text has been parsed
enum Reading {
    Integer(i64),
    Float(f64),
    Empty,
    Unconvertible,
}

fn read(value: &RawInterval) -> Reading {
    match value {
        RawInterval::Integer(n) => Reading::Integer(*n),
        RawInterval::Float(f) => Reading::Float(*f),
        // booleans count as 0/1
        RawInterval::Bool(b) => Reading::Integer(i64::from(*b)),
        RawInterval::Text(text) => {
            let text = text.trim();
            if text.is_empty() {
                Reading::Empty
            } else if let Ok(n) = text.parse::<i64>() {
                Reading::Float(n as f64)
            } else if let Ok(f) = text.parse::<f64>() {
                Reading::Float(f)
            } else {
                Reading::Unconvertible
            }
        }
        RawInterval::Other(_) => Reading::Unconvertible,
    }
}

fn normalize_one(job: &str, value: &RawInterval) -> Result<u64, ConfigError> {
    let too_small = || {
        error!(job, value = ?value, "launch_interval is empty or not greater than 1, aborting");
        ConfigError::IntervalTooSmall {
            job: job.to_string(),
            value: describe(value),
        }
    };

    let seconds = match read(value) {
        Reading::Empty => return Err(too_small()),
        Reading::Integer(n) if n <= 1 => return Err(too_small()),
        Reading::Integer(n) => n.unsigned_abs(),
        Reading::Float(f) if f <= 1.0 => return Err(too_small()),
        Reading::Float(f) => {
            warn!(job, value = ?value, "launch_interval should be an integer, converting");
            // NaN, infinity and out-of-range values have no integer reading
            if f.is_finite() && f < u64::MAX as f64 {
                f.trunc() as u64
            } else {
                DEFAULT_INTERVAL_SECS
            }
        }
        Reading::Unconvertible => {
            warn!(
                job,
                value = ?value,
                default = DEFAULT_INTERVAL_SECS,
                "launch_interval is not a number, using the default"
            );
            DEFAULT_INTERVAL_SECS
        }
    };

    if seconds < MIN_INTERVAL_SECS {
        warn!(
            job,
            seconds,
            floor = MIN_INTERVAL_SECS,
            "launch_interval fires too often, raising it to the floor"
        );
        return Ok(MIN_INTERVAL_SECS);
    }

    Ok(seconds)
}

fn describe(value: &RawInterval) -> String {
    match value {
        RawInterval::Integer(n) => n.to_string(),
        RawInterval::Float(f) => f.to_string(),
        RawInterval::Text(text) => format!("{:?}", text),
        RawInterval::Bool(b) => b.to_string(),
        RawInterval::Other(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(entries: &[(&str, RawInterval)]) -> BTreeMap<String, RawInterval> {
        entries
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    fn single(value: RawInterval) -> Result<u64, ConfigError> {
        normalize(&raw(&[("job", value)])).map(|table| table.get("job").unwrap())
    }

    #[test]
    fn test_valid_integers_pass_unchanged() {
        assert_eq!(single(RawInterval::Integer(60)).unwrap(), 60);
        assert_eq!(single(RawInterval::Integer(3600)).unwrap(), 3600);
    }

    #[test]
    fn test_values_not_greater_than_one_are_fatal() {
        for value in [
            RawInterval::Integer(1),
            RawInterval::Integer(0),
            RawInterval::Integer(-30),
            RawInterval::Float(0.5),
            RawInterval::Text(String::new()),
            RawInterval::Text("  ".to_string()),
            RawInterval::Text("1".to_string()),
            RawInterval::Bool(true),
            RawInterval::Bool(false),
        ] {
            let err = single(value.clone()).unwrap_err();
            assert!(
                matches!(err, ConfigError::IntervalTooSmall { .. }),
                "expected fatal error for {:?}",
                value
            );
        }
    }

    #[test]
    fn test_small_values_clamp_to_floor() {
        assert_eq!(single(RawInterval::Integer(2)).unwrap(), 60);
        assert_eq!(single(RawInterval::Integer(59)).unwrap(), 60);
        assert_eq!(single(RawInterval::Float(1.5)).unwrap(), 60);
    }

    #[test]
    fn test_convertible_values_truncate() {
        assert_eq!(single(RawInterval::Float(75.0)).unwrap(), 75);
        assert_eq!(single(RawInterval::Float(90.9)).unwrap(), 90);
        assert_eq!(single(RawInterval::Text("90".to_string())).unwrap(), 90);
        assert_eq!(single(RawInterval::Text("120.5".to_string())).unwrap(), 120);
        assert_eq!(single(RawInterval::Text("30".to_string())).unwrap(), 60);
    }

    #[test]
    fn test_unconvertible_values_use_default() {
        assert_eq!(single(RawInterval::Text("hourly".to_string())).unwrap(), 60);
        assert_eq!(single(RawInterval::Float(f64::NAN)).unwrap(), 60);
        assert_eq!(single(RawInterval::Float(f64::INFINITY)).unwrap(), 60);
        assert_eq!(
            single(RawInterval::Other(serde_json::json!([120]))).unwrap(),
            60
        );
    }

    #[test]
    fn test_collector_and_overdue_are_corrected() {
        let table = normalize(&raw(&[
            ("collector", RawInterval::Integer(30)),
            ("ddt_overdue", RawInterval::Text("90".to_string())),
        ]))
        .unwrap();

        assert_eq!(table.get("collector"), Some(60));
        assert_eq!(table.get("ddt_overdue"), Some(90));
    }

    #[test]
    fn test_fatal_entry_aborts_whole_table() {
        let err = normalize(&raw(&[
            ("collector", RawInterval::Integer(30)),
            ("ddt_overdue", RawInterval::Text("90".to_string())),
            ("ddt_decouple", RawInterval::Integer(0)),
        ]))
        .unwrap_err();

        match err {
            ConfigError::IntervalTooSmall { job, .. } => assert_eq!(job, "ddt_decouple"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize(&raw(&[
            ("a", RawInterval::Integer(5)),
            ("b", RawInterval::Float(75.0)),
            ("c", RawInterval::Text("junk".to_string())),
            ("d", RawInterval::Integer(600)),
        ]))
        .unwrap();
        let twice = normalize(&once.to_raw()).unwrap();
        assert_eq!(once, twice);
        assert!(twice.iter().all(|(_, secs)| secs >= MIN_INTERVAL_SECS));
    }

    #[test]
    fn test_missing_interval_for_enabled_job() {
        let table = normalize(&raw(&[("collector", RawInterval::Integer(300))])).unwrap();
        assert_eq!(table.seconds_for(JobKind::Collector).unwrap(), 300);
        assert!(matches!(
            table.seconds_for(JobKind::DdtOverdue),
            Err(ConfigError::MissingInterval { .. })
        ));
    }

    #[test]
    fn test_raw_interval_deserializes_from_toml() {
        let parsed: BTreeMap<String, RawInterval> =
            toml::from_str("a = 30\nb = 75.0\nc = \"90\"\nd = true\ne = [1]").unwrap();
        assert_eq!(parsed["a"], RawInterval::Integer(30));
        assert_eq!(parsed["b"], RawInterval::Float(75.0));
        assert_eq!(parsed["c"], RawInterval::Text("90".to_string()));
        assert_eq!(parsed["d"], RawInterval::Bool(true));
        assert!(matches!(parsed["e"], RawInterval::Other(_)));
    }
}

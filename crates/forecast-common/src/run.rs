//! Model run identification.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// One model initialization cycle.
///
/// Run ids have the fixed-width form `run_YYYYMMDD_HH`, so sorting them
/// lexicographically also sorts them chronologically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelRun {
    pub model_id: String,
    pub date: NaiveDate,
    pub init_hour: u32,
}

impl ModelRun {
    pub fn new(model_id: impl Into<String>, date: NaiveDate, init_hour: u32) -> Self {
        Self {
            model_id: model_id.into(),
            date,
            init_hour,
        }
    }

    /// Build a run from an initialization timestamp (minutes are dropped).
    pub fn from_init_time(model_id: impl Into<String>, init_time: DateTime<Utc>) -> Self {
        Self::new(model_id, init_time.date_naive(), init_time.hour())
    }

    /// Parse a `run_YYYYMMDD_HH` id for the given model.
    pub fn parse(model_id: impl Into<String>, run_id: &str) -> ConfigResult<Self> {
        let invalid = || ConfigError::InvalidRunId(run_id.to_string());

        let rest = run_id.strip_prefix("run_").ok_or_else(invalid)?;
        let (date_part, hour_part) = rest.split_once('_').ok_or_else(invalid)?;
        if date_part.len() != 8 || hour_part.len() != 2 {
            return Err(invalid());
        }

        let date = NaiveDate::parse_from_str(date_part, "%Y%m%d").map_err(|_| invalid())?;
        let init_hour: u32 = hour_part.parse().map_err(|_| invalid())?;
        if init_hour > 23 {
            return Err(invalid());
        }

        Ok(Self::new(model_id, date, init_hour))
    }

    /// Derived run id: `run_{YYYYMMDD}_{HH}`.
    pub fn run_id(&self) -> String {
        format!("run_{}_{}", self.date_str(), self.init_hour_str())
    }

    /// Date as `YYYYMMDD`.
    pub fn date_str(&self) -> String {
        self.date.format("%Y%m%d").to_string()
    }

    /// Init hour as two digits.
    pub fn init_hour_str(&self) -> String {
        format!("{:02}", self.init_hour)
    }

    /// Initialization time in UTC.
    pub fn init_time(&self) -> DateTime<Utc> {
        let midnight = self.date.and_hms_opt(0, 0, 0).unwrap_or_default();
        Utc.from_utc_datetime(&midnight) + Duration::hours(self.init_hour as i64)
    }

    /// Valid time of a forecast hour from this run.
    pub fn valid_time(&self, forecast_hour: u32) -> DateTime<Utc> {
        self.init_time() + Duration::hours(forecast_hour as i64)
    }
}

impl std::fmt::Display for ModelRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.model_id, self.run_id())
    }
}

/// Check whether a directory name looks like a run id.
pub fn is_run_id(name: &str) -> bool {
    ModelRun::parse("", name).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_roundtrip() {
        let run = ModelRun::new("hrrr", NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(), 7);
        assert_eq!(run.run_id(), "run_20260105_07");

        let parsed = ModelRun::parse("hrrr", "run_20260105_07").unwrap();
        assert_eq!(parsed, run);
    }

    #[test]
    fn test_parse_rejects_malformed_ids() {
        for bad in ["20260105_07", "run_2026015_07", "run_20260105_7", "run_20260105_24", "run_x"] {
            assert!(ModelRun::parse("gfs", bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_init_and_valid_time() {
        let run = ModelRun::parse("gfs", "run_20260131_18").unwrap();
        assert_eq!(run.init_time().to_rfc3339(), "2026-01-31T18:00:00+00:00");
        assert_eq!(run.valid_time(6).to_rfc3339(), "2026-02-01T00:00:00+00:00");
    }

    #[test]
    fn test_is_run_id() {
        assert!(is_run_id("run_20260101_00"));
        assert!(!is_run_id("latest"));
        assert!(!is_run_id("run_tmp"));
    }
}

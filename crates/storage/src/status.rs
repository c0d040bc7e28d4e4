//! Per-run cache status for a region.

use chrono::{DateTime, Utc};
use forecast_common::{schedule, ModelConfig, ModelRun};
use serde::Serialize;
use tracing::debug;

use crate::error::StorageResult;
use crate::layout::TileKey;
use crate::tile_store::{FsTileStore, TileRepository};

/// Fraction of expected hours at which a run counts as complete.
pub const COMPLETE_FRACTION: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Complete,
    Partial,
    Empty,
}

impl RunState {
    pub fn classify(present: usize, expected: usize) -> Self {
        if present == 0 {
            RunState::Empty
        } else if present as f64 >= expected as f64 * COMPLETE_FRACTION {
            RunState::Complete
        } else {
            RunState::Partial
        }
    }
}

/// Cached state of one run, judged by a proxy variable's tile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunStatus {
    pub model_id: String,
    pub run_id: String,
    pub variables: Vec<String>,
    pub hours_present: usize,
    pub expected_hours: usize,
    pub status: RunState,
    pub last_modified: Option<DateTime<Utc>>,
}

impl FsTileStore {
    /// Status of one run. The expected count is the model's base schedule
    /// for the run's init hour.
    pub fn run_status(
        &self,
        region_id: &str,
        resolution_deg: f64,
        model: &ModelConfig,
        run_id: &str,
        proxy_variable: &str,
    ) -> StorageResult<RunStatus> {
        let model_id = model.model.id.as_str();
        let key = TileKey::new(region_id, resolution_deg, model_id, run_id, proxy_variable);

        let expected = ModelRun::parse(model_id, run_id)
            .map(|run| schedule::expected_hours(&model.schedule, run.init_hour, None, false).len())
            .unwrap_or(0);
        let hours_present = match self.load_metadata(&key) {
            Ok(meta) => meta.hours.len(),
            Err(e) => {
                debug!(tile = %key, error = %e, "No proxy tile");
                0
            }
        };

        Ok(RunStatus {
            model_id: model_id.to_string(),
            run_id: run_id.to_string(),
            variables: self.list_variables(region_id, resolution_deg, model_id, run_id)?,
            hours_present,
            expected_hours: expected,
            status: RunState::classify(hours_present, expected),
            last_modified: self.modified_at(&key),
        })
    }

    /// Status of every cached run of every given model, newest run first.
    pub fn cache_status<'a>(
        &self,
        region_id: &str,
        resolution_deg: f64,
        models: impl IntoIterator<Item = &'a ModelConfig>,
        proxy_variable: &str,
    ) -> StorageResult<Vec<RunStatus>> {
        let mut out = Vec::new();
        for model in models {
            for run_id in self.list_runs(region_id, resolution_deg, &model.model.id)? {
                out.push(self.run_status(region_id, resolution_deg, model, &run_id, proxy_variable)?);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(RunState::classify(0, 18), RunState::Empty);
        assert_eq!(RunState::classify(17, 18), RunState::Complete);
        assert_eq!(RunState::classify(9, 10), RunState::Complete);
        assert_eq!(RunState::classify(8, 10), RunState::Partial);
        assert_eq!(RunState::classify(3, 0), RunState::Complete);
    }
}

//! Discovery of published model runs.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, DurationRound, Utc};
use forecast_common::{schedule, BoundingBox, Catalog, ModelConfig, ModelRun};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::error::ResolveError;
use crate::source::{probe_url, ArtifactSource};

/// A published run and the forecast hours expected for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunInfo {
    pub run: ModelRun,
    pub forecast_hours: Vec<u32>,
    /// Whether the hourly head of the schedule is published for this run.
    pub hourly_published: bool,
}

impl RunInfo {
    pub fn run_id(&self) -> String {
        self.run.run_id()
    }
}

/// Walks back from the current hour probing upstream for published runs.
pub struct ScheduleResolver {
    source: Arc<dyn ArtifactSource>,
    catalog: Arc<Catalog>,
    probe_bbox: BoundingBox,
    probe_timeout: Duration,
    lookback_override: Option<u32>,
}

impl ScheduleResolver {
    pub fn new(
        source: Arc<dyn ArtifactSource>,
        catalog: Arc<Catalog>,
        probe_bbox: BoundingBox,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            source,
            catalog,
            probe_bbox,
            probe_timeout,
            lookback_override: None,
        }
    }

    /// Use `hours` instead of each model's configured lookback window.
    pub fn with_lookback(mut self, hours: Option<u32>) -> Self {
        self.lookback_override = hours;
        self
    }

    /// Base schedule for a model, capped at `max_hours` (or the model maximum).
    pub fn valid_forecast_hours(&self, model_id: &str, max_hours: Option<u32>) -> Result<Vec<u32>, ResolveError> {
        let model = self.catalog.model(model_id)?;
        let schedule = &model.schedule;
        let max_hours = max_hours
            .unwrap_or(schedule.max_forecast_hours)
            .min(schedule.max_forecast_hours);
        Ok(schedule::valid_forecast_hours(schedule, max_hours))
    }

    /// Up to `max_runs` published runs, newest first.
    pub async fn resolve_runs(&self, model_id: &str, max_runs: usize) -> Result<Vec<RunInfo>, ResolveError> {
        self.resolve_runs_at(model_id, max_runs, Utc::now()).await
    }

    /// [`Self::resolve_runs`] relative to a fixed `now`.
    ///
    /// Candidates step back one hour at a time over the model's lookback
    /// window; non-cycle hours are skipped without probing. Probe failures
    /// only skip the candidate.
    #[instrument(skip(self, now), fields(model = %model_id))]
    pub async fn resolve_runs_at(
        &self,
        model_id: &str,
        max_runs: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<RunInfo>, ResolveError> {
        let model = self.catalog.model(model_id)?;
        let lookback = self.lookback_override.unwrap_or(model.schedule.lookback_hours);
        let start = now
            .duration_trunc(ChronoDuration::hours(1))
            .unwrap_or(now);

        let mut runs = Vec::new();
        for back in 0..=lookback {
            if runs.len() >= max_runs.max(1) {
                break;
            }
            let init_time = start - ChronoDuration::hours(back as i64);
            let run = ModelRun::from_init_time(model_id, init_time);
            if !model.schedule.is_cycle_hour(run.init_hour) {
                continue;
            }

            if let Some(info) = self.probe_run(model, run).await {
                info!(
                    run = %info.run.run_id(),
                    hours = info.forecast_hours.len(),
                    hourly = info.hourly_published,
                    "Run available"
                );
                runs.push(info);
            }
        }

        if runs.is_empty() {
            return Err(ResolveError::NoRunFound {
                model: model_id.to_string(),
                lookback_hours: lookback,
            });
        }
        Ok(runs)
    }

    /// Probe hour 1; models whose base schedule starts later fall back to
    /// their first base hour, in which case the hourly head is unpublished.
    async fn probe_run(&self, model: &ModelConfig, run: ModelRun) -> Option<RunInfo> {
        let base = schedule::expected_hours(&model.schedule, run.init_hour, None, false);
        let first_base = base.first().copied()?;

        let hourly_published = self.probe(model, &run, 1).await;
        let available = hourly_published || (first_base != 1 && self.probe(model, &run, first_base).await);
        if !available {
            return None;
        }

        let forecast_hours = if hourly_published {
            schedule::expected_hours(&model.schedule, run.init_hour, None, true)
        } else {
            base
        };
        Some(RunInfo {
            run,
            forecast_hours,
            hourly_published,
        })
    }

    async fn probe(&self, model: &ModelConfig, run: &ModelRun, forecast_hour: u32) -> bool {
        let url = probe_url(model, run, forecast_hour, &self.probe_bbox);
        match tokio::time::timeout(self.probe_timeout, self.source.exists(&url)).await {
            Ok(Ok(true)) => true,
            Ok(Ok(false)) => {
                debug!(run = %run.run_id(), forecast_hour, "Probe miss");
                false
            }
            Ok(Err(e)) => {
                debug!(run = %run.run_id(), forecast_hour, error = %e, "Probe failed");
                false
            }
            Err(_) => {
                debug!(run = %run.run_id(), forecast_hour, "Probe timed out");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::path::Path;
    use std::sync::Mutex;
    use test_utils::{gfs_like_model, hourly_model, t2m_variable, test_region};

    /// Answers probes for URLs containing any of the given fragments.
    struct ProbeSource {
        published: Vec<String>,
        probed: Mutex<Vec<String>>,
    }

    impl ProbeSource {
        fn new(published: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                published: published.iter().map(|s| s.to_string()).collect(),
                probed: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ArtifactSource for ProbeSource {
        async fn exists(&self, url: &str) -> Result<bool, FetchError> {
            self.probed.lock().unwrap().push(url.to_string());
            Ok(self.published.iter().any(|p| url.contains(p.as_str())))
        }

        async fn download_to(&self, url: &str, _dest: &Path) -> Result<u64, FetchError> {
            Err(FetchError::transient(url, "not used"))
        }
    }

    fn resolver(source: Arc<ProbeSource>) -> ScheduleResolver {
        let catalog = Catalog::from_parts(
            [hourly_model("hrrr"), gfs_like_model()],
            [t2m_variable()],
            [test_region()],
        );
        ScheduleResolver::new(
            source,
            Arc::new(catalog),
            test_region().bbox,
            Duration::from_secs(1),
        )
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 14, 40, 0).unwrap()
    }

    #[tokio::test]
    async fn test_newest_published_run_wins() {
        // 14z and 13z not yet out
        let source = ProbeSource::new(&["hrrr.t12z.f01", "hrrr.t11z.f01"]);
        let runs = resolver(source.clone()).resolve_runs_at("hrrr", 1, now()).await.unwrap();

        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].run_id(), "run_20240115_12");
        assert_eq!(runs[0].forecast_hours, (1..=24).collect::<Vec<_>>());
        // Stopped as soon as one run was accepted
        assert_eq!(source.probed.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_max_runs_newest_first() {
        let source = ProbeSource::new(&["t12z", "t11z", "t09z"]);
        let runs = resolver(source).resolve_runs_at("hrrr", 2, now()).await.unwrap();
        let ids: Vec<String> = runs.iter().map(RunInfo::run_id).collect();
        assert_eq!(ids, vec!["run_20240115_12", "run_20240115_11"]);
    }

    #[tokio::test]
    async fn test_nothing_published_is_an_error() {
        let source = ProbeSource::new(&[]);
        let err = resolver(source).resolve_runs_at("hrrr", 1, now()).await.unwrap_err();
        assert!(matches!(err, ResolveError::NoRunFound { lookback_hours: 6, .. }));
    }

    #[tokio::test]
    async fn test_off_cycle_hours_are_not_probed() {
        let source = ProbeSource::new(&["gfs.t06z"]);
        let runs = resolver(source.clone()).resolve_runs_at("gfs", 1, now()).await.unwrap();
        assert_eq!(runs[0].run_id(), "run_20240115_06");
        assert!(source
            .probed
            .lock()
            .unwrap()
            .iter()
            .all(|url| url.contains("gfs.t12z") || url.contains("gfs.t06z")));
    }

    #[tokio::test]
    async fn test_hourly_head_when_hour_one_is_published() {
        let source = ProbeSource::new(&["gfs.t12z.pgrb2.0p25.f001"]);
        let runs = resolver(source).resolve_runs_at("gfs", 1, now()).await.unwrap();
        let hours = &runs[0].forecast_hours;
        assert!(runs[0].hourly_published);
        assert_eq!(&hours[..4], &[1, 2, 3, 4]);
        assert!(hours.contains(&120));
        assert!(!hours.contains(&121));
        assert!(hours.contains(&123));
    }

    #[tokio::test]
    async fn test_base_schedule_when_only_first_base_hour_is_published() {
        let source = ProbeSource::new(&["gfs.t12z.pgrb2.0p25.f003"]);
        let runs = resolver(source).resolve_runs_at("gfs", 1, now()).await.unwrap();
        assert!(!runs[0].hourly_published);
        assert_eq!(&runs[0].forecast_hours[..3], &[3, 6, 9]);
    }

    #[tokio::test]
    async fn test_lookback_override_limits_search() {
        let source = ProbeSource::new(&["hrrr.t12z.f01"]);
        let err = resolver(source)
            .with_lookback(Some(1))
            .resolve_runs_at("hrrr", 1, now())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::NoRunFound { lookback_hours: 1, .. }));
    }

    #[test]
    fn test_valid_forecast_hours_capped() {
        let r = resolver(ProbeSource::new(&[]));
        assert_eq!(r.valid_forecast_hours("hrrr", Some(6)).unwrap(), vec![1, 2, 3, 4, 5, 6]);
        assert!(r.valid_forecast_hours("nope", None).is_err());
    }
}

//! Forecast-hour schedules.
//!
//! These are pure functions of a model's [`ScheduleConfig`] and a requested
//! horizon; no network access is involved.

use crate::config::ScheduleConfig;
use crate::error::{ConfigError, ConfigResult};

/// Check that a schedule's segments are well formed.
pub fn validate(model_id: &str, schedule: &ScheduleConfig) -> ConfigResult<()> {
    let invalid = |message: String| ConfigError::InvalidSchedule {
        model: model_id.to_string(),
        message,
    };

    if schedule.forecast_hours.is_empty() {
        return Err(invalid("no forecast_hours segments".to_string()));
    }

    let mut prev_end: Option<u32> = None;
    let last = schedule.forecast_hours.len() - 1;
    for (i, segment) in schedule.forecast_hours.iter().enumerate() {
        if segment.step == 0 {
            return Err(invalid(format!("segment {i} has step 0")));
        }
        match segment.end {
            None if i != last => {
                return Err(invalid(format!("open-ended segment {i} is not the last one")));
            }
            Some(end) => {
                if prev_end.map_or(false, |prev| end <= prev) {
                    return Err(invalid(format!("segment {i} ends at {end}, not after the previous segment")));
                }
                prev_end = Some(end);
            }
            None => {}
        }
    }
    Ok(())
}

/// Ordered forecast hours valid for a model up to and including `max_hours`.
///
/// The result is strictly increasing. Each segment boundary hour appears
/// exactly once: a segment without an explicit `start` begins at the first
/// multiple of its step strictly after the previous segment's end.
pub fn valid_forecast_hours(schedule: &ScheduleConfig, max_hours: u32) -> Vec<u32> {
    let mut hours: Vec<u32> = Vec::new();
    let mut prev_end: Option<u32> = None;

    for segment in &schedule.forecast_hours {
        if segment.step == 0 {
            break;
        }
        let step = segment.step;
        let start = segment.start.unwrap_or_else(|| match prev_end {
            None => step,
            Some(end) => (end / step + 1) * step,
        });
        let seg_end = segment.end.unwrap_or(max_hours);
        let end = seg_end.min(max_hours);

        let mut hour = start;
        while hour <= end {
            if hours.last().map_or(true, |&last| hour > last) {
                hours.push(hour);
            }
            hour += step;
        }

        if segment.end.is_none() || seg_end >= max_hours {
            break;
        }
        prev_end = Some(seg_end);
    }

    hours
}

/// Horizon for a run: the per-init cap when configured, else `requested`
/// bounded by the model maximum.
pub fn max_hours_for_run(schedule: &ScheduleConfig, init_hour: u32, requested: Option<u32>) -> u32 {
    let fallback = requested
        .unwrap_or(schedule.max_forecast_hours)
        .min(schedule.max_forecast_hours);
    schedule.max_hours_for_init(init_hour, fallback).min(fallback)
}

/// Replace the head of `base` with hourly steps `1..=min(first_hours, max_hours)`.
pub fn with_hourly_override(base: &[u32], first_hours: u32, max_hours: u32) -> Vec<u32> {
    if first_hours == 0 {
        return base.to_vec();
    }
    let n = first_hours.min(max_hours);
    (1..=n)
        .chain(base.iter().copied().filter(|&h| h > n))
        .collect()
}

/// Expected hours for one run.
///
/// `hourly_published` reports whether the run actually publishes the hourly
/// head; models without `hourly_override_first_hours` ignore it.
pub fn expected_hours(
    schedule: &ScheduleConfig,
    init_hour: u32,
    requested: Option<u32>,
    hourly_published: bool,
) -> Vec<u32> {
    let max_hours = max_hours_for_run(schedule, init_hour, requested);
    let base = valid_forecast_hours(schedule, max_hours);
    if hourly_published && schedule.hourly_override_first_hours > 0 {
        with_hourly_override(&base, schedule.hourly_override_first_hours, max_hours)
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HourSegment;
    use std::collections::BTreeMap;

    fn schedule(segments: Vec<HourSegment>, max: u32) -> ScheduleConfig {
        ScheduleConfig {
            cycle_hours: Vec::new(),
            update_frequency_hours: 1,
            max_forecast_hours: max,
            max_hours_by_init: BTreeMap::new(),
            forecast_hours: segments,
            hourly_override_first_hours: 0,
            lookback_hours: 24,
        }
    }

    fn seg(start: Option<u32>, end: Option<u32>, step: u32) -> HourSegment {
        HourSegment { start, end, step }
    }

    fn gfs() -> ScheduleConfig {
        schedule(vec![seg(None, Some(240), 3), seg(None, Some(384), 6)], 384)
    }

    fn nbm() -> ScheduleConfig {
        schedule(vec![seg(Some(1), Some(36), 1), seg(None, None, 6)], 264)
    }

    fn hrrr() -> ScheduleConfig {
        schedule(vec![seg(Some(1), None, 1)], 48)
    }

    fn assert_well_formed(hours: &[u32], max: u32) {
        assert!(hours.windows(2).all(|w| w[0] < w[1]), "not strictly increasing: {hours:?}");
        assert!(hours.iter().all(|&h| h <= max));
    }

    #[test]
    fn test_all_schedules_strictly_increasing_and_bounded() {
        for sched in [gfs(), nbm(), hrrr()] {
            for max in [0, 1, 6, 24, 36, 37, 42, 48, 168, 240, 246, 384] {
                assert_well_formed(&valid_forecast_hours(&sched, max), max);
            }
        }
    }

    #[test]
    fn test_gfs_short_horizon() {
        let hours = valid_forecast_hours(&gfs(), 30);
        assert_eq!(hours, (3..=30).step_by(3).collect::<Vec<_>>());
    }

    #[test]
    fn test_gfs_segment_boundary() {
        let hours = valid_forecast_hours(&gfs(), 252);
        assert_eq!(hours.iter().filter(|&&h| h == 240).count(), 1);
        let pos = hours.iter().position(|&h| h == 240).unwrap();
        assert_eq!(hours[pos + 1], 246);
        assert!((241..246).all(|h| !hours.contains(&h)));
        assert_eq!(hours.last(), Some(&252));
    }

    #[test]
    fn test_nbm_hourly_then_six_hourly() {
        let hours = valid_forecast_hours(&nbm(), 48);
        assert_eq!(&hours[..36], &(1..=36).collect::<Vec<_>>()[..]);
        assert_eq!(&hours[36..], &[42, 48]);
    }

    #[test]
    fn test_hrrr_hourly() {
        assert_eq!(valid_forecast_hours(&hrrr(), 48), (1..=48).collect::<Vec<_>>());
        assert!(valid_forecast_hours(&hrrr(), 0).is_empty());
    }

    #[test]
    fn test_max_hours_by_init() {
        let mut sched = hrrr();
        sched.max_hours_by_init.insert("00".into(), 48);
        sched.max_hours_by_init.insert("default".into(), 18);
        assert_eq!(max_hours_for_run(&sched, 0, None), 48);
        assert_eq!(max_hours_for_run(&sched, 1, None), 18);
        assert_eq!(max_hours_for_run(&sched, 0, Some(24)), 24);
        assert_eq!(max_hours_for_run(&sched, 0, Some(100)), 48);
    }

    #[test]
    fn test_hourly_override() {
        let mut sched = gfs();
        sched.hourly_override_first_hours = 6;

        let hours = expected_hours(&sched, 0, Some(12), true);
        assert_eq!(hours, vec![1, 2, 3, 4, 5, 6, 9, 12]);

        let hours = expected_hours(&sched, 0, Some(12), false);
        assert_eq!(hours, vec![3, 6, 9, 12]);

        assert_eq!(with_hourly_override(&[3, 6], 12, 4), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_validate_rejects_bad_segments() {
        assert!(validate("gfs", &gfs()).is_ok());
        assert!(validate("x", &schedule(vec![], 10)).is_err());
        assert!(validate("x", &schedule(vec![seg(None, Some(10), 0)], 10)).is_err());
        assert!(validate("x", &schedule(vec![seg(None, None, 1), seg(None, Some(10), 2)], 10)).is_err());
        assert!(validate("x", &schedule(vec![seg(None, Some(10), 1), seg(None, Some(10), 2)], 10)).is_err());
    }
}

//! Alternative window search.
//!
//! Scans forward from a task's dependency lower bound for the first window
//! that clears resources, the calendar and the weather. The lower bound is
//! fixed up front, so no proposed window can break a dependency.
//!
//! # Step rules
//! - Resource miss: jump straight to the earliest start where the resource
//!   frees up.
//! - Calendar block: jump past the block, rounded up to the step grid.
//! - Bad weather: jump past the last offending sample, rounded up likewise.
//! - Missing forecast: advance one step.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use super::config::SchedulerConfig;
use super::inputs::{first_resource_miss, Demand, PlanningHorizon};
use crate::ledger::LedgerView;
use crate::models::{InfeasibilityReason, Task, TimeWindow, WeatherFeed};
use crate::weather::evaluate;

/// What to search for.
#[derive(Debug, Clone)]
pub struct SearchRequest<'a> {
    pub task: &'a Task,
    pub duration: Duration,
    /// No candidate starts before this.
    pub earliest_start: DateTime<Utc>,
    pub demands: &'a [Demand],
}

#[derive(Debug, Clone, PartialEq)]
pub enum Recommendation {
    Found(TimeWindow),
    /// The horizon ran out. Carries the reasons the last candidate failed.
    NoneFound {
        last_reasons: Vec<InfeasibilityReason>,
    },
}

impl Recommendation {
    pub fn window(&self) -> Option<TimeWindow> {
        match self {
            Self::Found(w) => Some(*w),
            Self::NoneFound { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Recommender<'c> {
    config: &'c SchedulerConfig,
}

impl<'c> Recommender<'c> {
    pub fn new(config: &'c SchedulerConfig) -> Self {
        Self { config }
    }

    /// Finds the first window at or after the request's lower bound whose
    /// finish stays within `horizon.end`.
    pub fn find_alternative<F: WeatherFeed + ?Sized>(
        &self,
        request: &SearchRequest<'_>,
        view: &LedgerView,
        feed: &F,
        horizon: &PlanningHorizon,
    ) -> Recommendation {
        let step = self.config.step_for(request.duration);
        let gated = request.task.is_weather_gated();
        let mut start = request.earliest_start;
        let mut last_reasons = Vec::new();
        let mut candidates = 0usize;

        while start + request.duration <= horizon.end {
            candidates += 1;
            let window = TimeWindow::starting_at(start, request.duration);

            if let Some(miss) = first_resource_miss(view, request.demands, &window) {
                last_reasons = vec![InfeasibilityReason::ResourceConflict];
                match miss.retry_at() {
                    Some(next) if next > start => {
                        start = next;
                        continue;
                    }
                    // The request can never fit this resource.
                    _ => break,
                }
            }

            if let Some(block_end) = horizon
                .calendar
                .conflicts(&window)
                .iter()
                .map(|b| b.end)
                .max()
            {
                last_reasons = vec![InfeasibilityReason::CalendarUnavailable];
                start = advance(start, step, block_end);
                continue;
            }

            if gated {
                let verdict = evaluate(&request.task.thresholds, &window, feed);
                if let Some(reason) = verdict.reason() {
                    last_reasons = vec![reason];
                    start = match verdict.clear_after() {
                        Some(clear) => advance(start, step, clear),
                        None => start + step,
                    };
                    continue;
                }
            }

            debug!(
                task = %request.task.id,
                start = %window.start,
                candidates,
                "alternative window found"
            );
            return Recommendation::Found(window);
        }

        debug!(
            task = %request.task.id,
            candidates,
            horizon_end = %horizon.end,
            "no alternative window within horizon"
        );
        Recommendation::NoneFound { last_reasons }
    }
}

/// Smallest `start + k * step` (k >= 1) at or past `target`.
fn advance(start: DateTime<Utc>, step: Duration, target: DateTime<Utc>) -> DateTime<Utc> {
    let step_s = step.num_seconds().max(1);
    let gap_s = (target - start).num_seconds();
    let k = if gap_s <= 0 { 1 } else { (gap_s + step_s - 1) / step_s };
    start + Duration::seconds(k.max(1) * step_s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Calendar, Forecast, Reservation, Resource, WeatherForecastPoint, WeatherThresholds,
    };
    use chrono::TimeZone;

    fn day(d: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap() + Duration::days(d)
    }

    fn hour(h: i64) -> DateTime<Utc> {
        day(0) + Duration::hours(h)
    }

    fn windy_task(max_wind: f64) -> Task {
        Task::new("spray", "P")
            .with_estimated_hours(4.0)
            .with_weather(WeatherThresholds::default().with_max_wind_speed(max_wind))
    }

    fn search<'a>(task: &'a Task, duration: Duration, demands: &'a [Demand]) -> SearchRequest<'a> {
        SearchRequest {
            task,
            duration,
            earliest_start: day(0),
            demands,
        }
    }

    #[test]
    fn test_advance_rounds_to_grid() {
        let step = Duration::hours(1);
        assert_eq!(advance(hour(0), step, hour(0)), hour(1));
        assert_eq!(advance(hour(0), step, hour(3)), hour(3));
        assert_eq!(advance(hour(0), step, hour(3) + Duration::minutes(10)), hour(4));
    }

    #[test]
    fn test_wind_all_horizon_none_found() {
        let config = SchedulerConfig::default();
        let task = windy_task(20.0);
        let horizon = PlanningHorizon::new(day(0), Duration::days(3));
        let forecast = Forecast::hourly(day(0), 24 * 3, |t| {
            WeatherForecastPoint::new(t, 15.0).with_wind_speed(25.0)
        });

        let rec = Recommender::new(&config).find_alternative(
            &search(&task, Duration::hours(4), &[]),
            &LedgerView::default(),
            &forecast,
            &horizon,
        );
        assert_eq!(
            rec,
            Recommendation::NoneFound {
                last_reasons: vec![InfeasibilityReason::WeatherUnsuitable]
            }
        );
    }

    #[test]
    fn test_finds_first_calm_window() {
        let config = SchedulerConfig::default();
        let task = windy_task(20.0);
        let horizon = PlanningHorizon::new(day(0), Duration::days(3));
        // Windy until hour 10, calm afterwards.
        let forecast = Forecast::hourly(day(0), 24 * 3, |t| {
            let wind = if t < hour(10) { 30.0 } else { 5.0 };
            WeatherForecastPoint::new(t, 15.0).with_wind_speed(wind)
        });

        let rec = Recommender::new(&config).find_alternative(
            &search(&task, Duration::hours(4), &[]),
            &LedgerView::default(),
            &forecast,
            &horizon,
        );
        assert_eq!(rec.window(), Some(TimeWindow::new(hour(10), hour(14))));
    }

    #[test]
    fn test_missing_forecast_never_found() {
        let config = SchedulerConfig::default();
        let task = windy_task(20.0);
        let horizon = PlanningHorizon::new(day(0), Duration::days(2));
        let rec = Recommender::new(&config).find_alternative(
            &search(&task, Duration::hours(4), &[]),
            &LedgerView::default(),
            &Forecast::empty(Duration::hours(1)),
            &horizon,
        );
        assert_eq!(
            rec,
            Recommendation::NoneFound {
                last_reasons: vec![InfeasibilityReason::ForecastUnavailable]
            }
        );
    }

    #[test]
    fn test_resource_miss_jumps_to_free_slot() {
        let config = SchedulerConfig::default();
        let task = Task::new("haul", "P");
        let mut view = LedgerView::from_resources(&[Resource::new("truck").with_capacity(1)]);
        view.reserve_tentative(Reservation::new(
            "truck",
            "P2",
            "X",
            1,
            TimeWindow::new(day(0), day(2)),
        ))
        .unwrap();
        let demands = vec![Demand {
            resource_id: "truck".into(),
            quantity: 1,
        }];
        let horizon = PlanningHorizon::new(day(0), Duration::days(7));

        let rec = Recommender::new(&config).find_alternative(
            &search(&task, Duration::days(1), &demands),
            &view,
            &Forecast::empty(Duration::hours(1)),
            &horizon,
        );
        assert_eq!(rec.window(), Some(TimeWindow::new(day(2), day(3))));
    }

    #[test]
    fn test_oversized_demand_gives_up() {
        let config = SchedulerConfig::default();
        let task = Task::new("haul", "P");
        let view = LedgerView::from_resources(&[Resource::new("truck").with_capacity(1)]);
        let demands = vec![Demand {
            resource_id: "truck".into(),
            quantity: 2,
        }];
        let rec = Recommender::new(&config).find_alternative(
            &search(&task, Duration::days(1), &demands),
            &view,
            &Forecast::empty(Duration::hours(1)),
            &PlanningHorizon::new(day(0), Duration::days(7)),
        );
        assert_eq!(
            rec,
            Recommendation::NoneFound {
                last_reasons: vec![InfeasibilityReason::ResourceConflict]
            }
        );
    }

    #[test]
    fn test_calendar_block_skipped() {
        let config = SchedulerConfig::default();
        let task = Task::new("fence", "P");
        let horizon = PlanningHorizon::new(day(0), Duration::days(7))
            .with_calendar(Calendar::default().with_unavailable(day(0), day(2)));

        let rec = Recommender::new(&config).find_alternative(
            &search(&task, Duration::days(1), &[]),
            &LedgerView::default(),
            &Forecast::empty(Duration::hours(1)),
            &horizon,
        );
        assert_eq!(rec.window(), Some(TimeWindow::new(day(2), day(3))));
    }

    #[test]
    fn test_window_must_end_within_horizon() {
        let config = SchedulerConfig::default();
        let task = Task::new("long", "P");
        let horizon = PlanningHorizon::new(day(0), Duration::days(2));
        let rec = Recommender::new(&config).find_alternative(
            &search(&task, Duration::days(3), &[]),
            &LedgerView::default(),
            &Forecast::empty(Duration::hours(1)),
            &horizon,
        );
        assert_eq!(rec, Recommendation::NoneFound { last_reasons: vec![] });
    }
}

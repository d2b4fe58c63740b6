//! Schedule quality metrics (KPIs).
//!
//! Summarises one published snapshot against its input tasks.
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Makespan | Earliest planned start to latest planned finish |
//! | Total Tardiness | Sum of max(0, planned finish - due date) |
//! | Maximum Tardiness | Largest single delay |
//! | On-Time Rate | Fraction of planned tasks meeting their due date |
//! | Alternatives | Infeasible tasks that received a recommended window |
//!
//! Planned windows are the resolved window for feasible tasks and the
//! recommended alternative for infeasible ones. Tasks with neither are
//! counted as unplanned and excluded from the time-based metrics.
//!
//! # Reference
//! Pinedo (2016), "Scheduling", Ch. 1.2: Performance Measures

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::models::{ScheduleSnapshot, Task};

/// Schedule performance indicators.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleKpi {
    /// Span from the earliest planned start to the latest planned finish.
    pub makespan: Duration,
    pub feasible: usize,
    pub infeasible: usize,
    /// Infeasible tasks with an alternative window.
    pub alternatives: usize,
    /// Tasks with no window at all.
    pub unplanned: usize,
    pub total_tardiness: Duration,
    pub max_tardiness: Duration,
    /// Fraction of planned tasks finishing by their due date (0.0..=1.0).
    pub on_time_rate: f64,
}

impl ScheduleKpi {
    /// Computes KPIs from a snapshot and its input tasks.
    pub fn calculate(snapshot: &ScheduleSnapshot, tasks: &[Task]) -> Self {
        let due: HashMap<&str, _> = tasks
            .iter()
            .filter_map(|t| t.due_date.map(|d| (t.id.as_str(), d)))
            .collect();

        let mut earliest: Option<DateTime<Utc>> = None;
        let mut latest: Option<DateTime<Utc>> = None;
        let mut feasible = 0;
        let mut alternatives = 0;
        let mut unplanned = 0;
        let mut total_tardiness = Duration::zero();
        let mut max_tardiness = Duration::zero();
        let mut on_time_count: usize = 0;
        let mut planned_count: usize = 0;

        for result in &snapshot.results {
            if result.feasible {
                feasible += 1;
            } else if result.alternative_window.is_some() {
                alternatives += 1;
            }

            let Some(window) = result.planned_window() else {
                unplanned += 1;
                continue;
            };
            planned_count += 1;
            earliest = Some(earliest.map_or(window.start, |e| window.start.min(e)));
            latest = Some(latest.map_or(window.end, |e| window.end.max(e)));

            match due.get(result.task_id.as_str()) {
                Some(&due) if window.end > due => {
                    let tardiness = window.end - due;
                    total_tardiness = total_tardiness + tardiness;
                    max_tardiness = max_tardiness.max(tardiness);
                }
                // No due date counts as on time.
                _ => on_time_count += 1,
            }
        }

        let makespan = match (earliest, latest) {
            (Some(s), Some(e)) => e - s,
            _ => Duration::zero(),
        };
        let on_time_rate = if planned_count == 0 {
            1.0
        } else {
            on_time_count as f64 / planned_count as f64
        };

        Self {
            makespan,
            feasible,
            infeasible: snapshot.results.len() - feasible,
            alternatives,
            unplanned,
            total_tardiness,
            max_tardiness,
            on_time_rate,
        }
    }

    /// Whether the schedule meets the given quality thresholds.
    pub fn meets_thresholds(&self, max_tardiness: Duration, min_on_time_rate: f64) -> bool {
        self.max_tardiness <= max_tardiness && self.on_time_rate >= min_on_time_rate
    }
}

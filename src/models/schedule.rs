//! Schedule (solution) model.
//!
//! Every scheduling run produces a fresh [`ScheduleSnapshot`]: one
//! [`ScheduleResult`] per task plus the reservations committed for it.
//! Snapshots are immutable once published; a later run yields a new
//! snapshot with a higher version instead of patching the old one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TimeWindow;

/// Why a task could not be placed where the dependencies wanted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfeasibilityReason {
    /// Required resources are not available in enough quantity.
    ResourceConflict,
    /// A forecast sample breaks one of the task's weather limits.
    WeatherUnsuitable,
    /// Forecast data does not cover the whole window.
    ForecastUnavailable,
    /// The window touches a caller-supplied unavailable period.
    CalendarUnavailable,
    /// A predecessor has no window at all, so this task cannot be anchored.
    PredecessorInfeasible,
    /// The project's dependency graph is cyclic.
    DependencyCycle,
    /// The iteration cap or search horizon ran out.
    Unschedulable,
}

/// A committed claim on resource units over a window.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reservation {
    pub resource_id: String,
    pub project_id: String,
    pub task_id: String,
    pub quantity: u32,
    pub window: TimeWindow,
}

impl Reservation {
    pub fn new(
        resource_id: impl Into<String>,
        project_id: impl Into<String>,
        task_id: impl Into<String>,
        quantity: u32,
        window: TimeWindow,
    ) -> Self {
        Self {
            resource_id: resource_id.into(),
            project_id: project_id.into(),
            task_id: task_id.into(),
            quantity,
            window,
        }
    }
}

/// Outcome for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleResult {
    pub task_id: String,
    /// Start of the dependency- and resource-resolved window.
    pub resolved_start: DateTime<Utc>,
    /// End (exclusive) of the resolved window.
    pub resolved_finish: DateTime<Utc>,
    /// Whether the resolved window satisfies every constraint.
    pub feasible: bool,
    /// Empty when feasible; otherwise in the order they were detected.
    pub reasons: Vec<InfeasibilityReason>,
    /// Next window that would satisfy every constraint, if one was found.
    pub alternative_window: Option<TimeWindow>,
    /// Human-readable details (which resource, which sample, which gap).
    pub notes: Vec<String>,
}

impl ScheduleResult {
    /// A feasible result for the given window.
    pub fn feasible(task_id: impl Into<String>, window: TimeWindow) -> Self {
        Self {
            task_id: task_id.into(),
            resolved_start: window.start,
            resolved_finish: window.end,
            feasible: true,
            reasons: Vec::new(),
            alternative_window: None,
            notes: Vec::new(),
        }
    }

    /// An infeasible result for the given window.
    pub fn infeasible(
        task_id: impl Into<String>,
        window: TimeWindow,
        reasons: Vec<InfeasibilityReason>,
    ) -> Self {
        Self {
            feasible: false,
            reasons,
            ..Self::feasible(task_id, window)
        }
    }

    pub fn with_alternative(mut self, window: Option<TimeWindow>) -> Self {
        self.alternative_window = window;
        self
    }

    pub fn with_notes(mut self, notes: Vec<String>) -> Self {
        self.notes = notes;
        self
    }

    /// The resolved window.
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.resolved_start, self.resolved_finish)
    }

    /// The window the task is planned to occupy: the resolved one when
    /// feasible, otherwise the recommended alternative.
    pub fn planned_window(&self) -> Option<TimeWindow> {
        if self.feasible {
            Some(self.window())
        } else {
            self.alternative_window
        }
    }

    /// Primary reason for infeasibility.
    pub fn reason(&self) -> Option<InfeasibilityReason> {
        self.reasons.first().copied()
    }

    pub fn has_reason(&self, reason: InfeasibilityReason) -> bool {
        self.reasons.contains(&reason)
    }
}

/// Immutable output of one scheduling run for one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSnapshot {
    pub project_id: String,
    /// Monotonic per project; assigned when the snapshot is published.
    pub version: u64,
    /// Task ids in the order they were scheduled.
    pub order: Vec<String>,
    /// One result per task, sorted by task id.
    pub results: Vec<ScheduleResult>,
    /// Reservations committed for this project by this run.
    pub reservations: Vec<Reservation>,
}

impl ScheduleSnapshot {
    /// Creates an unpublished (version 0) snapshot.
    pub fn new(
        project_id: impl Into<String>,
        order: Vec<String>,
        mut results: Vec<ScheduleResult>,
        mut reservations: Vec<Reservation>,
    ) -> Self {
        results.sort_by(|a, b| a.task_id.cmp(&b.task_id));
        reservations.sort_by(|a, b| {
            (&a.resource_id, a.window.start, &a.task_id).cmp(&(
                &b.resource_id,
                b.window.start,
                &b.task_id,
            ))
        });
        Self {
            project_id: project_id.into(),
            version: 0,
            order,
            results,
            reservations,
        }
    }

    /// Finds the result for a task.
    pub fn result(&self, task_id: &str) -> Option<&ScheduleResult> {
        self.results
            .binary_search_by(|r| r.task_id.as_str().cmp(task_id))
            .ok()
            .map(|i| &self.results[i])
    }

    /// Whether every task is feasible.
    pub fn is_fully_feasible(&self) -> bool {
        self.results.iter().all(|r| r.feasible)
    }

    pub fn feasible_count(&self) -> usize {
        self.results.iter().filter(|r| r.feasible).count()
    }

    pub fn infeasible(&self) -> Vec<&ScheduleResult> {
        self.results.iter().filter(|r| !r.feasible).collect()
    }

    /// Latest finish over feasible tasks.
    pub fn makespan_end(&self) -> Option<DateTime<Utc>> {
        self.results
            .iter()
            .filter(|r| r.feasible)
            .map(|r| r.resolved_finish)
            .max()
    }

    /// Reservations held by one task.
    pub fn reservations_for_task(&self, task_id: &str) -> Vec<&Reservation> {
        self.reservations
            .iter()
            .filter(|r| r.task_id == task_id)
            .collect()
    }
}

/// A broken invariant found by auditing a schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub violation_type: ViolationType,
    /// Related entity ID (task or resource).
    pub entity_id: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationType {
    /// Committed reservations exceed a resource's capacity.
    CapacityExceeded,
    /// A successor's window does not honour a dependency edge.
    PrecedenceViolation,
}

impl Violation {
    pub fn capacity_exceeded(resource_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            violation_type: ViolationType::CapacityExceeded,
            entity_id: resource_id.into(),
            message: message.into(),
        }
    }

    pub fn precedence_violation(task_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            violation_type: ViolationType::PrecedenceViolation,
            entity_id: task_id.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(hour: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap() + Duration::hours(hour)
    }

    fn sample_snapshot() -> ScheduleSnapshot {
        ScheduleSnapshot::new(
            "P1",
            vec!["B".into(), "A".into(), "C".into()],
            vec![
                ScheduleResult::feasible("C", TimeWindow::new(at(10), at(20))),
                ScheduleResult::feasible("A", TimeWindow::new(at(0), at(5))),
                ScheduleResult::infeasible(
                    "B",
                    TimeWindow::new(at(0), at(8)),
                    vec![InfeasibilityReason::WeatherUnsuitable],
                )
                .with_alternative(Some(TimeWindow::new(at(30), at(38)))),
            ],
            vec![Reservation::new("tractor", "P1", "A", 1, TimeWindow::new(at(0), at(5)))],
        )
    }

    #[test]
    fn test_results_sorted_and_lookup() {
        let s = sample_snapshot();
        let ids: Vec<&str> = s.results.iter().map(|r| r.task_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
        assert!(s.result("B").is_some());
        assert!(s.result("Z").is_none());
    }

    #[test]
    fn test_feasibility_summary() {
        let s = sample_snapshot();
        assert!(!s.is_fully_feasible());
        assert_eq!(s.feasible_count(), 2);
        assert_eq!(s.infeasible().len(), 1);
        assert_eq!(s.makespan_end(), Some(at(20)));
        assert_eq!(s.reservations_for_task("A").len(), 1);
    }

    #[test]
    fn test_planned_window() {
        let s = sample_snapshot();
        let b = s.result("B").unwrap();
        assert_eq!(b.reason(), Some(InfeasibilityReason::WeatherUnsuitable));
        assert_eq!(b.planned_window(), Some(TimeWindow::new(at(30), at(38))));

        let a = s.result("A").unwrap();
        assert_eq!(a.planned_window(), Some(a.window()));
        assert_eq!(a.reason(), None);
    }

    #[test]
    fn test_reason_serde() {
        let json = serde_json::to_string(&InfeasibilityReason::ForecastUnavailable).unwrap();
        assert_eq!(json, "\"forecast_unavailable\"");
    }

    #[test]
    fn test_violation_factories() {
        let v1 = Violation::capacity_exceeded("tractor", "3 > 2");
        assert_eq!(v1.violation_type, ViolationType::CapacityExceeded);
        let v2 = Violation::precedence_violation("B", "starts before A finishes");
        assert_eq!(v2.violation_type, ViolationType::PrecedenceViolation);
        assert_eq!(v2.entity_id, "B");
    }
}

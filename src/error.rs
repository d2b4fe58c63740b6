//! Error types.
//!
//! Only project-wide failures are errors. Per-task problems (bad weather,
//! busy resources) are reported inside each task's `ScheduleResult`.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::validation::ValidationError;

/// A dependency cycle, as the ordered list of task ids along its edges.
///
/// The first id is repeated implicitly: `[A, B]` means `A -> B -> A`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("dependency cycle: {}", render_cycle(.cycle))]
pub struct CycleError {
    pub cycle: Vec<String>,
}

fn render_cycle(cycle: &[String]) -> String {
    let mut parts: Vec<&str> = cycle.iter().map(String::as_str).collect();
    if let Some(first) = cycle.first() {
        parts.push(first);
    }
    parts.join(" -> ")
}

impl CycleError {
    /// Whether the named task lies on the cycle.
    pub fn contains(&self, task_id: &str) -> bool {
        self.cycle.iter().any(|id| id == task_id)
    }
}

/// Failures building a project's dependency graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error(transparent)]
    DependencyCycle(#[from] CycleError),

    #[error("dependency of '{task_id}' names unknown task '{missing}'")]
    UnknownTask { task_id: String, missing: String },

    #[error("task '{task_id}' belongs to project '{found}', not '{expected}'")]
    ForeignTask {
        task_id: String,
        expected: String,
        found: String,
    },

    #[error("task '{task_id}' appears more than once")]
    DuplicateTask { task_id: String },
}

/// A reservation that does not fit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("resource '{resource_id}' has {available} of {requested} units free")]
pub struct CapacityError {
    pub resource_id: String,
    pub requested: u32,
    /// Lowest free capacity seen across the requested window.
    pub available: u32,
    /// Earliest start at which the request would fit, if it ever can.
    pub retry_at: Option<DateTime<Utc>>,
}

/// Resource ledger failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("resource '{0}' is not registered")]
    UnknownResource(String),

    #[error(transparent)]
    Capacity(#[from] CapacityError),

    #[error("resource '{resource_id}' changed since the plan was computed")]
    StaleView { resource_id: String },

    #[error("lock poisoned for resource '{0}'")]
    Poisoned(String),
}

/// Failures of a whole scheduling run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScheduleError {
    #[error("invalid scheduling input: {} problem(s)", .0.len())]
    Invalid(Vec<ValidationError>),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("gave up committing after {attempts} attempts; resources kept changing")]
    CommitContention { attempts: u32 },

    #[error("configuration error: {0}")]
    Config(String),
}

impl ScheduleError {
    /// The cycle, if the run failed on one.
    pub fn cycle(&self) -> Option<&CycleError> {
        match self {
            Self::Graph(GraphError::DependencyCycle(c)) => Some(c),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_display() {
        let err = CycleError {
            cycle: vec!["A".into(), "B".into()],
        };
        assert_eq!(err.to_string(), "dependency cycle: A -> B -> A");
        assert!(err.contains("A"));
        assert!(!err.contains("C"));
    }

    #[test]
    fn test_cycle_through_schedule_error() {
        let err: ScheduleError = GraphError::from(CycleError {
            cycle: vec!["X".into()],
        })
        .into();
        assert_eq!(err.cycle().map(|c| c.cycle.len()), Some(1));
        assert_eq!(err.to_string(), "dependency cycle: X -> X");
    }

    #[test]
    fn test_capacity_error_display() {
        let err = CapacityError {
            resource_id: "sprayer".into(),
            requested: 2,
            available: 1,
            retry_at: None,
        };
        assert_eq!(err.to_string(), "resource 'sprayer' has 1 of 2 units free");
    }
}

//! Precedence dependencies between tasks.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::TimeWindow;

/// How a predecessor's window bounds its successor.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    /// successor.start >= predecessor.finish
    #[default]
    FinishToStart,
    /// successor.start >= predecessor.start
    StartToStart,
    /// successor.finish >= predecessor.finish
    FinishToFinish,
}

impl DependencyType {
    /// Earliest start a successor of the given duration may take.
    pub fn earliest_successor_start(
        self,
        predecessor: &TimeWindow,
        successor_duration: Duration,
    ) -> DateTime<Utc> {
        match self {
            Self::FinishToStart => predecessor.end,
            Self::StartToStart => predecessor.start,
            Self::FinishToFinish => predecessor.end - successor_duration,
        }
    }

    /// Whether the pair of windows honours this dependency.
    pub fn is_satisfied(self, predecessor: &TimeWindow, successor: &TimeWindow) -> bool {
        match self {
            Self::FinishToStart => successor.start >= predecessor.end,
            Self::StartToStart => successor.start >= predecessor.start,
            Self::FinishToFinish => successor.end >= predecessor.end,
        }
    }
}

/// `task_id` depends on `dependent_on_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
    /// The successor.
    pub task_id: String,
    /// The predecessor.
    pub dependent_on_id: String,
    pub dependency_type: DependencyType,
}

impl Dependency {
    /// Creates a dependency of the given type.
    pub fn new(
        task_id: impl Into<String>,
        dependent_on_id: impl Into<String>,
        dependency_type: DependencyType,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            dependent_on_id: dependent_on_id.into(),
            dependency_type,
        }
    }

    /// `task_id` may start once `dependent_on_id` has finished.
    pub fn finish_to_start(task_id: impl Into<String>, dependent_on_id: impl Into<String>) -> Self {
        Self::new(task_id, dependent_on_id, DependencyType::FinishToStart)
    }

    /// `task_id` may start once `dependent_on_id` has started.
    pub fn start_to_start(task_id: impl Into<String>, dependent_on_id: impl Into<String>) -> Self {
        Self::new(task_id, dependent_on_id, DependencyType::StartToStart)
    }

    /// `task_id` may finish once `dependent_on_id` has finished.
    pub fn finish_to_finish(
        task_id: impl Into<String>,
        dependent_on_id: impl Into<String>,
    ) -> Self {
        Self::new(task_id, dependent_on_id, DependencyType::FinishToFinish)
    }

    /// Whether the edge touches the given task on either end.
    pub fn involves(&self, task_id: &str) -> bool {
        self.task_id == task_id || self.dependent_on_id == task_id
    }
}

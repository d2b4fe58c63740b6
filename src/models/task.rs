//! Task model.
//!
//! A task is a unit of field work (spraying, harvesting, fencing) owned by a
//! project. It carries optional dates, an effort estimate, and, for outdoor
//! work, the weather limits under which it may run.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not started.
    #[default]
    Todo,
    /// Work has begun.
    InProgress,
    /// Blocked on something outside the engine (parts, approvals).
    Waiting,
    /// Finished.
    Done,
    /// Abandoned.
    Cancelled,
}

impl TaskStatus {
    /// Whether the task is finished or abandoned and should not be moved.
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Done | Self::Cancelled)
    }
}

/// Task priority. Ordered so that `Critical > High > Medium > Low`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

/// Weather limits for outdoor work.
///
/// Each field is optional; only supplied limits are checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherThresholds {
    /// Lowest acceptable temperature (°C).
    pub min_temperature: Option<f64>,
    /// Highest acceptable temperature (°C).
    pub max_temperature: Option<f64>,
    /// Highest acceptable wind speed (km/h).
    pub max_wind_speed: Option<f64>,
    /// Highest acceptable precipitation (mm).
    pub max_precipitation: Option<f64>,
}

impl WeatherThresholds {
    /// Whether no limit is set.
    pub fn is_empty(&self) -> bool {
        self.min_temperature.is_none()
            && self.max_temperature.is_none()
            && self.max_wind_speed.is_none()
            && self.max_precipitation.is_none()
    }

    pub fn with_min_temperature(mut self, celsius: f64) -> Self {
        self.min_temperature = Some(celsius);
        self
    }

    pub fn with_max_temperature(mut self, celsius: f64) -> Self {
        self.max_temperature = Some(celsius);
        self
    }

    pub fn with_max_wind_speed(mut self, speed: f64) -> Self {
        self.max_wind_speed = Some(speed);
        self
    }

    pub fn with_max_precipitation(mut self, mm: f64) -> Self {
        self.max_precipitation = Some(mm);
        self
    }
}

/// Largest effort estimate a task may carry, roughly a century of hours.
pub const MAX_ESTIMATED_HOURS: f64 = 876_000.0;

/// A schedulable unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier.
    pub id: String,
    /// Owning project.
    pub project_id: String,
    /// Human-readable title.
    pub title: String,
    pub status: TaskStatus,
    pub priority: Priority,
    /// Free-form grouping (e.g. "irrigation", "harvest").
    pub category: String,
    /// Requested start. `None` = as soon as the planning anchor allows.
    pub start_date: Option<DateTime<Utc>>,
    /// Requested completion. Used for ordering and tardiness only.
    pub due_date: Option<DateTime<Utc>>,
    /// Whether the weather limits below gate this task.
    pub weather_dependent: bool,
    #[serde(flatten)]
    pub thresholds: WeatherThresholds,
    /// Planned effort in hours. `None` = the configured default (one day).
    pub estimated_hours: Option<f64>,
    /// Logged effort in hours.
    pub actual_hours: Option<f64>,
    /// Progress, 0..=100.
    pub completion_percentage: u8,
}

impl Task {
    /// Creates a task with the given ID in the given project.
    pub fn new(id: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            project_id: project_id.into(),
            title: String::new(),
            status: TaskStatus::Todo,
            priority: Priority::Medium,
            category: String::new(),
            start_date: None,
            due_date: None,
            weather_dependent: false,
            thresholds: WeatherThresholds::default(),
            estimated_hours: None,
            actual_hours: None,
            completion_percentage: 0,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_start_date(mut self, start: DateTime<Utc>) -> Self {
        self.start_date = Some(start);
        self
    }

    pub fn with_due_date(mut self, due: DateTime<Utc>) -> Self {
        self.due_date = Some(due);
        self
    }

    pub fn with_estimated_hours(mut self, hours: f64) -> Self {
        self.estimated_hours = Some(hours);
        self
    }

    /// Marks the task weather-dependent with the given limits.
    pub fn with_weather(mut self, thresholds: WeatherThresholds) -> Self {
        self.weather_dependent = true;
        self.thresholds = thresholds;
        self
    }

    /// Sets progress, clamped to 100.
    pub fn with_completion(mut self, percentage: u8) -> Self {
        self.completion_percentage = percentage.min(100);
        self
    }

    /// Planned duration, falling back to `default` when no estimate is set.
    ///
    /// Estimates are rounded to whole minutes; non-positive estimates
    /// also fall back to `default`. `None` when the estimate is above
    /// [`MAX_ESTIMATED_HOURS`] or infinite.
    pub fn duration(&self, default: Duration) -> Option<Duration> {
        match self.estimated_hours {
            Some(hours) if hours > MAX_ESTIMATED_HOURS => None,
            Some(hours) if hours > 0.0 => Duration::try_minutes((hours * 60.0).round() as i64),
            _ => Some(default),
        }
    }

    /// Whether weather limits apply to this task.
    pub fn is_weather_gated(&self) -> bool {
        self.weather_dependent && !self.thresholds.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_task_builder() {
        let start = Utc.with_ymd_and_hms(2026, 4, 1, 6, 0, 0).unwrap();
        let task = Task::new("T1", "P1")
            .with_title("Spray north field")
            .with_priority(Priority::High)
            .with_category("spraying")
            .with_start_date(start)
            .with_estimated_hours(6.0)
            .with_weather(WeatherThresholds::default().with_max_wind_speed(20.0))
            .with_completion(150);

        assert_eq!(task.id, "T1");
        assert_eq!(task.project_id, "P1");
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.start_date, Some(start));
        assert!(task.weather_dependent);
        assert_eq!(task.thresholds.max_wind_speed, Some(20.0));
        assert_eq!(task.completion_percentage, 100);
    }

    #[test]
    fn test_duration_default_and_estimate() {
        let day = Duration::days(1);
        assert_eq!(Task::new("T", "P").duration(day), Some(day));
        assert_eq!(
            Task::new("T", "P").with_estimated_hours(1.5).duration(day),
            Some(Duration::minutes(90))
        );
        assert_eq!(
            Task::new("T", "P").with_estimated_hours(0.0).duration(day),
            Some(day)
        );
    }

    #[test]
    fn test_duration_out_of_range() {
        let day = Duration::days(1);
        for hours in [f64::INFINITY, 1e10, MAX_ESTIMATED_HOURS + 1.0] {
            assert_eq!(
                Task::new("T", "P").with_estimated_hours(hours).duration(day),
                None,
                "{hours}"
            );
        }
        assert_eq!(
            Task::new("T", "P")
                .with_estimated_hours(MAX_ESTIMATED_HOURS)
                .duration(day),
            Some(Duration::hours(876_000))
        );
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
    }

    #[test]
    fn test_weather_gate_requires_thresholds() {
        let mut task = Task::new("T", "P");
        task.weather_dependent = true;
        assert!(!task.is_weather_gated());

        let task = task.with_weather(WeatherThresholds::default().with_min_temperature(5.0));
        assert!(task.is_weather_gated());
    }

    #[test]
    fn test_settled_status() {
        assert!(TaskStatus::Done.is_settled());
        assert!(TaskStatus::Cancelled.is_settled());
        assert!(!TaskStatus::Waiting.is_settled());
    }

    #[test]
    fn test_serde_field_names() {
        let task = Task::new("T1", "P1")
            .with_status(TaskStatus::InProgress)
            .with_weather(WeatherThresholds::default().with_max_precipitation(2.0));
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["status"], "in_progress");
        assert_eq!(json["max_precipitation"], 2.0);
        assert_eq!(json["priority"], "medium");
    }
}

//! Scheduler configuration.
//!
//! Hosts usually embed this in their own TOML file:
//!
//! ```toml
//! default_task_hours = 8.0
//! search_horizon_hours = 336
//! max_commit_attempts = 5
//! step = { fixed_minutes = 30 }
//! ```

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::ScheduleError;
use crate::models::MAX_ESTIMATED_HOURS;

/// Longest search horizon accepted, in hours.
pub const MAX_SEARCH_HORIZON_HOURS: i64 = 876_000;

const MAX_STEP_MINUTES: i64 = MAX_SEARCH_HORIZON_HOURS * 60;

/// How far the Recommender moves between candidate starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepPolicy {
    /// Short step for sub-day tasks, long step otherwise.
    #[default]
    Auto,
    /// Always the given number of minutes.
    FixedMinutes(i64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Duration of tasks with no estimate.
    #[serde(default = "default_task_hours")]
    pub default_task_hours: f64,
    /// How far past the anchor the Recommender may look.
    #[serde(default = "default_search_horizon_hours")]
    pub search_horizon_hours: i64,
    /// Cap on resource push steps per run. `None` scales with task count.
    #[serde(default)]
    pub max_iterations: Option<usize>,
    /// Optimistic commit retries before giving up.
    #[serde(default = "default_max_commit_attempts")]
    pub max_commit_attempts: u32,
    #[serde(default)]
    pub step: StepPolicy,
    #[serde(default = "default_auto_step_short_minutes")]
    pub auto_step_short_minutes: i64,
    #[serde(default = "default_auto_step_long_minutes")]
    pub auto_step_long_minutes: i64,
}

fn default_task_hours() -> f64 {
    24.0
}

fn default_search_horizon_hours() -> i64 {
    14 * 24
}

fn default_max_commit_attempts() -> u32 {
    3
}

fn default_auto_step_short_minutes() -> i64 {
    60
}

fn default_auto_step_long_minutes() -> i64 {
    24 * 60
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_task_hours: default_task_hours(),
            search_horizon_hours: default_search_horizon_hours(),
            max_iterations: None,
            max_commit_attempts: default_max_commit_attempts(),
            step: StepPolicy::Auto,
            auto_step_short_minutes: default_auto_step_short_minutes(),
            auto_step_long_minutes: default_auto_step_long_minutes(),
        }
    }
}

impl SchedulerConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ScheduleError> {
        let config: Self = toml::from_str(source)
            .map_err(|e| ScheduleError::Config(format!("failed to parse scheduler config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that would stall or invert the search.
    pub fn validate(&self) -> Result<(), ScheduleError> {
        let fail = |msg: &str| Err(ScheduleError::Config(msg.to_string()));
        if !(self.default_task_hours > 0.0 && self.default_task_hours <= MAX_ESTIMATED_HOURS) {
            return fail("default_task_hours must be positive and at most 876000");
        }
        if !(1..=MAX_SEARCH_HORIZON_HOURS).contains(&self.search_horizon_hours) {
            return fail("search_horizon_hours must be between 1 and 876000");
        }
        if self.max_commit_attempts == 0 {
            return fail("max_commit_attempts must be at least 1");
        }
        let step_ok = |m: i64| (1..=MAX_STEP_MINUTES).contains(&m);
        if !step_ok(self.auto_step_short_minutes) || !step_ok(self.auto_step_long_minutes) {
            return fail("auto step sizes must be positive and within the horizon limit");
        }
        if let StepPolicy::FixedMinutes(m) = self.step {
            if !step_ok(m) {
                return fail("fixed step must be positive and within the horizon limit");
            }
        }
        Ok(())
    }

    pub fn with_default_task_hours(mut self, hours: f64) -> Self {
        self.default_task_hours = hours;
        self
    }

    pub fn with_search_horizon_hours(mut self, hours: i64) -> Self {
        self.search_horizon_hours = hours;
        self
    }

    pub fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = Some(iterations);
        self
    }

    pub fn with_max_commit_attempts(mut self, attempts: u32) -> Self {
        self.max_commit_attempts = attempts;
        self
    }

    pub fn with_step(mut self, step: StepPolicy) -> Self {
        self.step = step;
        self
    }

    /// Duration of tasks without an estimate. Out-of-range values are
    /// clamped; [`validate`](Self::validate) rejects them.
    pub fn default_duration(&self) -> Duration {
        let hours = self.default_task_hours.clamp(1.0 / 60.0, MAX_ESTIMATED_HOURS);
        Duration::minutes((hours * 60.0).round() as i64)
    }

    pub fn search_horizon(&self) -> Duration {
        Duration::hours(self.search_horizon_hours.clamp(1, MAX_SEARCH_HORIZON_HOURS))
    }

    /// Resource push steps allowed for a run over `task_count` tasks.
    pub fn iteration_budget(&self, task_count: usize) -> usize {
        self.max_iterations.unwrap_or(16 * task_count + 64)
    }

    /// Candidate step for a task of the given length.
    pub fn step_for(&self, task_duration: Duration) -> Duration {
        let minutes = match self.step {
            StepPolicy::FixedMinutes(m) => m,
            StepPolicy::Auto if task_duration < Duration::days(1) => self.auto_step_short_minutes,
            StepPolicy::Auto => self.auto_step_long_minutes,
        };
        Duration::minutes(minutes.clamp(1, MAX_STEP_MINUTES))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = SchedulerConfig::default();
        assert_eq!(c.default_duration(), Duration::days(1));
        assert_eq!(c.search_horizon(), Duration::days(14));
        assert_eq!(c.iteration_budget(10), 224);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_auto_step() {
        let c = SchedulerConfig::default();
        assert_eq!(c.step_for(Duration::hours(4)), Duration::hours(1));
        assert_eq!(c.step_for(Duration::days(2)), Duration::days(1));

        let fixed = c.with_step(StepPolicy::FixedMinutes(15));
        assert_eq!(fixed.step_for(Duration::days(2)), Duration::minutes(15));
    }

    #[test]
    fn test_from_toml() {
        let c = SchedulerConfig::from_toml_str(
            r#"
            default_task_hours = 8.0
            max_iterations = 500
            step = { fixed_minutes = 30 }
            "#,
        )
        .unwrap();
        assert_eq!(c.default_duration(), Duration::hours(8));
        assert_eq!(c.iteration_budget(1000), 500);
        assert_eq!(c.step, StepPolicy::FixedMinutes(30));
        assert_eq!(c.max_commit_attempts, 3);
    }

    #[test]
    fn test_from_toml_auto_step() {
        let c = SchedulerConfig::from_toml_str(r#"step = "auto""#).unwrap();
        assert_eq!(c.step, StepPolicy::Auto);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = SchedulerConfig::from_toml_str("horizon_days = 3").unwrap_err();
        assert!(matches!(err, ScheduleError::Config(_)));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(SchedulerConfig::from_toml_str("search_horizon_hours = 0").is_err());
        assert!(SchedulerConfig::from_toml_str("max_commit_attempts = 0").is_err());
        assert!(SchedulerConfig::default()
            .with_step(StepPolicy::FixedMinutes(-5))
            .validate()
            .is_err());
    }

    #[test]
    fn test_out_of_range_values() {
        let c = SchedulerConfig::default().with_default_task_hours(f64::INFINITY);
        assert!(c.validate().is_err());
        assert_eq!(c.default_duration(), Duration::hours(876_000));

        let c = SchedulerConfig::default().with_search_horizon_hours(i64::MAX);
        assert!(c.validate().is_err());
        assert_eq!(c.search_horizon(), Duration::hours(MAX_SEARCH_HORIZON_HOURS));

        let c = SchedulerConfig::default().with_step(StepPolicy::FixedMinutes(i64::MAX));
        assert!(c.validate().is_err());
        assert_eq!(
            c.step_for(Duration::hours(1)),
            Duration::minutes(MAX_STEP_MINUTES)
        );
    }
}

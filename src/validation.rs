//! Input validation for scheduling requests.
//!
//! Checks structural integrity of a project and its resources before
//! scheduling. Detects:
//! - Duplicate IDs
//! - Requirements naming unknown tasks or resources
//! - Dependencies naming unknown tasks
//! - Inverted temperature ranges
//! - Effort estimates that are negative, not finite, or implausibly large
//! - Completion above 100%
//!
//! Cycles are not checked here. The graph builder reports them with the
//! offending path, which is more useful than a validation message.

use std::collections::HashSet;

use crate::models::{Project, Resource, MAX_ESTIMATED_HOURS};

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Two entities share the same ID.
    DuplicateId,
    /// A requirement references a resource that doesn't exist.
    InvalidResourceReference,
    /// A requirement or dependency references a task that doesn't exist.
    InvalidTaskReference,
    /// `min_temperature` is above `max_temperature`.
    InvalidThresholds,
    /// Estimated or actual hours are negative, non-finite or above
    /// [`MAX_ESTIMATED_HOURS`].
    InvalidEstimate,
    /// `completion_percentage` is above 100.
    InvalidCompletion,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// Validates a project and the resources it draws on.
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn validate_input(project: &Project, resources: &[Resource]) -> ValidationResult {
    let mut errors = Vec::new();

    let mut resource_ids = HashSet::new();
    for r in resources {
        if !resource_ids.insert(r.id.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate resource ID: {}", r.id),
            ));
        }
    }

    let mut task_ids = HashSet::new();
    for task in &project.tasks {
        if !task_ids.insert(task.id.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate task ID: {}", task.id),
            ));
        }

        if let (Some(min), Some(max)) = (
            task.thresholds.min_temperature,
            task.thresholds.max_temperature,
        ) {
            if min > max {
                errors.push(ValidationError::new(
                    ValidationErrorKind::InvalidThresholds,
                    format!(
                        "Task '{}' has min_temperature {min} above max_temperature {max}",
                        task.id
                    ),
                ));
            }
        }

        for (field, hours) in [
            ("estimated_hours", task.estimated_hours),
            ("actual_hours", task.actual_hours),
        ] {
            if let Some(h) = hours {
                if !(0.0..=MAX_ESTIMATED_HOURS).contains(&h) {
                    errors.push(ValidationError::new(
                        ValidationErrorKind::InvalidEstimate,
                        format!("Task '{}' has invalid {field}: {h}", task.id),
                    ));
                }
            }
        }

        if task.completion_percentage > 100 {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidCompletion,
                format!(
                    "Task '{}' is {}% complete",
                    task.id, task.completion_percentage
                ),
            ));
        }
    }

    for req in &project.task_resources {
        if !task_ids.contains(req.task_id.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidTaskReference,
                format!(
                    "Requirement on '{}' references unknown task '{}'",
                    req.resource_id, req.task_id
                ),
            ));
        }
        if !resource_ids.contains(req.resource_id.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidResourceReference,
                format!(
                    "Task '{}' references unknown resource '{}'",
                    req.task_id, req.resource_id
                ),
            ));
        }
    }

    for dep in &project.dependencies {
        for id in [&dep.task_id, &dep.dependent_on_id] {
            if !task_ids.contains(id.as_str()) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::InvalidTaskReference,
                    format!(
                        "Dependency '{}' on '{}' references unknown task '{id}'",
                        dep.task_id, dep.dependent_on_id
                    ),
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Dependency, Task, TaskResource, WeatherThresholds};

    fn sample_resources() -> Vec<Resource> {
        vec![
            Resource::new("tractor").with_capacity(2),
            Resource::new("crew").with_capacity(6),
        ]
    }

    fn sample_project() -> Project {
        Project::new("P1")
            .with_task(Task::new("plough", "P1").with_estimated_hours(8.0))
            .with_task(Task::new("sow", "P1"))
            .with_dependency(Dependency::finish_to_start("sow", "plough"))
            .with_requirement(TaskResource::new("plough", "tractor", 1))
            .with_requirement(TaskResource::new("sow", "crew", 3))
    }

    #[test]
    fn test_valid_input() {
        assert!(validate_input(&sample_project(), &sample_resources()).is_ok());
    }

    #[test]
    fn test_duplicate_task_id() {
        let project = sample_project().with_task(Task::new("sow", "P1"));
        let errors = validate_input(&project, &sample_resources()).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::DuplicateId));
    }

    #[test]
    fn test_duplicate_resource_id() {
        let resources = vec![
            Resource::new("tractor"),
            Resource::new("tractor"),
            Resource::new("crew"),
        ];
        let errors = validate_input(&sample_project(), &resources).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::DuplicateId && e.message.contains("resource")));
    }

    #[test]
    fn test_invalid_resource_reference() {
        let project = sample_project().with_requirement(TaskResource::new("sow", "drone", 1));
        let errors = validate_input(&project, &sample_resources()).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ValidationErrorKind::InvalidResourceReference);
    }

    #[test]
    fn test_invalid_task_reference() {
        let project = sample_project()
            .with_dependency(Dependency::finish_to_start("harvest", "sow"))
            .with_requirement(TaskResource::new("ghost", "crew", 1));
        let errors = validate_input(&project, &sample_resources()).unwrap_err();
        assert_eq!(
            errors
                .iter()
                .filter(|e| e.kind == ValidationErrorKind::InvalidTaskReference)
                .count(),
            2
        );
    }

    #[test]
    fn test_inverted_temperature_range() {
        let project = sample_project().with_task(Task::new("graft", "P1").with_weather(
            WeatherThresholds::default()
                .with_min_temperature(20.0)
                .with_max_temperature(10.0),
        ));
        let errors = validate_input(&project, &sample_resources()).unwrap_err();
        assert_eq!(errors[0].kind, ValidationErrorKind::InvalidThresholds);
    }

    #[test]
    fn test_bad_estimate_and_completion() {
        let mut task = Task::new("weed", "P1").with_estimated_hours(-2.0);
        task.completion_percentage = 140;
        let project = sample_project().with_task(task);

        let errors = validate_input(&project, &sample_resources()).unwrap_err();
        let kinds: Vec<_> = errors.iter().map(|e| e.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![ValidationErrorKind::InvalidEstimate, ValidationErrorKind::InvalidCompletion]
        );
    }

    #[test]
    fn test_rejects_unbounded_estimates() {
        for hours in [f64::INFINITY, f64::NAN, 1e10] {
            let project =
                sample_project().with_task(Task::new("haul", "P1").with_estimated_hours(hours));
            let errors = validate_input(&project, &sample_resources()).unwrap_err();
            assert_eq!(errors.len(), 1, "{hours}");
            assert_eq!(errors[0].kind, ValidationErrorKind::InvalidEstimate);
        }

        let mut task = Task::new("haul", "P1").with_estimated_hours(MAX_ESTIMATED_HOURS);
        task.actual_hours = Some(f64::NEG_INFINITY);
        let project = sample_project().with_task(task);
        let errors = validate_input(&project, &sample_resources()).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("actual_hours"));
    }

    #[test]
    fn test_cycles_left_to_graph_builder() {
        let project =
            sample_project().with_dependency(Dependency::finish_to_start("plough", "sow"));
        assert!(validate_input(&project, &sample_resources()).is_ok());
    }

    #[test]
    fn test_multiple_errors() {
        let project = sample_project().with_task(Task::new("plough", "P1"));
        let errors = validate_input(&project, &[]).unwrap_err();
        // Duplicate task plus two unknown resources.
        assert_eq!(errors.len(), 3);
    }
}

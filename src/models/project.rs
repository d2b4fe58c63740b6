//! Project: the unit of scheduling.
//!
//! A project owns its tasks together with the dependency edges and resource
//! requirements between them. One scheduling run covers exactly one project.

use serde::{Deserialize, Serialize};

use super::{Dependency, Task, TaskResource};

/// A project's task set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub tasks: Vec<Task>,
    pub dependencies: Vec<Dependency>,
    pub task_resources: Vec<TaskResource>,
}

impl Project {
    /// Creates an empty project.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Adds a task, stamping it with this project's id.
    pub fn with_task(mut self, mut task: Task) -> Self {
        task.project_id = self.id.clone();
        self.tasks.push(task);
        self
    }

    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn with_requirement(mut self, requirement: TaskResource) -> Self {
        self.task_resources.push(requirement);
        self
    }

    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    pub fn task_mut(&mut self, task_id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == task_id)
    }

    /// Requirements declared by one task.
    pub fn requirements_for(&self, task_id: &str) -> Vec<&TaskResource> {
        self.task_resources
            .iter()
            .filter(|r| r.task_id == task_id)
            .collect()
    }

    /// Deletes a task along with every dependency edge and resource
    /// requirement that mentions it.
    ///
    /// Returns the removed task, or `None` if it was not in the project.
    /// Reservations already committed to a ledger are released separately
    /// (see `SchedulingEngine::remove_task`).
    pub fn remove_task(&mut self, task_id: &str) -> Option<Task> {
        let pos = self.tasks.iter().position(|t| t.id == task_id)?;
        let task = self.tasks.remove(pos);
        self.dependencies.retain(|d| !d.involves(task_id));
        self.task_resources.retain(|r| r.task_id != task_id);
        Some(task)
    }
}

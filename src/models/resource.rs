//! Resource model.
//!
//! Resources are the shared things field work draws on: tractors, sprayers,
//! crews, water allocations. Each has an integral capacity; tasks declare how
//! many units they need while they run.

use serde::{Deserialize, Serialize};

/// A shared resource with a fixed number of simultaneously usable units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Unique resource identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Units available at any instant.
    pub capacity: u32,
    /// Unit label ("machines", "workers", "m3/h").
    pub unit: String,
}

impl Resource {
    /// Creates a resource with capacity 1.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            capacity: 1,
            unit: String::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }
}

/// A task's demand on a resource.
///
/// `quantity_required` is what the scheduler reserves. `quantity_used`
/// accumulates as work is logged and never feeds back into scheduling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResource {
    pub task_id: String,
    pub resource_id: String,
    pub quantity_required: u32,
    pub quantity_used: u32,
}

impl TaskResource {
    /// Creates a requirement with nothing used yet.
    pub fn new(
        task_id: impl Into<String>,
        resource_id: impl Into<String>,
        quantity_required: u32,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            resource_id: resource_id.into(),
            quantity_required,
            quantity_used: 0,
        }
    }

    pub fn with_used(mut self, quantity_used: u32) -> Self {
        self.quantity_used = quantity_used;
        self
    }

    /// Units used beyond the requirement, if any.
    pub fn overrun(&self) -> Option<u32> {
        self.quantity_used
            .checked_sub(self.quantity_required)
            .filter(|&over| over > 0)
    }
}

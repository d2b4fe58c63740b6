//! Per-run inputs shared by the propagator and the recommender.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use crate::error::CapacityError;
use crate::ledger::LedgerView;
use crate::models::{Calendar, TaskResource, TimeWindow};

/// Time frame of one scheduling run.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanningHorizon {
    /// Start for tasks with no requested start date.
    pub anchor: DateTime<Utc>,
    /// Latest finish the recommender may propose.
    pub end: DateTime<Utc>,
    pub calendar: Calendar,
}

impl PlanningHorizon {
    /// A horizon of `length` from `anchor`, saturating at the latest
    /// representable instant.
    pub fn new(anchor: DateTime<Utc>, length: Duration) -> Self {
        Self {
            anchor,
            end: anchor
                .checked_add_signed(length)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            calendar: Calendar::always_available(),
        }
    }

    pub fn with_calendar(mut self, calendar: Calendar) -> Self {
        self.calendar = calendar;
        self
    }
}

/// Units of one resource a task holds while it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Demand {
    pub resource_id: String,
    pub quantity: u32,
}

/// Resource demand of every task in a project, keyed by task id.
#[derive(Debug, Clone, Default)]
pub struct ResourceDemand {
    by_task: HashMap<String, Vec<Demand>>,
}

impl ResourceDemand {
    /// Collects `quantity_required` per task. Repeated rows for the same
    /// task and resource add up; zero quantities are dropped.
    pub fn from_requirements(requirements: &[TaskResource]) -> Self {
        let mut by_task: HashMap<String, Vec<Demand>> = HashMap::new();
        for req in requirements {
            if let Some(over) = req.overrun() {
                warn!(
                    task = %req.task_id,
                    resource = %req.resource_id,
                    required = req.quantity_required,
                    used = req.quantity_used,
                    overrun = over,
                    "resource usage exceeds requirement"
                );
            }
            if req.quantity_required == 0 {
                continue;
            }
            let demands = by_task.entry(req.task_id.clone()).or_default();
            match demands.iter_mut().find(|d| d.resource_id == req.resource_id) {
                Some(d) => d.quantity = d.quantity.saturating_add(req.quantity_required),
                None => demands.push(Demand {
                    resource_id: req.resource_id.clone(),
                    quantity: req.quantity_required,
                }),
            }
        }
        for demands in by_task.values_mut() {
            demands.sort_by(|a, b| a.resource_id.cmp(&b.resource_id));
        }
        Self { by_task }
    }

    /// Demands of one task, sorted by resource id.
    pub fn for_task(&self, task_id: &str) -> &[Demand] {
        self.by_task.get(task_id).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Why a window does not fit on the resources.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ResourceMiss {
    /// Not enough room now; retry at the contained start if any.
    Capacity(CapacityError),
    /// The resource is not in the view at all.
    Unknown(String),
}

impl ResourceMiss {
    pub(crate) fn retry_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Capacity(c) => c.retry_at,
            Self::Unknown(_) => None,
        }
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            Self::Capacity(c) => c.to_string(),
            Self::Unknown(id) => format!("resource '{id}' is not registered"),
        }
    }
}

/// First resource on which `window` does not fit, in resource id order.
pub(crate) fn first_resource_miss(
    view: &LedgerView,
    demands: &[Demand],
    window: &TimeWindow,
) -> Option<ResourceMiss> {
    demands.iter().find_map(|d| {
        let (Some(capacity), Some(profile)) = (
            view.capacity(&d.resource_id),
            view.profile(&d.resource_id),
        ) else {
            return Some(ResourceMiss::Unknown(d.resource_id.clone()));
        };
        profile
            .check(&d.resource_id, capacity, d.quantity, window)
            .err()
            .map(ResourceMiss::Capacity)
    })
}

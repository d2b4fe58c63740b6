//! Scheduling engine: one run per project, shared resources across runs.
//!
//! A run validates its request, builds the dependency graph, propagates
//! against a private view of the shared [`ResourceLedger`], commits the
//! resulting reservations with an optimistic version check, and publishes
//! an immutable [`ScheduleSnapshot`]. Runs for different projects may
//! execute on different threads; the ledger is the only state they share.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::error::{LedgerError, ScheduleError};
use crate::graph::DependencyGraph;
use crate::ledger::ResourceLedger;
use crate::models::{Calendar, Project, Resource, ScheduleSnapshot, WeatherFeed};
use crate::scheduler::{PlanningHorizon, ResourceDemand, Scheduler, SchedulerConfig};
use crate::validation::validate_input;

/// Input for one scheduling run.
#[derive(Debug, Clone)]
pub struct ScheduleRequest {
    /// The project to schedule.
    pub project: Project,
    /// Resources the project's tasks draw on. Registered with the ledger
    /// (or updated to this capacity) at the start of the run.
    pub resources: Vec<Resource>,
    /// Blocked periods.
    pub calendar: Calendar,
    /// Default start for tasks without a requested start date.
    pub anchor: DateTime<Utc>,
    /// Overrides the configured search horizon.
    pub horizon: Option<Duration>,
}

impl ScheduleRequest {
    /// Creates a new schedule request.
    pub fn new(project: Project, anchor: DateTime<Utc>) -> Self {
        Self {
            project,
            resources: Vec::new(),
            calendar: Calendar::always_available(),
            anchor,
            horizon: None,
        }
    }

    pub fn with_resources(mut self, resources: Vec<Resource>) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_calendar(mut self, calendar: Calendar) -> Self {
        self.calendar = calendar;
        self
    }

    pub fn with_horizon(mut self, horizon: Duration) -> Self {
        self.horizon = Some(horizon);
        self
    }
}

/// Latest published snapshot per project.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    latest: RwLock<HashMap<String, Arc<ScheduleSnapshot>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self, project_id: &str) -> Option<Arc<ScheduleSnapshot>> {
        // A writer can only panic between whole-map operations, so a
        // poisoned map is still consistent.
        let latest = self.latest.read().unwrap_or_else(PoisonError::into_inner);
        latest.get(project_id).cloned()
    }

    /// Stamps the next version onto `snapshot` and makes it current.
    pub fn publish(&self, mut snapshot: ScheduleSnapshot) -> Arc<ScheduleSnapshot> {
        let mut latest = self.latest.write().unwrap_or_else(PoisonError::into_inner);
        snapshot.version = latest
            .get(&snapshot.project_id)
            .map_or(1, |prev| prev.version + 1);
        let snapshot = Arc::new(snapshot);
        latest.insert(snapshot.project_id.clone(), Arc::clone(&snapshot));
        snapshot
    }

    /// Drops a project's snapshot. Returns the one removed, if any.
    pub fn forget(&self, project_id: &str) -> Option<Arc<ScheduleSnapshot>> {
        let mut latest = self.latest.write().unwrap_or_else(PoisonError::into_inner);
        latest.remove(project_id)
    }
}

/// Entry point for scheduling runs.
///
/// # Example
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use fieldplan::engine::{ScheduleRequest, SchedulingEngine};
/// use fieldplan::models::{Dependency, Forecast, Project, Task};
///
/// let day0 = Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap();
/// let project = Project::new("north")
///     .with_task(Task::new("plough", "north"))
///     .with_task(Task::new("sow", "north"))
///     .with_dependency(Dependency::finish_to_start("sow", "plough"));
///
/// let engine = SchedulingEngine::default();
/// let forecast = Forecast::empty(chrono::Duration::hours(1));
/// let snapshot = engine.run(&ScheduleRequest::new(project, day0), &forecast).unwrap();
///
/// assert!(snapshot.is_fully_feasible());
/// assert_eq!(snapshot.order, vec!["plough", "sow"]);
/// ```
#[derive(Debug)]
pub struct SchedulingEngine {
    ledger: Arc<ResourceLedger>,
    store: SnapshotStore,
    scheduler: Scheduler,
}

impl Default for SchedulingEngine {
    fn default() -> Self {
        Self::new(Arc::new(ResourceLedger::new()), SchedulerConfig::default())
    }
}

impl SchedulingEngine {
    /// Creates an engine over a (possibly shared) ledger.
    pub fn new(ledger: Arc<ResourceLedger>, config: SchedulerConfig) -> Self {
        Self {
            ledger,
            store: SnapshotStore::new(),
            scheduler: Scheduler::new(config),
        }
    }

    pub fn ledger(&self) -> &Arc<ResourceLedger> {
        &self.ledger
    }

    pub fn config(&self) -> &SchedulerConfig {
        self.scheduler.config()
    }

    /// Latest published snapshot for a project.
    pub fn latest(&self, project_id: &str) -> Option<Arc<ScheduleSnapshot>> {
        self.store.latest(project_id)
    }

    /// Schedules one project end to end.
    ///
    /// A dependency cycle aborts the run before anything is planned or
    /// committed. Per-task problems do not fail the run; they appear in
    /// the snapshot's results.
    pub fn run<F: WeatherFeed + ?Sized>(
        &self,
        request: &ScheduleRequest,
        feed: &F,
    ) -> Result<Arc<ScheduleSnapshot>, ScheduleError> {
        let project = &request.project;
        self.config().validate()?;
        validate_input(project, &request.resources).map_err(|errors| {
            warn!(project = %project.id, problems = errors.len(), "scheduling request rejected");
            ScheduleError::Invalid(errors)
        })?;

        for resource in &request.resources {
            self.ledger.register(resource)?;
        }

        let graph = DependencyGraph::build(&project.id, &project.tasks, &project.dependencies)?;
        let demand = ResourceDemand::from_requirements(&project.task_resources);
        let horizon = PlanningHorizon::new(
            request.anchor,
            request.horizon.unwrap_or_else(|| self.config().search_horizon()),
        )
        .with_calendar(request.calendar.clone());

        let attempts = self.config().max_commit_attempts;
        for attempt in 1..=attempts {
            let view = self.ledger.view(Some(&project.id))?;
            let outcome = self.scheduler.schedule(&graph, &demand, &view, feed, &horizon);

            match self.ledger.commit(&project.id, &view, outcome.reservations) {
                Ok(committed) => {
                    let snapshot = self.store.publish(ScheduleSnapshot::new(
                        project.id.clone(),
                        outcome.order,
                        outcome.results,
                        committed,
                    ));
                    info!(
                        project = %project.id,
                        version = snapshot.version,
                        feasible = snapshot.feasible_count(),
                        tasks = snapshot.results.len(),
                        "schedule published"
                    );
                    return Ok(snapshot);
                }
                Err(LedgerError::StaleView { resource_id }) => {
                    info!(
                        project = %project.id,
                        resource = %resource_id,
                        attempt,
                        "resources changed during planning, replanning"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(project = %project.id, attempts, "commit contention, giving up");
        Err(ScheduleError::CommitContention { attempts })
    }

    /// Releases a deleted task's reservations. Returns how many went.
    ///
    /// The task's edges and requirements are dropped with
    /// [`Project::remove_task`]; the next run publishes a snapshot without it.
    pub fn remove_task(&self, project_id: &str, task_id: &str) -> Result<usize, ScheduleError> {
        let released = self.ledger.release_task(project_id, task_id)?;
        debug!(project = project_id, task = task_id, released, "task reservations released");
        Ok(released)
    }

    /// Releases every reservation a project holds and forgets its snapshot.
    pub fn remove_project(&self, project_id: &str) -> Result<usize, ScheduleError> {
        let released = self.ledger.release_project(project_id)?;
        self.store.forget(project_id);
        Ok(released)
    }
}

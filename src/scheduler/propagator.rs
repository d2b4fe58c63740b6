//! Constraint propagation over the dependency graph.
//!
//! # Algorithm
//!
//! Tasks are visited once each, in dependency order (Kahn, with the dispatch
//! tie-break). For each task:
//!
//! 1. Lower bound = requested start (or the horizon anchor), raised by every
//!    placed predecessor through its edge type.
//! 2. Resource push: while some required resource is short over
//!    `[start, start + duration)`, move `start` to that resource's earliest
//!    fit. Each move costs one iteration from the run's shared budget.
//! 3. The final window is checked against the calendar and the weather.
//! 4. A clean window is feasible and its reservations are held tentatively
//!    in the run's private ledger view. Otherwise the recommender searches
//!    for an alternative; a found alternative is what successors build on.
//!
//! Successors are visited after their predecessors, so a push or an
//! alternative cascades forward without revisiting anything. Only feasible
//! windows end up in [`ScheduleOutcome::reservations`].
//!
//! # Complexity
//! O(n + e) graph work plus O(p * r^2) per resource check, where p is the
//! number of pushes and r the reservations on the resource.

use chrono::Duration;
use tracing::{debug, info, warn};

use super::config::SchedulerConfig;
use super::inputs::{first_resource_miss, Demand, PlanningHorizon, ResourceDemand};
use super::recommend::{Recommendation, Recommender, SearchRequest};
use crate::graph::DependencyGraph;
use crate::ledger::{LedgerView, ResourceProfile};
use crate::models::{
    InfeasibilityReason, Reservation, ScheduleResult, Task, TaskStatus, TimeWindow, Violation,
    WeatherFeed,
};
use crate::weather::evaluate;

/// Where a visited task ended up, as seen by its successors.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Placement {
    /// Successors are bounded by this window.
    Window(TimeWindow),
    /// Cancelled: ignored by successors.
    Ignored,
    /// No window at all: successors cannot be anchored.
    Missing,
}

/// Result of one propagation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleOutcome {
    /// Task ids in visiting order.
    pub order: Vec<String>,
    /// One result per task, in visiting order.
    pub results: Vec<ScheduleResult>,
    /// Reservations for feasible tasks, ready to commit.
    pub reservations: Vec<Reservation>,
    /// Resource push steps spent.
    pub iterations: usize,
}

impl ScheduleOutcome {
    pub fn result(&self, task_id: &str) -> Option<&ScheduleResult> {
        self.results.iter().find(|r| r.task_id == task_id)
    }
}

/// Dependency-, resource- and weather-aware scheduler.
///
/// Pure with respect to its inputs: the ledger view is cloned, never
/// written back.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Schedules every task of `graph`.
    pub fn schedule<F: WeatherFeed + ?Sized>(
        &self,
        graph: &DependencyGraph,
        demand: &ResourceDemand,
        view: &LedgerView,
        feed: &F,
        horizon: &PlanningHorizon,
    ) -> ScheduleOutcome {
        let mut run = Run {
            config: &self.config,
            recommender: Recommender::new(&self.config),
            graph,
            demand,
            feed,
            horizon,
            work: view.clone(),
            placement: vec![Placement::Missing; graph.len()],
            budget: self.config.iteration_budget(graph.len()),
            iterations: 0,
            reservations: Vec::new(),
        };

        let order = graph.topological_order();
        let results: Vec<ScheduleResult> = order.iter().map(|&i| run.visit(i)).collect();

        let infeasible = results.iter().filter(|r| !r.feasible).count();
        info!(
            project = graph.project_id(),
            tasks = results.len(),
            infeasible,
            iterations = run.iterations,
            "schedule propagated"
        );

        ScheduleOutcome {
            order: order.iter().map(|&i| graph.task(i).id.clone()).collect(),
            results,
            reservations: run.reservations,
            iterations: run.iterations,
        }
    }
}

/// Mutable state of one pass.
struct Run<'a, F: ?Sized> {
    config: &'a SchedulerConfig,
    recommender: Recommender<'a>,
    graph: &'a DependencyGraph,
    demand: &'a ResourceDemand,
    feed: &'a F,
    horizon: &'a PlanningHorizon,
    /// Ledger view plus this run's tentative reservations.
    work: LedgerView,
    placement: Vec<Placement>,
    budget: usize,
    iterations: usize,
    reservations: Vec<Reservation>,
}

impl<'a, F: WeatherFeed + ?Sized> Run<'a, F> {
    fn visit(&mut self, index: usize) -> ScheduleResult {
        let task = self.graph.task(index);
        let Some(duration) = task.duration(self.config.default_duration()) else {
            warn!(task = %task.id, hours = ?task.estimated_hours, "estimate out of range");
            self.placement[index] = Placement::Missing;
            let start = task.start_date.unwrap_or(self.horizon.anchor);
            return ScheduleResult::infeasible(
                &task.id,
                TimeWindow::new(start, start),
                vec![InfeasibilityReason::Unschedulable],
            )
            .with_notes(vec!["estimated hours out of range".to_string()]);
        };

        if task.status.is_settled() {
            return self.pin_settled(index, task, duration);
        }

        // 1. Dependency lower bound.
        let mut lower = task.start_date.unwrap_or(self.horizon.anchor);
        let mut blocked_by = Vec::new();
        for edge in self.graph.predecessors(index) {
            match self.placement[edge.from] {
                Placement::Window(w) => {
                    lower = lower.max(edge.kind.earliest_successor_start(&w, duration));
                }
                Placement::Ignored => {}
                Placement::Missing => blocked_by.push(self.graph.task(edge.from).id.clone()),
            }
        }
        if !blocked_by.is_empty() {
            self.placement[index] = Placement::Missing;
            debug!(task = %task.id, ?blocked_by, "predecessor has no window");
            return ScheduleResult::infeasible(
                &task.id,
                TimeWindow::starting_at(lower, duration),
                vec![InfeasibilityReason::PredecessorInfeasible],
            )
            .with_notes(
                blocked_by
                    .into_iter()
                    .map(|id| format!("predecessor '{id}' has no window"))
                    .collect(),
            );
        }

        // 2. Resource push.
        let demands = self.demand.for_task(&task.id);
        let mut start = lower;
        let mut reasons = Vec::new();
        let mut notes = Vec::new();
        loop {
            let window = TimeWindow::starting_at(start, duration);
            let Some(miss) = first_resource_miss(&self.work, demands, &window) else {
                break;
            };
            match miss.retry_at() {
                Some(next) if next > start => {
                    if self.budget == 0 {
                        warn!(
                            task = %task.id,
                            iterations = self.iterations,
                            "iteration cap reached"
                        );
                        self.placement[index] = Placement::Missing;
                        return ScheduleResult::infeasible(
                            &task.id,
                            window,
                            vec![InfeasibilityReason::Unschedulable],
                        )
                        .with_notes(vec![format!(
                            "gave up after {} resource push steps",
                            self.iterations
                        )]);
                    }
                    self.budget -= 1;
                    self.iterations += 1;
                    debug!(
                        task = %task.id,
                        from = %start,
                        to = %next,
                        "pushed by resource contention"
                    );
                    start = next;
                }
                _ => {
                    reasons.push(InfeasibilityReason::ResourceConflict);
                    notes.push(miss.describe());
                    break;
                }
            }
        }
        let window = TimeWindow::starting_at(start, duration);
        if start > lower {
            notes.push(format!("delayed from {} by resource contention", lower.to_rfc3339()));
        }

        // 3. Calendar and weather.
        let blocked = self.horizon.calendar.conflicts(&window);
        if !blocked.is_empty() {
            reasons.push(InfeasibilityReason::CalendarUnavailable);
            notes.extend(blocked.iter().map(|b| {
                format!("unavailable from {} to {}", b.start.to_rfc3339(), b.end.to_rfc3339())
            }));
        }
        if task.is_weather_gated() {
            let verdict = evaluate(&task.thresholds, &window, self.feed);
            if let Some(reason) = verdict.reason() {
                reasons.push(reason);
                notes.extend(verdict.describe());
            }
        }

        // 4. Accept, or look for an alternative.
        if reasons.is_empty() {
            self.hold(task, demands_window(demands, window));
            self.placement[index] = Placement::Window(window);
            return ScheduleResult::feasible(&task.id, window).with_notes(notes);
        }

        let request = SearchRequest {
            task,
            duration,
            earliest_start: lower,
            demands,
        };
        match self
            .recommender
            .find_alternative(&request, &self.work, self.feed, self.horizon)
        {
            Recommendation::Found(alt) => {
                info!(
                    task = %task.id,
                    ?reasons,
                    alternative = %alt.start,
                    "task infeasible, alternative found"
                );
                self.hold_tentative(task, demands_window(demands, alt));
                self.placement[index] = Placement::Window(alt);
                ScheduleResult::infeasible(&task.id, window, reasons)
                    .with_alternative(Some(alt))
                    .with_notes(notes)
            }
            Recommendation::NoneFound { .. } => {
                info!(task = %task.id, ?reasons, "task infeasible, no alternative in horizon");
                reasons.push(InfeasibilityReason::Unschedulable);
                notes.push(format!(
                    "no window found before {}",
                    self.horizon.end.to_rfc3339()
                ));
                self.placement[index] = Placement::Missing;
                ScheduleResult::infeasible(&task.id, window, reasons).with_notes(notes)
            }
        }
    }

    /// Done and cancelled tasks stay where they are and hold nothing.
    fn pin_settled(&mut self, index: usize, task: &Task, duration: Duration) -> ScheduleResult {
        let start = task
            .start_date
            .or_else(|| task.due_date.map(|due| due - duration))
            .unwrap_or(self.horizon.anchor);
        let window = TimeWindow::starting_at(start, duration);
        self.placement[index] = match task.status {
            TaskStatus::Cancelled => Placement::Ignored,
            _ => Placement::Window(window),
        };
        ScheduleResult::feasible(&task.id, window)
            .with_notes(vec![format!("{:?} task left in place", task.status).to_lowercase()])
    }

    /// Holds reservations for a feasible window; they will be committed.
    fn hold(&mut self, task: &Task, demands: Vec<(String, u32, TimeWindow)>) {
        for reservation in self.reserve_in_view(task, demands) {
            self.reservations.push(reservation);
        }
    }

    /// Holds reservations for an alternative; visible to later tasks of
    /// this run only.
    fn hold_tentative(&mut self, task: &Task, demands: Vec<(String, u32, TimeWindow)>) {
        self.reserve_in_view(task, demands);
    }

    fn reserve_in_view(
        &mut self,
        task: &Task,
        demands: Vec<(String, u32, TimeWindow)>,
    ) -> Vec<Reservation> {
        let mut held = Vec::with_capacity(demands.len());
        for (resource_id, quantity, window) in demands {
            let reservation = Reservation::new(
                resource_id,
                self.graph.project_id(),
                &task.id,
                quantity,
                window,
            );
            match self.work.reserve_tentative(reservation.clone()) {
                Ok(()) => held.push(reservation),
                Err(e) => warn!(task = %task.id, error = %e, "tentative reservation refused"),
            }
        }
        held
    }
}

fn demands_window(demands: &[Demand], window: TimeWindow) -> Vec<(String, u32, TimeWindow)> {
    demands
        .iter()
        .map(|d| (d.resource_id.clone(), d.quantity, window))
        .collect()
}

/// Re-checks a finished schedule.
///
/// Reports every dependency edge between two feasible tasks whose windows
/// break it, and every resource whose committed load (`view` plus
/// `reservations`) exceeds capacity anywhere.
pub fn audit(
    graph: &DependencyGraph,
    results: &[ScheduleResult],
    view: &LedgerView,
    reservations: &[Reservation],
) -> Vec<Violation> {
    let mut violations = Vec::new();

    let feasible_window = |task_id: &str| {
        results
            .iter()
            .find(|r| r.task_id == task_id && r.feasible)
            .map(ScheduleResult::window)
    };
    for edge in graph.edges() {
        let pred = graph.task(edge.from);
        let succ = graph.task(edge.to);
        if let (Some(p), Some(s)) = (feasible_window(&pred.id), feasible_window(&succ.id)) {
            if !edge.kind.is_satisfied(&p, &s) {
                violations.push(Violation::precedence_violation(
                    &succ.id,
                    format!("{:?} on '{}' not honoured", edge.kind, pred.id),
                ));
            }
        }
    }

    for resource_id in view.resource_ids() {
        let (Some(capacity), Some(base)) = (view.capacity(resource_id), view.profile(resource_id))
        else {
            continue;
        };
        let mut profile: ResourceProfile = base.clone();
        for r in reservations.iter().filter(|r| r.resource_id == resource_id) {
            profile.insert(r.clone());
        }
        let peak = profile
            .reservations()
            .iter()
            .map(|r| profile.peak_load(&r.window))
            .max()
            .unwrap_or(0);
        if peak > capacity {
            violations.push(Violation::capacity_exceeded(
                resource_id,
                format!("peak load {peak} exceeds capacity {capacity}"),
            ));
        }
    }

    if !violations.is_empty() {
        warn!(project = graph.project_id(), count = violations.len(), "schedule audit failed");
    }
    violations
}

//! End-to-end scheduling scenarios through the public API.

use std::sync::Arc;
use std::thread;

use chrono::{DateTime, Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;

use fieldplan::graph::DependencyGraph;
use fieldplan::ledger::{ResourceLedger, ResourceProfile};
use fieldplan::models::{
    Dependency, DependencyType, Forecast, InfeasibilityReason, Project, Reservation, Resource,
    Task, TaskResource, TimeWindow, WeatherForecastPoint, WeatherThresholds,
};
use fieldplan::scheduler::{
    audit, PlanningHorizon, Recommendation, Recommender, ResourceDemand, SchedulerConfig,
    SearchRequest,
};
use fieldplan::weather::{evaluate, Suitability};
use fieldplan::{GraphError, ScheduleRequest, SchedulingEngine};

fn day(d: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap() + Duration::days(d)
}

fn days(from: i64, to: i64) -> TimeWindow {
    TimeWindow::new(day(from), day(to))
}

fn no_weather() -> Forecast {
    Forecast::empty(Duration::hours(1))
}

#[test]
fn chain_of_three_finish_to_start() {
    let project = Project::new("P")
        .with_task(Task::new("A", "P").with_start_date(day(0)))
        .with_task(Task::new("B", "P"))
        .with_task(Task::new("C", "P"))
        .with_dependency(Dependency::finish_to_start("B", "A"))
        .with_dependency(Dependency::finish_to_start("C", "B"));

    let engine = SchedulingEngine::default();
    let snap = engine
        .run(&ScheduleRequest::new(project, day(0)), &no_weather())
        .unwrap();

    let windows: Vec<(String, TimeWindow)> = snap
        .results
        .iter()
        .map(|r| (r.task_id.clone(), r.window()))
        .collect();
    assert_eq!(
        windows,
        vec![
            ("A".to_string(), days(0, 1)),
            ("B".to_string(), days(1, 2)),
            ("C".to_string(), days(2, 3)),
        ]
    );
}

#[test]
fn resource_push_waits_for_capacity() {
    let ledger = Arc::new(
        ResourceLedger::with_resources(&[Resource::new("harvester").with_capacity(5)]).unwrap(),
    );
    ledger
        .reserve(Reservation::new("harvester", "neighbour", "X", 3, days(0, 2)))
        .unwrap();

    let project = Project::new("P")
        .with_task(Task::new("harvest", "P"))
        .with_requirement(TaskResource::new("harvest", "harvester", 5));
    let request = ScheduleRequest::new(project, day(0))
        .with_resources(vec![Resource::new("harvester").with_capacity(5)]);

    let engine = SchedulingEngine::new(Arc::clone(&ledger), SchedulerConfig::default());
    let snap = engine.run(&request, &no_weather()).unwrap();

    let harvest = snap.result("harvest").unwrap();
    assert!(harvest.feasible);
    // First instant with at most 2 units reserved.
    assert_eq!(harvest.resolved_start, day(2));
    assert_eq!(ledger.available_at("harvester", day(2)).unwrap(), 0);
    assert_eq!(ledger.available_at("harvester", day(1)).unwrap(), 2);
}

#[test]
fn constant_high_wind_yields_none_found() {
    let config = SchedulerConfig::default();
    let horizon = PlanningHorizon::new(day(0), Duration::days(7));
    let forecast = Forecast::hourly(day(0), 24 * 7, |t| {
        WeatherForecastPoint::new(t, 16.0).with_wind_speed(25.0)
    });
    let task = Task::new("spray", "P")
        .with_weather(WeatherThresholds::default().with_max_wind_speed(20.0));

    let rec = Recommender::new(&config).find_alternative(
        &SearchRequest {
            task: &task,
            duration: task.duration(config.default_duration()).unwrap(),
            earliest_start: day(0),
            demands: &[],
        },
        &Default::default(),
        &forecast,
        &horizon,
    );
    assert!(matches!(rec, Recommendation::NoneFound { .. }));

    // Through the engine the task is reported, not dropped.
    let project = Project::new("P").with_task(task);
    let snap = SchedulingEngine::default()
        .run(
            &ScheduleRequest::new(project, day(0)).with_horizon(Duration::days(7)),
            &forecast,
        )
        .unwrap();
    let spray = snap.result("spray").unwrap();
    assert!(!spray.feasible);
    assert_eq!(
        spray.reasons,
        vec![InfeasibilityReason::WeatherUnsuitable, InfeasibilityReason::Unschedulable]
    );
    assert_eq!(spray.alternative_window, None);
}

#[test]
fn two_task_cycle_is_rejected() {
    let tasks = vec![Task::new("A", "P"), Task::new("B", "P")];
    let deps = vec![
        Dependency::finish_to_start("B", "A"),
        Dependency::finish_to_start("A", "B"),
    ];
    match DependencyGraph::build("P", &tasks, &deps) {
        Err(GraphError::DependencyCycle(cycle)) => {
            assert!(cycle.contains("A"));
            assert!(cycle.contains("B"));
        }
        other => panic!("expected a cycle, got {other:?}"),
    }
}

#[test]
fn rerun_produces_identical_results() {
    let forecast = Forecast::hourly(day(0), 24 * 14, |t| {
        let wind = if t < day(2) { 30.0 } else { 6.0 };
        WeatherForecastPoint::new(t, 14.0).with_wind_speed(wind)
    });
    let project = Project::new("P")
        .with_task(
            Task::new("spray", "P")
                .with_estimated_hours(6.0)
                .with_weather(WeatherThresholds::default().with_max_wind_speed(20.0)),
        )
        .with_task(Task::new("mow", "P"))
        .with_task(Task::new("bale", "P"))
        .with_dependency(Dependency::finish_to_start("bale", "mow"))
        .with_requirement(TaskResource::new("mow", "tractor", 1))
        .with_requirement(TaskResource::new("bale", "tractor", 1))
        .with_requirement(TaskResource::new("spray", "tractor", 1));
    let request = ScheduleRequest::new(project, day(0))
        .with_resources(vec![Resource::new("tractor")]);

    let engine = SchedulingEngine::default();
    let first = engine.run(&request, &forecast).unwrap();
    let second = engine.run(&request, &forecast).unwrap();

    assert_eq!(
        serde_json::to_string(&first.results).unwrap(),
        serde_json::to_string(&second.results).unwrap()
    );
    assert_eq!(first.reservations, second.reservations);
    assert!(second.version > first.version);
}

#[test]
fn dependency_types_hold_in_committed_schedule() {
    let project = Project::new("P")
        .with_task(Task::new("irrigate", "P").with_estimated_hours(36.0))
        .with_task(Task::new("monitor", "P").with_estimated_hours(6.0))
        .with_task(Task::new("report", "P").with_estimated_hours(2.0))
        .with_task(Task::new("drain", "P"))
        .with_dependency(Dependency::start_to_start("monitor", "irrigate"))
        .with_dependency(Dependency::finish_to_finish("report", "irrigate"))
        .with_dependency(Dependency::finish_to_start("drain", "irrigate"))
        .with_requirement(TaskResource::new("irrigate", "pump", 1))
        .with_requirement(TaskResource::new("drain", "pump", 1));
    let deps = project.dependencies.clone();
    let request = ScheduleRequest::new(project, day(0)).with_resources(vec![Resource::new("pump")]);

    let snap = SchedulingEngine::default().run(&request, &no_weather()).unwrap();
    assert!(snap.is_fully_feasible());

    for dep in &deps {
        let pred = snap.result(&dep.dependent_on_id).unwrap().window();
        let succ = snap.result(&dep.task_id).unwrap().window();
        assert!(
            dep.dependency_type.is_satisfied(&pred, &succ),
            "{:?} {} -> {}",
            dep.dependency_type,
            dep.dependent_on_id,
            dep.task_id
        );
    }
    let report = snap.result("report").unwrap();
    assert_eq!(report.resolved_finish, day(0) + Duration::hours(36));
    assert_eq!(DependencyType::default(), DependencyType::FinishToStart);
}

#[test]
fn concurrent_projects_never_overbook() {
    let ledger = Arc::new(ResourceLedger::new());
    let engine = Arc::new(SchedulingEngine::new(
        Arc::clone(&ledger),
        SchedulerConfig::default().with_max_commit_attempts(16),
    ));

    let handles: Vec<_> = (0..6)
        .map(|p| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let id = format!("farm-{p}");
                let project = Project::new(&id)
                    .with_task(Task::new("harvest", &id).with_estimated_hours(12.0))
                    .with_task(Task::new("haul", &id).with_estimated_hours(6.0))
                    .with_dependency(Dependency::finish_to_start("haul", "harvest"))
                    .with_requirement(TaskResource::new("harvest", "combine", 1))
                    .with_requirement(TaskResource::new("haul", "truck", 2));
                let request = ScheduleRequest::new(project, day(0)).with_resources(vec![
                    Resource::new("combine").with_capacity(2),
                    Resource::new("truck").with_capacity(3),
                ]);
                engine.run(&request, &no_weather()).unwrap()
            })
        })
        .collect();
    let snapshots: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(snapshots.iter().all(|s| s.is_fully_feasible()));

    for (resource, capacity) in [("combine", 2), ("truck", 3)] {
        let mut profile = ResourceProfile::new();
        for r in ledger.reservations(resource).unwrap() {
            profile.insert(r);
        }
        for r in profile.reservations() {
            assert!(profile.peak_load(&r.window) <= capacity, "{resource} overbooked");
        }
        assert_eq!(profile.reservations().len(), 6);
    }
}

#[test]
fn forecast_gap_never_feasible() {
    let thresholds = WeatherThresholds::default().with_min_temperature(4.0);
    let forecast = Forecast::hourly(day(0), 10, |t| WeatherForecastPoint::new(t, 12.0));
    let verdict = evaluate(&thresholds, &days(0, 1), &forecast);
    assert!(matches!(verdict, Suitability::ForecastUnavailable(_)));

    let project = Project::new("P").with_task(Task::new("graft", "P").with_weather(thresholds));
    let snap = SchedulingEngine::default()
        .run(&ScheduleRequest::new(project, day(0)), &forecast)
        .unwrap();
    let graft = snap.result("graft").unwrap();
    assert!(!graft.feasible);
    assert_eq!(graft.reason(), Some(InfeasibilityReason::ForecastUnavailable));
}

#[test]
fn demand_ignores_usage_overruns() {
    let demand = ResourceDemand::from_requirements(&[
        TaskResource::new("T", "fuel", 10).with_used(25),
    ]);
    assert_eq!(demand.for_task("T")[0].quantity, 10);
}

#[test]
fn committed_schedules_pass_audit() {
    let ledger = Arc::new(ResourceLedger::new());
    let engine = SchedulingEngine::new(Arc::clone(&ledger), SchedulerConfig::default());

    for p in 0..3 {
        let id = format!("field-{p}");
        let project = Project::new(&id)
            .with_task(Task::new("plough", &id).with_estimated_hours(10.0))
            .with_task(Task::new("sow", &id).with_estimated_hours(6.0))
            .with_task(Task::new("roll", &id).with_estimated_hours(4.0))
            .with_dependency(Dependency::finish_to_start("sow", "plough"))
            .with_dependency(Dependency::start_to_start("roll", "sow"))
            .with_requirement(TaskResource::new("plough", "tractor", 1))
            .with_requirement(TaskResource::new("sow", "drill", 1))
            .with_requirement(TaskResource::new("roll", "tractor", 1));
        let request = ScheduleRequest::new(project.clone(), day(0)).with_resources(vec![
            Resource::new("tractor").with_capacity(2),
            Resource::new("drill"),
        ]);
        let snap = engine.run(&request, &no_weather()).unwrap();
        assert!(snap.is_fully_feasible());

        let graph = DependencyGraph::build(&id, &project.tasks, &project.dependencies).unwrap();
        let others = ledger.view(Some(&id)).unwrap();
        let violations = audit(&graph, &snap.results, &others, &snap.reservations);
        assert!(violations.is_empty(), "{violations:?}");
    }
}

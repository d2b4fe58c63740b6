//! Scheduling: constraint propagation, alternative search and KPIs.
//!
//! # Algorithm
//!
//! [`Scheduler`] walks the dependency graph once in topological order and
//! resolves each task against its predecessors, the shared resources, the
//! calendar and the weather. Tasks that cannot run where the dependencies
//! want them are handed to the [`Recommender`], which scans forward for the
//! next window that clears every constraint.
//!
//! # KPI
//!
//! `ScheduleKpi` summarises a snapshot: makespan, tardiness, on-time rate
//! and how many tasks needed an alternative.
//!
//! # References
//!
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems", Ch. 3-4
//! - Kelley & Walker (1959), "Critical-Path Planning and Scheduling"

mod config;
mod inputs;
mod kpi;
mod propagator;
mod recommend;

pub use config::{SchedulerConfig, StepPolicy};
pub use inputs::{Demand, PlanningHorizon, ResourceDemand};
pub use kpi::ScheduleKpi;
pub use propagator::{audit, ScheduleOutcome, Scheduler};
pub use recommend::{Recommendation, Recommender, SearchRequest};

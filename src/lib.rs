//! Weather-gated, dependency-aware task scheduling for field operations.
//!
//! Given a project's tasks, their typed precedence dependencies, the shared
//! resources they need and a weather forecast, computes a window per task
//! that honours every constraint, or says precisely why it cannot and
//! proposes the next window that would work.
//!
//! # Modules
//!
//! - **`models`**: Domain types: `Task`, `Resource`, `Dependency`,
//!   `TimeWindow`, `Calendar`, `Forecast`, `ScheduleResult`, `ScheduleSnapshot`
//! - **`graph`**: Dependency graph arena, cycle detection, topological order
//! - **`dispatching`**: Deterministic tie-break among ready tasks
//! - **`ledger`**: Shared resource reservations with optimistic commits
//! - **`weather`**: Window suitability against forecast thresholds
//! - **`scheduler`**: Constraint propagation, alternative windows, KPIs
//! - **`engine`**: Per-project runs and versioned snapshots
//! - **`validation`**: Input integrity checks (duplicate IDs, dangling references)
//!
//! # Architecture
//!
//! Graph builder → scheduler (consulting the ledger and the weather
//! evaluator) → recommender on failure → immutable snapshot. Only the
//! ledger is shared between concurrent project runs.
//!
//! Logging goes through `tracing`; install a subscriber in the host
//! application to see it.
//!
//! # References
//!
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems"
//! - Kahn (1962), "Topological sorting of large networks"

pub mod dispatching;
pub mod engine;
pub mod error;
pub mod graph;
pub mod ledger;
pub mod models;
pub mod scheduler;
pub mod validation;
pub mod weather;

pub use engine::{ScheduleRequest, SchedulingEngine, SnapshotStore};
pub use error::{CapacityError, CycleError, GraphError, LedgerError, ScheduleError};

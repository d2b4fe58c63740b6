//! Scheduling domain models.
//!
//! Plain, serializable data types. Field names follow the shapes exchanged
//! with the surrounding task-management application, so callers can map
//! their persistence rows onto them directly.
//!
//! # Domain Mappings
//!
//! | fieldplan | Farm operations | Orchard | Vineyard |
//! |-----------|-----------------|---------|----------|
//! | Task | Field operation | Pruning pass | Spray round |
//! | Resource | Tractor / crew | Picking crew | Sprayer |
//! | Dependency | "plough before sow" | "thin before pick" | "prune before tie" |
//! | WeatherThresholds | No rain for sowing | Wind limit for ladders | Wind limit for drift |

mod calendar;
mod dependency;
mod project;
mod resource;
mod schedule;
mod task;
mod weather;

pub use calendar::{Calendar, TimeWindow};
pub use dependency::{Dependency, DependencyType};
pub use project::Project;
pub use resource::{Resource, TaskResource};
pub use schedule::{
    InfeasibilityReason, Reservation, ScheduleResult, ScheduleSnapshot, Violation, ViolationType,
};
pub use task::{Priority, Task, TaskStatus, WeatherThresholds, MAX_ESTIMATED_HOURS};
pub use weather::{Forecast, WeatherFeed, WeatherForecastPoint};

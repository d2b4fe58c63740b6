//! Dispatch ordering for simultaneously unblocked tasks.
//!
//! When several tasks become ready at once, they are taken in a fixed,
//! total order so identical inputs always yield identical schedules:
//!
//! 1. priority, highest first
//! 2. due date, earliest first (tasks without one go last)
//! 3. task id, ascending
//!
//! # Reference
//! Pinedo (2016), "Scheduling", Ch. 4: Priority Dispatching

use std::cmp::Reverse;
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::models::{Priority, Task};

/// Sort key for a task. Smaller keys are dispatched first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DispatchKey<'a> {
    priority: Reverse<Priority>,
    /// `(missing, due)` so that a missing due date sorts after any date.
    due: (bool, Option<DateTime<Utc>>),
    id: &'a str,
}

impl<'a> DispatchKey<'a> {
    pub fn of(task: &'a Task) -> Self {
        Self {
            priority: Reverse(task.priority),
            due: (task.due_date.is_none(), task.due_date),
            id: &task.id,
        }
    }
}

/// Ready set ordered by [`DispatchKey`], holding arena indices.
#[derive(Debug, Default)]
pub struct ReadyQueue<'a> {
    ready: BTreeSet<(DispatchKey<'a>, usize)>,
}

impl<'a> ReadyQueue<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: &'a Task, index: usize) {
        self.ready.insert((DispatchKey::of(task), index));
    }

    /// Removes and returns the index of the task to dispatch next.
    pub fn pop(&mut self) -> Option<usize> {
        self.ready.pop_first().map(|(_, index)| index)
    }

    pub fn is_empty(&self) -> bool {
        self.ready.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ready.len()
    }
}

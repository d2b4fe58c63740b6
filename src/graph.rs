//! Dependency graph builder.
//!
//! Turns a project's flat task and dependency lists into an arena: tasks are
//! addressed by dense indices (sorted by task id) and adjacency is stored as
//! index lists. Cycle detection and topological ordering are plain index
//! walks over that arena.
//!
//! # Reference
//! Cormen et al. (2009), "Introduction to Algorithms", Ch. 22.4 (Topological Sort)
//! Kahn (1962), "Topological sorting of large networks"

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::dispatching::ReadyQueue;
use crate::error::{CycleError, GraphError};
use crate::models::{Dependency, DependencyType, Task};

/// A precedence edge between arena indices: `from` is the predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    pub from: usize,
    pub to: usize,
    pub kind: DependencyType,
}

/// A validated, acyclic dependency graph for one project.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    project_id: String,
    tasks: Vec<Task>,
    index: HashMap<String, usize>,
    edges: Vec<Edge>,
    /// Edge indices leaving each task.
    outgoing: Vec<Vec<usize>>,
    /// Edge indices entering each task.
    incoming: Vec<Vec<usize>>,
}

impl DependencyGraph {
    /// Builds and validates the graph.
    ///
    /// Fails if a task belongs to another project, appears twice, a
    /// dependency names a task outside the set, or the edges form a cycle.
    pub fn build(
        project_id: &str,
        tasks: &[Task],
        dependencies: &[Dependency],
    ) -> Result<Self, GraphError> {
        let mut sorted: Vec<Task> = tasks.to_vec();
        sorted.sort_by(|a, b| a.id.cmp(&b.id));

        let mut index = HashMap::with_capacity(sorted.len());
        for (i, task) in sorted.iter().enumerate() {
            if task.project_id != project_id {
                return Err(GraphError::ForeignTask {
                    task_id: task.id.clone(),
                    expected: project_id.to_string(),
                    found: task.project_id.clone(),
                });
            }
            if index.insert(task.id.clone(), i).is_some() {
                return Err(GraphError::DuplicateTask {
                    task_id: task.id.clone(),
                });
            }
        }

        let mut seen = HashSet::new();
        let mut edges = Vec::with_capacity(dependencies.len());
        for dep in dependencies {
            let lookup = |id: &str| {
                index.get(id).copied().ok_or_else(|| GraphError::UnknownTask {
                    task_id: dep.task_id.clone(),
                    missing: id.to_string(),
                })
            };
            let to = lookup(&dep.task_id)?;
            let from = lookup(&dep.dependent_on_id)?;
            let edge = Edge {
                from,
                to,
                kind: dep.dependency_type,
            };
            if seen.insert(edge) {
                edges.push(edge);
            }
        }
        // Stable edge order regardless of input order.
        edges.sort_by_key(|e| (e.from, e.to, e.kind));

        let mut outgoing = vec![Vec::new(); sorted.len()];
        let mut incoming = vec![Vec::new(); sorted.len()];
        for (ei, edge) in edges.iter().enumerate() {
            outgoing[edge.from].push(ei);
            incoming[edge.to].push(ei);
        }

        let graph = Self {
            project_id: project_id.to_string(),
            tasks: sorted,
            index,
            edges,
            outgoing,
            incoming,
        };

        if let Some(cycle) = graph.find_cycle() {
            warn!(project = project_id, cycle = %cycle, "dependency cycle rejected");
            return Err(cycle.into());
        }

        debug!(
            project = project_id,
            tasks = graph.len(),
            edges = graph.edges.len(),
            "dependency graph built"
        );
        Ok(graph)
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Number of tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Tasks in arena order (sorted by id).
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, index: usize) -> &Task {
        &self.tasks[index]
    }

    pub fn index_of(&self, task_id: &str) -> Option<usize> {
        self.index.get(task_id).copied()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Edges entering `index` (one per predecessor relation).
    pub fn predecessors(&self, index: usize) -> impl Iterator<Item = &Edge> + '_ {
        self.incoming[index].iter().map(move |&ei| &self.edges[ei])
    }

    /// Edges leaving `index`.
    pub fn successors(&self, index: usize) -> impl Iterator<Item = &Edge> + '_ {
        self.outgoing[index].iter().map(move |&ei| &self.edges[ei])
    }

    /// Topological order via Kahn's algorithm.
    ///
    /// Among tasks unblocked at the same time, the dispatch order decides
    /// (priority, due date, id), so the result is fully deterministic.
    pub fn topological_order(&self) -> Vec<usize> {
        let mut remaining: Vec<usize> = self.incoming.iter().map(Vec::len).collect();
        let mut ready = ReadyQueue::new();
        for (i, &deg) in remaining.iter().enumerate() {
            if deg == 0 {
                ready.push(&self.tasks[i], i);
            }
        }

        let mut order = Vec::with_capacity(self.tasks.len());
        while let Some(node) = ready.pop() {
            order.push(node);
            for edge in self.successors(node) {
                remaining[edge.to] -= 1;
                if remaining[edge.to] == 0 {
                    ready.push(&self.tasks[edge.to], edge.to);
                }
            }
        }
        order
    }

    /// Finds a cycle with a depth-first walk that tracks the current path.
    /// An edge back to a node still on the path closes a cycle.
    ///
    /// The walk keeps its own stack of `(node, next outgoing edge)` frames,
    /// so chain length is bounded by memory rather than the thread stack.
    fn find_cycle(&self) -> Option<CycleError> {
        let mut state = vec![Visit::New; self.tasks.len()];
        let mut stack: Vec<(usize, usize)> = Vec::new();

        for root in 0..self.tasks.len() {
            if state[root] != Visit::New {
                continue;
            }
            state[root] = Visit::OnStack;
            stack.push((root, 0));

            while let Some(frame) = stack.last_mut() {
                let (node, next) = *frame;
                let Some(&edge) = self.outgoing[node].get(next) else {
                    state[node] = Visit::Done;
                    stack.pop();
                    continue;
                };
                frame.1 += 1;

                let to = self.edges[edge].to;
                match state[to] {
                    Visit::OnStack => {
                        // The cycle is the path suffix starting at `to`.
                        let pos = stack.iter().position(|&(n, _)| n == to).unwrap_or(0);
                        return Some(CycleError {
                            cycle: stack[pos..]
                                .iter()
                                .map(|&(n, _)| self.tasks[n].id.clone())
                                .collect(),
                        });
                    }
                    Visit::New => {
                        state[to] = Visit::OnStack;
                        stack.push((to, 0));
                    }
                    Visit::Done => {}
                }
            }
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    New,
    OnStack,
    Done,
}

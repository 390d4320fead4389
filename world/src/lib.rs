#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state management for Gate Siege.

use std::time::Duration;

use gate_siege_core::{
    BugId, Command, Event, Position, RouteAssignment, RouteGraph, RouteGraphId,
    RouteGraphTableView,
};

/// Live bug tracked by the world.
#[derive(Clone, Copy, Debug)]
struct Bug {
    id: BugId,
    position: Position,
    assignment: Option<RouteAssignment>,
}

/// Represents the authoritative Gate Siege world state.
#[derive(Debug, Default)]
pub struct World {
    clock: Duration,
    bugs: Vec<Bug>,
    next_bug: u32,
    route_graphs: Vec<RouteGraph>,
}

impl World {
    /// Creates a new world ready for simulation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_bug_id(&mut self) -> BugId {
        let id = BugId::new(self.next_bug);
        self.next_bug = self.next_bug.wrapping_add(1);
        id
    }

    fn bug_index(&self, bug: BugId) -> Option<usize> {
        self.bugs.iter().position(|candidate| candidate.id == bug)
    }

    fn graph_index(&self, graph: RouteGraphId) -> Option<usize> {
        self.route_graphs
            .iter()
            .position(|candidate| candidate.id() == graph)
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::Tick { dt } => {
            world.clock = world.clock.saturating_add(dt);
            out_events.push(Event::TimeAdvanced { dt });
        }
        Command::InstallRouteGraph { graph } => {
            let id = graph.id();
            let gateway = graph.gateway();
            let route_count = u16::try_from(graph.route_count()).unwrap_or(u16::MAX);

            if let Some(index) = world.graph_index(id) {
                world.route_graphs[index] = graph;
            } else {
                world.route_graphs.push(graph);
            }

            out_events.push(Event::RouteGraphComputed {
                graph: id,
                gateway,
                route_count,
            });
        }
        Command::RemoveRouteGraph { graph } => {
            if let Some(index) = world.graph_index(graph) {
                let _ = world.route_graphs.remove(index);
                out_events.push(Event::RouteGraphReleased { graph });
            }
        }
        Command::RemoveGateway { gateway } => {
            out_events.push(Event::GatewayRemoved { gateway });
        }
        Command::SpawnBug {
            position,
            assignment,
        } => {
            let id = world.allocate_bug_id();
            world.bugs.push(Bug {
                id,
                position,
                assignment,
            });
            out_events.push(Event::BugSpawned {
                bug: id,
                assignment,
            });
        }
        Command::KillBug { bug, position } => {
            if let Some(index) = world.bug_index(bug) {
                let _ = world.bugs.remove(index);
                out_events.push(Event::BugKilled { bug, position });
            }
        }
        Command::ClearBugs => {
            world.bugs.clear();
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use std::time::Duration;

    use gate_siege_core::{BugId, Position, RouteAssignment};

    use super::{RouteGraphTableView, World};

    /// Immutable representation of a single bug's state used for queries.
    #[derive(Clone, Copy, Debug, PartialEq)]
    pub struct BugSnapshot {
        /// Unique identifier assigned to the bug.
        pub id: BugId,
        /// Location the bug currently occupies.
        pub position: Position,
        /// Route choice pinned to the bug, when it follows one.
        pub assignment: Option<RouteAssignment>,
    }

    /// Captures snapshots of every live bug in ascending identifier order.
    #[must_use]
    pub fn bug_view(world: &World) -> Vec<BugSnapshot> {
        world
            .bugs
            .iter()
            .map(|bug| BugSnapshot {
                id: bug.id,
                position: bug.position,
                assignment: bug.assignment,
            })
            .collect()
    }

    /// Captures a view over the installed route-graph resources.
    #[must_use]
    pub fn route_graph_table(world: &World) -> RouteGraphTableView<'_> {
        RouteGraphTableView::new(&world.route_graphs)
    }

    /// Reports whether the provided bug is still alive.
    #[must_use]
    pub fn bug_exists(world: &World, bug: BugId) -> bool {
        world.bug_index(bug).is_some()
    }

    /// Number of bugs currently alive in the world.
    #[must_use]
    pub fn bug_count(world: &World) -> usize {
        world.bugs.len()
    }

    /// Total simulated time accumulated by the world clock.
    #[must_use]
    pub fn clock(world: &World) -> Duration {
        world.clock
    }
}

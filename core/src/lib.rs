#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Gate Siege engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Adapters submit [`Command`] values
//! describing desired mutations, the world executes those commands via its
//! `apply` entry point, and then broadcasts [`Event`] values for systems to
//! react to deterministically. Route-graph resources are defined here so the
//! world can own them while systems read them through borrowed views.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Unique identifier assigned to a live bug.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BugId(u32);

impl BugId {
    /// Creates a new bug identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Unique identifier assigned to a spawn gateway.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GatewayId(u32);

impl GatewayId {
    /// Creates a new gateway identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Unique identifier assigned to a computed route graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RouteGraphId(u32);

impl RouteGraphId {
    /// Creates a new route-graph identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Index of a single route within its owning route graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RouteIndex(u16);

impl RouteIndex {
    /// Creates a new route index with the provided numeric value.
    #[must_use]
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the index.
    #[must_use]
    pub const fn get(&self) -> u16 {
        self.0
    }
}

/// Secondary tag partitioning a graph's spawn population.
///
/// Variants sharing a graph learn independent route distributions. Variant
/// zero is seeded from the builder's static route costs at graph-computation
/// time; other variants start from a uniform prior once observed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpawnVariant(u16);

impl SpawnVariant {
    /// Creates a new spawn variant tag with the provided numeric value.
    #[must_use]
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the tag.
    #[must_use]
    pub const fn get(&self) -> u16 {
        self.0
    }
}

/// World-space coordinate used for spawn and death locations.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    x: f32,
    y: f32,
}

impl Position {
    /// Creates a new position from world-space components.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Horizontal component of the position in world units.
    #[must_use]
    pub const fn x(&self) -> f32 {
        self.x
    }

    /// Vertical component of the position in world units.
    #[must_use]
    pub const fn y(&self) -> f32 {
        self.y
    }
}

/// Route choice pinned to a bug for the duration of its life.
///
/// The triple is cached by the routing system at spawn time because the
/// world forgets a bug's navigation state before death accounting runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RouteAssignment {
    /// Graph the bug was routed through.
    pub graph: RouteGraphId,
    /// Route the bug was assigned within the graph.
    pub route: RouteIndex,
    /// Spawn variant the bug belongs to.
    pub variant: SpawnVariant,
}

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Advances the simulation clock by the provided delta time.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Installs a freshly computed route-graph resource into the world.
    InstallRouteGraph {
        /// Complete resource produced by the route-graph builder.
        graph: RouteGraph,
    },
    /// Releases the route-graph resource with the provided identifier.
    RemoveRouteGraph {
        /// Identifier of the resource to drop.
        graph: RouteGraphId,
    },
    /// Announces that a spawn gateway was torn down.
    RemoveGateway {
        /// Identifier of the gateway that disappeared.
        gateway: GatewayId,
    },
    /// Requests that a new bug enter the world.
    SpawnBug {
        /// Location the bug appears at.
        position: Position,
        /// Route choice pinned to the bug, when it follows one.
        assignment: Option<RouteAssignment>,
    },
    /// Requests that a bug die at the provided location.
    KillBug {
        /// Identifier of the bug to kill.
        bug: BugId,
        /// Location the bug died at.
        position: Position,
    },
    /// Wipes every live bug without individual kill notifications.
    ClearBugs,
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// Announces that a route graph finished computing and is queryable.
    RouteGraphComputed {
        /// Identifier of the installed resource.
        graph: RouteGraphId,
        /// Gateway that owns the graph's spawn traffic.
        gateway: GatewayId,
        /// Number of candidate routes the graph contains.
        route_count: u16,
    },
    /// Confirms that a route-graph resource was dropped from the world.
    RouteGraphReleased {
        /// Identifier of the removed resource.
        graph: RouteGraphId,
    },
    /// Announces that a spawn gateway was torn down.
    GatewayRemoved {
        /// Identifier of the gateway that disappeared.
        gateway: GatewayId,
    },
    /// Confirms that a bug entered the world.
    BugSpawned {
        /// Identifier assigned to the new bug.
        bug: BugId,
        /// Route choice pinned to the bug, when it follows one.
        assignment: Option<RouteAssignment>,
    },
    /// Confirms that a bug died.
    BugKilled {
        /// Identifier of the dead bug.
        bug: BugId,
        /// Location the bug died at.
        position: Position,
    },
}

/// Dense distance-to-target field sampled in world space.
///
/// Cells store the remaining travel distance along the owning route. The
/// field mirrors the arena's footprint; positions outside the sampled domain
/// yield no reading so callers can fail soft. Stored values may be negative
/// where the builder's solve did not converge.
#[derive(Clone, Debug, PartialEq)]
pub struct DistanceField {
    columns: u32,
    rows: u32,
    cell_length: f32,
    distances: Vec<f32>,
    valid: bool,
}

impl DistanceField {
    /// Creates a field from dense row-major distances.
    ///
    /// The field is valid only when the cell data matches the declared
    /// dimensions and the cell length is strictly positive.
    #[must_use]
    pub fn new(columns: u32, rows: u32, cell_length: f32, distances: Vec<f32>) -> Self {
        let expected = usize::try_from(columns).unwrap_or(0) * usize::try_from(rows).unwrap_or(0);
        let valid = expected > 0 && distances.len() == expected && cell_length > 0.0;
        Self {
            columns,
            rows,
            cell_length,
            distances,
            valid,
        }
    }

    /// Creates the canonical invalid field that yields no readings.
    #[must_use]
    pub const fn invalid() -> Self {
        Self {
            columns: 0,
            rows: 0,
            cell_length: 0.0,
            distances: Vec::new(),
            valid: false,
        }
    }

    /// Reports whether the field carries usable distance data.
    #[must_use]
    pub const fn valid(&self) -> bool {
        self.valid
    }

    /// Samples the remaining distance to the target at a world position.
    ///
    /// Returns `None` when the field is invalid or the position falls
    /// outside the sampled domain. Stored values are returned as-is, so a
    /// negative reading reaches the caller unchanged.
    #[must_use]
    pub fn distance_to_target(&self, position: Position) -> Option<f32> {
        if !self.valid {
            return None;
        }

        if position.x() < 0.0 || position.y() < 0.0 {
            return None;
        }

        let column = (position.x() / self.cell_length) as u32;
        let row = (position.y() / self.cell_length) as u32;
        if column >= self.columns || row >= self.rows {
            return None;
        }

        let width = usize::try_from(self.columns).ok()?;
        let index = usize::try_from(row)
            .ok()?
            .checked_mul(width)?
            .checked_add(usize::try_from(column).ok()?)?;
        self.distances.get(index).copied()
    }
}

/// One precomputed path within a route graph.
#[derive(Clone, Debug, PartialEq)]
pub struct Route {
    total_distance: f32,
    cost_weight: f32,
    field: DistanceField,
}

impl Route {
    /// Creates a route from its total length, static cost weight, and field.
    #[must_use]
    pub const fn new(total_distance: f32, cost_weight: f32, field: DistanceField) -> Self {
        Self {
            total_distance,
            cost_weight,
            field,
        }
    }

    /// Total route length, normalized to `1.0` when not strictly positive.
    #[must_use]
    pub fn total_distance(&self) -> f32 {
        if self.total_distance > 0.0 {
            self.total_distance
        } else {
            1.0
        }
    }

    /// Static quality weight supplied by the route-graph builder.
    #[must_use]
    pub const fn cost_weight(&self) -> f32 {
        self.cost_weight
    }

    /// Distance field describing remaining travel along the route.
    #[must_use]
    pub const fn field(&self) -> &DistanceField {
        &self.field
    }
}

/// Full set of candidate routes between one gateway and the target.
#[derive(Clone, Debug, PartialEq)]
pub struct RouteGraph {
    id: RouteGraphId,
    gateway: GatewayId,
    routes: Vec<Route>,
}

impl RouteGraph {
    /// Creates a route graph owned by the provided gateway.
    #[must_use]
    pub fn new(id: RouteGraphId, gateway: GatewayId, routes: Vec<Route>) -> Self {
        Self {
            id,
            gateway,
            routes,
        }
    }

    /// Identifier of the graph resource.
    #[must_use]
    pub const fn id(&self) -> RouteGraphId {
        self.id
    }

    /// Gateway that owns the graph's spawn traffic.
    #[must_use]
    pub const fn gateway(&self) -> GatewayId {
        self.gateway
    }

    /// Number of candidate routes the graph contains.
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Looks up a route by index, yielding `None` when out of range.
    #[must_use]
    pub fn route(&self, index: RouteIndex) -> Option<&Route> {
        self.routes.get(usize::from(index.get()))
    }

    /// Minimum normalized total distance among the graph's routes.
    ///
    /// Defaults to `1.0` for an empty graph so callers never divide by zero.
    #[must_use]
    pub fn min_total_distance(&self) -> f32 {
        let minimum = self
            .routes
            .iter()
            .map(Route::total_distance)
            .fold(f32::INFINITY, f32::min);
        if minimum.is_finite() {
            minimum
        } else {
            1.0
        }
    }

    /// Initial per-route weights derived from the builder's cost weights.
    ///
    /// Weights are normalized onto the probability simplex; non-finite or
    /// negative cost weights contribute nothing, and a degenerate total
    /// falls back to a uniform prior.
    #[must_use]
    pub fn initial_weights(&self) -> Vec<f64> {
        if self.routes.is_empty() {
            return Vec::new();
        }

        let mut weights: Vec<f64> = self
            .routes
            .iter()
            .map(|route| {
                let weight = f64::from(route.cost_weight());
                if weight.is_finite() && weight > 0.0 {
                    weight
                } else {
                    0.0
                }
            })
            .collect();

        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            let uniform = 1.0 / weights.len() as f64;
            for weight in &mut weights {
                *weight = uniform;
            }
        } else {
            for weight in &mut weights {
                *weight /= total;
            }
        }
        weights
    }
}

/// Read-only view over the world's installed route graphs.
#[derive(Clone, Copy, Debug)]
pub struct RouteGraphTableView<'a> {
    graphs: &'a [RouteGraph],
}

impl<'a> RouteGraphTableView<'a> {
    /// Captures a new view backed by the provided graph slice.
    #[must_use]
    pub const fn new(graphs: &'a [RouteGraph]) -> Self {
        Self { graphs }
    }

    /// Looks up a graph by identifier.
    #[must_use]
    pub fn graph(&self, id: RouteGraphId) -> Option<&'a RouteGraph> {
        self.graphs.iter().find(|graph| graph.id() == id)
    }

    /// Iterator over the installed graphs in storage order.
    pub fn iter(&self) -> impl Iterator<Item = &'a RouteGraph> {
        self.graphs.iter()
    }
}

/// Number of summary slots the routing report always carries.
pub const ROUTING_SUMMARY_SLOTS: usize = 4;

/// Placeholder emitted for summary slots with no data behind them.
pub const ROUTING_SUMMARY_EMPTY: &str = "0";

/// Deterministic, display-ready summary of the routing system's state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingReport {
    /// Number of graphs still accepting learning updates.
    pub active_graphs: u32,
    /// Number of populations held by those graphs.
    pub active_populations: u32,
    /// Top-weight summaries for up to four graphs, ascending by identifier.
    pub summaries: [String; ROUTING_SUMMARY_SLOTS],
}

impl Default for RoutingReport {
    fn default() -> Self {
        Self {
            active_graphs: 0,
            active_populations: 0,
            summaries: [
                ROUTING_SUMMARY_EMPTY.to_string(),
                ROUTING_SUMMARY_EMPTY.to_string(),
                ROUTING_SUMMARY_EMPTY.to_string(),
                ROUTING_SUMMARY_EMPTY.to_string(),
            ],
        }
    }
}

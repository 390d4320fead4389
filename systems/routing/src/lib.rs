#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Adaptive route allocation driven by per-route survival fitness.
//!
//! Each route graph carries one learned weight distribution per spawn
//! variant. Newly spawned bugs consume pre-sampled route choices from a
//! pool; death locations are folded back into the weights once per tick via
//! a multiplicative-weights update, and pools are refilled from the updated
//! distribution. Entries drain and are pruned when their owning gateway
//! disappears.

mod fitness;
mod sampler;
mod telemetry;

use std::collections::BTreeMap;
use std::time::Duration;

use gate_siege_core::{
    BugId, Command, Event, GatewayId, Position, RouteAssignment, RouteGraph, RouteGraphId,
    RouteGraphTableView, RouteIndex, RoutingReport, SpawnVariant,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};

const RNG_STREAM_POPULATION: &str = "route-population";

/// Tuning knobs controlling learning, sampling, and entry lifetime.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Number of pre-sampled route choices each population holds.
    pub pool_size: usize,
    /// Multiplicative-update step size applied to observed mean fitness.
    pub learning_rate: f64,
    /// Minimum weight any route is allowed to decay to.
    pub weight_floor: f64,
    /// Probability that a pool slot ignores the weights entirely.
    pub scout_rate: f64,
    /// Simulated time a draining entry is retained before pruning.
    pub drain_timeout: Duration,
    /// Seed from which every population's sampling stream is derived.
    pub rng_seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pool_size: 64,
            learning_rate: 0.5,
            weight_floor: 0.005,
            scout_rate: 0.10,
            drain_timeout: Duration::from_secs(8),
            rng_seed: 0x6a7e_51e6_e0a1_9b02,
        }
    }
}

/// Learned weight vector and pre-sampled consumption pool for one variant.
#[derive(Debug)]
struct Population {
    weights: Vec<f64>,
    pool: Vec<RouteIndex>,
    head: usize,
    rng: ChaCha8Rng,
}

impl Population {
    fn new(weights: Vec<f64>, seed: u64) -> Self {
        Self {
            weights,
            pool: Vec::new(),
            head: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    fn remaining(&self) -> usize {
        self.pool.len().saturating_sub(self.head)
    }

    fn pop(&mut self) -> Option<RouteIndex> {
        let choice = self.pool.get(self.head).copied()?;
        self.head += 1;
        Some(choice)
    }

    fn resample(&mut self, pool_size: usize, scout_rate: f64) {
        sampler::sample_pool(
            &self.weights,
            pool_size,
            scout_rate,
            &mut self.rng,
            &mut self.pool,
        );
        self.head = 0;
    }
}

/// Per-graph bookkeeping owned by the routing system.
#[derive(Debug)]
struct GraphEntry {
    gateway: GatewayId,
    route_count: usize,
    populations: BTreeMap<SpawnVariant, Population>,
    drain_started: Option<Duration>,
}

impl GraphEntry {
    fn is_draining(&self) -> bool {
        self.drain_started.is_some()
    }
}

/// Tick-driven system that allocates spawn routes and learns from deaths.
#[derive(Debug)]
pub struct Routing {
    config: Config,
    enabled: bool,
    clock: Duration,
    entries: BTreeMap<RouteGraphId, GraphEntry>,
    tracked: BTreeMap<BugId, RouteAssignment>,
    pending_deaths: Vec<(BugId, Position)>,
    outcomes: BTreeMap<(RouteGraphId, SpawnVariant), Vec<(RouteIndex, f64)>>,
    fitness_sums: Vec<f64>,
    fitness_counts: Vec<u32>,
    report: RoutingReport,
}

impl Default for Routing {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Routing {
    /// Creates a new routing system using the supplied configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            enabled: true,
            clock: Duration::ZERO,
            entries: BTreeMap::new(),
            tracked: BTreeMap::new(),
            pending_deaths: Vec::new(),
            outcomes: BTreeMap::new(),
            fitness_sums: Vec::new(),
            fitness_counts: Vec::new(),
            report: RoutingReport::default(),
        }
    }

    /// Enables or disables the system without discarding learned state.
    ///
    /// While disabled, `handle` ignores its inputs and `pop_route` answers
    /// `None`; drain timers are frozen alongside the clock.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Clears every entry, tracking record, buffer, and the report.
    pub fn reset(&mut self) {
        self.clock = Duration::ZERO;
        self.entries.clear();
        self.tracked.clear();
        self.pending_deaths.clear();
        self.outcomes.clear();
        self.report = RoutingReport::default();
    }

    /// Returns the telemetry report refreshed at the end of the last tick.
    #[must_use]
    pub fn last_report(&self) -> &RoutingReport {
        &self.report
    }

    /// Consumes one pre-sampled route choice for the provided population.
    ///
    /// Answers `None` when the system is disabled, no population exists for
    /// the pair, or the pool is exhausted; callers fall back to their
    /// default behavior. Never blocks and never allocates.
    pub fn pop_route(&mut self, graph: RouteGraphId, variant: SpawnVariant) -> Option<RouteIndex> {
        if !self.enabled {
            return None;
        }
        self.entries
            .get_mut(&graph)?
            .populations
            .get_mut(&variant)?
            .pop()
    }

    /// Consumes world events and immutable views to run one allocation tick.
    ///
    /// Events are ingested in order; death notifications are only buffered
    /// because the world forgets a bug's navigation state before this system
    /// runs. The update phase executes iff the batch carried a
    /// [`Event::TimeAdvanced`], in a fixed order: buffered deaths, stale
    /// reconciliation, weight updates with pool resampling, low-water
    /// top-ups, pruning, telemetry refresh. Prune releases are emitted as
    /// [`Command::RemoveRouteGraph`] values.
    pub fn handle<F>(
        &mut self,
        events: &[Event],
        route_graphs: RouteGraphTableView<'_>,
        mut bug_alive: F,
        out: &mut Vec<Command>,
    ) where
        F: FnMut(BugId) -> bool,
    {
        if !self.enabled {
            return;
        }

        let mut tick_observed = false;
        for event in events {
            match event {
                Event::TimeAdvanced { dt } => {
                    self.clock = self.clock.saturating_add(*dt);
                    tick_observed = true;
                }
                Event::RouteGraphComputed {
                    graph,
                    gateway,
                    route_count,
                } => {
                    self.create_entry(*graph, *gateway, usize::from(*route_count), route_graphs);
                }
                Event::GatewayRemoved { gateway } => self.begin_draining(*gateway),
                Event::BugSpawned {
                    bug,
                    assignment: Some(assignment),
                } => {
                    let _ = self.tracked.insert(*bug, *assignment);
                }
                Event::BugKilled { bug, position } => {
                    self.pending_deaths.push((*bug, *position));
                }
                _ => {}
            }
        }

        if !tick_observed {
            return;
        }

        self.record_death_outcomes(route_graphs);
        self.reconcile_stale_tracking(&mut bug_alive);
        self.apply_buffered_outcomes();
        self.top_up_low_pools();
        self.prune_drained_entries(out);
        self.report = telemetry::build_report(&self.entries);
    }

    /// Creates or replaces the entry for a freshly computed graph and seeds
    /// its base variant from the builder's static route costs.
    fn create_entry(
        &mut self,
        graph: RouteGraphId,
        gateway: GatewayId,
        route_count: usize,
        route_graphs: RouteGraphTableView<'_>,
    ) {
        let mut entry = GraphEntry {
            gateway,
            route_count,
            populations: BTreeMap::new(),
            drain_started: None,
        };

        if route_count > 0 {
            let weights = route_graphs
                .graph(graph)
                .map(RouteGraph::initial_weights)
                .filter(|weights| weights.len() == route_count)
                .unwrap_or_else(|| uniform_weights(route_count));

            let variant = SpawnVariant::new(0);
            let seed = derive_population_seed(self.config.rng_seed, graph, variant);
            let mut population = Population::new(weights, seed);
            population.resample(self.config.pool_size, self.config.scout_rate);
            let _ = entry.populations.insert(variant, population);
        }

        let _ = self.entries.insert(graph, entry);
    }

    fn begin_draining(&mut self, gateway: GatewayId) {
        for entry in self.entries.values_mut() {
            if entry.gateway == gateway && entry.drain_started.is_none() {
                entry.drain_started = Some(self.clock);
            }
        }
    }

    /// Folds buffered death notifications into per-population outcomes.
    fn record_death_outcomes(&mut self, route_graphs: RouteGraphTableView<'_>) {
        let deaths = std::mem::take(&mut self.pending_deaths);
        for (bug, position) in deaths {
            let Some(assignment) = self.tracked.remove(&bug) else {
                continue;
            };
            let fitness = route_graphs
                .graph(assignment.graph)
                .map_or(0.0, |graph| fitness::evaluate(graph, assignment.route, position));
            self.buffer_outcome(assignment, fitness);
        }
    }

    /// Records a flat zero outcome for every tracked bug the world forgot.
    ///
    /// Bulk despawns wipe bugs without individual kill notifications; the
    /// zero outcome keeps accounting honest and bounds the tracking table to
    /// one tick past each bug's actual destruction.
    fn reconcile_stale_tracking<F>(&mut self, bug_alive: &mut F)
    where
        F: FnMut(BugId) -> bool,
    {
        let stale: Vec<(BugId, RouteAssignment)> = self
            .tracked
            .iter()
            .filter(|(bug, _)| !bug_alive(**bug))
            .map(|(bug, assignment)| (*bug, *assignment))
            .collect();

        for (bug, assignment) in stale {
            let _ = self.tracked.remove(&bug);
            self.buffer_outcome(assignment, 0.0);
        }
    }

    fn buffer_outcome(&mut self, assignment: RouteAssignment, fitness: f64) {
        self.outcomes
            .entry((assignment.graph, assignment.variant))
            .or_default()
            .push((assignment.route, fitness));
    }

    /// Runs the multiplicative-weights update for every population that
    /// collected outcomes this tick, then resamples its pool.
    fn apply_buffered_outcomes(&mut self) {
        let learning_rate = self.config.learning_rate;
        let weight_floor = self.config.weight_floor;
        let pool_size = self.config.pool_size;
        let scout_rate = self.config.scout_rate;
        let rng_seed = self.config.rng_seed;

        let outcomes = std::mem::take(&mut self.outcomes);
        for ((graph, variant), samples) in outcomes {
            let Some(entry) = self.entries.get_mut(&graph) else {
                continue;
            };
            if entry.is_draining() || entry.route_count == 0 {
                continue;
            }

            let route_count = entry.route_count;
            let population = entry.populations.entry(variant).or_insert_with(|| {
                Population::new(
                    uniform_weights(route_count),
                    derive_population_seed(rng_seed, graph, variant),
                )
            });

            fold_outcomes(
                &mut population.weights,
                &samples,
                learning_rate,
                weight_floor,
                &mut self.fitness_sums,
                &mut self.fitness_counts,
            );
            population.resample(pool_size, scout_rate);
        }
    }

    fn top_up_low_pools(&mut self) {
        for entry in self.entries.values_mut() {
            if entry.is_draining() {
                continue;
            }
            for population in entry.populations.values_mut() {
                if sampler::is_low_water(population.remaining(), self.config.pool_size) {
                    population.resample(self.config.pool_size, self.config.scout_rate);
                }
            }
        }
    }

    /// Drops drained entries past their timeout and requests release of the
    /// matching route-graph resources in the same tick.
    fn prune_drained_entries(&mut self, out: &mut Vec<Command>) {
        let timeout = self.config.drain_timeout;
        let clock = self.clock;
        let expired: Vec<RouteGraphId> = self
            .entries
            .iter()
            .filter(|(_, entry)| {
                entry
                    .drain_started
                    .is_some_and(|start| clock.saturating_sub(start) >= timeout)
            })
            .map(|(graph, _)| *graph)
            .collect();

        for graph in expired {
            let _ = self.entries.remove(&graph);
            self.outcomes.retain(|(owner, _), _| *owner != graph);
            out.push(Command::RemoveRouteGraph { graph });
        }
    }
}

/// Applies one tick's outcomes to a weight vector.
///
/// The order is load-bearing: multiplicative update, normalize, floor, then
/// a second normalization only when the floor clamped something. Routes
/// without observations keep their prior weight through the update step.
fn fold_outcomes(
    weights: &mut [f64],
    samples: &[(RouteIndex, f64)],
    learning_rate: f64,
    weight_floor: f64,
    sums: &mut Vec<f64>,
    counts: &mut Vec<u32>,
) {
    let route_count = weights.len();
    sums.clear();
    sums.resize(route_count, 0.0);
    counts.clear();
    counts.resize(route_count, 0);

    for (route, fitness) in samples {
        let index = usize::from(route.get());
        if index < route_count {
            sums[index] += fitness;
            counts[index] += 1;
        }
    }

    for index in 0..route_count {
        if counts[index] > 0 {
            let mean = sums[index] / f64::from(counts[index]);
            weights[index] *= (learning_rate * mean).exp();
        }
    }

    normalize(weights);

    let mut floored = false;
    for weight in weights.iter_mut() {
        if *weight < weight_floor {
            *weight = weight_floor;
            floored = true;
        }
    }
    if floored {
        normalize(weights);
    }
}

fn normalize(weights: &mut [f64]) {
    if weights.is_empty() {
        return;
    }
    let total: f64 = weights.iter().sum();
    if total > 0.0 && total.is_finite() {
        for weight in weights.iter_mut() {
            *weight /= total;
        }
    } else {
        let uniform = 1.0 / weights.len() as f64;
        for weight in weights.iter_mut() {
            *weight = uniform;
        }
    }
}

fn uniform_weights(route_count: usize) -> Vec<f64> {
    if route_count == 0 {
        return Vec::new();
    }
    vec![1.0 / route_count as f64; route_count]
}

fn derive_population_seed(global_seed: u64, graph: RouteGraphId, variant: SpawnVariant) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(global_seed.to_le_bytes());
    hasher.update(RNG_STREAM_POPULATION.as_bytes());
    hasher.update(graph.get().to_le_bytes());
    hasher.update(variant.get().to_le_bytes());
    let digest = hasher.finalize();
    let bytes: [u8; 8] = digest[0..8].try_into().expect("sha256 digest slice length");
    u64::from_le_bytes(bytes)
}

#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs a headless Gate Siege assault loop.
//!
//! Two gateways stream bugs along their candidate routes; every bug falls
//! within its spawn tick at a progress point biased by its route's quality.
//! The routing system learns which routes carry bugs furthest and the
//! telemetry print shows its weights converging. Halfway through the run the
//! southern gateway is torn down to exercise draining and pruning.

use std::time::Duration;

use anyhow::{ensure, Result};
use clap::Parser;
use gate_siege_core::{
    BugId, Command, DistanceField, Event, GatewayId, Position, Route, RouteAssignment, RouteGraph,
    RouteGraphId, RouteIndex, SpawnVariant,
};
use gate_siege_system_routing::{Config, Routing};
use gate_siege_world::{self as world, query, World};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const ROUTE_CELLS: u32 = 16;
const TICK_DT: Duration = Duration::from_millis(100);
const NORTH_GATEWAY: GatewayId = GatewayId::new(1);
const SOUTH_GATEWAY: GatewayId = GatewayId::new(2);

/// Command-line options controlling the headless assault loop.
#[derive(Debug, Parser)]
#[command(name = "gate-siege", about = "Headless adaptive route allocation demo")]
struct Args {
    /// Number of simulation ticks to run.
    #[arg(long, default_value_t = 600)]
    ticks: u64,
    /// Bugs spawned per gateway per tick.
    #[arg(long, default_value_t = 4)]
    spawns_per_tick: u32,
    /// Seed for the allocator and the battle simulation.
    #[arg(long, default_value_t = 0x5eed)]
    seed: u64,
    /// Ticks between telemetry prints.
    #[arg(long, default_value_t = 60)]
    report_every: u64,
}

/// Entry point for the Gate Siege command-line interface.
fn main() -> Result<()> {
    let args = Args::parse();
    ensure!(args.ticks > 0, "--ticks must be positive");
    ensure!(args.report_every > 0, "--report-every must be positive");

    let mut world = World::new();
    let mut routing = Routing::new(Config {
        rng_seed: args.seed,
        ..Config::default()
    });
    let mut battle_rng = ChaCha8Rng::seed_from_u64(args.seed ^ 0x00ff_00ff_00ff_00ff);

    let mut events = Vec::new();
    install_demo_graphs(&mut world, &mut events);
    let mut out = Vec::new();
    handle(&mut routing, &world, &events, &mut out);

    let teardown_tick = args.ticks / 2;
    let mut south_removed = false;

    for tick_index in 0..args.ticks {
        let mut events = Vec::new();

        let gateways: Vec<(RouteGraphId, GatewayId)> = query::route_graph_table(&world)
            .iter()
            .map(|graph| (graph.id(), graph.gateway()))
            .collect();
        for (graph, gateway) in gateways {
            if south_removed && gateway == SOUTH_GATEWAY {
                continue;
            }
            for _ in 0..args.spawns_per_tick {
                let assignment = routing
                    .pop_route(graph, SpawnVariant::new(0))
                    .map(|route| RouteAssignment {
                        graph,
                        route,
                        variant: SpawnVariant::new(0),
                    });
                world::apply(
                    &mut world,
                    Command::SpawnBug {
                        position: Position::new(0.0, 0.0),
                        assignment,
                    },
                    &mut events,
                );
            }
        }

        let casualties: Vec<(BugId, Position)> = query::bug_view(&world)
            .iter()
            .map(|snapshot| {
                let position = match snapshot.assignment {
                    Some(assignment) => death_position(&world, assignment, &mut battle_rng),
                    None => snapshot.position,
                };
                (snapshot.id, position)
            })
            .collect();
        for (bug, position) in casualties {
            world::apply(&mut world, Command::KillBug { bug, position }, &mut events);
        }

        if tick_index == teardown_tick && !south_removed {
            world::apply(
                &mut world,
                Command::RemoveGateway {
                    gateway: SOUTH_GATEWAY,
                },
                &mut events,
            );
            south_removed = true;
            println!("tick {tick_index:>4}  southern gateway torn down");
        }

        world::apply(&mut world, Command::Tick { dt: TICK_DT }, &mut events);

        let mut out = Vec::new();
        handle(&mut routing, &world, &events, &mut out);
        let mut release_events = Vec::new();
        for command in out {
            world::apply(&mut world, command, &mut release_events);
        }
        for event in &release_events {
            if let Event::RouteGraphReleased { graph } = event {
                println!("tick {tick_index:>4}  released route graph {}", graph.get());
            }
        }

        if tick_index % args.report_every == 0 {
            let report = routing.last_report();
            println!(
                "tick {tick_index:>4}  graphs={} populations={}  [{}]",
                report.active_graphs,
                report.active_populations,
                report.summaries.join(" | ")
            );
        }
    }

    Ok(())
}

fn handle(routing: &mut Routing, world: &World, events: &[Event], out: &mut Vec<Command>) {
    routing.handle(
        events,
        query::route_graph_table(world),
        |bug| query::bug_exists(world, bug),
        out,
    );
}

fn install_demo_graphs(world: &mut World, out_events: &mut Vec<Event>) {
    let north = RouteGraph::new(
        RouteGraphId::new(1),
        NORTH_GATEWAY,
        vec![
            demo_route(40.0, 2.5),
            demo_route(55.0, 1.8),
            demo_route(70.0, 1.4),
        ],
    );
    let south = RouteGraph::new(
        RouteGraphId::new(2),
        SOUTH_GATEWAY,
        vec![demo_route(45.0, 2.2), demo_route(60.0, 1.7)],
    );
    world::apply(
        world,
        Command::InstallRouteGraph { graph: north },
        out_events,
    );
    world::apply(
        world,
        Command::InstallRouteGraph { graph: south },
        out_events,
    );
}

/// Builds a route with a single-row field falling linearly to the target.
fn demo_route(total: f32, cost_weight: f32) -> Route {
    let cell_length = total / ROUTE_CELLS as f32;
    let distances = (0..ROUTE_CELLS)
        .map(|index| total - (index as f32 + 0.5) * cell_length)
        .collect();
    Route::new(
        total,
        cost_weight,
        DistanceField::new(ROUTE_CELLS, 1, cell_length, distances),
    )
}

/// Samples where along its route a bug fell, biased by route quality.
fn death_position(world: &World, assignment: RouteAssignment, rng: &mut ChaCha8Rng) -> Position {
    let total = query::route_graph_table(world)
        .graph(assignment.graph)
        .and_then(|graph| graph.route(assignment.route))
        .map_or(1.0, Route::total_distance);
    let mean = survival_mean(assignment.route);
    let progress = (rng.gen::<f32>() * 2.0 * mean).min(0.999);
    Position::new(progress * total, 0.0)
}

/// Mean traversal fraction per route index; lower indices are safer lanes.
fn survival_mean(route: RouteIndex) -> f32 {
    match route.get() {
        0 => 0.9,
        1 => 0.55,
        _ => 0.35,
    }
}

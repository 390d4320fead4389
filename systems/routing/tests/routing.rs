use std::time::Duration;

use gate_siege_core::{
    Command, DistanceField, Event, GatewayId, Position, Route, RouteAssignment, RouteGraph,
    RouteGraphId, RouteIndex, SpawnVariant,
};
use gate_siege_system_routing::{Config, Routing};
use gate_siege_world::{self as world, query, World};

/// Single-row field whose distance falls linearly from `total` to zero.
fn gradient_field(total: f32) -> DistanceField {
    let cells = 10;
    let cell_length = total / cells as f32;
    let distances = (0..cells)
        .map(|index| total - (index as f32 + 0.5) * cell_length)
        .collect();
    DistanceField::new(cells, 1, cell_length, distances)
}

fn install_graph(
    world: &mut World,
    events: &mut Vec<Event>,
    id: u32,
    gateway: u32,
    routes: Vec<Route>,
) {
    world::apply(
        world,
        Command::InstallRouteGraph {
            graph: RouteGraph::new(RouteGraphId::new(id), GatewayId::new(gateway), routes),
        },
        events,
    );
}

fn tick(world: &mut World, events: &mut Vec<Event>, dt: Duration) {
    world::apply(world, Command::Tick { dt }, events);
}

fn handle(routing: &mut Routing, world: &World, events: &[Event], out: &mut Vec<Command>) {
    routing.handle(
        events,
        query::route_graph_table(world),
        |bug| query::bug_exists(world, bug),
        out,
    );
}

#[test]
fn seeded_pools_reflect_initial_weights() {
    let mut world = World::new();
    let mut routing = Routing::new(Config {
        pool_size: 2048,
        ..Config::default()
    });
    let mut events = Vec::new();
    let mut out = Vec::new();

    install_graph(
        &mut world,
        &mut events,
        7,
        0,
        vec![
            Route::new(10.0, 0.6, gradient_field(10.0)),
            Route::new(12.0, 0.3, gradient_field(12.0)),
            Route::new(15.0, 0.1, gradient_field(15.0)),
        ],
    );
    handle(&mut routing, &world, &events, &mut out);

    let mut counts = [0usize; 3];
    for _ in 0..1_000 {
        let route = routing
            .pop_route(RouteGraphId::new(7), SpawnVariant::new(0))
            .expect("seeded pool should cover 1000 draws");
        counts[usize::from(route.get())] += 1;
    }

    // 90% of slots exploit the 0.6 weight, 10% scout uniformly.
    let expected = 0.6 * 0.9 + 0.1 / 3.0;
    let observed = counts[0] as f64 / 1_000.0;
    assert!(
        (observed - expected).abs() < 0.05,
        "observed {observed}, expected about {expected}"
    );
}

#[test]
fn rewarded_routes_gain_weight() {
    let mut world = World::new();
    let mut routing = Routing::new(Config {
        pool_size: 4096,
        ..Config::default()
    });
    let mut out = Vec::new();

    let mut events = Vec::new();
    install_graph(
        &mut world,
        &mut events,
        1,
        0,
        vec![
            Route::new(10.0, 1.0, gradient_field(10.0)),
            Route::new(20.0, 1.0, gradient_field(20.0)),
        ],
    );
    handle(&mut routing, &world, &events, &mut out);

    // Both routes deliver full progress; only the length discount differs.
    for _ in 0..3 {
        let mut events = Vec::new();
        for index in 0..2u16 {
            let assignment = RouteAssignment {
                graph: RouteGraphId::new(1),
                route: RouteIndex::new(index),
                variant: SpawnVariant::new(0),
            };
            for _ in 0..50 {
                world::apply(
                    &mut world,
                    Command::SpawnBug {
                        position: Position::new(0.0, 0.5),
                        assignment: Some(assignment),
                    },
                    &mut events,
                );
            }
        }

        for snapshot in query::bug_view(&world) {
            let route = snapshot.assignment.expect("route-following bug").route;
            let death_x = if route == RouteIndex::new(0) { 9.9 } else { 19.8 };
            world::apply(
                &mut world,
                Command::KillBug {
                    bug: snapshot.id,
                    position: Position::new(death_x, 0.5),
                },
                &mut events,
            );
        }

        tick(&mut world, &mut events, Duration::from_millis(100));
        handle(&mut routing, &world, &events, &mut out);
    }

    let mut counts = [0usize; 2];
    for _ in 0..2_000 {
        let route = routing
            .pop_route(RouteGraphId::new(1), SpawnVariant::new(0))
            .expect("refilled pool should cover 2000 draws");
        counts[usize::from(route.get())] += 1;
    }

    assert!(
        counts[0] > counts[1],
        "shorter route should dominate: {counts:?}"
    );
    assert_eq!(routing.last_report().active_graphs, 1);
}

#[test]
fn stale_bugs_feed_their_variant_population() {
    let mut world = World::new();
    let mut routing = Routing::default();
    let mut out = Vec::new();

    let mut events = Vec::new();
    install_graph(
        &mut world,
        &mut events,
        2,
        0,
        vec![
            Route::new(10.0, 1.0, gradient_field(10.0)),
            Route::new(11.0, 1.0, gradient_field(11.0)),
        ],
    );
    handle(&mut routing, &world, &events, &mut out);

    // Only variant zero exists until an outcome arrives for variant three.
    assert_eq!(
        routing.pop_route(RouteGraphId::new(2), SpawnVariant::new(3)),
        None
    );

    let mut events = Vec::new();
    world::apply(
        &mut world,
        Command::SpawnBug {
            position: Position::new(0.0, 0.5),
            assignment: Some(RouteAssignment {
                graph: RouteGraphId::new(2),
                route: RouteIndex::new(1),
                variant: SpawnVariant::new(3),
            }),
        },
        &mut events,
    );
    handle(&mut routing, &world, &events, &mut out);

    // The wipe destroys the bug without a kill notification; the next tick's
    // stale pass records a zero-fitness outcome for variant three.
    let mut events = Vec::new();
    world::apply(&mut world, Command::ClearBugs, &mut events);
    tick(&mut world, &mut events, Duration::from_millis(100));
    handle(&mut routing, &world, &events, &mut out);

    assert_eq!(query::bug_count(&world), 0);
    assert!(
        routing
            .pop_route(RouteGraphId::new(2), SpawnVariant::new(3))
            .is_some(),
        "stale outcome should have materialized the variant population"
    );
}

#[test]
fn draining_blocks_refills_until_prune_releases_the_graph() {
    let mut world = World::new();
    let mut routing = Routing::new(Config {
        pool_size: 8,
        drain_timeout: Duration::from_secs(8),
        ..Config::default()
    });
    let mut out = Vec::new();

    let mut events = Vec::new();
    install_graph(
        &mut world,
        &mut events,
        4,
        5,
        vec![Route::new(10.0, 1.0, gradient_field(10.0))],
    );
    handle(&mut routing, &world, &events, &mut out);

    for _ in 0..8 {
        assert!(routing
            .pop_route(RouteGraphId::new(4), SpawnVariant::new(0))
            .is_some());
    }
    assert_eq!(
        routing.pop_route(RouteGraphId::new(4), SpawnVariant::new(0)),
        None
    );

    // Draining: repeated gateway teardown must not restart the timer, and
    // the exhausted pool must stay empty even across ticks.
    let mut events = Vec::new();
    world::apply(
        &mut world,
        Command::RemoveGateway {
            gateway: GatewayId::new(5),
        },
        &mut events,
    );
    world::apply(
        &mut world,
        Command::RemoveGateway {
            gateway: GatewayId::new(5),
        },
        &mut events,
    );
    tick(&mut world, &mut events, Duration::from_secs(1));
    handle(&mut routing, &world, &events, &mut out);

    assert!(out.is_empty(), "timeout has not elapsed");
    assert_eq!(
        routing.pop_route(RouteGraphId::new(4), SpawnVariant::new(0)),
        None
    );
    assert_eq!(routing.last_report().active_graphs, 0);

    let mut events = Vec::new();
    tick(&mut world, &mut events, Duration::from_secs(10));
    handle(&mut routing, &world, &events, &mut out);

    assert_eq!(
        out,
        vec![Command::RemoveRouteGraph {
            graph: RouteGraphId::new(4),
        }]
    );

    // The world releases the resource the allocator asked to drop.
    let mut events = Vec::new();
    for command in out.drain(..) {
        world::apply(&mut world, command, &mut events);
    }
    assert_eq!(
        events,
        vec![Event::RouteGraphReleased {
            graph: RouteGraphId::new(4),
        }]
    );
    assert!(query::route_graph_table(&world)
        .graph(RouteGraphId::new(4))
        .is_none());
}

#[test]
fn identical_event_streams_replay_identically() {
    let build = || {
        let mut world = World::new();
        let mut routing = Routing::new(Config::default());
        let mut out = Vec::new();

        let mut events = Vec::new();
        install_graph(
            &mut world,
            &mut events,
            1,
            0,
            vec![
                Route::new(10.0, 2.0, gradient_field(10.0)),
                Route::new(14.0, 1.0, gradient_field(14.0)),
            ],
        );
        for _ in 0..10 {
            world::apply(
                &mut world,
                Command::SpawnBug {
                    position: Position::new(0.0, 0.5),
                    assignment: Some(RouteAssignment {
                        graph: RouteGraphId::new(1),
                        route: RouteIndex::new(0),
                        variant: SpawnVariant::new(0),
                    }),
                },
                &mut events,
            );
        }
        for snapshot in query::bug_view(&world).into_iter().take(5) {
            world::apply(
                &mut world,
                Command::KillBug {
                    bug: snapshot.id,
                    position: Position::new(5.0, 0.5),
                },
                &mut events,
            );
        }
        tick(&mut world, &mut events, Duration::from_millis(16));
        handle(&mut routing, &world, &events, &mut out);
        (world, routing)
    };

    let (_, mut first) = build();
    let (_, mut second) = build();

    for _ in 0..50 {
        assert_eq!(
            first.pop_route(RouteGraphId::new(1), SpawnVariant::new(0)),
            second.pop_route(RouteGraphId::new(1), SpawnVariant::new(0))
        );
    }
}

#[test]
fn disabled_routing_answers_no_route() {
    let mut world = World::new();
    let mut routing = Routing::default();
    let mut out = Vec::new();

    routing.set_enabled(false);

    let mut events = Vec::new();
    install_graph(
        &mut world,
        &mut events,
        1,
        0,
        vec![Route::new(10.0, 1.0, gradient_field(10.0))],
    );
    handle(&mut routing, &world, &events, &mut out);
    assert_eq!(
        routing.pop_route(RouteGraphId::new(1), SpawnVariant::new(0)),
        None
    );

    // Re-enabling alone cannot recover dropped notifications; a fresh
    // install must arrive.
    routing.set_enabled(true);
    assert_eq!(
        routing.pop_route(RouteGraphId::new(1), SpawnVariant::new(0)),
        None
    );

    let mut events = Vec::new();
    install_graph(
        &mut world,
        &mut events,
        1,
        0,
        vec![Route::new(10.0, 1.0, gradient_field(10.0))],
    );
    handle(&mut routing, &world, &events, &mut out);
    assert!(routing
        .pop_route(RouteGraphId::new(1), SpawnVariant::new(0))
        .is_some());
}

#[test]
fn reset_restores_empty_state() {
    let mut world = World::new();
    let mut routing = Routing::default();
    let mut out = Vec::new();

    let mut events = Vec::new();
    install_graph(
        &mut world,
        &mut events,
        1,
        0,
        vec![Route::new(10.0, 1.0, gradient_field(10.0))],
    );
    tick(&mut world, &mut events, Duration::from_millis(100));
    handle(&mut routing, &world, &events, &mut out);
    assert_eq!(routing.last_report().active_graphs, 1);

    routing.reset();

    assert_eq!(routing.last_report().active_graphs, 0);
    assert_eq!(
        routing.pop_route(RouteGraphId::new(1), SpawnVariant::new(0)),
        None
    );
}

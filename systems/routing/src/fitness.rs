//! Converts a bug's death location into a bounded route reward.

use gate_siege_core::{Position, RouteGraph, RouteIndex};

/// Scores how well a route served a bug that died at `death`.
///
/// The reward is the fraction of the route traversed before death,
/// discounted by the route's length relative to the graph's shortest
/// alternative, so a long route that delivers a bug as far as a short one
/// still scores lower. Every lookup failure degrades to zero: a missing
/// route, an invalid distance field, a death outside the field's domain, or
/// a negative sampled distance all mean there is no usable signal.
pub(crate) fn evaluate(graph: &RouteGraph, route: RouteIndex, death: Position) -> f64 {
    let Some(route_data) = graph.route(route) else {
        return 0.0;
    };

    let field = route_data.field();
    if !field.valid() {
        return 0.0;
    }

    let Some(death_distance) = field.distance_to_target(death) else {
        return 0.0;
    };
    if death_distance < 0.0 {
        return 0.0;
    }

    let total = f64::from(route_data.total_distance());
    let progress = (1.0 - f64::from(death_distance) / total).clamp(0.0, 1.0);
    let efficiency = (f64::from(graph.min_total_distance()) / total).clamp(0.0, 1.0);
    progress * efficiency
}

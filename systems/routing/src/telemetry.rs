//! Deterministic, display-ready summaries of the routing populations.

use std::collections::BTreeMap;

use gate_siege_core::{
    RouteGraphId, RoutingReport, SpawnVariant, ROUTING_SUMMARY_EMPTY, ROUTING_SUMMARY_SLOTS,
};

use crate::GraphEntry;

/// Builds the per-tick report from the entry table.
///
/// Draining entries are invisible here. Summary slots cover the first four
/// active graphs in ascending identifier order; the remainder keep the
/// zero-string so the display stays stable.
pub(crate) fn build_report(entries: &BTreeMap<RouteGraphId, GraphEntry>) -> RoutingReport {
    let mut report = RoutingReport::default();
    let mut slot = 0;

    for entry in entries.values() {
        if entry.is_draining() {
            continue;
        }

        report.active_graphs += 1;
        report.active_populations += entry.populations.len() as u32;

        if slot < ROUTING_SUMMARY_SLOTS {
            report.summaries[slot] = summarize(entry);
            slot += 1;
        }
    }

    report
}

/// Formats the top three weights of the graph's base-variant population.
///
/// Three or more routes render as `"62 31 7 /5"`; one or two routes render
/// just the percentages; a graph without a base population renders the
/// zero-string.
fn summarize(entry: &GraphEntry) -> String {
    let Some(population) = entry.populations.get(&SpawnVariant::new(0)) else {
        return ROUTING_SUMMARY_EMPTY.to_string();
    };
    if population.weights.is_empty() {
        return ROUTING_SUMMARY_EMPTY.to_string();
    }

    let mut ordered = population.weights.clone();
    ordered.sort_by(|left, right| right.total_cmp(left));

    let percentages: Vec<String> = ordered
        .iter()
        .take(3)
        .map(|weight| format!("{}", (weight * 100.0).round() as u32))
        .collect();

    let mut summary = percentages.join(" ");
    if entry.route_count >= 3 {
        summary.push_str(&format!(" /{}", entry.route_count));
    }
    summary
}

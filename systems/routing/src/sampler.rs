//! Pool materialization blending weight-proportional and uniform draws.

use gate_siege_core::RouteIndex;
use rand::{seq::SliceRandom, Rng};

/// Fills `out` with `pool_size` shuffled route choices.
///
/// Each slot scouts with probability `scout_rate`, picking uniformly across
/// all routes; otherwise it exploits by binary-searching a cumulative-sum
/// array with a uniform draw. A non-positive total weight always scouts.
/// The final shuffle keeps scout and exploit picks positionally
/// uncorrelated, which matters because callers consume in bursts.
pub(crate) fn sample_pool<R>(
    weights: &[f64],
    pool_size: usize,
    scout_rate: f64,
    rng: &mut R,
    out: &mut Vec<RouteIndex>,
) where
    R: Rng,
{
    out.clear();
    let route_count = weights.len();
    if route_count == 0 || pool_size == 0 {
        return;
    }
    debug_assert!(
        route_count <= usize::from(u16::MAX),
        "route indices must fit u16"
    );

    let mut cumulative = Vec::with_capacity(route_count);
    let mut total = 0.0;
    for &weight in weights {
        total += weight.max(0.0);
        cumulative.push(total);
    }

    out.reserve(pool_size);
    for _ in 0..pool_size {
        let index = if total <= 0.0 || rng.gen::<f64>() < scout_rate {
            rng.gen_range(0..route_count)
        } else {
            let draw = rng.gen::<f64>() * total;
            cumulative
                .partition_point(|&bound| bound <= draw)
                .min(route_count - 1)
        };
        out.push(RouteIndex::new(index as u16));
    }

    out.shuffle(rng);
}

/// Reports whether a pool has fewer unconsumed slots than a quarter of its
/// configured size, the trigger for proactive refills.
pub(crate) fn is_low_water(remaining: usize, pool_size: usize) -> bool {
    remaining < pool_size / 4
}

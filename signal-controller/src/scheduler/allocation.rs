//! Density-weighted water-filling green allocation.
//!
//! Green time is shared in proportion to lane weight, clamped into
//! `[green_min, green_max]`, and any surplus or deficit created by clamping
//! is poured back into the lanes that can still move, until nothing is left
//! or every lane sits at a bound.

use crate::lane::{Lane, PerLane};

/// Redistribution rounds. Each round either settles the remainder or pins
/// at least one more lane, so four lanes need at most five.
const MAX_ROUNDS: usize = 8;

/// Whether the bounds could all be honoured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feasibility {
    Feasible,
    /// Every lane was pinned with `remainder` seconds still unassigned
    /// (positive: surplus, negative: deficit). It was absorbed starting
    /// with north.
    Infeasible { remainder: i64 },
}

impl Feasibility {
    pub fn is_feasible(&self) -> bool {
        matches!(self, Feasibility::Feasible)
    }
}

/// Result of [`allocate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub greens: PerLane<u32>,
    pub feasibility: Feasibility,
}

impl Allocation {
    pub fn total(&self) -> u64 {
        self.greens.as_array().iter().map(|&g| u64::from(g)).sum()
    }
}

/// Split `available` green seconds across the four lanes.
///
/// The greens always sum to exactly `available`. Weights are expected to be
/// positive; non-finite or non-positive weights are treated as the smallest
/// possible share.
///
/// # Example
///
/// ```
/// use signal_controller::lane::PerLane;
/// use signal_controller::scheduler::allocate;
///
/// let allocation = allocate(&PerLane::new([80.0, 20.0, 20.0, 20.0]), 48, 5, 30);
/// assert_eq!(allocation.greens, PerLane::new([27, 7, 7, 7]));
/// assert!(allocation.feasibility.is_feasible());
/// ```
pub fn allocate(weights: &PerLane<f64>, available: u32, green_min: u32, green_max: u32) -> Allocation {
    let weights = weights.map(sanitize_weight);
    let total_weight: f64 = weights.as_array().iter().sum();
    let available_i = i64::from(available);
    let min = i64::from(green_min);
    let max = i64::from(green_max).max(min);

    // Proportional share, rounded.
    let mut greens: [i64; 4] =
        Lane::ALL.map(|lane| (weights[lane] / total_weight * available as f64).round() as i64);

    let mut remainder = 0;
    for _ in 0..MAX_ROUNDS {
        for green in greens.iter_mut() {
            *green = (*green).clamp(min, max);
        }
        remainder = available_i - greens.iter().sum::<i64>();
        if remainder == 0 {
            break;
        }

        let free: Vec<Lane> = Lane::ALL
            .into_iter()
            .filter(|lane| {
                let green = greens[lane.index()];
                if remainder > 0 {
                    green < max
                } else {
                    green > min
                }
            })
            .collect();
        if free.is_empty() {
            break;
        }

        let shares = apportion(remainder.unsigned_abs(), &free, &weights);
        for (lane, share) in free.iter().zip(shares) {
            greens[lane.index()] += remainder.signum() * share as i64;
        }
    }

    let feasibility = if remainder == 0 {
        Feasibility::Feasible
    } else {
        absorb_remainder(&mut greens, remainder);
        Feasibility::Infeasible { remainder }
    };

    let greens = PerLane::new(greens.map(|g| u32::try_from(g.max(0)).unwrap_or(u32::MAX)));
    let allocation = Allocation {
        greens,
        feasibility,
    };
    debug_assert_eq!(
        allocation.total(),
        u64::from(available),
        "allocation must distribute exactly the available green"
    );
    allocation
}

fn sanitize_weight(weight: f64) -> f64 {
    if weight.is_finite() && weight > 0.0 {
        weight
    } else {
        f64::MIN_POSITIVE
    }
}

/// Largest-remainder apportionment of `amount` over `lanes` by weight.
///
/// Integer parts first, then one second each to the largest fractional
/// parts; equal fractions go to the lane earlier in canonical order.
fn apportion(amount: u64, lanes: &[Lane], weights: &PerLane<f64>) -> Vec<u64> {
    let total: f64 = lanes.iter().map(|&lane| weights[lane]).sum();
    let quotas: Vec<f64> = lanes
        .iter()
        .map(|&lane| amount as f64 * weights[lane] / total)
        .collect();

    let mut shares: Vec<u64> = quotas.iter().map(|q| q.floor() as u64).collect();
    let assigned: u64 = shares.iter().sum();
    let mut leftover = amount.saturating_sub(assigned);

    let mut order: Vec<usize> = (0..lanes.len()).collect();
    // Stable sort keeps canonical order among equal fractions.
    order.sort_by(|&a, &b| {
        let frac_a = quotas[a] - quotas[a].floor();
        let frac_b = quotas[b] - quotas[b].floor();
        frac_b.total_cmp(&frac_a)
    });
    for i in order.into_iter().cycle() {
        if leftover == 0 {
            break;
        }
        shares[i] += 1;
        leftover -= 1;
    }
    shares
}

/// Put an unresolvable remainder on north, spilling a deficit north cannot
/// cover onto the following lanes without going below zero.
fn absorb_remainder(greens: &mut [i64; 4], remainder: i64) {
    if remainder > 0 {
        greens[Lane::North.index()] += remainder;
        return;
    }
    let mut deficit = -remainder;
    for green in greens.iter_mut() {
        let take = deficit.min(*green);
        *green -= take;
        deficit -= take;
        if deficit == 0 {
            break;
        }
    }
}

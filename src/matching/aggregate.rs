//! Many-to-one aggregation of invoice candidates.
//!
//! One settlement can pay several invoices of the same partner at once.
//! The aggregator looks for a subset of unclaimed invoices whose summed
//! tax-inclusive totals explain the transaction amount: exhaustively for
//! small pools, greedily largest-first beyond the combinatorial cutoff.

use bigdecimal::BigDecimal;

use crate::matching::tolerance::within_tolerance;
use crate::types::Invoice;

/// Subset of invoices selected to explain a transaction amount
#[derive(Debug, Clone)]
pub struct AggregationOutcome {
    /// Indices into the input slice, ascending
    pub members: Vec<usize>,
    /// Summed tax-inclusive total of the members
    pub total: BigDecimal,
    /// Unexplained remainder, `target - total`
    pub residual: BigDecimal,
    /// Whether the total reaches the target within tolerance
    pub complete: bool,
}

/// Hard ceiling on the exhaustive pool size; the subset mask is 32 bits
/// and subset counts double per invoice, so policies asking for more fall
/// back to the greedy path
const EXHAUSTIVE_CEILING: usize = 20;

/// Find a subset of invoices summing to `target` within `tolerance`.
///
/// Subsets never overshoot the target by more than the tolerance. When no
/// subset reaches the target, the largest achievable sum is returned as an
/// incomplete outcome so the caller can record a partial match with its
/// residual. Returns `None` when not even one invoice fits under the
/// target, or the pool is empty.
///
/// Pools up to `exhaustive_limit` invoices, capped at
/// [`EXHAUSTIVE_CEILING`], are searched exhaustively; larger pools fall
/// back to greedy largest-first accumulation.
pub fn aggregate(
    target: &BigDecimal,
    invoices: &[&Invoice],
    tolerance: &BigDecimal,
    exhaustive_limit: usize,
) -> Option<AggregationOutcome> {
    if invoices.is_empty() {
        return None;
    }

    let cap = target + tolerance;
    let members = if invoices.len() <= exhaustive_limit.min(EXHAUSTIVE_CEILING) {
        exhaustive_best(invoices, &cap)
    } else {
        greedy_best(invoices, &cap, tolerance, target)
    }?;

    let total: BigDecimal = members
        .iter()
        .map(|index| &invoices[*index].total_inclusive)
        .sum();
    let residual = target - &total;
    let complete = within_tolerance(&total, target, tolerance);

    Some(AggregationOutcome {
        members,
        total,
        residual,
        complete,
    })
}

/// Exhaustive subset search, maximizing the sum without exceeding `cap`.
/// Equal sums prefer fewer members, then the earliest subset in mask
/// order, keeping the choice deterministic.
fn exhaustive_best(invoices: &[&Invoice], cap: &BigDecimal) -> Option<Vec<usize>> {
    let n = invoices.len();
    let mut best: Option<(BigDecimal, Vec<usize>)> = None;

    for mask in 1u32..(1u32 << n) {
        let members: Vec<usize> = (0..n).filter(|bit| mask & (1 << bit) != 0).collect();
        let sum: BigDecimal = members
            .iter()
            .map(|index| &invoices[*index].total_inclusive)
            .sum();
        if &sum > cap {
            continue;
        }
        let better = match &best {
            None => true,
            Some((best_sum, best_members)) => {
                sum > *best_sum || (sum == *best_sum && members.len() < best_members.len())
            }
        };
        if better {
            best = Some((sum, members));
        }
    }

    best.map(|(_, members)| members)
}

/// Greedy largest-first accumulation, stopping once within tolerance
fn greedy_best(
    invoices: &[&Invoice],
    cap: &BigDecimal,
    tolerance: &BigDecimal,
    target: &BigDecimal,
) -> Option<Vec<usize>> {
    let mut order: Vec<usize> = (0..invoices.len()).collect();
    order.sort_by(|a, b| {
        invoices[*b]
            .total_inclusive
            .cmp(&invoices[*a].total_inclusive)
            .then(a.cmp(b))
    });

    let mut members = Vec::new();
    let mut sum = BigDecimal::from(0);
    for index in order {
        let next = &sum + &invoices[index].total_inclusive;
        if &next > cap {
            continue;
        }
        sum = next;
        members.push(index);
        if within_tolerance(&sum, target, tolerance) {
            break;
        }
    }

    if members.is_empty() {
        return None;
    }
    members.sort_unstable();
    Some(members)
}

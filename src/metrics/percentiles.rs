//! Nearest-rank percentiles over sorted samples.
//!
//! Percentiles are expressed in per-mille so the rank arithmetic stays in
//! integers: `rank = ceil(p * n / 1000) - 1`, clamped to `[0, n - 1]`.

pub const P50: u64 = 500;
pub const P90: u64 = 900;
pub const P95: u64 = 950;
pub const P99: u64 = 990;

const PER_MILLE: u64 = 1_000;

/// Returns the nearest-rank percentile of `sorted` (ascending), or `0.0`
/// for an empty slice.
#[must_use]
pub fn nearest_rank(sorted: &[f64], per_mille: u64) -> f64 {
    let Some(last) = sorted.len().checked_sub(1) else {
        return 0.0;
    };
    let n = u64::try_from(sorted.len()).unwrap_or(u64::MAX);
    let rank = per_mille
        .saturating_mul(n)
        .saturating_add(PER_MILLE.saturating_sub(1))
        .checked_div(PER_MILLE)
        .unwrap_or(0)
        .saturating_sub(1);
    let index = usize::try_from(rank).unwrap_or(last).min(last);
    sorted.get(index).copied().unwrap_or(0.0)
}

pub(crate) fn sort_samples(samples: &mut [f64]) {
    samples.sort_by(f64::total_cmp);
}

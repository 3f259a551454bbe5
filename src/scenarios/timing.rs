//! Randomized delays, observed scheduling jitter and weighted phase budgets.
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;

/// Lower bound for any weighted phase budget.
pub const MIN_PHASE_DURATION: Duration = Duration::from_secs(1);

/// Uniformly distributed delay in `[min, max]`. Collapses to `min` when the
/// bounds are inverted or equal.
pub fn random_delay<R: Rng + ?Sized>(rng: &mut R, min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let low = u64::try_from(min.as_micros()).unwrap_or(u64::MAX);
    let high = u64::try_from(max.as_micros()).unwrap_or(u64::MAX);
    Duration::from_micros(rng.gen_range(low..=high))
}

/// Absolute distance between when a cycle was scheduled and when it began.
#[must_use]
pub fn observed_jitter(scheduled: Instant, actual: Instant) -> Duration {
    if actual >= scheduled {
        actual.saturating_duration_since(scheduled)
    } else {
        scheduled.saturating_duration_since(actual)
    }
}

/// `total × weight`, never below [`MIN_PHASE_DURATION`].
///
/// Weights outside `[0, 1]` are clamped. Because of the floor the phases of a
/// short run may add up to more than `total`.
#[must_use]
pub fn phase_duration(total: Duration, weight: f64) -> Duration {
    let weight = if weight.is_finite() {
        weight.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let scaled = Duration::try_from_secs_f64(total.as_secs_f64() * weight).unwrap_or(Duration::ZERO);
    scaled.max(MIN_PHASE_DURATION)
}

/// `start + offset`, saturating far in the future instead of overflowing.
#[must_use]
pub fn instant_after(start: Instant, offset: Duration) -> Instant {
    start
        .checked_add(offset)
        .unwrap_or_else(|| far_future(start))
}

fn far_future(start: Instant) -> Instant {
    const ONE_YEAR: Duration = Duration::from_secs(31_536_000);
    start.checked_add(ONE_YEAR).unwrap_or(start)
}

/// Fixed-rate schedule. Cycles are anchored to the start time, so a late
/// cycle shows up as jitter instead of shifting every later cycle.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Pacer {
    interval: Duration,
    next: Instant,
}

impl Pacer {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    /// Marks the start of a cycle and returns how far it is off schedule.
    pub(crate) fn begin(&self) -> Duration {
        observed_jitter(self.next, Instant::now())
    }

    /// Moves the schedule one interval forward and returns the next start.
    pub(crate) fn advance(&mut self) -> Instant {
        self.next = instant_after(self.next, self.interval);
        self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, AppResult};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn phase_budget_scales_and_floors() -> AppResult<()> {
        let total = Duration::from_secs(20);
        if phase_duration(total, 0.25) != Duration::from_secs(5) {
            return Err(AppError::validation(format!(
                "Expected 5s, got {:?}",
                phase_duration(total, 0.25)
            )));
        }
        if phase_duration(Duration::from_secs(2), 0.25) != MIN_PHASE_DURATION {
            return Err(AppError::validation("Short budgets must floor at one second"));
        }
        if phase_duration(total, f64::NAN) != MIN_PHASE_DURATION {
            return Err(AppError::validation("NaN weight must floor"));
        }
        Ok(())
    }

    #[test]
    fn random_delay_stays_in_bounds() -> AppResult<()> {
        let mut rng = StdRng::seed_from_u64(3);
        let min = Duration::from_millis(10);
        let max = Duration::from_millis(20);
        for _ in 0..200 {
            let delay = random_delay(&mut rng, min, max);
            if delay < min || delay > max {
                return Err(AppError::validation(format!("Out of bounds: {:?}", delay)));
            }
        }
        if random_delay(&mut rng, max, min) != max {
            return Err(AppError::validation("Inverted bounds must collapse to min"));
        }
        Ok(())
    }

    #[test]
    fn jitter_is_symmetric() -> AppResult<()> {
        let base = Instant::now();
        let later = instant_after(base, Duration::from_millis(7));
        if observed_jitter(base, later) != observed_jitter(later, base) {
            return Err(AppError::validation("Jitter should not depend on direction"));
        }
        if observed_jitter(base, later) != Duration::from_millis(7) {
            return Err(AppError::validation("Expected 7ms jitter"));
        }
        Ok(())
    }
}

/// Upper (exclusive) bounds of every bucket but the last, in milliseconds.
pub const BUCKET_BOUNDS_MS: [f64; 6] = [1.0, 5.0, 10.0, 50.0, 100.0, 500.0];
pub const BUCKET_COUNT: usize = 7;
pub const BUCKET_LABELS: [&str; BUCKET_COUNT] = [
    "<1ms",
    "1-5ms",
    "5-10ms",
    "10-50ms",
    "50-100ms",
    "100-500ms",
    ">500ms",
];

/// Fixed-width latency histogram; every recorded value lands in exactly one
/// bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LatencyHistogram {
    counts: [u64; BUCKET_COUNT],
}

impl LatencyHistogram {
    #[must_use]
    pub fn from_values(values: &[f64]) -> Self {
        let mut histogram = Self::default();
        for value in values {
            histogram.record(*value);
        }
        histogram
    }

    #[must_use]
    pub fn bucket_index(value_ms: f64) -> usize {
        BUCKET_BOUNDS_MS
            .iter()
            .position(|bound| value_ms < *bound)
            .unwrap_or(BUCKET_BOUNDS_MS.len())
    }

    pub fn record(&mut self, value_ms: f64) {
        if let Some(count) = self.counts.get_mut(Self::bucket_index(value_ms)) {
            *count = count.saturating_add(1);
        }
    }

    #[must_use]
    pub const fn counts(&self) -> &[u64; BUCKET_COUNT] {
        &self.counts
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().fold(0_u64, |acc, count| acc.saturating_add(*count))
    }

    pub fn buckets(&self) -> impl Iterator<Item = (&'static str, u64)> + '_ {
        BUCKET_LABELS.iter().copied().zip(self.counts.iter().copied())
    }
}

use std::time::{Duration, Instant};

pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(5);

/// Measures how many frames per second actually arrive.
///
/// The rate is recomputed once per report interval and held in between; it is
/// 0 until the first interval has completed.
#[derive(Debug, Clone)]
pub struct SamplingRateEstimator {
    sample_count: u64,
    last_update: Instant,
    update_interval: Duration,
    sampling_rate: f64,
}

impl SamplingRateEstimator {
    pub fn new(update_interval: Duration) -> Self {
        Self::starting_at(update_interval, Instant::now())
    }

    pub fn starting_at(update_interval: Duration, now: Instant) -> Self {
        Self {
            sample_count: 0,
            last_update: now,
            update_interval,
            sampling_rate: 0.0,
        }
    }

    pub fn add_sample(&mut self) -> f64 {
        self.add_sample_at(Instant::now())
    }

    pub fn add_sample_at(&mut self, now: Instant) -> f64 {
        self.sample_count += 1;
        let elapsed = now.saturating_duration_since(self.last_update);
        if elapsed >= self.update_interval && !elapsed.is_zero() {
            self.sampling_rate = self.sample_count as f64 / elapsed.as_secs_f64();
            self.sample_count = 0;
            self.last_update = now;
        }
        self.sampling_rate
    }

    pub fn rate(&self) -> f64 {
        self.sampling_rate
    }

    pub fn reset(&mut self) {
        self.reset_at(Instant::now());
    }

    pub fn reset_at(&mut self, now: Instant) {
        self.sample_count = 0;
        self.last_update = now;
        self.sampling_rate = 0.0;
    }
}

impl Default for SamplingRateEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_REPORT_INTERVAL)
    }
}

use ndarray::Array1;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};

use crate::frame::SampleFrame;

/// Raw ADC counts per millivolt on the synthetic device.
pub const COUNTS_PER_MV: f64 = 1000.0;

// (amplitude mV, offset from R in s, gaussian width in s²)
const P_WAVE: (f64, f64, f64) = (0.1, -0.15, 0.005);
const Q_WAVE: (f64, f64, f64) = (-0.3, -0.03, 0.001);
const R_WAVE: (f64, f64, f64) = (1.0, 0.0, 0.002);
const S_WAVE: (f64, f64, f64) = (-0.2, 0.03, 0.001);
const T_WAVE: (f64, f64, f64) = (0.3, 0.2, 0.01);

// Projection of the cardiac signal onto the measured channels, relative to
// lead II, in device order.
const CHANNEL_GAINS: [f64; 8] = [0.6, 1.0, 0.9, 1.0, 0.6, 0.7, -0.4, 0.2];

/// Deterministic PQRST generator at a fixed heart rate.
#[derive(Debug, Clone)]
pub struct SyntheticEcg {
    pub sampling_frequency: f64,
    pub heart_rate_bpm: f64,
    /// Peak amplitude of the uniform noise, mV.
    pub noise: f64,
    /// Amplitude of the 0.2 Hz baseline wander, mV.
    pub wander: f64,
    seed: u64,
}

impl SyntheticEcg {
    pub fn new(sampling_frequency: f64, heart_rate_bpm: f64) -> Self {
        Self {
            sampling_frequency,
            heart_rate_bpm,
            noise: 0.01,
            wander: 0.05,
            seed: 0,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = noise;
        self
    }

    pub fn rr_seconds(&self) -> f64 {
        60.0 / self.heart_rate_bpm
    }

    fn first_r(&self) -> f64 {
        0.5 * self.rr_seconds()
    }

    /// Noise-free lead II in mV at time `t`.
    pub fn clean_sample(&self, t: f64) -> f64 {
        let rr = self.rr_seconds();
        let nearest = ((t - self.first_r()) / rr).round() as i64;

        let mut value = self.wander * (2.0 * std::f64::consts::PI * 0.2 * t).sin();
        for k in nearest - 1..=nearest + 1 {
            let dt = t - (self.first_r() + k as f64 * rr);
            for &(amplitude, offset, width) in &[P_WAVE, Q_WAVE, R_WAVE, S_WAVE, T_WAVE] {
                value += amplitude * (-(dt - offset).powi(2) / width).exp();
            }
        }
        value
    }

    /// Indices of the R wave apexes that fall inside a window of `len` samples.
    pub fn r_peak_indices(&self, len: usize) -> Vec<usize> {
        let rr = self.rr_seconds();
        (0..)
            .map(|k| ((self.first_r() + k as f64 * rr) * self.sampling_frequency).round() as usize)
            .take_while(|&i| i < len)
            .collect()
    }

    /// Lead II in mV for the given duration.
    pub fn lead_ii(&self, seconds: f64) -> Array1<f64> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let n = (seconds * self.sampling_frequency) as usize;
        Array1::from_iter((0..n).map(|i| {
            self.clean_sample(i as f64 / self.sampling_frequency) + self.jitter(&mut rng)
        }))
    }

    /// Endless stream of device frames, channel noise drawn independently.
    pub fn frames(&self) -> Frames {
        Frames {
            ecg: self.clone(),
            rng: StdRng::seed_from_u64(self.seed),
            index: 0,
        }
    }

    /// Endless stream of device lines as the sensor sends them.
    pub fn lines(&self) -> impl Iterator<Item = String> {
        self.frames().map(|frame| frame.to_string())
    }

    fn jitter(&self, rng: &mut StdRng) -> f64 {
        if self.noise > 0.0 {
            rng.gen_range(-self.noise..self.noise)
        } else {
            0.0
        }
    }
}

pub struct Frames {
    ecg: SyntheticEcg,
    rng: StdRng,
    index: u64,
}

impl Iterator for Frames {
    type Item = SampleFrame;

    fn next(&mut self) -> Option<SampleFrame> {
        let t = self.index as f64 / self.ecg.sampling_frequency;
        self.index += 1;

        let clean = self.ecg.clean_sample(t);
        let mut measured = [0i32; 8];
        for (slot, gain) in measured.iter_mut().zip(CHANNEL_GAINS) {
            let mv = gain * clean + self.ecg.jitter(&mut self.rng);
            *slot = (mv * COUNTS_PER_MV).round() as i32;
        }
        Some(SampleFrame::from(measured))
    }
}

/// Feeds synthetic lines into `tx` at the generator's sampling rate until the
/// receiver goes away.
pub async fn mock_loop(ecg: SyntheticEcg, tx: mpsc::Sender<String>) {
    let mut lines = ecg.lines();
    let mut ticker = interval(Duration::from_millis(20));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let started = Instant::now();
    let mut sent: u64 = 0;
    loop {
        ticker.tick().await;

        let due = (started.elapsed().as_secs_f64() * ecg.sampling_frequency) as u64;
        while sent < due {
            let Some(line) = lines.next() else { return };
            if tx.send(line).await.is_err() {
                return;
            }
            sent += 1;
        }
    }
}

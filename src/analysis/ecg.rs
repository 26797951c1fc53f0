use find_peaks::PeakFinder;
use ndarray::{s, Array1, ArrayView1};
use ndarray_stats::QuantileExt;
use serde::{Deserialize, Serialize};
use slog::{debug, Logger};

use crate::analysis::filter::bandpass_filter;
use crate::error::DetectorError;

#[derive(Debug, Clone, PartialEq)]
pub struct DetectorParams {
    pub sampling_frequency: f64,
    pub filter_bandpass_frequencies: (f64, f64),
    /// Moving-window integration length, seconds.
    pub integration_window: f64,
    /// Threshold is `mean + factor * stddev` of the integrated envelope.
    pub threshold_std_factor: f64,
    /// Shortest accepted R-R spacing, seconds.
    pub r_peak_min_distance: f64,
    /// P search window, seconds before R: `(far, near)`.
    pub p_window: (f64, f64),
    /// Q search reach before R, seconds.
    pub q_window: f64,
    /// S search reach after R, seconds.
    pub s_window: f64,
    /// T search window, seconds after R: `(near, far)`.
    pub t_window: (f64, f64),
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            sampling_frequency: 500.0,
            filter_bandpass_frequencies: (0.5, 40.0),
            integration_window: 0.15,
            threshold_std_factor: 0.5,
            r_peak_min_distance: 0.2,
            p_window: (0.20, 0.12),
            q_window: 0.08,
            s_window: 0.08,
            t_window: (0.10, 0.30),
        }
    }
}

impl DetectorParams {
    pub fn with_sampling_rate(mut self, fs: f64) -> Self {
        self.sampling_frequency = fs;
        self
    }

    fn samples(&self, seconds: f64) -> usize {
        (seconds * self.sampling_frequency) as usize
    }
}

/// Wave positions found around one R peak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Beat {
    pub p: Option<usize>,
    pub q: Option<usize>,
    pub r: usize,
    pub s: Option<usize>,
    pub t: Option<usize>,
}

/// Indices into the window the features were computed from. They are
/// meaningless against any later window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    pub beats: Vec<Beat>,
    /// False when the bandpass could not be applied and the raw window was used.
    pub filtered: bool,
}

impl FeatureSet {
    pub fn r_peaks(&self) -> Vec<usize> {
        self.beats.iter().map(|b| b.r).collect()
    }

    pub fn p_waves(&self) -> Vec<usize> {
        self.beats.iter().filter_map(|b| b.p).collect()
    }

    pub fn q_waves(&self) -> Vec<usize> {
        self.beats.iter().filter_map(|b| b.q).collect()
    }

    pub fn s_waves(&self) -> Vec<usize> {
        self.beats.iter().filter_map(|b| b.s).collect()
    }

    pub fn t_waves(&self) -> Vec<usize> {
        self.beats.iter().filter_map(|b| b.t).collect()
    }

    /// One interval per consecutive R pair, in milliseconds.
    pub fn rr_intervals_ms(&self, fs: f64) -> Vec<f64> {
        self.beats
            .windows(2)
            .map(|w| (w[1].r - w[0].r) as f64 * 1000.0 / fs)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.beats.is_empty()
    }
}

/// Outcome of one detector run. Both non-feature variants read as an empty
/// feature set downstream, but stay distinguishable for logging and display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Detection {
    Features(FeatureSet),
    NoFeatures { filtered: bool },
    Degraded(DetectorError),
}

impl Detection {
    pub fn features(&self) -> Option<&FeatureSet> {
        match self {
            Detection::Features(features) => Some(features),
            _ => None,
        }
    }

    pub fn into_features(self) -> FeatureSet {
        match self {
            Detection::Features(features) => features,
            Detection::NoFeatures { filtered } => FeatureSet {
                beats: Vec::new(),
                filtered,
            },
            Detection::Degraded(_) => FeatureSet::default(),
        }
    }

    pub fn r_peaks(&self) -> Vec<usize> {
        self.features().map(FeatureSet::r_peaks).unwrap_or_default()
    }

    pub fn error(&self) -> Option<&DetectorError> {
        match self {
            Detection::Degraded(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Detection::Degraded(_))
    }
}

#[derive(Clone, Copy)]
enum Extreme {
    Max,
    Min,
}

/// Locates P, Q, R, S and T in one lead window.
pub struct FeatureDetector {
    pub params: DetectorParams,
    log: Logger,
}

impl FeatureDetector {
    pub fn new(params: DetectorParams, log: Option<Logger>) -> Self {
        Self {
            params,
            log: crate::log::or_discard(log),
        }
    }

    pub fn analyze(&self, signal: ArrayView1<f64>) -> Detection {
        let fs = self.params.sampling_frequency;
        if !(fs.is_finite() && fs > 0.0) {
            return Detection::Degraded(DetectorError::InvalidSamplingRate(fs));
        }
        if signal.is_empty() {
            return Detection::NoFeatures { filtered: false };
        }
        if let Some(index) = signal.iter().position(|v| !v.is_finite()) {
            return Detection::Degraded(DetectorError::NonFiniteSample { index });
        }

        let mean = signal.mean().unwrap_or(0.0);
        let normalized = signal.mapv(|a| a - mean);

        let (filtered, was_filtered) = match self.filter(normalized.view()) {
            Ok(filtered) => (filtered, true),
            Err(e) => {
                debug!(self.log, "bandpass bypassed"; "reason" => %e, "len" => signal.len());
                (normalized, false)
            }
        };

        let r_peaks = match self.find_r_peaks(filtered.view()) {
            Ok(peaks) => peaks,
            Err(e) => return Detection::Degraded(e),
        };

        if r_peaks.is_empty() {
            return Detection::NoFeatures {
                filtered: was_filtered,
            };
        }

        let beats = r_peaks
            .into_iter()
            .map(|r| self.delineate(filtered.view(), r))
            .collect();

        Detection::Features(FeatureSet {
            beats,
            filtered: was_filtered,
        })
    }

    fn filter(&self, signal: ArrayView1<f64>) -> Result<Array1<f64>, crate::error::FilterError> {
        let (low, high) = self.params.filter_bandpass_frequencies;
        bandpass_filter(signal, low, high, self.params.sampling_frequency)
    }

    /// Pan-Tompkins: differentiate, square, integrate, threshold.
    fn find_r_peaks(&self, signal: ArrayView1<f64>) -> Result<Vec<usize>, DetectorError> {
        if signal.len() < 3 {
            return Ok(Vec::new());
        }

        let derivative = &signal.slice(s![1..]) - &signal.slice(s![..-1]);
        let squared = derivative.mapv(|d| d * d);
        let window = self.params.samples(self.params.integration_window).max(1);
        let integrated = moving_average(squared.view(), window);

        let envelope = ArrayView1::from(&integrated[..]);
        let mean = envelope.mean().ok_or(DetectorError::NonFiniteEnvelope)?;
        let threshold = mean + self.params.threshold_std_factor * envelope.std(0.0);
        if !threshold.is_finite() {
            return Err(DetectorError::NonFiniteEnvelope);
        }

        let mut candidates: Vec<usize> = PeakFinder::new(&integrated)
            .with_min_height(threshold)
            .find_peaks()
            .iter()
            .map(|p| p.position.start)
            .filter(|&i| integrated[i] > threshold)
            .collect();
        candidates.sort_unstable();

        // earliest candidate wins inside the refractory distance
        let min_distance = ((self.params.r_peak_min_distance * self.params.sampling_frequency)
            .ceil() as usize)
            .max(1);
        let mut peaks: Vec<usize> = Vec::new();
        for candidate in candidates {
            match peaks.last() {
                Some(&last) if candidate - last < min_distance => {}
                _ => peaks.push(candidate),
            }
        }

        Ok(peaks)
    }

    fn delineate(&self, signal: ArrayView1<f64>, r: usize) -> Beat {
        let params = &self.params;
        let last = signal.len() - 1;
        let (p_far, p_near) = params.p_window;
        let (t_near, t_far) = params.t_window;

        let p = window_extreme(
            signal,
            r.saturating_sub(params.samples(p_far)),
            r.saturating_sub(params.samples(p_near)),
            Extreme::Max,
        );
        let q = window_extreme(
            signal,
            r.saturating_sub(params.samples(params.q_window)),
            r,
            Extreme::Min,
        );
        let s = window_extreme(
            signal,
            r + 1,
            (r + params.samples(params.s_window)).min(last) + 1,
            Extreme::Min,
        );
        let t = window_extreme(
            signal,
            r + params.samples(t_near),
            (r + params.samples(t_far)).min(last) + 1,
            Extreme::Max,
        );

        Beat { p, q, r, s, t }
    }
}

/// Index of the first extreme value in `[start, end)`, if that range is non-empty.
fn window_extreme(
    signal: ArrayView1<f64>,
    start: usize,
    end: usize,
    kind: Extreme,
) -> Option<usize> {
    if start >= end || end > signal.len() {
        return None;
    }
    let window = signal.slice(s![start..end]);
    let offset = match kind {
        Extreme::Max => window.argmax(),
        Extreme::Min => window.argmin(),
    };
    offset.ok().map(|i| start + i)
}

/// Centred moving average; the window is clipped at both ends and always
/// divided by its full length.
fn moving_average(data: ArrayView1<f64>, window: usize) -> Vec<f64> {
    let n = data.len();
    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0.0);
    let mut acc = 0.0;
    for &x in data.iter() {
        acc += x;
        prefix.push(acc);
    }

    let behind = window / 2;
    let ahead = (window - 1) / 2;
    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(behind);
            let hi = (i + ahead).min(n - 1);
            (prefix[hi + 1] - prefix[lo]) / window as f64
        })
        .collect()
}

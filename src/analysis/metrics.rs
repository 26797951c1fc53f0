use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::analysis::ecg::FeatureSet;

/// Fixed QT used for the Bazett correction until T-wave offsets are measured.
pub const QT_PLACEHOLDER_MS: f64 = 380.0;

/// Fixed P-wave duration reported while P onsets and offsets are not located.
pub const P_DURATION_PLACEHOLDER_MS: f64 = 80.0;

/// Rates outside this open band are treated as detection noise by displays.
pub const PLAUSIBLE_HEART_RATE_BPM: (f64, f64) = (30.0, 220.0);

/// Interval measurements for one analysis window. Every value is optional:
/// it is only reported when enough features were found to compute it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub heart_rate_bpm: Option<f64>,
    pub rr_interval_ms: Option<f64>,
    pub pr_interval_ms: Option<f64>,
    pub qrs_duration_ms: Option<f64>,
    pub qtc_ms: Option<f64>,
    pub p_duration_ms: Option<f64>,
}

impl Metrics {
    pub fn compute(features: &FeatureSet, fs: f64) -> Self {
        if features.is_empty() || !(fs.is_finite() && fs > 0.0) {
            return Self::default();
        }
        let to_ms = |samples: usize| samples as f64 * 1000.0 / fs;

        let rr_interval_ms = mean(features.rr_intervals_ms(fs).into_iter()).filter(|rr| *rr > 0.0);

        let pr_interval_ms = mean(features.beats.iter().filter_map(|b| match (b.p, b.q) {
            (Some(p), Some(q)) if q > p => Some(to_ms(q - p)),
            _ => None,
        }));

        let qrs_duration_ms = mean(features.beats.iter().filter_map(|b| match (b.q, b.s) {
            (Some(q), Some(s)) if s > q => Some(to_ms(s - q)),
            _ => None,
        }));

        Self {
            heart_rate_bpm: rr_interval_ms.map(|rr| 60_000.0 / rr),
            rr_interval_ms,
            pr_interval_ms,
            qrs_duration_ms,
            qtc_ms: rr_interval_ms.map(|rr| QT_PLACEHOLDER_MS / (rr / 1000.0).sqrt()),
            p_duration_ms: Some(P_DURATION_PLACEHOLDER_MS),
        }
    }

    /// Reference-range verdicts for the metrics that are present.
    pub fn assessments(&self) -> Vec<(MetricKind, Assessment)> {
        [
            (MetricKind::HeartRate, self.heart_rate_bpm),
            (MetricKind::PrInterval, self.pr_interval_ms),
            (MetricKind::QrsDuration, self.qrs_duration_ms),
            (MetricKind::Qtc, self.qtc_ms),
        ]
        .into_iter()
        .filter_map(|(kind, value)| value.map(|v| (kind, kind.assess(v))))
        .collect()
    }

    pub fn heart_rate_plausible(&self) -> bool {
        self.heart_rate_bpm.map_or(false, heart_rate_plausible)
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    values.collect::<Array1<f64>>().mean()
}

pub fn heart_rate_plausible(bpm: f64) -> bool {
    let (low, high) = PLAUSIBLE_HEART_RATE_BPM;
    bpm > low && bpm < high
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricKind {
    HeartRate,
    PrInterval,
    QrsDuration,
    Qtc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Assessment {
    Below,
    Normal,
    Above,
}

impl MetricKind {
    /// Inclusive normal range, in the metric's unit.
    pub fn normal_range(self) -> (f64, f64) {
        match self {
            MetricKind::HeartRate => (60.0, 100.0),
            MetricKind::PrInterval => (120.0, 200.0),
            MetricKind::QrsDuration => (80.0, 120.0),
            MetricKind::Qtc => (350.0, 450.0),
        }
    }

    pub fn assess(self, value: f64) -> Assessment {
        let (low, high) = self.normal_range();
        if value < low {
            Assessment::Below
        } else if value > high {
            Assessment::Above
        } else {
            Assessment::Normal
        }
    }

    /// What a display calls the verdict for this metric.
    pub fn describe(self, assessment: Assessment) -> &'static str {
        match (self, assessment) {
            (_, Assessment::Normal) => "Normal",
            (MetricKind::HeartRate, Assessment::Below) => "Bradycardia",
            (MetricKind::HeartRate, Assessment::Above) => "Tachycardia",
            (MetricKind::QrsDuration, Assessment::Below) => "Narrow",
            (MetricKind::QrsDuration, Assessment::Above) => "Wide",
            (MetricKind::PrInterval | MetricKind::Qtc, Assessment::Below) => "Short",
            (MetricKind::PrInterval | MetricKind::Qtc, Assessment::Above) => "Prolonged",
        }
    }
}

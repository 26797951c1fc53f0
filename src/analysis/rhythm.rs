use std::fmt;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RhythmLabel {
    #[serde(rename = "Possible Atrial Fibrillation")]
    AtrialFibrillation,
    #[serde(rename = "Possible Ventricular Tachycardia")]
    VentricularTachycardia,
    #[serde(rename = "PVC Detected")]
    PrematureVentricularContraction,
    #[serde(rename = "Bradycardia")]
    Bradycardia,
    #[serde(rename = "Tachycardia")]
    Tachycardia,
    #[serde(rename = "Normal Sinus Rhythm")]
    NormalSinusRhythm,
    #[serde(rename = "Unspecified Irregular Rhythm")]
    UnspecifiedIrregular,
    #[serde(rename = "insufficient data")]
    InsufficientData,
}

impl RhythmLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            RhythmLabel::AtrialFibrillation => "Possible Atrial Fibrillation",
            RhythmLabel::VentricularTachycardia => "Possible Ventricular Tachycardia",
            RhythmLabel::PrematureVentricularContraction => "PVC Detected",
            RhythmLabel::Bradycardia => "Bradycardia",
            RhythmLabel::Tachycardia => "Tachycardia",
            RhythmLabel::NormalSinusRhythm => "Normal Sinus Rhythm",
            RhythmLabel::UnspecifiedIrregular => "Unspecified Irregular Rhythm",
            RhythmLabel::InsufficientData => "insufficient data",
        }
    }
}

impl fmt::Display for RhythmLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// RR timing summary the rules are evaluated against.
#[derive(Debug, Clone, PartialEq)]
pub struct RrStats {
    pub peak_count: usize,
    pub rr_ms: Vec<f64>,
    pub mean_rr_ms: f64,
    pub std_rr_ms: f64,
    pub mean_hr_bpm: f64,
    /// Coefficient of variation of the raw sample spacing.
    pub spacing_cv: f64,
}

pub const MIN_PEAKS: usize = 3;

impl RrStats {
    /// `None` when there are too few peaks or the spacing is not increasing on average.
    pub fn from_peaks(r_peaks: &[usize], fs: f64) -> Option<Self> {
        if r_peaks.len() < MIN_PEAKS || !(fs.is_finite() && fs > 0.0) {
            return None;
        }

        let spacing: Array1<f64> = r_peaks
            .windows(2)
            .map(|w| w[1] as f64 - w[0] as f64)
            .collect();
        let mean_spacing = spacing.mean()?;
        if mean_spacing <= 0.0 {
            return None;
        }

        let rr_ms = spacing.mapv(|d| d * 1000.0 / fs);
        let mean_rr_ms = rr_ms.mean()?;

        Some(Self {
            peak_count: r_peaks.len(),
            mean_hr_bpm: 60_000.0 / mean_rr_ms,
            std_rr_ms: rr_ms.std(0.0),
            rr_ms: rr_ms.to_vec(),
            mean_rr_ms,
            spacing_cv: spacing.std(0.0) / mean_spacing,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    /// Evaluated always; matches accumulate.
    Arrhythmia,
    /// Evaluated while nothing has matched; the first match wins.
    Rate,
    /// Evaluated while nothing has matched; a match is returned on its own.
    Exclusive,
}

struct Rule {
    label: RhythmLabel,
    tier: Tier,
    matches: fn(&RrStats) -> bool,
}

// No rule has a peak gate of its own beyond MIN_PEAKS, apart from AF.
// A 3-peak window is already labelled for rate, sinus rhythm, VT and PVC.
const RULES: [Rule; 6] = [
    Rule {
        label: RhythmLabel::AtrialFibrillation,
        tier: Tier::Arrhythmia,
        matches: |s| s.peak_count >= 10 && s.spacing_cv > 0.15,
    },
    Rule {
        label: RhythmLabel::VentricularTachycardia,
        tier: Tier::Arrhythmia,
        matches: |s| s.mean_hr_bpm > 120.0 && s.std_rr_ms < 40.0,
    },
    Rule {
        label: RhythmLabel::PrematureVentricularContraction,
        tier: Tier::Arrhythmia,
        // premature beat followed by a compensatory pause
        matches: |s| {
            s.rr_ms
                .windows(2)
                .any(|w| w[0] < 0.8 * s.mean_rr_ms && w[1] > 1.2 * s.mean_rr_ms)
        },
    },
    Rule {
        label: RhythmLabel::Bradycardia,
        tier: Tier::Rate,
        matches: |s| s.mean_hr_bpm < 60.0,
    },
    Rule {
        label: RhythmLabel::Tachycardia,
        tier: Tier::Rate,
        matches: |s| s.mean_hr_bpm > 100.0,
    },
    Rule {
        label: RhythmLabel::NormalSinusRhythm,
        tier: Tier::Exclusive,
        matches: |s| (60.0..=100.0).contains(&s.mean_hr_bpm) && s.std_rr_ms < 120.0,
    },
];

/// Heuristic rhythm labelling from R-peak timing alone.
#[derive(Debug, Clone, Copy)]
pub struct RhythmClassifier {
    pub sampling_frequency: f64,
}

impl RhythmClassifier {
    pub fn new(sampling_frequency: f64) -> Self {
        Self { sampling_frequency }
    }

    pub fn classify(&self, r_peaks: &[usize]) -> Vec<RhythmLabel> {
        match RrStats::from_peaks(r_peaks, self.sampling_frequency) {
            Some(stats) => evaluate(&stats),
            None => vec![RhythmLabel::InsufficientData],
        }
    }
}

/// Runs the rule list in order.
pub fn evaluate(stats: &RrStats) -> Vec<RhythmLabel> {
    let mut labels = Vec::new();

    for rule in RULES.iter() {
        let eligible = match rule.tier {
            Tier::Arrhythmia => true,
            Tier::Rate | Tier::Exclusive => labels.is_empty(),
        };
        if !eligible || !(rule.matches)(stats) {
            continue;
        }
        if rule.tier == Tier::Exclusive {
            return vec![rule.label];
        }
        labels.push(rule.label);
    }

    if labels.is_empty() {
        labels.push(RhythmLabel::UnspecifiedIrregular);
    }
    labels
}

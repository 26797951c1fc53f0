use chrono::{DateTime, Utc};
use ndarray::ArrayView1;
use serde::Serialize;
use slog::{debug, warn, Logger};

use crate::leads::Lead;

pub mod ecg;
pub mod filter;
pub mod metrics;
pub mod rhythm;

pub use ecg::{Beat, DetectorParams, Detection, FeatureDetector, FeatureSet};
pub use metrics::{Assessment, MetricKind, Metrics};
pub use rhythm::{RhythmClassifier, RhythmLabel};

/// Everything one analysis pass produced for one lead window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub lead: Lead,
    pub sampling_rate: f64,
    pub window_len: usize,
    pub detection: Detection,
    pub rhythm: Vec<RhythmLabel>,
    pub metrics: Metrics,
    pub analyzed_at: DateTime<Utc>,
}

impl AnalysisReport {
    /// The detected features; empty when detection found nothing or degraded.
    pub fn features(&self) -> FeatureSet {
        self.detection.clone().into_features()
    }
}

/// Detector, classifier and metrics run back to back over one window.
pub struct Analysis {
    pub params: DetectorParams,
    log: Logger,
}

impl Analysis {
    pub fn new(params: DetectorParams, log: Option<Logger>) -> Self {
        Self {
            params,
            log: crate::log::or_discard(log),
        }
    }

    pub fn run(&self, lead: Lead, window: ArrayView1<f64>, sampling_rate: f64) -> AnalysisReport {
        let params = self.params.clone().with_sampling_rate(sampling_rate);
        let detector = FeatureDetector::new(params, Some(self.log.clone()));
        let detection = detector.analyze(window);

        let (rhythm, metrics) = match &detection {
            Detection::Degraded(e) => {
                warn!(self.log, "detection degraded"; "lead" => %lead, "error" => %e);
                (vec![RhythmLabel::InsufficientData], Metrics::default())
            }
            Detection::NoFeatures { .. } => (
                RhythmClassifier::new(sampling_rate).classify(&[]),
                Metrics::default(),
            ),
            Detection::Features(features) => (
                RhythmClassifier::new(sampling_rate).classify(&features.r_peaks()),
                Metrics::compute(features, sampling_rate),
            ),
        };

        debug!(self.log, "analysis pass";
            "lead" => %lead,
            "fs" => sampling_rate,
            "beats" => detection.features().map_or(0, |f| f.beats.len()),
            "rhythm" => ?rhythm,
            "hr" => ?metrics.heart_rate_bpm);

        AnalysisReport {
            lead,
            sampling_rate,
            window_len: window.len(),
            detection,
            rhythm,
            metrics,
            analyzed_at: Utc::now(),
        }
    }
}

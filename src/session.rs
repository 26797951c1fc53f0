use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use ndarray::ArrayView1;
use serde::Serialize;
use slog::{debug, info, o, warn, Logger};
use uuid::Uuid;

use crate::analysis::{Analysis, AnalysisReport, DetectorParams, FeatureSet, Metrics, RhythmLabel};
use crate::config::SessionConfig;
use crate::error::ConfigError;
use crate::frame::FrameDecoder;
use crate::leads::{Lead, LeadVector};
use crate::sampling::SamplingRateEstimator;
use crate::storage::LeadHistory;

/// Receives session updates, typically to redraw. Called from inside
/// [`Session::tick`], so implementations should return quickly.
pub trait SessionObserver: Send + Sync {
    fn frames_buffered(&self, _count: usize, _history: &LeadHistory) {}

    fn analysis_updated(&self, _report: &AnalysisReport) {}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AcquisitionStats {
    pub lines_received: u64,
    pub frames_decoded: u64,
    pub frames_dropped: u64,
    pub frames_overflowed: u64,
    pub frames_buffered: u64,
    pub ticks: u64,
    pub analyses: u64,
}

/// Owned copy of everything a display or report needs.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub running: bool,
    pub sampling_rate: f64,
    pub pending: usize,
    pub stats: AcquisitionStats,
    pub histories: BTreeMap<Lead, Vec<f64>>,
    pub report: Option<AnalysisReport>,
}

/// Tick-driven acquisition and analysis for one recording.
///
/// Lines go in through [`Session::push_frame`] and wait in a bounded queue;
/// each [`Session::tick`] moves a batch into the lead histories and analyses
/// the latest window. Everything else is a read-only query.
pub struct Session {
    id: Uuid,
    config: SessionConfig,
    decoder: FrameDecoder,
    pending: VecDeque<LeadVector>,
    history: LeadHistory,
    estimator: SamplingRateEstimator,
    analysis: Analysis,
    report: Option<AnalysisReport>,
    running: bool,
    frames_overflowed: u64,
    ticks: u64,
    analyses: u64,
    observer: Option<Arc<dyn SessionObserver>>,
    log: Logger,
}

impl Session {
    pub fn new(config: SessionConfig, log: Option<Logger>) -> Result<Self, ConfigError> {
        config.validate()?;

        let id = Uuid::new_v4();
        let log = crate::log::or_discard(log).new(o!("session" => id.to_string()));
        let params = DetectorParams::default().with_sampling_rate(config.nominal_sampling_rate);

        Ok(Self {
            id,
            decoder: FrameDecoder::new(Some(log.clone())),
            pending: VecDeque::new(),
            history: LeadHistory::new(config.history_len),
            estimator: SamplingRateEstimator::new(config.rate_report_interval()),
            analysis: Analysis::new(params, Some(log.clone())),
            report: None,
            running: false,
            frames_overflowed: 0,
            ticks: 0,
            analyses: 0,
            observer: None,
            config,
            log,
        })
    }

    pub fn set_observer(&mut self, observer: Arc<dyn SessionObserver>) {
        self.observer = Some(observer);
    }

    pub fn start(&mut self) {
        self.start_at(Instant::now());
    }

    /// Begins accepting frames. The rate measurement restarts from `now`;
    /// histories and the last report are kept.
    pub fn start_at(&mut self, now: Instant) {
        self.estimator.reset_at(now);
        if !self.running {
            info!(self.log, "acquisition started"; "lead" => %self.config.analysis_lead);
        }
        self.running = true;
    }

    /// Stops accepting frames and discards the ones not yet buffered.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        let discarded = self.pending.len();
        self.pending.clear();
        info!(self.log, "acquisition stopped";
            "discarded" => discarded,
            "buffered" => self.history.frames_pushed());
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Queues one raw device line. Returns whether it produced a frame.
    pub fn push_frame(&mut self, line: &str) -> bool {
        if !self.running {
            return false;
        }
        let Some(leads) = self.decoder.decode(line) else {
            return false;
        };

        if self.pending.len() >= self.config.max_pending_frames {
            self.pending.pop_front();
            self.frames_overflowed += 1;
            if self.frames_overflowed.is_power_of_two() {
                warn!(self.log, "frame queue full, dropping oldest";
                    "capacity" => self.config.max_pending_frames,
                    "overflowed" => self.frames_overflowed);
            }
        }
        self.pending.push_back(leads);
        true
    }

    pub fn tick(&mut self) -> usize {
        self.tick_at(Instant::now())
    }

    /// Moves up to `max_frames_per_tick` queued frames into the histories and,
    /// if any moved, analyses the latest window. Returns the number moved.
    pub fn tick_at(&mut self, now: Instant) -> usize {
        if !self.running {
            return 0;
        }
        self.ticks += 1;

        let count = self.pending.len().min(self.config.max_frames_per_tick);
        if count == 0 {
            return 0;
        }

        let previous_rate = self.estimator.rate();
        for leads in self.pending.drain(..count) {
            self.history.push(&leads);
            self.estimator.add_sample_at(now);
        }
        if self.estimator.rate() != previous_rate {
            let hz = format!("{:.1}", self.estimator.rate());
            info!(self.log, "sampling rate updated"; "hz" => hz);
        }

        if let Some(observer) = &self.observer {
            observer.frames_buffered(count, &self.history);
        }

        let lead = self.config.analysis_lead;
        let window = ArrayView1::from(self.history.window(lead));
        let report = self.analysis.run(lead, window, self.sampling_rate());
        self.analyses += 1;

        if let Some(observer) = &self.observer {
            observer.analysis_updated(&report);
        }
        self.report = Some(report);

        debug!(self.log, "tick"; "buffered" => count, "pending" => self.pending.len());
        count
    }

    /// Measured frame rate once available, the configured nominal rate before.
    pub fn sampling_rate(&self) -> f64 {
        match self.estimator.rate() {
            rate if rate > 0.0 => rate,
            _ => self.config.nominal_sampling_rate,
        }
    }

    pub fn history(&self, lead: Lead) -> &[f64] {
        self.history.window(lead)
    }

    pub fn histories(&self) -> &LeadHistory {
        &self.history
    }

    pub fn features(&self) -> FeatureSet {
        self.report.as_ref().map(AnalysisReport::features).unwrap_or_default()
    }

    /// Labels from the last analysis; empty before the first one.
    pub fn rhythm(&self) -> &[RhythmLabel] {
        self.report.as_ref().map(|r| r.rhythm.as_slice()).unwrap_or(&[])
    }

    pub fn metrics(&self) -> Metrics {
        self.report.as_ref().map(|r| r.metrics).unwrap_or_default()
    }

    pub fn report(&self) -> Option<&AnalysisReport> {
        self.report.as_ref()
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn stats(&self) -> AcquisitionStats {
        AcquisitionStats {
            lines_received: self.decoder.lines_received(),
            frames_decoded: self.decoder.frames_decoded(),
            frames_dropped: self.decoder.frames_dropped(),
            frames_overflowed: self.frames_overflowed,
            frames_buffered: self.history.frames_pushed(),
            ticks: self.ticks,
            analyses: self.analyses,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            running: self.running,
            sampling_rate: self.sampling_rate(),
            pending: self.pending.len(),
            stats: self.stats(),
            histories: Lead::ALL
                .iter()
                .map(|&lead| (lead, self.history.window(lead).to_vec()))
                .collect(),
            report: self.report.clone(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    fn session(config: SessionConfig) -> Session {
        let mut session = Session::new(config, None).unwrap();
        session.start();
        session
    }

    #[test]
    fn stopped_session_ignores_input() {
        let mut session = Session::new(SessionConfig::default(), None).unwrap();
        assert!(!session.push_frame("1 2 3 4 5 6 7 8"));
        assert_eq!(session.tick(), 0);
        assert_eq!(session.stats(), AcquisitionStats::default());
        assert!(session.rhythm().is_empty());
    }

    #[test]
    fn rejects_config_that_cannot_be_timed() {
        let config = SessionConfig {
            rate_report_interval_s: 1e20,
            ..SessionConfig::default()
        };
        assert!(matches!(Session::new(config, None), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn tick_moves_a_bounded_batch() {
        let mut session = session(SessionConfig::default());
        for i in 0..45 {
            assert!(session.push_frame(&format!("{i} 0 0 {i} 0 0 0 0")));
        }
        assert_eq!(session.tick(), 20);
        assert_eq!(session.tick(), 20);
        assert_eq!(session.tick(), 5);
        assert_eq!(session.tick(), 0);

        let window = session.history(Lead::I);
        assert_eq!(window.len(), 1000);
        assert_eq!(window[999], 44.0);
        assert_eq!(window[956], 1.0);

        let stats = session.stats();
        assert_eq!(stats.frames_buffered, 45);
        assert_eq!(stats.ticks, 4);
        assert_eq!(stats.analyses, 3);
    }

    #[test]
    fn malformed_lines_are_counted_and_skipped() {
        let mut session = session(SessionConfig::default());
        assert!(!session.push_frame("1 2 3"));
        assert!(!session.push_frame("a b c d e f g h"));
        assert!(!session.push_frame(""));
        assert!(session.push_frame("1 2 3 4 5 6 7 8"));

        let stats = session.stats();
        assert_eq!(stats.lines_received, 3);
        assert_eq!(stats.frames_dropped, 2);
        assert_eq!(stats.frames_decoded, 1);
        assert_eq!(session.pending(), 1);
    }

    #[test]
    fn overflow_drops_oldest() {
        let config = SessionConfig {
            max_pending_frames: 3,
            max_frames_per_tick: 10,
            ..SessionConfig::default()
        };
        let mut session = session(config);
        for i in 1..=5 {
            session.push_frame(&format!("{i} 0 0 0 0 0 0 0"));
        }
        assert_eq!(session.pending(), 3);
        assert_eq!(session.stats().frames_overflowed, 2);

        session.tick();
        let window = session.history(Lead::I);
        assert_eq!(&window[window.len() - 3..], &[3.0, 4.0, 5.0]);
    }

    #[test]
    fn stop_keeps_history_and_report() {
        let mut session = session(SessionConfig::default());
        for _ in 0..10 {
            session.push_frame("5 0 0 5 0 0 0 0");
        }
        session.tick();
        for _ in 0..10 {
            session.push_frame("7 0 0 7 0 0 0 0");
        }

        session.stop();
        session.stop();
        assert!(!session.is_running());
        assert_eq!(session.pending(), 0);
        assert_eq!(session.history(Lead::I)[999], 5.0);
        assert!(session.report().is_some());

        session.start();
        assert_eq!(session.history(Lead::I)[999], 5.0);
    }

    #[test]
    fn nominal_rate_until_measured() {
        let config = SessionConfig {
            rate_report_interval_s: 1.0,
            ..SessionConfig::default()
        };
        let mut session = Session::new(config, None).unwrap();
        let t0 = Instant::now();
        session.start_at(t0);
        assert_eq!(session.sampling_rate(), 500.0);

        // one frame every 4 ms for a second
        for step in 1..=250 {
            session.push_frame("0 0 0 0 0 0 0 0");
            session.tick_at(t0 + Duration::from_millis(4 * step));
        }
        assert_eq!(session.sampling_rate(), 250.0);
        assert_eq!(session.report().unwrap().sampling_rate, 250.0);

        session.start_at(t0 + Duration::from_secs(3));
        assert_eq!(session.sampling_rate(), 500.0);
    }

    #[test]
    fn observer_sees_each_update() {
        #[derive(Default)]
        struct Counter {
            frames: AtomicUsize,
            reports: AtomicUsize,
        }

        impl SessionObserver for Counter {
            fn frames_buffered(&self, count: usize, _history: &LeadHistory) {
                self.frames.fetch_add(count, Ordering::SeqCst);
            }

            fn analysis_updated(&self, _report: &AnalysisReport) {
                self.reports.fetch_add(1, Ordering::SeqCst);
            }
        }

        let counter = Arc::new(Counter::default());
        let mut session = session(SessionConfig::default());
        session.set_observer(counter.clone());

        for _ in 0..30 {
            session.push_frame("1 1 1 1 1 1 1 1");
        }
        session.tick();
        session.tick();
        session.tick();

        assert_eq!(counter.frames.load(Ordering::SeqCst), 30);
        assert_eq!(counter.reports.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn invalid_config_is_refused() {
        let config = SessionConfig {
            history_len: 0,
            ..SessionConfig::default()
        };
        assert!(Session::new(config, None).is_err());
    }
}

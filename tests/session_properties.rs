use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use ecgcore::leads::{derive_leads, Lead, LEAD_COUNT};
use ecgcore::mock::SyntheticEcg;
use ecgcore::storage::LeadHistory;
use ecgcore::{RhythmLabel, Session, SessionConfig};

/// Feeds `seconds` of synthetic signal, one tick per 50 ms of signal time.
fn record(ecg: &SyntheticEcg, config: SessionConfig, seconds: f64) -> Session {
    let per_tick = (ecg.sampling_frequency * 0.05) as usize;
    let ticks = (seconds * 20.0).round() as u64;

    let mut session = Session::new(config, None).unwrap();
    let t0 = Instant::now();
    session.start_at(t0);

    let mut lines = ecg.lines();
    for k in 1..=ticks {
        for line in lines.by_ref().take(per_tick) {
            assert!(session.push_frame(&line));
        }
        assert_eq!(session.tick_at(t0 + Duration::from_millis(50 * k)), per_tick);
    }
    session
}

fn recording_config() -> SessionConfig {
    SessionConfig {
        history_len: 4000,
        max_frames_per_tick: 25,
        ..SessionConfig::default()
    }
}

#[test]
fn derived_leads_obey_einthoven_and_goldberger() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..1000 {
        let measured: Vec<i32> = (0..8).map(|_| rng.gen_range(-5000..5000)).collect();
        let leads = derive_leads(&measured).unwrap();

        assert_eq!(leads[Lead::III], leads[Lead::II] - leads[Lead::I]);
        assert_eq!(leads[Lead::AVR] + leads[Lead::AVL] + leads[Lead::AVF], 0.0);
        assert_eq!(leads[Lead::V4], measured[1] as f64);
        assert_eq!(leads[Lead::V1], measured[6] as f64);
    }
}

#[test]
fn history_length_never_changes() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut history = LeadHistory::new(250);
    for _ in 0..1000 {
        let measured: Vec<i32> = (0..8).map(|_| rng.gen_range(-100..100)).collect();
        history.push(&derive_leads(&measured).unwrap());
        for lead in Lead::ALL {
            assert_eq!(history.window(lead).len(), 250);
        }
    }
}

#[test]
fn resting_recording_reads_as_sinus_rhythm() {
    let ecg = SyntheticEcg::new(500.0, 72.0).with_seed(9);
    let session = record(&ecg, recording_config(), 10.0);

    let rate = session.sampling_rate();
    assert!((rate - 500.0).abs() < 10.0, "measured {} Hz", rate);
    assert_eq!(session.rhythm(), &[RhythmLabel::NormalSinusRhythm]);

    let hr = session.metrics().heart_rate_bpm.expect("heart rate");
    assert!((hr - 72.0).abs() < 4.0, "hr {}", hr);

    let stats = session.stats();
    assert_eq!(stats.frames_buffered, 5000);
    assert_eq!(stats.frames_dropped, 0);
    assert_eq!(stats.ticks, 200);
}

#[test]
fn feature_indices_are_ordered_and_in_bounds() {
    let ecg = SyntheticEcg::new(500.0, 88.0).with_seed(21);
    let session = record(&ecg, recording_config(), 9.0);

    let features = session.features();
    let peaks = features.r_peaks();
    assert!(peaks.len() >= 3);
    assert!(peaks.windows(2).all(|w| w[0] < w[1]));
    assert!(peaks.iter().all(|&r| r < 4000));
    assert_eq!(features.rr_intervals_ms(session.sampling_rate()).len(), peaks.len() - 1);

    for series in [features.p_waves(), features.q_waves(), features.s_waves(), features.t_waves()] {
        assert!(series.len() <= peaks.len());
        assert!(series.iter().all(|&i| i < 4000));
    }
}

#[test]
fn slow_and_fast_recordings() {
    let slow = record(&SyntheticEcg::new(500.0, 45.0).with_seed(1), recording_config(), 10.0);
    assert_eq!(slow.rhythm(), &[RhythmLabel::Bradycardia]);

    let fast = record(&SyntheticEcg::new(500.0, 110.0).with_seed(2), recording_config(), 10.0);
    assert_eq!(fast.rhythm(), &[RhythmLabel::Tachycardia]);
}

#[test]
fn too_little_signal_is_insufficient() {
    // a single beat's worth of frames, analysed against a mostly flat window
    let ecg = SyntheticEcg::new(500.0, 60.0).with_seed(3);
    let config = SessionConfig {
        max_frames_per_tick: 25,
        ..SessionConfig::default()
    };
    let session = record(&ecg, config, 0.6);

    assert_eq!(session.rhythm(), &[RhythmLabel::InsufficientData]);
    assert_eq!(session.metrics().heart_rate_bpm, None);
}

#[test]
fn snapshot_is_a_complete_copy() {
    let ecg = SyntheticEcg::new(500.0, 72.0).with_seed(5);
    let mut session = record(&ecg, recording_config(), 5.0);
    session.stop();

    let snapshot = session.snapshot();
    assert!(!snapshot.running);
    assert_eq!(snapshot.histories.len(), LEAD_COUNT);
    assert_eq!(snapshot.histories[&Lead::AVF], session.history(Lead::AVF));
    assert_eq!(snapshot.stats, session.stats());

    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["histories"]["aVR"].as_array().unwrap().len(), 4000);
    assert!(json["report"]["rhythm"].is_array());
    assert_eq!(json["session_id"], session.id().to_string());
}

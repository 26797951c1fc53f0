//! Acquisition and analysis core for a 12-lead ECG.
//!
//! Device lines are decoded into [`frame::SampleFrame`]s, expanded to twelve
//! leads, buffered per lead and analysed on every [`session::Session`] tick.
//! [`monitor::Monitor`] drives a session from an async line source.

pub mod analysis;
pub mod config;
pub mod error;
pub mod frame;
pub mod leads;
pub mod log;
pub mod mock;
pub mod monitor;
pub mod sampling;
pub mod session;
pub mod storage;

pub use analysis::{AnalysisReport, Detection, FeatureSet, Metrics, RhythmLabel};
pub use config::SessionConfig;
pub use leads::{derive_leads, Lead, LeadVector, MonitoringMode};
pub use monitor::Monitor;
pub use session::{AcquisitionStats, Session, SessionObserver, SessionSnapshot};

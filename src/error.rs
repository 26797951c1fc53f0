use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Why a raw device line could not be turned into a [`crate::frame::SampleFrame`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("empty line")]
    Empty,
    #[error("token {position} is not an integer: {token:?}")]
    InvalidToken { position: usize, token: String },
    #[error("expected at least 8 fields, found {found}")]
    TooFewFields { found: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DerivationError {
    #[error("invalid frame: expected 8 measured values, got {len}")]
    InvalidFrame { len: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown lead {0:?}")]
pub struct UnknownLead(pub String);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    #[error("filter design failed: {0}")]
    Design(String),
    #[error("signal of {len} samples is too short, need more than {required}")]
    SignalTooShort { len: usize, required: usize },
}

/// Numerical conditions under which the feature detector gives up on a window.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
pub enum DetectorError {
    #[error("invalid sampling rate {0} Hz")]
    InvalidSamplingRate(f64),
    #[error("non-finite sample at index {index}")]
    NonFiniteSample { index: usize },
    #[error("detection envelope is not finite")]
    NonFiniteEnvelope,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed configuration")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("line source failed")]
    Source(#[from] io::Error),
}

use std::fmt;
use std::str::FromStr;

use slog::{trace, Logger};

use crate::error::{DecodeError, DerivationError};
use crate::leads::LeadVector;

pub const MEASURED_CHANNELS: usize = 8;

/// The eight readings of one device line, named after the electrode they come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleFrame {
    pub lead1: i32,
    pub v4: i32,
    pub v5: i32,
    pub lead2: i32,
    pub v3: i32,
    pub v6: i32,
    pub v1: i32,
    pub v2: i32,
}

impl SampleFrame {
    /// Builds a frame from exactly eight values in device order.
    pub fn from_measured(values: &[i32]) -> Result<Self, DerivationError> {
        match *values {
            [lead1, v4, v5, lead2, v3, v6, v1, v2] => Ok(SampleFrame {
                lead1,
                v4,
                v5,
                lead2,
                v3,
                v6,
                v1,
                v2,
            }),
            _ => Err(DerivationError::InvalidFrame { len: values.len() }),
        }
    }

    pub fn to_measured(&self) -> [i32; MEASURED_CHANNELS] {
        [
            self.lead1, self.v4, self.v5, self.lead2, self.v3, self.v6, self.v1, self.v2,
        ]
    }
}

impl From<[i32; MEASURED_CHANNELS]> for SampleFrame {
    fn from([lead1, v4, v5, lead2, v3, v6, v1, v2]: [i32; MEASURED_CHANNELS]) -> Self {
        SampleFrame {
            lead1,
            v4,
            v5,
            lead2,
            v3,
            v6,
            v1,
            v2,
        }
    }
}

/// Formats the frame the way the device sends it, minus the line terminator.
impl fmt::Display for SampleFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [first, rest @ ..] = self.to_measured();
        write!(f, "{}", first)?;
        for value in rest {
            write!(f, " {}", value)?;
        }
        Ok(())
    }
}

impl FromStr for SampleFrame {
    type Err = DecodeError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        if line.is_empty() {
            return Err(DecodeError::Empty);
        }

        let values = line
            .split_whitespace()
            .enumerate()
            .map(|(position, token)| {
                token.parse::<i32>().map_err(|_| DecodeError::InvalidToken {
                    position,
                    token: token.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if values.len() < MEASURED_CHANNELS {
            return Err(DecodeError::TooFewFields {
                found: values.len(),
            });
        }

        SampleFrame::from_measured(&values[..MEASURED_CHANNELS]).map_err(|_| {
            DecodeError::TooFewFields {
                found: values.len(),
            }
        })
    }
}

/// Turns device lines into lead vectors, counting what it sees.
pub struct FrameDecoder {
    lines_received: u64,
    frames_decoded: u64,
    frames_dropped: u64,
    log: Logger,
}

impl FrameDecoder {
    pub fn new(log: Option<Logger>) -> Self {
        Self {
            lines_received: 0,
            frames_decoded: 0,
            frames_dropped: 0,
            log: crate::log::or_discard(log),
        }
    }

    /// Decodes one line. Malformed lines are counted and dropped; blank lines
    /// are ignored entirely.
    pub fn decode(&mut self, line: &str) -> Option<LeadVector> {
        if line.trim().is_empty() {
            return None;
        }
        self.lines_received += 1;

        match line.parse::<SampleFrame>() {
            Ok(frame) => {
                self.frames_decoded += 1;
                Some(frame.into())
            }
            Err(e) => {
                self.frames_dropped += 1;
                trace!(self.log, "dropping frame"; "reason" => %e);
                None
            }
        }
    }

    pub fn lines_received(&self) -> u64 {
        self.lines_received
    }

    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }
}

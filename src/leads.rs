use std::fmt;
use std::ops::Index;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DerivationError, UnknownLead};
use crate::frame::SampleFrame;

pub const LEAD_COUNT: usize = 12;

/// The twelve standard leads. The discriminant is the lead's position in every
/// [`LeadVector`], history and display; [`Lead::ALL`] is the only lead table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Lead {
    I = 0,
    II,
    III,
    #[serde(rename = "aVR")]
    AVR,
    #[serde(rename = "aVL")]
    AVL,
    #[serde(rename = "aVF")]
    AVF,
    V1,
    V2,
    V3,
    V4,
    V5,
    V6,
}

impl Lead {
    pub const ALL: [Lead; LEAD_COUNT] = [
        Lead::I,
        Lead::II,
        Lead::III,
        Lead::AVR,
        Lead::AVL,
        Lead::AVF,
        Lead::V1,
        Lead::V2,
        Lead::V3,
        Lead::V4,
        Lead::V5,
        Lead::V6,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Lead> {
        Lead::ALL.get(index).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Lead::I => "I",
            Lead::II => "II",
            Lead::III => "III",
            Lead::AVR => "aVR",
            Lead::AVL => "aVL",
            Lead::AVF => "aVF",
            Lead::V1 => "V1",
            Lead::V2 => "V2",
            Lead::V3 => "V3",
            Lead::V4 => "V4",
            Lead::V5 => "V5",
            Lead::V6 => "V6",
        }
    }
}

impl fmt::Display for Lead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Lead {
    type Err = UnknownLead;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Lead::ALL
            .iter()
            .copied()
            .find(|lead| lead.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownLead(s.to_string()))
    }
}

/// One derived sample for all twelve leads, in [`Lead::ALL`] order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeadVector([f64; LEAD_COUNT]);

impl LeadVector {
    pub fn get(&self, lead: Lead) -> f64 {
        self.0[lead.index()]
    }

    pub fn as_array(&self) -> &[f64; LEAD_COUNT] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = (Lead, f64)> + '_ {
        Lead::ALL.iter().copied().zip(self.0.iter().copied())
    }
}

impl Index<Lead> for LeadVector {
    type Output = f64;

    fn index(&self, lead: Lead) -> &f64 {
        &self.0[lead.index()]
    }
}

impl From<[f64; LEAD_COUNT]> for LeadVector {
    fn from(values: [f64; LEAD_COUNT]) -> Self {
        LeadVector(values)
    }
}

impl From<SampleFrame> for LeadVector {
    fn from(frame: SampleFrame) -> Self {
        let lead1 = frame.lead1 as f64;
        let lead2 = frame.lead2 as f64;

        // Einthoven for III, Goldberger for the augmented limb leads.
        LeadVector([
            lead1,
            lead2,
            lead2 - lead1,
            -(lead1 + lead2) / 2.0,
            lead1 - lead2 / 2.0,
            lead2 - lead1 / 2.0,
            frame.v1 as f64,
            frame.v2 as f64,
            frame.v3 as f64,
            frame.v4 as f64,
            frame.v5 as f64,
            frame.v6 as f64,
        ])
    }
}

/// Derives all twelve leads from the eight measured values, given in device
/// order `[lead1, V4, V5, lead2, V3, V6, V1, V2]`.
pub fn derive_leads(measured: &[i32]) -> Result<LeadVector, DerivationError> {
    let frame = SampleFrame::from_measured(measured)?;
    Ok(frame.into())
}

/// Lead subsets shown by the different acquisition pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonitoringMode {
    TwelveLead,
    SevenLead,
    LiveMonitoring,
}

impl MonitoringMode {
    pub fn leads(self) -> &'static [Lead] {
        match self {
            MonitoringMode::TwelveLead => &Lead::ALL,
            MonitoringMode::SevenLead => &[
                Lead::V1,
                Lead::V2,
                Lead::V3,
                Lead::V4,
                Lead::V5,
                Lead::V6,
                Lead::II,
            ],
            MonitoringMode::LiveMonitoring => &[Lead::II],
        }
    }
}

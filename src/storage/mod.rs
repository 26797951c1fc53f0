use crate::leads::{Lead, LeadVector, LEAD_COUNT};

mod ringbuffer;

pub use ringbuffer::HistoryBuffer;

pub const DEFAULT_HISTORY_LEN: usize = 1000;

/// Sliding windows for all twelve leads, indexed through the lead table.
#[derive(Debug, Clone)]
pub struct LeadHistory {
    leads: [HistoryBuffer<f64>; LEAD_COUNT],
    frames_pushed: u64,
}

impl LeadHistory {
    pub fn new(hist_size: usize) -> Self {
        Self {
            leads: std::array::from_fn(|_| HistoryBuffer::new(hist_size, 0.0)),
            frames_pushed: 0,
        }
    }

    pub fn push(&mut self, sample: &LeadVector) {
        for (buffer, (_, value)) in self.leads.iter_mut().zip(sample.iter()) {
            buffer.push(value);
        }
        self.frames_pushed += 1;
    }

    pub fn window(&self, lead: Lead) -> &[f64] {
        self.leads[lead.index()].read()
    }

    pub fn latest(&self) -> LeadVector {
        let mut values = [0.0; LEAD_COUNT];
        for (slot, buffer) in values.iter_mut().zip(self.leads.iter()) {
            *slot = *buffer.latest();
        }
        LeadVector::from(values)
    }

    /// Owned copies of every window, in table order.
    pub fn snapshot(&self) -> Vec<Vec<f64>> {
        self.leads.iter().map(|b| b.read().to_vec()).collect()
    }

    pub fn hist_size(&self) -> usize {
        self.leads[0].capacity()
    }

    pub fn frames_pushed(&self) -> u64 {
        self.frames_pushed
    }
}

impl Default for LeadHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leads::derive_leads;

    #[test]
    fn every_lead_slides_together() {
        let mut history = LeadHistory::new(3);
        for k in 1..=4 {
            let leads = derive_leads(&[k, 0, 0, 2 * k, 0, 0, 10 * k, 0]).unwrap();
            history.push(&leads);
        }
        assert_eq!(history.window(Lead::I), &[2.0, 3.0, 4.0]);
        assert_eq!(history.window(Lead::II), &[4.0, 6.0, 8.0]);
        assert_eq!(history.window(Lead::III), &[2.0, 3.0, 4.0]);
        assert_eq!(history.window(Lead::V1), &[20.0, 30.0, 40.0]);
        assert_eq!(history.latest()[Lead::V1], 40.0);
        assert_eq!(history.frames_pushed(), 4);

        let snapshot = history.snapshot();
        assert_eq!(snapshot.len(), LEAD_COUNT);
        assert!(snapshot.iter().all(|w| w.len() == 3));
    }

    #[test]
    fn starts_flat() {
        let history = LeadHistory::default();
        assert_eq!(history.hist_size(), DEFAULT_HISTORY_LEN);
        assert!(history.window(Lead::AVF).iter().all(|&v| v == 0.0));
    }
}

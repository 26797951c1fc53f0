use biquad::{Biquad, Coefficients, DirectForm1, ToHertz, Type, Q_BUTTERWORTH_F64};
use ndarray::{Array1, ArrayView1};

use crate::error::FilterError;

// A Butterworth high-pass and low-pass section make a 4th order band; padding
// is three times the band's tap count, like a classic filtfilt.
const BAND_TAPS: usize = 9;
pub const PAD_LEN: usize = 3 * BAND_TAPS;

/// Zero-phase bandpass built from two biquad sections.
#[derive(Debug, Clone, Copy)]
pub struct Bandpass {
    high: Coefficients<f64>,
    low: Coefficients<f64>,
}

impl Bandpass {
    pub fn design(lowcut: f64, highcut: f64, fs: f64) -> Result<Self, FilterError> {
        if !(fs.is_finite() && lowcut.is_finite() && highcut.is_finite()) {
            return Err(FilterError::Design(format!(
                "non-finite parameters {lowcut}..{highcut} Hz at {fs} Hz"
            )));
        }
        if lowcut <= 0.0 || lowcut >= highcut {
            return Err(FilterError::Design(format!(
                "empty passband {lowcut}..{highcut} Hz"
            )));
        }
        if highcut >= fs / 2.0 {
            return Err(FilterError::Design(format!(
                "upper cutoff {highcut} Hz is not below Nyquist for {fs} Hz"
            )));
        }

        let high = Coefficients::<f64>::from_params(
            Type::HighPass,
            fs.hz(),
            lowcut.hz(),
            Q_BUTTERWORTH_F64,
        )
        .map_err(|e| FilterError::Design(format!("{:?}", e)))?;

        let low = Coefficients::<f64>::from_params(
            Type::LowPass,
            fs.hz(),
            highcut.hz(),
            Q_BUTTERWORTH_F64,
        )
        .map_err(|e| FilterError::Design(format!("{:?}", e)))?;

        Ok(Self { high, low })
    }

    /// Filters forward and then time-reversed so peaks stay where they are.
    pub fn filtfilt(&self, data: ArrayView1<f64>) -> Result<Array1<f64>, FilterError> {
        if data.len() <= PAD_LEN {
            return Err(FilterError::SignalTooShort {
                len: data.len(),
                required: PAD_LEN,
            });
        }

        let mut padded = odd_extension(data, PAD_LEN);

        self.run(&mut padded);
        padded.reverse();
        self.run(&mut padded);
        padded.reverse();

        Ok(Array1::from(padded[PAD_LEN..PAD_LEN + data.len()].to_vec()))
    }

    fn run(&self, data: &mut [f64]) {
        // fresh state for every pass
        let mut high = DirectForm1::<f64>::new(self.high);
        let mut low = DirectForm1::<f64>::new(self.low);

        for sample in data.iter_mut() {
            *sample = low.run(high.run(*sample));
        }
    }
}

/// Convenience wrapper: design and apply in one go.
pub fn bandpass_filter(
    data: ArrayView1<f64>,
    lowcut: f64,
    highcut: f64,
    fs: f64,
) -> Result<Array1<f64>, FilterError> {
    Bandpass::design(lowcut, highcut, fs)?.filtfilt(data)
}

/// Mirrors `pad` samples around each end point so the filters start settled.
fn odd_extension(data: ArrayView1<f64>, pad: usize) -> Vec<f64> {
    let n = data.len();
    let first = data[0];
    let last = data[n - 1];

    let mut out = Vec::with_capacity(n + 2 * pad);
    out.extend((1..=pad).rev().map(|i| 2.0 * first - data[i]));
    out.extend(data.iter().copied());
    out.extend((1..=pad).map(|i| 2.0 * last - data[n - 1 - i]));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;
    use std::f64::consts::PI;

    fn tone(freq: f64, fs: f64, n: usize) -> Array1<f64> {
        Array1::from_iter((0..n).map(|i| (2.0 * PI * freq * i as f64 / fs).sin()))
    }

    fn rms(data: &[f64]) -> f64 {
        (data.iter().map(|x| x * x).sum::<f64>() / data.len() as f64).sqrt()
    }

    #[test]
    fn passes_band_and_rejects_outside() {
        let fs = 500.0;
        let n = 2000;
        let inside = bandpass_filter(tone(10.0, fs, n).view(), 0.5, 40.0, fs).unwrap();
        let above = bandpass_filter(tone(150.0, fs, n).view(), 0.5, 40.0, fs).unwrap();

        // look away from the edges
        let mid = 500..1500;
        let inside_rms = rms(&inside.as_slice().unwrap()[mid.clone()]);
        assert!(inside_rms > 0.6, "in-band rms {}", inside_rms);
        assert!(rms(&above.as_slice().unwrap()[mid]) < 0.1);
    }

    #[test]
    fn keeps_peak_position() {
        let fs = 500.0;
        let signal = Array1::from_iter((0..1000).map(|i| {
            let t = (i as f64 - 400.0) / fs;
            (-(t / 0.02).powi(2)).exp()
        }));
        let filtered = bandpass_filter(signal.view(), 0.5, 40.0, fs).unwrap();
        let peak = filtered
            .iter()
            .enumerate()
            .fold((0, f64::MIN), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
            .0;
        assert!((peak as i64 - 400).abs() <= 1, "peak moved to {}", peak);
    }

    #[test]
    fn refuses_what_it_cannot_filter() {
        let short = Array1::from_elem(PAD_LEN, 1.0);
        assert!(matches!(
            bandpass_filter(short.view(), 0.5, 40.0, 500.0),
            Err(FilterError::SignalTooShort { .. })
        ));
        assert!(matches!(
            Bandpass::design(0.5, 40.0, 60.0),
            Err(FilterError::Design(_))
        ));
        assert!(Bandpass::design(40.0, 0.5, 500.0).is_err());
        assert!(Bandpass::design(0.5, 40.0, f64::NAN).is_err());
    }
}

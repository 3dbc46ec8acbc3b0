use crate::{
    errors::WaveformErr,
    instrument::{ChannelResponse, GroundMotion, StationResponse},
    trace::{Samples, Trace, TraceSet},
};
use log::debug;
use num_complex::Complex64;
use rustfft::FftPlanner;
use std::{f64::consts::PI, fmt};
use strum_macros::{EnumIter, EnumString, IntoStaticStr};

/// Physical units to convert the data to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumString, IntoStaticStr, EnumIter)]
pub enum OutputUnits {
    /// Displacement in meters.
    #[strum(to_string = "DISP")]
    Displacement,
    /// Velocity in meters per second.
    #[strum(to_string = "VEL")]
    Velocity,
    /// Acceleration in meters per second squared.
    #[strum(to_string = "ACC")]
    Acceleration,
}

impl OutputUnits {
    fn motion(self) -> GroundMotion {
        match self {
            OutputUnits::Displacement => GroundMotion::Displacement,
            OutputUnits::Velocity => GroundMotion::Velocity,
            OutputUnits::Acceleration => GroundMotion::Acceleration,
        }
    }
}

impl fmt::Display for OutputUnits {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name: &'static str = self.into();
        write!(f, "{}", name)
    }
}

/// Options for removing the instrument response.
#[derive(Clone, Debug, PartialEq)]
pub struct Deconvolution {
    /// Corner frequencies f1 < f2 < f3 < f4 in Hz of a cosine band pass applied in the frequency
    /// domain. Everything below f1 and above f4 is removed.
    pub pre_filter: Option<[f64; 4]>,
    /// Largest amplification of the inverse response in dB below its peak. `None` inverts the
    /// response exactly, which blows up wherever the response is small.
    pub water_level: Option<f64>,
    /// Units of the result.
    pub output: OutputUnits,
    /// Fraction of the trace at each end tapered with a half cosine before the transform.
    pub taper_fraction: f64,
}

impl Default for Deconvolution {
    fn default() -> Self {
        Deconvolution {
            pre_filter: None,
            water_level: Some(60.0),
            output: OutputUnits::Velocity,
            taper_fraction: 0.05,
        }
    }
}

impl Deconvolution {
    fn validate(&self) -> Result<(), WaveformErr> {
        if !(0.0..=0.5).contains(&self.taper_fraction) {
            return Err(WaveformErr::Validation(format!(
                "taper fraction {} is not between 0 and 0.5",
                self.taper_fraction
            )));
        }

        if let Some(corners) = self.pre_filter {
            let increasing = corners.windows(2).all(|pair| pair[0] < pair[1]);
            if !increasing || corners[0] < 0.0 {
                return Err(WaveformErr::Validation(format!(
                    "pre-filter corners {:?} must be non-negative and increasing",
                    corners
                )));
            }
        }

        Ok(())
    }
}

/// Convert every trace from counts to ground motion.
///
/// Each trace is corrected with the epoch of its channel that covers the whole trace. The mean is
/// removed before tapering, so a constant offset in counts does not leak into the result. The
/// result is floating point, written back to an integer format it is truncated.
pub fn remove_response(
    traces: &TraceSet,
    response: &StationResponse,
    options: &Deconvolution,
) -> Result<TraceSet, WaveformErr> {
    options.validate()?;

    let mut planner = FftPlanner::new();
    traces
        .iter()
        .map(|trace| {
            let epoch = response.epoch_for(
                trace.nscl.channel(),
                trace.nscl.location(),
                trace.start,
                trace.end(),
            )?;
            deconvolve(&mut planner, trace, epoch, options)
        })
        .collect::<Result<Vec<_>, _>>()
        .map(TraceSet::from)
}

fn deconvolve(
    planner: &mut FftPlanner<f64>,
    trace: &Trace,
    epoch: &ChannelResponse,
    options: &Deconvolution,
) -> Result<Trace, WaveformErr> {
    if trace.sample_rate <= 0.0 {
        return Err(WaveformErr::Validation(format!(
            "cannot correct {} with sample rate {}",
            trace.nscl, trace.sample_rate
        )));
    }

    let input = epoch.ground_motion()?;
    let power = options.output.motion() as i32 - input as i32;

    let n = trace.len();
    if n == 0 {
        return Ok(Trace {
            samples: Samples::Float(vec![]),
            ..trace.clone()
        });
    }

    let mut data = trace.samples.to_f64();
    remove_mean(&mut data);
    cosine_taper(&mut data, options.taper_fraction);

    let nfft = fast_length(2 * n);
    debug!(
        "removing response of {} from {} samples with a {} point transform",
        trace.nscl, n, nfft
    );

    let mut buffer: Vec<Complex64> = data
        .iter()
        .map(|&x| Complex64::new(x, 0.0))
        .chain(std::iter::repeat(Complex64::new(0.0, 0.0)))
        .take(nfft)
        .collect();

    planner.plan_fft_forward(nfft).process(&mut buffer);

    let df = trace.sample_rate / nfft as f64;
    let frequency = |k: usize| {
        if k <= nfft / 2 {
            k as f64 * df
        } else {
            (k as f64 - nfft as f64) * df
        }
    };

    let mut spectrum: Vec<Complex64> = (0..nfft)
        .map(|k| {
            let f = frequency(k);
            let h = epoch.evaluate(f.abs());
            if f < 0.0 {
                h.conj()
            } else {
                h
            }
        })
        .collect();

    if let Some(level) = options.water_level {
        apply_water_level(&mut spectrum, level);
    }

    for (k, (x, h)) in buffer.iter_mut().zip(&spectrum).enumerate() {
        let f = frequency(k);

        let mut value = if h.norm() > 0.0 {
            *x / h
        } else {
            Complex64::new(0.0, 0.0)
        };

        if let Some(corners) = options.pre_filter {
            value *= band_pass(f.abs(), &corners);
        }

        value *= unit_conversion(2.0 * PI * f, power);
        *x = value;
    }

    planner.plan_fft_inverse(nfft).process(&mut buffer);

    let corrected = buffer
        .iter()
        .take(n)
        .map(|c| c.re / nfft as f64)
        .collect();

    Ok(Trace {
        nscl: trace.nscl.clone(),
        start: trace.start,
        sample_rate: trace.sample_rate,
        samples: Samples::Float(corrected),
    })
}

/// Raise every non-zero value smaller than `level` dB below the peak up to that level, keeping
/// its phase.
fn apply_water_level(spectrum: &mut [Complex64], level: f64) {
    let peak = spectrum.iter().map(|h| h.norm()).fold(0.0, f64::max);
    let floor = peak * 10f64.powf(-level / 20.0);

    for h in spectrum.iter_mut() {
        let amplitude = h.norm();
        if amplitude > 0.0 && amplitude < floor {
            *h *= floor / amplitude;
        }
    }
}

fn remove_mean(data: &mut [f64]) {
    let mean = data.iter().sum::<f64>() / data.len() as f64;
    data.iter_mut().for_each(|x| *x -= mean);
}

/// Taper both ends of `data` with a half cosine over `fraction` of its length.
fn cosine_taper(data: &mut [f64], fraction: f64) {
    let width = (fraction * data.len() as f64).floor() as usize;
    if width == 0 {
        return;
    }

    let n = data.len();
    for i in 0..width {
        let weight = 0.5 * (1.0 - (PI * i as f64 / width as f64).cos());
        data[i] *= weight;
        data[n - 1 - i] *= weight;
    }
}

/// Gain of a cosine tapered band pass with corners `f1 < f2 < f3 < f4`.
fn band_pass(f: f64, corners: &[f64; 4]) -> f64 {
    let [f1, f2, f3, f4] = *corners;

    if f <= f1 || f >= f4 {
        0.0
    } else if f < f2 {
        0.5 * (1.0 - (PI * (f - f1) / (f2 - f1)).cos())
    } else if f <= f3 {
        1.0
    } else {
        0.5 * (1.0 + (PI * (f - f3) / (f4 - f3)).cos())
    }
}

/// `(iω)^power`, differentiating for positive powers and integrating for negative ones. The
/// zero frequency of an integral is set to zero.
fn unit_conversion(omega: f64, power: i32) -> Complex64 {
    if power == 0 {
        return Complex64::new(1.0, 0.0);
    }
    if omega == 0.0 {
        return Complex64::new(0.0, 0.0);
    }

    Complex64::new(0.0, omega).powi(power)
}

/// Smallest length of at least `min` whose only prime factors are 2, 3, and 5.
fn fast_length(min: usize) -> usize {
    let mut candidate = min.max(1);
    loop {
        let mut rest = candidate;
        for &p in &[2, 3, 5] {
            while rest % p == 0 {
                rest /= p;
            }
        }

        if rest == 1 {
            return candidate;
        }
        candidate += 1;
    }
}

#[cfg(test)]
mod unit {
    use super::*;
    use crate::{
        instrument::{PolesZeros, Sensitivity, TransferType},
        nscl::Nscl,
    };
    use chrono::{NaiveDate, NaiveDateTime};
    use std::str::FromStr;

    const RATE: f64 = 100.0;

    fn midnight() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2016, 5, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn response(units: &str, poles_zeros: Option<PolesZeros>) -> StationResponse {
        StationResponse {
            network: "CI".to_owned(),
            station: "WCS2".to_owned(),
            channels: vec![ChannelResponse {
                channel: "BHE".to_owned(),
                location: String::new(),
                start: NaiveDate::from_ymd_opt(2008, 1, 1)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
                end: None,
                sensitivity: Sensitivity {
                    value: 1000.0,
                    frequency: 1.0,
                    input_units: units.to_owned(),
                },
                poles_zeros,
            }],
        }
    }

    fn sine(chan: &str, frequency: f64, amplitude: f64, n: usize) -> TraceSet {
        let values = (0..n)
            .map(|i| amplitude * (2.0 * PI * frequency * i as f64 / RATE).sin())
            .collect();
        TraceSet::from(vec![Trace::new(
            Nscl::parse(&format!("CI.WCS2.{}.", chan)).unwrap(),
            midnight(),
            RATE,
            Samples::Float(values),
        )])
    }

    fn values(set: &TraceSet) -> Vec<f64> {
        set.traces()[0].samples.to_f64()
    }

    #[test]
    fn test_flat_response_scales_by_sensitivity() {
        let raw = sine("BHE", 2.0, 5000.0, 1000);
        let options = Deconvolution {
            water_level: None,
            taper_fraction: 0.0,
            ..Deconvolution::default()
        };

        let out = remove_response(&raw, &response("M/S", None), &options).unwrap();
        for (y, x) in values(&out).iter().zip(values(&raw)) {
            assert!((y - x / 1000.0).abs() < 1.0e-9, "{} vs {}", y, x / 1000.0);
        }
    }

    #[test]
    fn test_constant_offset_is_removed() {
        let raw = TraceSet::from(vec![Trace::new(
            Nscl::parse("CI.WCS2.BHE.").unwrap(),
            midnight(),
            RATE,
            Samples::Int(vec![5000; 1000]),
        )]);

        let out = remove_response(&raw, &response("M/S", None), &Deconvolution::default()).unwrap();
        assert!(values(&out).iter().all(|y| y.abs() < 1.0e-9));

        let options = Deconvolution {
            output: OutputUnits::Displacement,
            ..Deconvolution::default()
        };
        let out = remove_response(&raw, &response("M/S", None), &options).unwrap();
        assert!(values(&out).iter().all(|y| y.abs() < 1.0e-9));
    }

    #[test]
    fn test_taper_leaves_middle_alone() {
        let raw = sine("BHE", 2.0, 5000.0, 1000);
        let out = remove_response(&raw, &response("M/S", None), &Deconvolution::default()).unwrap();

        let (x, y) = (values(&raw), values(&out));
        assert_eq!(y.len(), x.len());
        assert!(y[0].abs() < 1.0e-9);
        for i in 50..950 {
            assert!((y[i] - x[i] / 1000.0).abs() < 1.0e-6);
        }
    }

    #[test]
    fn test_velocity_to_acceleration() {
        let raw = sine("BHE", 1.0, 1000.0, 2000);
        let options = Deconvolution {
            output: OutputUnits::Acceleration,
            taper_fraction: 0.2,
            ..Deconvolution::default()
        };

        let out = values(&remove_response(&raw, &response("M/S", None), &options).unwrap());
        let peak = 2.0 * PI;
        for (i, y) in out.iter().enumerate().take(1400).skip(600) {
            let expected = peak * (2.0 * PI * i as f64 / RATE).cos();
            assert!((y - expected).abs() < 0.02 * peak, "{}: {} vs {}", i, y, expected);
        }
    }

    #[test]
    fn test_pre_filter_removes_out_of_band_energy() {
        let raw = sine("BHE", 10.0, 1000.0, 2000);
        let options = Deconvolution {
            pre_filter: Some([0.5, 1.0, 3.0, 4.0]),
            ..Deconvolution::default()
        };

        let out = values(&remove_response(&raw, &response("M/S", None), &options).unwrap());
        let peak = out[500..1500].iter().fold(0.0f64, |m, y| m.max(y.abs()));
        assert!(peak < 0.01, "{}", peak);
    }

    #[test]
    fn test_water_level_bounds_amplification() {
        let high_pass = PolesZeros {
            transfer: TransferType::LaplaceRadians,
            normalization_factor: 0.0,
            normalization_frequency: 10.0,
            zeros: vec![Complex64::new(0.0, 0.0)],
            poles: vec![Complex64::new(-2.0 * PI, 0.0)],
        };
        let station = response("M/S", Some(high_pass));
        let raw = TraceSet::from(vec![Trace::new(
            Nscl::parse("CI.WCS2.BHE.").unwrap(),
            midnight(),
            RATE,
            Samples::Int((0..1000).collect()),
        )]);

        let peak = |water_level| {
            let options = Deconvolution {
                water_level,
                ..Deconvolution::default()
            };
            let out = values(&remove_response(&raw, &station, &options).unwrap());
            assert!(out.iter().all(|y| y.is_finite()));
            out.iter().fold(0.0f64, |m, y| m.max(y.abs()))
        };

        assert!(peak(Some(20.0)) < peak(None));
    }

    #[test]
    fn test_response_errors() {
        let raw = sine("BHZ", 2.0, 1.0, 100);
        match remove_response(&raw, &response("M/S", None), &Deconvolution::default()) {
            Err(WaveformErr::Response(_)) => {}
            other => panic!("expected response error, got {:?}", other),
        }

        let raw = sine("BHE", 2.0, 1.0, 100);
        match remove_response(&raw, &response("COUNTS", None), &Deconvolution::default()) {
            Err(WaveformErr::Response(_)) => {}
            other => panic!("expected response error, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_options() {
        let raw = sine("BHE", 2.0, 1.0, 100);
        let station = response("M/S", None);

        let options = Deconvolution {
            pre_filter: Some([1.0, 0.5, 3.0, 4.0]),
            ..Deconvolution::default()
        };
        assert!(remove_response(&raw, &station, &options).is_err());

        let options = Deconvolution {
            taper_fraction: 0.9,
            ..Deconvolution::default()
        };
        assert!(remove_response(&raw, &station, &options).is_err());
    }

    #[test]
    fn test_helpers() {
        assert_eq!(fast_length(1), 1);
        assert_eq!(fast_length(7), 8);
        assert_eq!(fast_length(2000), 2000);
        assert_eq!(fast_length(2002), 2025);

        let corners = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(band_pass(0.5, &corners), 0.0);
        assert_eq!(band_pass(2.5, &corners), 1.0);
        assert!((band_pass(1.5, &corners) - 0.5).abs() < 1.0e-12);
        assert_eq!(band_pass(4.5, &corners), 0.0);

        assert_eq!(unit_conversion(0.0, -1), Complex64::new(0.0, 0.0));
        assert_eq!(unit_conversion(2.0, 1), Complex64::new(0.0, 2.0));

        assert_eq!(OutputUnits::from_str("DISP").unwrap(), OutputUnits::Displacement);
        assert_eq!(OutputUnits::Velocity.to_string(), "VEL");
        assert!(OutputUnits::from_str("JERK").is_err());
    }
}

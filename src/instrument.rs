//! Instrument responses.
//!
//! A response describes how the sensor and digitizer turn ground motion into counts. These are
//! plain values so they can be built by hand as well as read from StationXML.

use crate::errors::WaveformErr;
use chrono::NaiveDateTime;
use num_complex::Complex64;
use std::f64::consts::PI;

pub mod stationxml;

/// All channel response epochs of one station.
#[derive(Clone, Debug, PartialEq)]
pub struct StationResponse {
    /// Network code.
    pub network: String,
    /// Station code.
    pub station: String,
    /// Every channel epoch listed for the station.
    pub channels: Vec<ChannelResponse>,
}

/// The response of one channel over one epoch.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelResponse {
    /// Channel code.
    pub channel: String,
    /// Location code, empty for none.
    pub location: String,
    /// Start of the epoch.
    pub start: NaiveDateTime,
    /// End of the epoch, `None` if still open.
    pub end: Option<NaiveDateTime>,
    /// Overall gain.
    pub sensitivity: Sensitivity,
    /// The analog stage, if the channel has one.
    pub poles_zeros: Option<PolesZeros>,
}

/// Overall gain of a channel.
#[derive(Clone, Debug, PartialEq)]
pub struct Sensitivity {
    /// Counts per input unit.
    pub value: f64,
    /// Frequency the gain is valid at, in Hz.
    pub frequency: f64,
    /// Physical units of the input, e.g. `M/S`.
    pub input_units: String,
}

/// How pole and zero values are expressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferType {
    /// Laplace transform in radians per second.
    LaplaceRadians,
    /// Laplace transform in Hz.
    LaplaceHertz,
}

/// Poles and zeros of the analog stage.
#[derive(Clone, Debug, PartialEq)]
pub struct PolesZeros {
    /// Units of the poles and zeros.
    pub transfer: TransferType,
    /// A0, scales the stage to unit gain at the normalization frequency.
    pub normalization_factor: f64,
    /// Frequency A0 applies at, in Hz.
    pub normalization_frequency: f64,
    /// Zeros of the transfer function.
    pub zeros: Vec<Complex64>,
    /// Poles of the transfer function.
    pub poles: Vec<Complex64>,
}

/// Physical quantities a sensor can measure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum GroundMotion {
    /// Meters.
    Displacement = 0,
    /// Meters per second.
    Velocity = 1,
    /// Meters per second squared.
    Acceleration = 2,
}

impl GroundMotion {
    /// Interpret a StationXML unit name.
    pub fn from_units(units: &str) -> Result<Self, WaveformErr> {
        let normalized: String = units
            .trim()
            .to_uppercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();

        match normalized.as_str() {
            "M" => Ok(GroundMotion::Displacement),
            "M/S" | "M/SEC" => Ok(GroundMotion::Velocity),
            "M/S**2" | "M/S/S" | "M/SEC**2" | "M/S2" => Ok(GroundMotion::Acceleration),
            _ => Err(WaveformErr::Response(format!(
                "unrecognized input units '{}'",
                units
            ))),
        }
    }
}

impl StationResponse {
    /// Find the epoch of a channel that covers `start` through `end`.
    pub fn epoch_for(
        &self,
        channel: &str,
        location: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<&ChannelResponse, WaveformErr> {
        let location = location.trim_matches(|c| c == '-' || c == ' ');

        self.channels
            .iter()
            .filter(|ch| ch.channel == channel)
            .filter(|ch| ch.location.trim_matches(|c| c == '-' || c == ' ') == location)
            .find(|ch| ch.start <= start && ch.end.map(|e| e >= end).unwrap_or(true))
            .ok_or_else(|| {
                WaveformErr::Response(format!(
                    "no response epoch for {}.{}.{}.{} covering {} to {}",
                    self.network, self.station, channel, location, start, end
                ))
            })
    }
}

impl PolesZeros {
    /// Value of the pole-zero expansion at `frequency` Hz, without A0.
    fn expansion(&self, frequency: f64) -> Complex64 {
        let s = match self.transfer {
            TransferType::LaplaceRadians => Complex64::new(0.0, 2.0 * PI * frequency),
            TransferType::LaplaceHertz => Complex64::new(0.0, frequency),
        };

        let numerator: Complex64 = self.zeros.iter().map(|z| s - z).product();
        let denominator: Complex64 = self.poles.iter().map(|p| s - p).product();
        numerator / denominator
    }

    /// A0, or the factor that gives unit gain at the normalization frequency when A0 is unset.
    pub fn a0(&self) -> f64 {
        if self.normalization_factor != 0.0 && self.normalization_factor.is_finite() {
            return self.normalization_factor;
        }

        let gain = self.expansion(self.normalization_frequency).norm();
        if gain > 0.0 && gain.is_finite() {
            1.0 / gain
        } else {
            1.0
        }
    }

    /// Normalized response of the stage at `frequency` Hz.
    pub fn evaluate(&self, frequency: f64) -> Complex64 {
        self.expansion(frequency) * self.a0()
    }
}

impl ChannelResponse {
    /// The quantity the channel measures.
    pub fn ground_motion(&self) -> Result<GroundMotion, WaveformErr> {
        GroundMotion::from_units(&self.sensitivity.input_units)
    }

    /// Counts out per unit of ground motion in, at `frequency` Hz.
    ///
    /// Digital filter stages are treated as flat, which holds inside the passband.
    pub fn evaluate(&self, frequency: f64) -> Complex64 {
        let stage = match &self.poles_zeros {
            Some(pz) => pz.evaluate(frequency),
            None => Complex64::new(1.0, 0.0),
        };

        stage * self.sensitivity.value
    }
}

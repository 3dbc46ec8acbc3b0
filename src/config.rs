//! Settings read from the environment.

use crate::{
    errors::WaveformErr,
    transform::{Deconvolution, OutputUnits},
};
use dirs::home_dir;
use std::{path::PathBuf, str::FromStr};

/// Settings shared by every product.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Bucket holding the continuous waveform archive and station metadata.
    pub input_bucket: String,
    /// Bucket the response removal product writes to.
    pub output_bucket: Option<String>,
    /// Directory of the local object store.
    pub store_root: PathBuf,
    /// How instrument responses are removed.
    pub deconvolution: Deconvolution,
}

impl Config {
    /// Public bucket of the continuous waveform archive.
    pub const DEFAULT_INPUT_BUCKET: &'static str = "scedc-pds";

    /// Read settings from the process environment.
    ///
    /// | Variable | Meaning |
    /// |---|---|
    /// | `PDS_INPUT_BUCKET` | archive bucket, default `scedc-pds` |
    /// | `S3_OUTPUT_BUCKET` | bucket for response removed files |
    /// | `PDS_STORE_ROOT` | local store directory, default `${HOME}/pds` |
    /// | `PDS_WATER_LEVEL` | water level in dB, `none` to disable, default 60 |
    /// | `PDS_PRE_FILTER` | four comma separated corner frequencies in Hz |
    /// | `PDS_OUTPUT_UNITS` | `DISP`, `VEL`, or `ACC`, default `VEL` |
    /// | `PDS_TAPER_FRACTION` | fraction tapered at each end, default 0.05 |
    pub fn from_env() -> Result<Self, WaveformErr> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from any source of variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, WaveformErr>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|val| !val.trim().is_empty());
        let mut config = Config::default();

        if let Some(bucket) = var("PDS_INPUT_BUCKET") {
            config.input_bucket = bucket.trim().to_owned();
        }
        config.output_bucket = var("S3_OUTPUT_BUCKET").map(|b| b.trim().to_owned());
        if let Some(root) = var("PDS_STORE_ROOT") {
            config.store_root = PathBuf::from(root);
        }

        let decon = &mut config.deconvolution;
        if let Some(level) = var("PDS_WATER_LEVEL") {
            decon.water_level = if level.trim().eq_ignore_ascii_case("none") {
                None
            } else {
                Some(number("PDS_WATER_LEVEL", &level)?)
            };
        }
        if let Some(corners) = var("PDS_PRE_FILTER") {
            decon.pre_filter = Some(pre_filter(&corners)?);
        }
        if let Some(units) = var("PDS_OUTPUT_UNITS") {
            decon.output = OutputUnits::from_str(&units.trim().to_uppercase()).map_err(|_| {
                WaveformErr::Validation(format!(
                    "PDS_OUTPUT_UNITS must be DISP, VEL, or ACC, not '{}'",
                    units
                ))
            })?;
        }
        if let Some(fraction) = var("PDS_TAPER_FRACTION") {
            decon.taper_fraction = number("PDS_TAPER_FRACTION", &fraction)?;
        }

        Ok(config)
    }

    /// The output bucket, required by products that write files.
    pub fn require_output_bucket(&self) -> Result<&str, WaveformErr> {
        self.output_bucket.as_deref().ok_or_else(|| {
            WaveformErr::Validation("no output bucket configured, set S3_OUTPUT_BUCKET".to_owned())
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            input_bucket: Self::DEFAULT_INPUT_BUCKET.to_owned(),
            output_bucket: None,
            store_root: home_dir()
                .map(|home| home.join("pds"))
                .unwrap_or_else(|| PathBuf::from("pds")),
            deconvolution: Deconvolution::default(),
        }
    }
}

fn number(name: &str, value: &str) -> Result<f64, WaveformErr> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|val| val.is_finite())
        .ok_or_else(|| WaveformErr::Validation(format!("{} is not a number: '{}'", name, value)))
}

fn pre_filter(value: &str) -> Result<[f64; 4], WaveformErr> {
    let corners = value
        .split(',')
        .map(|corner| number("PDS_PRE_FILTER", corner))
        .collect::<Result<Vec<_>, _>>()?;

    match corners.as_slice() {
        [f1, f2, f3, f4] => Ok([*f1, *f2, *f3, *f4]),
        _ => Err(WaveformErr::Validation(format!(
            "PDS_PRE_FILTER needs four corner frequencies, got '{}'",
            value
        ))),
    }
}

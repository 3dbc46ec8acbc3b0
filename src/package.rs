//! Shape results for the caller.

use crate::trace::{Samples, Trace};
use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// One trace as structured data.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WaveformRecord {
    /// Network code.
    pub network: String,
    /// Station code.
    pub station: String,
    /// Channel code.
    pub channel: String,
    /// Location code, empty for none.
    pub location: String,
    /// Seconds between samples.
    pub delta: f64,
    /// Time of the first sample, ISO-8601.
    pub starttime: String,
    /// Time of the last sample, ISO-8601.
    pub endtime: String,
    /// Samples per second.
    pub sampling_rate: f64,
    /// The samples, integers for count data.
    pub data: Samples,
}

impl From<&Trace> for WaveformRecord {
    fn from(trace: &Trace) -> Self {
        WaveformRecord {
            network: trace.nscl.network().to_owned(),
            station: trace.nscl.station().to_owned(),
            channel: trace.nscl.channel().to_owned(),
            location: trace.nscl.location().to_owned(),
            delta: trace.delta(),
            starttime: iso_time(trace.start),
            endtime: iso_time(trace.end()),
            sampling_rate: trace.sample_rate,
            data: trace.samples.clone(),
        }
    }
}

/// Where a product was written.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductOutput {
    /// Location of the output object as `s3://bucket/key`.
    pub output_key: String,
}

impl ProductOutput {
    /// Describe an object written to `bucket` under `key`.
    pub fn new(bucket: &str, key: &str) -> Self {
        ProductOutput {
            output_key: format!("s3://{}/{}", bucket, key),
        }
    }
}

/// Format a time as ISO-8601, with microseconds only when there are any.
pub fn iso_time(time: NaiveDateTime) -> String {
    if time.nanosecond() / 1_000 == 0 {
        time.format("%Y-%m-%dT%H:%M:%S").to_string()
    } else {
        time.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
    }
}

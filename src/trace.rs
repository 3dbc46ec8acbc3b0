//! Uniformly sampled waveform segments.

use crate::nscl::Nscl;
use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

/// Sample values of a trace.
///
/// Data read from the archive is in integer counts. Removing the instrument response turns it
/// into floating point physical units.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Samples {
    /// Digitizer counts.
    Int(Vec<i32>),
    /// Physical units, or any other non-integer data.
    Float(Vec<f64>),
}

impl Samples {
    /// Number of samples.
    pub fn len(&self) -> usize {
        match self {
            Samples::Int(v) => v.len(),
            Samples::Float(v) => v.len(),
        }
    }

    /// True if there are no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True for integer samples.
    pub fn is_int(&self) -> bool {
        match self {
            Samples::Int(_) => true,
            Samples::Float(_) => false,
        }
    }

    /// Copy the samples out as floating point values.
    pub fn to_f64(&self) -> Vec<f64> {
        match self {
            Samples::Int(v) => v.iter().map(|&x| f64::from(x)).collect(),
            Samples::Float(v) => v.clone(),
        }
    }

    /// Samples as 32 bit integers.
    ///
    /// Floating point values are truncated toward zero and saturate at the `i32` limits, NaN
    /// becomes zero. This loses information and is only used when writing integer formats.
    pub fn to_i32_truncated(&self) -> Vec<i32> {
        match self {
            Samples::Int(v) => v.clone(),
            Samples::Float(v) => v.iter().map(|&x| x as i32).collect(),
        }
    }

    /// A sub range of the samples.
    pub fn slice(&self, start: usize, end: usize) -> Samples {
        match self {
            Samples::Int(v) => Samples::Int(v[start..end].to_vec()),
            Samples::Float(v) => Samples::Float(v[start..end].to_vec()),
        }
    }

    /// Every `step`th sample, dropping any trailing partial group.
    pub(crate) fn every_nth(&self, step: usize) -> Samples {
        match self {
            Samples::Int(v) => Samples::Int(v.chunks_exact(step).map(|c| c[0]).collect()),
            Samples::Float(v) => Samples::Float(v.chunks_exact(step).map(|c| c[0]).collect()),
        }
    }
}

/// A contiguous, evenly spaced run of samples from one channel.
#[derive(Clone, Debug, PartialEq)]
pub struct Trace {
    /// The channel that recorded the samples.
    pub nscl: Nscl,
    /// Time of the first sample.
    pub start: NaiveDateTime,
    /// Samples per second.
    pub sample_rate: f64,
    /// The data.
    pub samples: Samples,
}

impl Trace {
    /// Create a new trace.
    pub fn new(nscl: Nscl, start: NaiveDateTime, sample_rate: f64, samples: Samples) -> Self {
        Trace {
            nscl,
            start,
            sample_rate,
            samples,
        }
    }

    /// Seconds between samples, zero if the sample rate is zero.
    pub fn delta(&self) -> f64 {
        if self.sample_rate > 0.0 {
            1.0 / self.sample_rate
        } else {
            0.0
        }
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True if the trace holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Time of the last sample. Equal to the start for empty traces.
    pub fn end(&self) -> NaiveDateTime {
        if self.is_empty() {
            self.start
        } else {
            self.time_of(self.len() - 1)
        }
    }

    /// Time of the sample at `index`.
    pub fn time_of(&self, index: usize) -> NaiveDateTime {
        self.start + seconds(index as f64 * self.delta())
    }

    /// Time the sample after the last one would have.
    pub fn next_start(&self) -> NaiveDateTime {
        self.time_of(self.len())
    }
}

/// An ordered collection of traces, possibly from several channels.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TraceSet {
    traces: Vec<Trace>,
}

impl TraceSet {
    /// Create an empty set.
    pub fn new() -> Self {
        TraceSet { traces: vec![] }
    }

    /// Add a trace to the end of the set.
    pub fn push(&mut self, trace: Trace) {
        self.traces.push(trace);
    }

    /// The traces in order.
    pub fn traces(&self) -> &[Trace] {
        &self.traces
    }

    /// Number of traces.
    pub fn len(&self) -> usize {
        self.traces.len()
    }

    /// True if there are no traces.
    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    /// Iterate over the traces.
    pub fn iter(&self) -> std::slice::Iter<'_, Trace> {
        self.traces.iter()
    }

    /// Give up the traces.
    pub fn into_traces(self) -> Vec<Trace> {
        self.traces
    }
}

impl From<Vec<Trace>> for TraceSet {
    fn from(traces: Vec<Trace>) -> Self {
        TraceSet { traces }
    }
}

impl IntoIterator for TraceSet {
    type Item = Trace;
    type IntoIter = std::vec::IntoIter<Trace>;

    fn into_iter(self) -> Self::IntoIter {
        self.traces.into_iter()
    }
}

impl<'a> IntoIterator for &'a TraceSet {
    type Item = &'a Trace;
    type IntoIter = std::slice::Iter<'a, Trace>;

    fn into_iter(self) -> Self::IntoIter {
        self.traces.iter()
    }
}

/// A duration from fractional seconds, rounded to the nearest nanosecond.
pub(crate) fn seconds(secs: f64) -> Duration {
    Duration::nanoseconds((secs * 1.0e9).round() as i64)
}

/// Seconds from `from` until `to`, negative if `to` comes first.
pub(crate) fn seconds_between(from: NaiveDateTime, to: NaiveDateTime) -> f64 {
    let diff = to - from;
    match diff.num_nanoseconds() {
        Some(ns) => ns as f64 / 1.0e9,
        None => diff.num_milliseconds() as f64 / 1.0e3,
    }
}

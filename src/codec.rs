//! Decoding archive files into traces and encoding traces for output.
//!
//! The archive stores miniSEED. Output is either STEIM2 compressed miniSEED, which is lossless
//! for integer data, or SAC. Writing miniSEED from floating point traces, which is what removing
//! the instrument response produces, truncates every sample to a 32 bit integer first. That step
//! is lossy and deliberate, STEIM2 can only compress integers.

use crate::{
    errors::WaveformErr,
    trace::{seconds_between, Samples, Trace, TraceSet},
};
use std::fmt;
use strum_macros::{EnumIter, EnumString, IntoStaticStr};

mod mseed;
mod sac;
mod steim;

/// Formats traces can be written in.
#[derive(Clone, Copy, PartialEq, Eq, Debug, EnumString, IntoStaticStr, EnumIter, Hash)]
pub enum Format {
    /// STEIM2 compressed miniSEED, the archive's own format.
    #[strum(to_string = "MSEED", serialize = "mseed", serialize = "ms")]
    MiniSeed,
    /// Binary SAC, one trace per file.
    #[strum(to_string = "SAC", serialize = "sac")]
    Sac,
}

impl Format {
    /// File name extension for the format.
    pub fn extension(self) -> &'static str {
        match self {
            Format::MiniSeed => "ms",
            Format::Sac => "sac",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name: &'static str = self.into();
        write!(f, "{}", name)
    }
}

/// Decode a miniSEED file.
///
/// Records are kept in file order. A record continues the previous trace when it has the same
/// identifiers, sample rate, and sample type, and starts within half a sample of where that
/// trace's next sample is due.
///
/// Records without samples are skipped, so an empty input, or one holding only such records,
/// decodes to an empty set rather than an error. Whether that is acceptable is up to the caller.
pub fn decode(bytes: &[u8]) -> Result<TraceSet, WaveformErr> {
    let mut traces: Vec<Trace> = vec![];

    for record in mseed::read_records(bytes)? {
        if let Some(last) = traces.last_mut() {
            if continues(last, &record) {
                append(&mut last.samples, record.samples);
                continue;
            }
        }

        traces.push(Trace::new(
            record.nscl,
            record.start,
            record.sample_rate,
            record.samples,
        ));
    }

    Ok(TraceSet::from(traces))
}

/// Decode a file in the given format.
pub fn decode_as(bytes: &[u8], format: Format) -> Result<TraceSet, WaveformErr> {
    match format {
        Format::MiniSeed => decode(bytes),
        Format::Sac => Ok(TraceSet::from(vec![sac::read(bytes)?])),
    }
}

/// Encode traces in the given format.
///
/// SAC holds exactly one trace. Empty traces are skipped in miniSEED output.
pub fn encode(traces: &TraceSet, format: Format) -> Result<Vec<u8>, WaveformErr> {
    if traces.is_empty() {
        return Err(WaveformErr::Encoding("no traces to encode".to_owned()));
    }

    match format {
        Format::MiniSeed => {
            let mut bytes = vec![];
            let mut sequence = 0;
            for trace in traces {
                mseed::write_trace(trace, &mut sequence, &mut bytes)?;
            }
            Ok(bytes)
        }
        Format::Sac => match traces.traces() {
            [trace] => sac::write(trace),
            many => Err(WaveformErr::Encoding(format!(
                "SAC holds one trace, got {}",
                many.len()
            ))),
        },
    }
}

fn continues(trace: &Trace, record: &mseed::Record) -> bool {
    if trace.nscl != record.nscl
        || (trace.sample_rate - record.sample_rate).abs() > 1.0e-9 * trace.sample_rate
        || trace.samples.is_int() != record.samples.is_int()
    {
        return false;
    }

    let offset = seconds_between(trace.next_start(), record.start);
    offset.abs() <= 0.5 * trace.delta()
}

fn append(samples: &mut Samples, more: Samples) {
    match (samples, more) {
        (Samples::Int(a), Samples::Int(b)) => a.extend(b),
        (Samples::Float(a), Samples::Float(b)) => a.extend(b),
        (Samples::Float(a), Samples::Int(b)) => a.extend(b.into_iter().map(f64::from)),
        (samples, Samples::Float(b)) => {
            let mut a = samples.to_f64();
            a.extend(b);
            *samples = Samples::Float(a);
        }
    }
}

/*--------------------------------------------------------------------------------------------------
                                          Unit Tests
--------------------------------------------------------------------------------------------------*/

use crate::{
    errors::WaveformErr,
    trace::{Trace, TraceSet},
};

/// Keep one of every `factor` samples.
///
/// No anti-alias filter is applied first, energy above the new Nyquist frequency folds back into
/// the output. Samples left over at the end that do not make a full group of `factor` are
/// dropped. A factor of 1 returns the trace unchanged and 0 is a validation error.
pub fn decimate(trace: &Trace, factor: u32) -> Result<Trace, WaveformErr> {
    if factor == 0 {
        return Err(WaveformErr::Validation(
            "decimation factor must be at least 1".to_owned(),
        ));
    }
    if factor == 1 {
        return Ok(trace.clone());
    }

    Ok(Trace {
        nscl: trace.nscl.clone(),
        start: trace.start,
        sample_rate: trace.sample_rate / f64::from(factor),
        samples: trace.samples.every_nth(factor as usize),
    })
}

/// Decimate every trace in a set.
pub fn decimate_all(traces: &TraceSet, factor: u32) -> Result<TraceSet, WaveformErr> {
    traces
        .iter()
        .map(|trace| decimate(trace, factor))
        .collect::<Result<Vec<_>, _>>()
        .map(TraceSet::from)
}

use crate::{
    errors::WaveformErr,
    nscl::Nscl,
    trace::{seconds_between, Samples, Trace, TraceSet},
};
use chrono::NaiveDateTime;

/// Tolerance in samples used when rounding window edges to sample indexes.
const EDGE_TOLERANCE: f64 = 1.0e-6;

/// Which samples win where two traces of the same channel cover the same times.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverlapPolicy {
    /// The trace that starts first keeps its samples.
    KeepFirst,
    /// The trace that starts later overwrites the earlier one.
    KeepLast,
}

impl Default for OverlapPolicy {
    fn default() -> Self {
        OverlapPolicy::KeepFirst
    }
}

/// Join overlapping and abutting traces of each channel with the default overlap policy.
pub fn merge(traces: TraceSet) -> TraceSet {
    merge_with(traces, OverlapPolicy::default())
}

/// Join overlapping and abutting traces of each channel.
///
/// Channels come out in the order they first appear, each channel's traces sorted by start time.
/// Traces separated by a gap, or sampled at different rates, stay separate. Joining integer
/// samples to floating point ones makes the result floating point.
pub fn merge_with(traces: TraceSet, policy: OverlapPolicy) -> TraceSet {
    let mut channels: Vec<(Nscl, Vec<Trace>)> = vec![];
    for trace in traces {
        match channels.iter_mut().find(|(nscl, _)| *nscl == trace.nscl) {
            Some((_, group)) => group.push(trace),
            None => channels.push((trace.nscl.clone(), vec![trace])),
        }
    }

    let mut merged = TraceSet::new();
    for (_, mut group) in channels {
        group.sort_by(|a, b| a.start.cmp(&b.start));

        let mut current: Option<Trace> = None;
        for trace in group {
            current = match current {
                None => Some(trace),
                Some(mut prev) => match resolve_overlap(&mut prev, trace, policy) {
                    None => Some(prev),
                    Some(next) => {
                        merged.push(prev);
                        Some(next)
                    }
                },
            };
        }

        if let Some(last) = current {
            merged.push(last);
        }
    }

    merged
}

/// Join `next` onto the end of `prev`, where `next` starts no earlier than `prev`.
///
/// Returns `next` untouched when the two cannot be joined because of a gap or a different
/// sample rate.
pub fn resolve_overlap(prev: &mut Trace, next: Trace, policy: OverlapPolicy) -> Option<Trace> {
    if prev.nscl != next.nscl
        || prev.sample_rate <= 0.0
        || (prev.sample_rate - next.sample_rate).abs() > 1.0e-9 * prev.sample_rate
    {
        return Some(next);
    }

    let offset = (seconds_between(prev.start, next.start) / prev.delta()).round();
    if offset < 0.0 || offset > prev.len() as f64 {
        return Some(next);
    }

    let offset = offset as usize;
    let (p, n) = (prev.len(), next.len());

    let parts = match policy {
        OverlapPolicy::KeepFirst => {
            let skip = (p - offset).min(n);
            vec![prev.samples.clone(), next.samples.slice(skip, n)]
        }
        OverlapPolicy::KeepLast => {
            let mut parts = vec![prev.samples.slice(0, offset), next.samples];
            if offset + n < p {
                parts.push(prev.samples.slice(offset + n, p));
            }
            parts
        }
    };

    prev.samples = concat(parts);
    None
}

fn concat(parts: Vec<Samples>) -> Samples {
    if parts.iter().all(Samples::is_int) {
        let mut joined = vec![];
        for part in parts {
            if let Samples::Int(values) = part {
                joined.extend(values);
            }
        }
        Samples::Int(joined)
    } else {
        Samples::Float(parts.iter().flat_map(Samples::to_f64).collect())
    }
}

/// Cut a trace down to the samples inside the closed interval `start` through `end`.
///
/// Window edges that fall between samples are rounded inward. It is an error for the window to
/// hold no samples of the trace.
pub fn trim(trace: &Trace, start: NaiveDateTime, end: NaiveDateTime) -> Result<Trace, WaveformErr> {
    if start > end {
        return Err(WaveformErr::Validation(format!(
            "trim window starts at {} after it ends at {}",
            start, end
        )));
    }
    if trace.sample_rate <= 0.0 {
        return Err(WaveformErr::Validation(format!(
            "cannot trim {} with sample rate {}",
            trace.nscl, trace.sample_rate
        )));
    }

    let miss = || WaveformErr::Window {
        start,
        end,
        trace_start: trace.start,
        trace_end: trace.end(),
    };

    if trace.is_empty() {
        return Err(miss());
    }

    let from = seconds_between(trace.start, start) / trace.delta();
    let to = seconds_between(trace.start, end) / trace.delta();

    let first = if from <= 0.0 {
        0.0
    } else {
        (from - EDGE_TOLERANCE).ceil()
    };
    let last = (to + EDGE_TOLERANCE)
        .floor()
        .min((trace.len() - 1) as f64);

    if last < 0.0 || first > last {
        return Err(miss());
    }

    let (first, last) = (first as usize, last as usize);
    Ok(Trace {
        nscl: trace.nscl.clone(),
        start: trace.time_of(first),
        sample_rate: trace.sample_rate,
        samples: trace.samples.slice(first, last + 1),
    })
}

/// Trim every trace in a set, dropping the ones the window misses.
///
/// Fails only when no trace has samples in the window.
pub fn trim_all(
    traces: &TraceSet,
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Result<TraceSet, WaveformErr> {
    let mut kept = TraceSet::new();
    let mut first_miss = None;

    for trace in traces {
        match trim(trace, start, end) {
            Ok(trimmed) => kept.push(trimmed),
            Err(err) if err.is_window() => {
                if first_miss.is_none() {
                    first_miss = Some(err);
                }
            }
            Err(err) => return Err(err),
        }
    }

    match (kept.is_empty(), first_miss) {
        (false, _) => Ok(kept),
        (true, Some(miss)) => Err(miss),
        (true, None) => Err(WaveformErr::Validation("no traces to trim".to_owned())),
    }
}

#[cfg(test)]
mod unit {
    use super::*;
    use crate::trace::seconds;
    use chrono::NaiveDate;

    fn midnight() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2016, 5, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn trace(chan: &str, offset_secs: f64, values: Vec<i32>) -> Trace {
        Trace::new(
            Nscl::parse(&format!("CI.WCS2.{}.", chan)).unwrap(),
            midnight() + seconds(offset_secs),
            10.0,
            Samples::Int(values),
        )
    }

    #[test]
    fn test_abutting_traces_join() {
        let set = TraceSet::from(vec![
            trace("BHE", 0.5, vec![5, 6, 7]),
            trace("BHE", 0.0, vec![0, 1, 2, 3, 4]),
        ]);

        let merged = merge(set);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.traces()[0].start, midnight());
        assert_eq!(
            merged.traces()[0].samples,
            Samples::Int(vec![0, 1, 2, 3, 4, 5, 6, 7])
        );
    }

    #[test]
    fn test_overlap_policies() {
        let set = || {
            TraceSet::from(vec![
                trace("BHE", 0.0, vec![0, 1, 2, 3, 4, 5]),
                trace("BHE", 0.2, vec![20, 30]),
            ])
        };

        let first = merge_with(set(), OverlapPolicy::KeepFirst);
        assert_eq!(first.traces()[0].samples, Samples::Int(vec![0, 1, 2, 3, 4, 5]));

        let last = merge_with(set(), OverlapPolicy::KeepLast);
        assert_eq!(
            last.traces()[0].samples,
            Samples::Int(vec![0, 1, 20, 30, 4, 5])
        );

        let tail = TraceSet::from(vec![
            trace("BHE", 0.0, vec![0, 1, 2]),
            trace("BHE", 0.1, vec![10, 20, 30, 40]),
        ]);
        let first = merge_with(tail.clone(), OverlapPolicy::KeepFirst);
        assert_eq!(first.traces()[0].samples, Samples::Int(vec![0, 1, 2, 30, 40]));
        let last = merge_with(tail, OverlapPolicy::KeepLast);
        assert_eq!(last.traces()[0].samples, Samples::Int(vec![0, 10, 20, 30, 40]));
    }

    #[test]
    fn test_gaps_and_channels_stay_separate() {
        let set = TraceSet::from(vec![
            trace("BHE", 0.0, vec![0, 1, 2]),
            trace("BHN", 0.0, vec![9, 9]),
            trace("BHE", 10.0, vec![3, 4]),
        ]);

        let merged = merge(set);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.traces()[0].nscl.channel(), "BHE");
        assert_eq!(merged.traces()[1].nscl.channel(), "BHE");
        assert_eq!(merged.traces()[1].samples, Samples::Int(vec![3, 4]));
        assert_eq!(merged.traces()[2].nscl.channel(), "BHN");
    }

    #[test]
    fn test_merge_promotes_to_float() {
        let mut float = trace("BHE", 0.3, vec![]);
        float.samples = Samples::Float(vec![0.5, 1.5]);
        let merged = merge(TraceSet::from(vec![trace("BHE", 0.0, vec![1, 2, 3]), float]));
        assert_eq!(
            merged.traces()[0].samples,
            Samples::Float(vec![1.0, 2.0, 3.0, 0.5, 1.5])
        );
    }

    #[test]
    fn test_trim_rounds_inward() {
        let tr = trace("BHE", 0.0, (0..100).collect());

        let out = trim(&tr, midnight() + seconds(1.05), midnight() + seconds(2.0)).unwrap();
        assert_eq!(out.start, midnight() + seconds(1.1));
        assert_eq!(out.samples, Samples::Int((11..=20).collect()));

        // Window wider than the trace keeps everything.
        let out = trim(&tr, midnight() - seconds(5.0), midnight() + seconds(50.0)).unwrap();
        assert_eq!(out, tr);
    }

    #[test]
    fn test_trim_misses() {
        let tr = trace("BHE", 0.0, (0..100).collect());

        let after = trim(&tr, midnight() + seconds(20.0), midnight() + seconds(30.0));
        assert!(after.unwrap_err().is_window());

        let before = trim(&tr, midnight() - seconds(20.0), midnight() - seconds(1.0));
        assert!(before.unwrap_err().is_window());

        let between = trim(&tr, midnight() + seconds(1.01), midnight() + seconds(1.09));
        assert!(between.unwrap_err().is_window());

        match trim(&tr, midnight() + seconds(2.0), midnight()) {
            Err(WaveformErr::Validation(_)) => {}
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_trim_all_drops_misses() {
        let set = TraceSet::from(vec![
            trace("BHE", 0.0, (0..10).collect()),
            trace("BHE", 100.0, (0..10).collect()),
        ]);

        let out = trim_all(&set, midnight(), midnight() + seconds(0.5)).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.traces()[0].len(), 6);

        let none = trim_all(&set, midnight() + seconds(50.0), midnight() + seconds(60.0));
        assert!(none.unwrap_err().is_window());
    }
}

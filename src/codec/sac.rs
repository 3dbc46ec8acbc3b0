//! Binary SAC files, the exchange format.
//!
//! A 632 byte header (70 floats, 40 integers, 192 bytes of text) followed by `npts` 32 bit
//! floats. Written little endian, read in either byte order.

use crate::{
    errors::WaveformErr,
    nscl::Nscl,
    trace::{seconds, seconds_between, Samples, Trace},
};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

const HEADER_LENGTH: usize = 632;
const NUM_FLOATS: usize = 70;
const NUM_INTS: usize = 40;
const STRINGS_OFFSET: usize = (NUM_FLOATS + NUM_INTS) * 4;
const UNDEFINED: i32 = -12345;

// Float header words.
const DELTA: usize = 0;
const DEPMIN: usize = 1;
const DEPMAX: usize = 2;
const B: usize = 5;
const E: usize = 6;
const DEPMEN: usize = 56;

// Integer header words, counted from the first integer.
const NZYEAR: usize = 0;
const NZJDAY: usize = 1;
const NZHOUR: usize = 2;
const NZMIN: usize = 3;
const NZSEC: usize = 4;
const NZMSEC: usize = 5;
const NVHDR: usize = 6;
const NPTS: usize = 9;
const IFTYPE: usize = 15;
const IDEP: usize = 16;
const IZTYPE: usize = 17;
const LEVEN: usize = 35;
const LPSPOL: usize = 36;
const LOVROK: usize = 37;
const LCALDA: usize = 38;

// Text header fields as (byte offset from the start of the text, width).
const KSTNM: (usize, usize) = (0, 8);
const KHOLE: (usize, usize) = (24, 8);
const KCMPNM: (usize, usize) = (160, 8);
const KNETWK: (usize, usize) = (168, 8);

const ITIME: i32 = 1;
const IUNKN: i32 = 5;
const IB: i32 = 9;

/// Write one trace as a SAC file. Samples are stored as 32 bit floats.
pub(crate) fn write(trace: &Trace) -> Result<Vec<u8>, WaveformErr> {
    if trace.sample_rate <= 0.0 {
        return Err(WaveformErr::Encoding(format!(
            "SAC needs a positive sample rate, not {}",
            trace.sample_rate
        )));
    }

    let data = trace.samples.to_f64();
    let mut floats = [UNDEFINED as f32; NUM_FLOATS];
    let mut ints = [UNDEFINED; NUM_INTS];
    let mut text = vec![b' '; HEADER_LENGTH - STRINGS_OFFSET];
    for chunk in text.chunks_mut(8) {
        chunk[..6].copy_from_slice(b"-12345");
    }
    // kevnm is the single 16 character field.
    text[8..24].copy_from_slice(b"-12345          ");

    // The reference time keeps millisecond precision, the rest goes into `b`.
    let reference = trace
        .start
        .with_nanosecond(trace.start.nanosecond() / 1_000_000 * 1_000_000)
        .unwrap_or(trace.start);
    let b = seconds_between(reference, trace.start);

    floats[DELTA] = trace.delta() as f32;
    floats[B] = b as f32;
    floats[E] = (b + (data.len().max(1) - 1) as f64 * trace.delta()) as f32;
    if !data.is_empty() {
        let min = data.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = data.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let mean = data.iter().sum::<f64>() / data.len() as f64;
        floats[DEPMIN] = min as f32;
        floats[DEPMAX] = max as f32;
        floats[DEPMEN] = mean as f32;
    }

    ints[NZYEAR] = reference.year();
    ints[NZJDAY] = reference.ordinal() as i32;
    ints[NZHOUR] = reference.hour() as i32;
    ints[NZMIN] = reference.minute() as i32;
    ints[NZSEC] = reference.second() as i32;
    ints[NZMSEC] = (reference.nanosecond() / 1_000_000) as i32;
    ints[NVHDR] = 6;
    ints[NPTS] = data.len() as i32;
    ints[IFTYPE] = ITIME;
    ints[IDEP] = IUNKN;
    ints[IZTYPE] = IB;
    ints[LEVEN] = 1;
    ints[LPSPOL] = 1;
    ints[LOVROK] = 1;
    ints[LCALDA] = 1;

    put_text(&mut text, KSTNM, trace.nscl.station());
    put_text(&mut text, KHOLE, trace.nscl.location());
    put_text(&mut text, KCMPNM, trace.nscl.channel());
    put_text(&mut text, KNETWK, trace.nscl.network());

    let mut bytes = Vec::with_capacity(HEADER_LENGTH + 4 * data.len());
    for f in floats.iter() {
        bytes.extend_from_slice(&f.to_le_bytes());
    }
    for i in ints.iter() {
        bytes.extend_from_slice(&i.to_le_bytes());
    }
    bytes.extend_from_slice(&text);
    for &v in &data {
        bytes.extend_from_slice(&(v as f32).to_le_bytes());
    }

    Ok(bytes)
}

/// Read a SAC file back into a trace of floating point samples.
pub(crate) fn read(bytes: &[u8]) -> Result<Trace, WaveformErr> {
    if bytes.len() < HEADER_LENGTH {
        return Err(WaveformErr::Codec(format!(
            "{} bytes is too short for a SAC header",
            bytes.len()
        )));
    }

    let word = |idx: usize, little: bool| -> [u8; 4] {
        let at = 4 * idx;
        let mut b = [bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]];
        if !little {
            b.reverse();
        }
        b
    };

    let little = if i32::from_le_bytes(word(NUM_FLOATS + NVHDR, true)) == 6 {
        true
    } else if i32::from_le_bytes(word(NUM_FLOATS + NVHDR, false)) == 6 {
        false
    } else {
        return Err(WaveformErr::Codec("SAC header version is not 6".to_owned()));
    };

    let float = |idx: usize| f32::from_le_bytes(word(idx, little));
    let int = |idx: usize| i32::from_le_bytes(word(NUM_FLOATS + idx, little));

    let npts = int(NPTS);
    if npts < 0 || HEADER_LENGTH + 4 * npts as usize > bytes.len() {
        return Err(WaveformErr::Codec(format!(
            "SAC header claims {} samples but the file is {} bytes",
            npts,
            bytes.len()
        )));
    }

    let delta = f64::from(float(DELTA));
    if delta <= 0.0 {
        return Err(WaveformErr::Codec(format!("invalid SAC delta {}", delta)));
    }

    let reference = NaiveDate::from_yo_opt(int(NZYEAR), int(NZJDAY) as u32)
        .and_then(|d| {
            d.and_hms_milli_opt(
                int(NZHOUR) as u32,
                int(NZMIN) as u32,
                int(NZSEC) as u32,
                int(NZMSEC) as u32,
            )
        })
        .ok_or_else(|| WaveformErr::Codec("invalid SAC reference time".to_owned()))?;
    let b = f64::from(float(B));
    let start: NaiveDateTime = reference + seconds(if b == UNDEFINED as f64 { 0.0 } else { b });

    let text = &bytes[STRINGS_OFFSET..HEADER_LENGTH];
    let nscl = Nscl::new(
        &get_text(text, KNETWK),
        &get_text(text, KSTNM),
        &get_text(text, KCMPNM),
        &get_text(text, KHOLE),
    )
    .map_err(|err| WaveformErr::Codec(format!("SAC identifiers: {}", err)))?;

    let samples = (0..npts as usize)
        .map(|i| f64::from(f32::from_le_bytes(word(HEADER_LENGTH / 4 + i, little))))
        .collect();

    // The period is only stored to 32 bit precision, snap to a whole rate when it is that close.
    let mut sample_rate = 1.0 / delta;
    if (sample_rate - sample_rate.round()).abs() < 1.0e-5 * sample_rate {
        sample_rate = sample_rate.round();
    }

    Ok(Trace::new(nscl, start, sample_rate, Samples::Float(samples)))
}

fn put_text(text: &mut [u8], (offset, width): (usize, usize), value: &str) {
    let field = &mut text[offset..offset + width];
    for (i, slot) in field.iter_mut().enumerate() {
        *slot = value.as_bytes().get(i).copied().unwrap_or(b' ');
    }
}

fn get_text(text: &[u8], (offset, width): (usize, usize)) -> String {
    let value = String::from_utf8_lossy(&text[offset..offset + width])
        .trim_end_matches(|c: char| c == ' ' || c == '\0')
        .trim()
        .to_owned();

    if value == UNDEFINED.to_string() {
        String::new()
    } else {
        value
    }
}

#[cfg(test)]
mod unit {
    use super::*;

    fn trace() -> Trace {
        Trace::new(
            Nscl::parse("CI.WCS2.BHE.00").unwrap(),
            NaiveDate::from_ymd_opt(2016, 5, 2)
                .unwrap()
                .and_hms_micro_opt(1, 2, 3, 456_789)
                .unwrap(),
            40.0,
            Samples::Int(vec![1, -2, 3, 100_000]),
        )
    }

    #[test]
    fn test_write_layout() {
        let bytes = write(&trace()).unwrap();
        assert_eq!(bytes.len(), HEADER_LENGTH + 4 * 4);
        assert_eq!(&bytes[440..448], b"WCS2    ");
        assert_eq!(&bytes[448..454], b"-12345");
        assert_eq!(&bytes[600..608], b"BHE     ");
        assert_eq!(&bytes[608..616], b"CI      ");

        let npts = i32::from_le_bytes([bytes[316], bytes[317], bytes[318], bytes[319]]);
        assert_eq!(npts, 4);
    }

    #[test]
    fn test_read_back() {
        let original = trace();
        let read_back = read(&write(&original).unwrap()).unwrap();

        assert_eq!(read_back.nscl, original.nscl);
        assert_eq!(read_back.sample_rate, 40.0);
        assert_eq!(
            read_back.samples,
            Samples::Float(vec![1.0, -2.0, 3.0, 100_000.0])
        );
        assert!(seconds_between(original.start, read_back.start).abs() < 1.0e-6);
    }

    #[test]
    fn test_read_rejects_garbage() {
        assert!(read(&[0u8; 100]).is_err());
        assert!(read(&[0u8; 700]).is_err());
    }
}

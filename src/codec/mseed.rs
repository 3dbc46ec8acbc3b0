//! Reading and writing miniSEED 2 data records.

use super::steim::{self, Level};
use crate::{
    errors::WaveformErr,
    nscl::Nscl,
    trace::{seconds, Samples, Trace},
};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use std::convert::TryFrom;

/// Length of the records this crate writes, 2^12 bytes.
pub(crate) const RECORD_LENGTH: usize = 4096;
const RECORD_LENGTH_EXP: u8 = 12;
const FIXED_HEADER: usize = 48;
const DATA_OFFSET: usize = 64;

const ENCODING_INT16: u8 = 1;
const ENCODING_INT32: u8 = 3;
const ENCODING_FLOAT32: u8 = 4;
const ENCODING_FLOAT64: u8 = 5;
const ENCODING_STEIM1: u8 = 10;
const ENCODING_STEIM2: u8 = 11;

/// One decoded data record.
#[derive(Debug)]
pub(crate) struct Record {
    pub nscl: Nscl,
    pub start: NaiveDateTime,
    pub sample_rate: f64,
    pub samples: Samples,
}

/// Reads header fields in the record's byte order.
struct Fields<'a> {
    bytes: &'a [u8],
    big_endian: bool,
}

impl<'a> Fields<'a> {
    fn u16(&self, at: usize) -> u16 {
        let b = [self.bytes[at], self.bytes[at + 1]];
        if self.big_endian {
            u16::from_be_bytes(b)
        } else {
            u16::from_le_bytes(b)
        }
    }

    fn i16(&self, at: usize) -> i16 {
        self.u16(at) as i16
    }

    fn u32(&self, at: usize) -> u32 {
        let b = [
            self.bytes[at],
            self.bytes[at + 1],
            self.bytes[at + 2],
            self.bytes[at + 3],
        ];
        if self.big_endian {
            u32::from_be_bytes(b)
        } else {
            u32::from_le_bytes(b)
        }
    }

    fn i32(&self, at: usize) -> i32 {
        self.u32(at) as i32
    }

    fn f32(&self, at: usize) -> f32 {
        f32::from_bits(self.u32(at))
    }

    fn f64(&self, at: usize) -> f64 {
        let hi = u64::from(self.u32(at));
        let lo = u64::from(self.u32(at + 4));
        if self.big_endian {
            f64::from_bits(hi << 32 | lo)
        } else {
            f64::from_bits(lo << 32 | hi)
        }
    }

    fn text(&self, from: usize, to: usize) -> String {
        String::from_utf8_lossy(&self.bytes[from..to])
            .trim()
            .to_owned()
    }
}

/// Decode every data record in `bytes`, in file order.
pub(crate) fn read_records(bytes: &[u8]) -> Result<Vec<Record>, WaveformErr> {
    let mut records = vec![];
    let mut offset = 0;

    while offset < bytes.len() {
        let rest = &bytes[offset..];

        // Zero padding after the last record.
        if rest.iter().all(|&b| b == 0) {
            break;
        }

        let (record, length) = read_record(rest)
            .map_err(|err| WaveformErr::Codec(format!("record at byte {}: {}", offset, err)))?;

        if let Some(record) = record {
            records.push(record);
        }
        offset += length;
    }

    Ok(records)
}

/// Decode one record, returning it (if it holds samples) and its length in bytes.
fn read_record(bytes: &[u8]) -> Result<(Option<Record>, usize), String> {
    if bytes.len() < FIXED_HEADER {
        return Err(format!("only {} bytes left, need a full header", bytes.len()));
    }

    let sequence_ok = bytes[0..6]
        .iter()
        .all(|&b| b.is_ascii_digit() || b == b' ' || b == 0);
    if !sequence_ok || !b"DRQM".contains(&bytes[6]) {
        return Err("invalid fixed header".to_owned());
    }

    let fields = detect_byte_order(bytes)?;

    let network = fields.text(18, 20);
    let station = fields.text(8, 13);
    let location = fields.text(13, 15);
    let channel = fields.text(15, 18);
    let nscl = Nscl::new(&network, &station, &channel, &location)
        .map_err(|err| format!("bad identifiers: {}", err))?;

    let num_samples = usize::from(fields.u16(30));
    let mut sample_rate = sample_rate(fields.i16(32), fields.i16(34));
    let activity_flags = bytes[36];
    let num_blockettes = bytes[39];
    let time_correction = fields.i32(40);
    let data_offset = usize::from(fields.u16(44));

    let mut start = read_btime(&fields, 20)?;
    if activity_flags & 0x02 == 0 && time_correction != 0 {
        start += seconds(f64::from(time_correction) * 1.0e-4);
    }

    let mut encoding = None;
    let mut record_length = None;
    let mut frame_count = None;
    let mut next = usize::from(fields.u16(46));
    for _ in 0..num_blockettes {
        if next == 0 {
            break;
        }
        if next + 4 > bytes.len() {
            return Err("blockette runs past the end of the data".to_owned());
        }

        let kind = fields.u16(next);
        match kind {
            100 if next + 8 <= bytes.len() => {
                sample_rate = f64::from(fields.f32(next + 4));
            }
            1000 if next + 8 <= bytes.len() => {
                encoding = Some(bytes[next + 4]);
                let exp = bytes[next + 6];
                if !(7..=20).contains(&exp) {
                    return Err(format!("invalid record length exponent {}", exp));
                }
                record_length = Some(1usize << exp);
            }
            1001 if next + 8 <= bytes.len() => {
                start += seconds(f64::from(bytes[next + 5] as i8) * 1.0e-6);
                frame_count = Some(usize::from(bytes[next + 7]));
            }
            _ => {}
        }
        next = usize::from(fields.u16(next + 2));
    }

    let record_length =
        record_length.ok_or_else(|| "missing blockette 1000, record length unknown".to_owned())?;
    if record_length > bytes.len() {
        return Err(format!(
            "record of {} bytes truncated to {}",
            record_length,
            bytes.len()
        ));
    }

    if num_samples == 0 || sample_rate == 0.0 {
        return Ok((None, record_length));
    }

    if data_offset < FIXED_HEADER || data_offset > record_length {
        return Err(format!("invalid data offset {}", data_offset));
    }

    let encoding = encoding.ok_or_else(|| "missing encoding".to_owned())?;
    let data = &bytes[data_offset..record_length];
    let samples = decode_data(data, num_samples, encoding, frame_count, fields.big_endian)?;

    Ok((
        Some(Record {
            nscl,
            start,
            sample_rate,
            samples,
        }),
        record_length,
    ))
}

fn detect_byte_order(bytes: &[u8]) -> Result<Fields<'_>, String> {
    for &big_endian in &[true, false] {
        let fields = Fields { bytes, big_endian };
        let year = fields.u16(20);
        let day = fields.u16(22);
        if (1900..=2100).contains(&year) && (1..=366).contains(&day) {
            return Ok(fields);
        }
    }

    Err("start time year/day invalid in either byte order".to_owned())
}

fn read_btime(fields: &Fields, at: usize) -> Result<NaiveDateTime, String> {
    let year = i32::from(fields.u16(at));
    let day = u32::from(fields.u16(at + 2));
    let hour = u32::from(fields.bytes[at + 4]);
    let minute = u32::from(fields.bytes[at + 5]);
    let second = u32::from(fields.bytes[at + 6]);
    let fract = u32::from(fields.u16(at + 8));

    let base = NaiveDate::from_yo_opt(year, day)
        .and_then(|date| date.and_hms_opt(hour, minute, 0))
        .ok_or_else(|| format!("invalid start time {} {} {}:{}", year, day, hour, minute))?;

    // Seconds may be 60 during a leap second.
    Ok(base + chrono::Duration::seconds(i64::from(second))
        + chrono::Duration::microseconds(i64::from(fract) * 100))
}

fn sample_rate(factor: i16, multiplier: i16) -> f64 {
    let f = f64::from(factor);
    let m = f64::from(multiplier);

    match (factor, multiplier) {
        (0, _) | (_, 0) => 0.0,
        (f_, m_) if f_ > 0 && m_ > 0 => f * m,
        (f_, _) if f_ > 0 => -f / m,
        (_, m_) if m_ > 0 => -m / f,
        _ => 1.0 / (f * m),
    }
}

/// Express a sample rate as a factor and multiplier pair.
fn factor_multiplier(rate: f64) -> Option<(i16, i16)> {
    if !rate.is_finite() || rate <= 0.0 {
        return None;
    }

    for den in 1..=i32::from(i16::MAX) {
        let num = rate * f64::from(den);
        let rounded = num.round();
        if rounded < 1.0 || rounded > f64::from(i16::MAX) {
            continue;
        }
        if (num - rounded).abs() > 1.0e-7 * num {
            continue;
        }

        let num = rounded as i16;
        let den = den as i16;
        return Some(if den == 1 {
            (num, 1)
        } else if num == 1 {
            (-den, 1)
        } else {
            (num, -den)
        });
    }

    None
}

fn decode_data(
    data: &[u8],
    num_samples: usize,
    encoding: u8,
    frame_count: Option<usize>,
    big_endian: bool,
) -> Result<Samples, String> {
    let fields = Fields {
        bytes: data,
        big_endian,
    };

    let need = |width: usize| -> Result<(), String> {
        if num_samples * width > data.len() {
            Err(format!(
                "{} samples of {} bytes do not fit in {} bytes",
                num_samples,
                width,
                data.len()
            ))
        } else {
            Ok(())
        }
    };

    let samples = match encoding {
        ENCODING_INT16 => {
            need(2)?;
            Samples::Int(
                (0..num_samples)
                    .map(|i| i32::from(fields.i16(2 * i)))
                    .collect(),
            )
        }
        ENCODING_INT32 => {
            need(4)?;
            Samples::Int((0..num_samples).map(|i| fields.i32(4 * i)).collect())
        }
        ENCODING_FLOAT32 => {
            need(4)?;
            Samples::Float(
                (0..num_samples)
                    .map(|i| f64::from(fields.f32(4 * i)))
                    .collect(),
            )
        }
        ENCODING_FLOAT64 => {
            need(8)?;
            Samples::Float((0..num_samples).map(|i| fields.f64(8 * i)).collect())
        }
        ENCODING_STEIM1 | ENCODING_STEIM2 => {
            let level = if encoding == ENCODING_STEIM1 {
                Level::One
            } else {
                Level::Two
            };
            let frames = match frame_count {
                Some(count) if count > 0 => {
                    &data[..(count * steim::FRAME_SIZE).min(data.len())]
                }
                _ => data,
            };
            let values = steim::decode(frames, num_samples, level, big_endian)
                .map_err(|err| err.to_string())?;
            Samples::Int(values)
        }
        other => return Err(format!("unsupported data encoding {}", other)),
    };

    Ok(samples)
}

/// Append STEIM2 compressed records holding `trace` to `out`.
///
/// Floating point samples are truncated to integers first, see [`Samples::to_i32_truncated`].
pub(crate) fn write_trace(
    trace: &Trace,
    sequence: &mut u32,
    out: &mut Vec<u8>,
) -> Result<(), WaveformErr> {
    let samples = trace.samples.to_i32_truncated();
    if samples.is_empty() {
        return Ok(());
    }

    let (factor, multiplier) = factor_multiplier(trace.sample_rate).ok_or_else(|| {
        WaveformErr::Encoding(format!(
            "sample rate {} cannot be written as a factor and multiplier",
            trace.sample_rate
        ))
    })?;

    let network = trace.nscl.network();
    if network.len() > 2 {
        return Err(WaveformErr::Encoding(format!(
            "network code '{}' is wider than 2 characters",
            network
        )));
    }
    let location: String = trace
        .nscl
        .location()
        .chars()
        .map(|c| if c == '-' { ' ' } else { c })
        .collect();

    let max_frames = (RECORD_LENGTH - DATA_OFFSET) / steim::FRAME_SIZE;
    let mut idx = 0;

    while idx < samples.len() {
        let (data, count) = steim::encode_steim2(&samples[idx..], max_frames)?;
        let frames = data.len() / steim::FRAME_SIZE;

        let mut record = vec![0u8; RECORD_LENGTH];
        *sequence = *sequence % 999_999 + 1;
        record[0..6].copy_from_slice(format!("{:06}", sequence).as_bytes());
        record[6] = b'D';
        record[7] = b' ';
        write_padded(&mut record[8..13], trace.nscl.station());
        write_padded(&mut record[13..15], &location);
        write_padded(&mut record[15..18], trace.nscl.channel());
        write_padded(&mut record[18..20], network);

        let start = trace.time_of(idx);
        let nanos = start.nanosecond().min(999_999_999);
        let year = u16::try_from(start.year())
            .map_err(|_| WaveformErr::Encoding(format!("year {} out of range", start.year())))?;
        record[20..22].copy_from_slice(&year.to_be_bytes());
        record[22..24].copy_from_slice(&(start.ordinal() as u16).to_be_bytes());
        record[24] = start.hour() as u8;
        record[25] = start.minute() as u8;
        record[26] = start.second() as u8;
        record[28..30].copy_from_slice(&((nanos / 100_000) as u16).to_be_bytes());

        record[30..32].copy_from_slice(&(count as u16).to_be_bytes());
        record[32..34].copy_from_slice(&factor.to_be_bytes());
        record[34..36].copy_from_slice(&multiplier.to_be_bytes());
        record[39] = 2;
        record[44..46].copy_from_slice(&(DATA_OFFSET as u16).to_be_bytes());
        record[46..48].copy_from_slice(&(FIXED_HEADER as u16).to_be_bytes());

        // Blockette 1000: encoding, big endian, record length.
        record[48..50].copy_from_slice(&1000u16.to_be_bytes());
        record[50..52].copy_from_slice(&56u16.to_be_bytes());
        record[52] = ENCODING_STEIM2;
        record[53] = 1;
        record[54] = RECORD_LENGTH_EXP;

        // Blockette 1001: microseconds beyond the header's 100 microsecond resolution.
        record[56..58].copy_from_slice(&1001u16.to_be_bytes());
        record[61] = ((nanos / 1_000) % 100) as i8 as u8;
        record[63] = frames as u8;

        record[DATA_OFFSET..DATA_OFFSET + data.len()].copy_from_slice(&data);
        out.extend_from_slice(&record);

        idx += count;
    }

    Ok(())
}

fn write_padded(field: &mut [u8], value: &str) {
    for (i, slot) in field.iter_mut().enumerate() {
        *slot = value.as_bytes().get(i).copied().unwrap_or(b' ');
    }
}

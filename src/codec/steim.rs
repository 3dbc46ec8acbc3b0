//! Steim1 and Steim2 compression of first differences of integer samples.
//!
//! Data is stored in 64 byte frames of sixteen 32 bit words. Word 0 of each frame holds a 2 bit
//! code per word saying how that word is packed. Words 1 and 2 of the first frame hold the first
//! and last sample of the record, the integration constants.

use crate::errors::WaveformErr;
use log::warn;

/// Size of one compressed frame in bytes.
pub(crate) const FRAME_SIZE: usize = 64;
const WORDS_PER_FRAME: usize = 16;

/// Which flavour of Steim compression.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Level {
    One,
    Two,
}

/// Decode `num_samples` samples from Steim compressed frames.
pub(crate) fn decode(
    data: &[u8],
    num_samples: usize,
    level: Level,
    big_endian: bool,
) -> Result<Vec<i32>, WaveformErr> {
    if num_samples == 0 {
        return Ok(vec![]);
    }

    let read_word = |frame: &[u8], w: usize| -> u32 {
        let bytes = [
            frame[4 * w],
            frame[4 * w + 1],
            frame[4 * w + 2],
            frame[4 * w + 3],
        ];
        if big_endian {
            u32::from_be_bytes(bytes)
        } else {
            u32::from_le_bytes(bytes)
        }
    };

    let mut diffs: Vec<i32> = Vec::with_capacity(num_samples + 7);
    let mut x0 = 0;
    let mut xn = 0;

    'frames: for (frame_idx, frame) in data.chunks_exact(FRAME_SIZE).enumerate() {
        let control = read_word(frame, 0);

        for w in 1..WORDS_PER_FRAME {
            let word = read_word(frame, w);

            if frame_idx == 0 && w == 1 {
                x0 = word as i32;
                continue;
            }
            if frame_idx == 0 && w == 2 {
                xn = word as i32;
                continue;
            }

            let nibble = (control >> (30 - 2 * w)) & 0b11;
            match (level, nibble) {
                (_, 0) => {}
                (_, 1) => unpack(word, 4, 8, &mut diffs),
                (Level::One, 2) => unpack(word, 2, 16, &mut diffs),
                (Level::One, _) => unpack(word, 1, 32, &mut diffs),
                (Level::Two, 2) => match word >> 30 {
                    1 => unpack(word, 1, 30, &mut diffs),
                    2 => unpack(word, 2, 15, &mut diffs),
                    3 => unpack(word, 3, 10, &mut diffs),
                    _ => {
                        return Err(WaveformErr::Codec(
                            "invalid steim2 sub-code in a 10 word".to_owned(),
                        ))
                    }
                },
                (Level::Two, _) => match word >> 30 {
                    0 => unpack(word, 5, 6, &mut diffs),
                    1 => unpack(word, 6, 5, &mut diffs),
                    2 => unpack(word, 7, 4, &mut diffs),
                    _ => {
                        return Err(WaveformErr::Codec(
                            "invalid steim2 sub-code in an 11 word".to_owned(),
                        ))
                    }
                },
            }

            if diffs.len() >= num_samples {
                break 'frames;
            }
        }
    }

    if diffs.len() < num_samples {
        return Err(WaveformErr::Codec(format!(
            "steim data holds {} differences, header claims {} samples",
            diffs.len(),
            num_samples
        )));
    }

    // The first difference is relative to the previous record, x0 replaces it.
    let mut samples = Vec::with_capacity(num_samples);
    let mut last = x0;
    samples.push(last);
    for &d in &diffs[1..num_samples] {
        last = last.wrapping_add(d);
        samples.push(last);
    }

    if last != xn {
        warn!(
            "steim integrity check failed: last sample {} but reverse constant {}",
            last, xn
        );
    }

    Ok(samples)
}

fn unpack(word: u32, count: u32, bits: u32, out: &mut Vec<i32>) {
    for j in 0..count {
        let shift = (count - 1 - j) * bits;
        out.push(sign_extend(word >> shift, bits));
    }
}

fn sign_extend(value: u32, bits: u32) -> i32 {
    let unused = 32 - bits;
    ((value << unused) as i32) >> unused
}

// (differences per word, bits per difference, code, sub-code) from densest to sparsest.
const STEIM2_PACKINGS: [(usize, u32, u32, Option<u32>); 7] = [
    (7, 4, 3, Some(2)),
    (6, 5, 3, Some(1)),
    (5, 6, 3, Some(0)),
    (4, 8, 1, None),
    (3, 10, 2, Some(3)),
    (2, 15, 2, Some(2)),
    (1, 30, 2, Some(1)),
];

/// Steim2 compress as many leading `samples` as fit in `max_frames` frames.
///
/// Returns the frames and how many samples they hold. The first difference of every record is
/// written as zero, readers start from the forward integration constant.
pub(crate) fn encode_steim2(
    samples: &[i32],
    max_frames: usize,
) -> Result<(Vec<u8>, usize), WaveformErr> {
    let n = samples.len();
    if n == 0 || max_frames == 0 {
        return Ok((vec![], 0));
    }

    let diff = |i: usize| -> i64 {
        if i == 0 {
            0
        } else {
            i64::from(samples[i]) - i64::from(samples[i - 1])
        }
    };

    let mut frames: Vec<[u32; WORDS_PER_FRAME]> = Vec::with_capacity(max_frames);
    let mut idx = 0;

    while idx < n && frames.len() < max_frames {
        let mut words = [0u32; WORDS_PER_FRAME];
        let first_word = if frames.is_empty() { 3 } else { 1 };

        for w in first_word..WORDS_PER_FRAME {
            if idx >= n {
                break;
            }

            let (code, word, count) = pack_steim2(&diff, idx, n)?;
            words[0] |= code << (30 - 2 * w);
            words[w] = word;
            idx += count;
        }

        frames.push(words);
    }

    frames[0][1] = samples[0] as u32;
    frames[0][2] = samples[idx - 1] as u32;

    let mut bytes = Vec::with_capacity(frames.len() * FRAME_SIZE);
    for frame in &frames {
        for word in frame.iter() {
            bytes.extend_from_slice(&word.to_be_bytes());
        }
    }

    Ok((bytes, idx))
}

fn pack_steim2(
    diff: &dyn Fn(usize) -> i64,
    idx: usize,
    n: usize,
) -> Result<(u32, u32, usize), WaveformErr> {
    let remaining = n - idx;

    for &(count, bits, code, sub_code) in STEIM2_PACKINGS.iter() {
        if count > remaining {
            continue;
        }

        let lo = -(1i64 << (bits - 1));
        let hi = (1i64 << (bits - 1)) - 1;
        if !(0..count).all(|j| (lo..=hi).contains(&diff(idx + j))) {
            continue;
        }

        let mask = (1u64 << bits) - 1;
        let mut word = sub_code.map(|s| s << 30).unwrap_or(0);
        for j in 0..count {
            let shift = (count - 1 - j) as u32 * bits;
            word |= (((diff(idx + j) as u64) & mask) as u32) << shift;
        }

        return Ok((code, word, count));
    }

    Err(WaveformErr::Encoding(format!(
        "sample difference {} does not fit in steim2's 30 bits",
        diff(idx)
    )))
}

//! Module for errors.
use chrono::NaiveDateTime;
use std::{error::Error, fmt::Display};

/// Error from the waveform products interface.
#[derive(Debug)]
pub enum WaveformErr {
    // Inherited errors from std
    /// Error forwarded from std
    IO(::std::io::Error),

    // Other forwarded errors
    /// Error forwarded from serde_json
    Json(::serde_json::Error),
    /// Error forwarded from roxmltree while reading StationXML
    Xml(::roxmltree::Error),
    /// Error forwarded from the strum crate
    StrumError(strum::ParseError),

    // My own errors from this crate
    /// Malformed identifiers, time windows, request fields, or configuration.
    Validation(String),
    /// A trim window does not intersect the trace it was applied to.
    Window {
        /// Requested window start.
        start: NaiveDateTime,
        /// Requested window end.
        end: NaiveDateTime,
        /// First sample time of the trace.
        trace_start: NaiveDateTime,
        /// Last sample time of the trace.
        trace_end: NaiveDateTime,
    },
    /// An object was absent from storage or could not be fully read.
    Retrieval {
        /// Bucket the object was requested from.
        bucket: String,
        /// Key of the object.
        key: String,
        /// What went wrong.
        reason: String,
    },
    /// The input could not be parsed as a supported waveform format.
    Codec(String),
    /// No usable instrument response for the data.
    Response(String),
    /// Output bytes could not be produced.
    Encoding(String),
}

impl WaveformErr {
    /// True for failures to fetch an object, which batch window requests skip over.
    pub fn is_retrieval(&self) -> bool {
        match self {
            WaveformErr::Retrieval { .. } => true,
            _ => false,
        }
    }

    /// True when a trim window missed the data entirely.
    pub fn is_window(&self) -> bool {
        match self {
            WaveformErr::Window { .. } => true,
            _ => false,
        }
    }

    pub(crate) fn retrieval(bucket: &str, key: &str, reason: impl Display) -> Self {
        WaveformErr::Retrieval {
            bucket: bucket.to_owned(),
            key: key.to_owned(),
            reason: reason.to_string(),
        }
    }
}

impl Display for WaveformErr {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> Result<(), std::fmt::Error> {
        use crate::errors::WaveformErr::*;

        match self {
            IO(err) => write!(f, "std lib io error: {}", err),

            Json(err) => write!(f, "json error: {}", err),
            Xml(err) => write!(f, "StationXML parse error: {}", err),
            StrumError(err) => write!(f, "error forwarded from strum crate: {}", err),

            Validation(msg) => write!(f, "validation error: {}", msg),
            Window {
                start,
                end,
                trace_start,
                trace_end,
            } => write!(
                f,
                "window {} to {} does not intersect trace spanning {} to {}",
                start, end, trace_start, trace_end
            ),
            Retrieval {
                bucket,
                key,
                reason,
            } => write!(f, "could not retrieve {} from {}: {}", key, bucket, reason),
            Codec(msg) => write!(f, "codec error: {}", msg),
            Response(msg) => write!(f, "instrument response error: {}", msg),
            Encoding(msg) => write!(f, "encoding error: {}", msg),
        }
    }
}

impl Error for WaveformErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            WaveformErr::IO(err) => Some(err),
            WaveformErr::Json(err) => Some(err),
            WaveformErr::Xml(err) => Some(err),
            WaveformErr::StrumError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<::std::io::Error> for WaveformErr {
    fn from(err: ::std::io::Error) -> WaveformErr {
        WaveformErr::IO(err)
    }
}

impl From<::serde_json::Error> for WaveformErr {
    fn from(err: ::serde_json::Error) -> WaveformErr {
        WaveformErr::Json(err)
    }
}

impl From<::roxmltree::Error> for WaveformErr {
    fn from(err: ::roxmltree::Error) -> WaveformErr {
        WaveformErr::Xml(err)
    }
}

impl From<strum::ParseError> for WaveformErr {
    fn from(err: strum::ParseError) -> WaveformErr {
        WaveformErr::StrumError(err)
    }
}

//! Requested time windows and how they map onto archive day files.

use crate::{errors::WaveformErr, keys::derive_archive_key, nscl::Nscl};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

/// A closed time interval.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeWindow {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl TimeWindow {
    /// Create a window, `start` must not come after `end`.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self, WaveformErr> {
        if start > end {
            return Err(WaveformErr::Validation(format!(
                "window start {} is after its end {}",
                start, end
            )));
        }

        Ok(TimeWindow { start, end })
    }

    /// Start of the window.
    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    /// End of the window.
    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    /// True if the start and end fall on the same calendar day.
    pub fn within_one_day(&self) -> bool {
        self.start.year() == self.end.year() && self.start.ordinal() == self.end.ordinal()
    }
}

/// One requested piece of data: a channel, a start time, and an optional end time.
///
/// Without an end time the whole day containing `start` is requested.
#[derive(Clone, Debug, PartialEq)]
pub struct WindowRequest {
    /// The channel.
    pub nscl: Nscl,
    /// Start of the data.
    pub start: NaiveDateTime,
    /// End of the data, `None` for the whole day.
    pub end: Option<NaiveDateTime>,
}

/// A validated request resolved to the archive file holding its data.
#[derive(Clone, Debug, PartialEq)]
pub struct RetrievalUnit {
    /// The channel.
    pub nscl: Nscl,
    /// Year of the day file.
    pub year: i32,
    /// Day of year of the day file.
    pub day: u32,
    /// Key of the day file in the archive.
    pub archive_key: String,
    /// Window to trim to, `None` keeps the whole day.
    pub trim: Option<TimeWindow>,
}

impl WindowRequest {
    /// Validate the request and resolve it to a retrieval unit.
    ///
    /// Windows must start and end within the same calendar day, there is no stitching of data
    /// across day files.
    pub fn resolve(&self) -> Result<RetrievalUnit, WaveformErr> {
        let trim = match self.end {
            Some(end) => {
                let window = TimeWindow::new(self.start, end)?;
                if !window.within_one_day() {
                    return Err(WaveformErr::Validation(format!(
                        "time window {} to {} for {} must start and end within the same day",
                        self.start, end, self.nscl
                    )));
                }
                Some(window)
            }
            None => None,
        };

        let year = self.start.year();
        let day = self.start.ordinal();
        let archive_key = derive_archive_key(&self.nscl, year, day)?;

        Ok(RetrievalUnit {
            nscl: self.nscl.clone(),
            year,
            day,
            archive_key,
            trim,
        })
    }
}

/// Resolve each request independently; a bad item does not affect the others.
pub fn plan(requests: &[WindowRequest]) -> Vec<Result<RetrievalUnit, WaveformErr>> {
    requests.iter().map(WindowRequest::resolve).collect()
}

/// Parse an ISO-8601 style UTC timestamp.
///
/// Accepts RFC 3339 strings with an offset, `YYYY-MM-DDTHH:MM:SS[.fff]` with or without a
/// trailing `Z`, the same with a space instead of the `T`, and bare dates.
pub fn parse_time(value: &str) -> Result<NaiveDateTime, WaveformErr> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.naive_utc());
    }

    let naive = value.trim_end_matches(|c| c == 'Z' || c == 'z');
    for fmt in &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, fmt) {
            return Ok(dt);
        }
    }

    if let Some(dt) = NaiveDate::parse_from_str(naive, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(dt);
    }

    Err(WaveformErr::Validation(format!(
        "could not parse '{}' as a time",
        value
    )))
}

/*--------------------------------------------------------------------------------------------------
                                          Unit Tests
--------------------------------------------------------------------------------------------------*/
#[cfg(test)]
mod unit {
    use super::*;

    fn at(s: &str) -> NaiveDateTime {
        parse_time(s).unwrap()
    }

    fn request(start: &str, end: Option<&str>) -> WindowRequest {
        WindowRequest {
            nscl: Nscl::parse("CI.WCS2.BHE.").unwrap(),
            start: at(start),
            end: end.map(at),
        }
    }

    #[test]
    fn test_parse_time_formats() {
        let expected = NaiveDate::from_ymd_opt(2016, 5, 2)
            .unwrap()
            .and_hms_milli_opt(1, 2, 3, 500)
            .unwrap();

        assert_eq!(at("2016-05-02T01:02:03.5"), expected);
        assert_eq!(at("2016-05-02T01:02:03.500Z"), expected);
        assert_eq!(at("2016-05-02 01:02:03.5"), expected);
        assert_eq!(at("2016-05-02T03:02:03.5+02:00"), expected);
        assert_eq!(
            at("2016-05-02"),
            NaiveDate::from_ymd_opt(2016, 5, 2)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
        assert!(parse_time("May 2nd").is_err());
    }

    #[test]
    fn test_resolve_window() {
        let unit = request("2016-05-02T01:00:00", Some("2016-05-02T01:10:00"))
            .resolve()
            .unwrap();

        assert_eq!(unit.year, 2016);
        assert_eq!(unit.day, 123);
        assert_eq!(
            unit.archive_key,
            "continuous_waveforms/2016/2016_123/CIWCS2_BHE___2016123.ms"
        );
        let trim = unit.trim.unwrap();
        assert_eq!(trim.start(), at("2016-05-02T01:00:00"));
        assert_eq!(trim.end(), at("2016-05-02T01:10:00"));
    }

    #[test]
    fn test_full_day_without_end() {
        let unit = request("2016-05-02T13:00:00", None).resolve().unwrap();
        assert_eq!(unit.day, 123);
        assert!(unit.trim.is_none());
    }

    #[test]
    fn test_cross_day_rejected() {
        match request("2016-05-02T23:59:00", Some("2016-05-03T00:01:00")).resolve() {
            Err(WaveformErr::Validation(_)) => {}
            other => panic!("expected validation error, got {:?}", other),
        }

        // Same day of year, different year.
        assert!(request("2015-05-03T00:00:00", Some("2016-05-02T00:00:00"))
            .resolve()
            .is_err());
    }

    #[test]
    fn test_reversed_window_rejected() {
        assert!(request("2016-05-02T02:00:00", Some("2016-05-02T01:00:00"))
            .resolve()
            .is_err());
        assert!(request("2016-05-02T02:00:00", Some("2016-05-02T02:00:00"))
            .resolve()
            .is_ok());
    }

    #[test]
    fn test_plan_is_per_item() {
        let requests = vec![
            request("2016-05-02T01:00:00", Some("2016-05-02T01:10:00")),
            request("2016-05-02T23:00:00", Some("2016-05-03T01:00:00")),
            request("2016-05-04T01:00:00", None),
        ];

        let planned = plan(&requests);
        assert_eq!(planned.len(), 3);
        assert!(planned[0].is_ok());
        assert!(planned[1].is_err());
        assert_eq!(planned[2].as_ref().unwrap().day, 125);
    }
}

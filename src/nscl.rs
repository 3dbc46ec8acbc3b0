//! Network-station-channel-location identifiers.

use crate::errors::WaveformErr;
use std::fmt::Display;

/// Identifier of one recording channel.
///
/// The location code is kept as given; [`Nscl::key_location`] returns the form used in archive
/// keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Nscl {
    network: String,
    station: String,
    channel: String,
    location: String,
}

impl Nscl {
    /// Widest station code the archive key layout can hold.
    pub const STATION_WIDTH: usize = 5;
    /// Widest channel code the archive key layout can hold.
    pub const CHANNEL_WIDTH: usize = 3;
    /// Width of the location field in archive keys.
    pub const LOCATION_WIDTH: usize = 2;

    /// Create a new identifier, validating every field against the archive key layout.
    pub fn new(
        network: &str,
        station: &str,
        channel: &str,
        location: &str,
    ) -> Result<Self, WaveformErr> {
        check_field("network", network, None)?;
        check_field("station", station, Some(Self::STATION_WIDTH))?;
        check_field("channel", channel, Some(Self::CHANNEL_WIDTH))?;

        let key_loc = normalize_location(location);
        if key_loc.chars().count() > Self::LOCATION_WIDTH {
            return Err(WaveformErr::Validation(format!(
                "location '{}' is wider than {} characters",
                location,
                Self::LOCATION_WIDTH
            )));
        }

        Ok(Nscl {
            network: network.to_owned(),
            station: station.to_owned(),
            channel: channel.to_owned(),
            location: location.to_owned(),
        })
    }

    /// Parse a `NET.STA.CHAN.LOC` string. The location part may be empty.
    pub fn parse(nscl: &str) -> Result<Self, WaveformErr> {
        let parts: Vec<&str> = nscl.split('.').collect();

        match parts.as_slice() {
            [net, sta, chan, loc] => Self::new(net, sta, chan, loc),
            _ => Err(WaveformErr::Validation(format!(
                "'{}' is not of the form NET.STA.CHAN.LOC",
                nscl
            ))),
        }
    }

    /// The network code.
    pub fn network(&self) -> &str {
        &self.network
    }

    /// The station code.
    pub fn station(&self) -> &str {
        &self.station
    }

    /// The channel code.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// The location code as it was given.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// The location code as it appears in archive keys, see [`normalize_location`].
    pub fn key_location(&self) -> String {
        normalize_location(&self.location)
    }
}

impl Display for Nscl {
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> Result<(), std::fmt::Error> {
        write!(
            formatter,
            "{}.{}.{}.{}",
            self.network, self.station, self.channel, self.location
        )
    }
}

/// Convert a location code to its archive key form.
///
/// `-` is commonly used to stand for a space in location codes, so both `-` and real spaces
/// become `_`. An empty location becomes `__`.
pub fn normalize_location(location: &str) -> String {
    if location.is_empty() {
        return "__".to_owned();
    }

    location
        .chars()
        .map(|c| if c == '-' || c == ' ' { '_' } else { c })
        .collect()
}

fn check_field(name: &str, value: &str, width: Option<usize>) -> Result<(), WaveformErr> {
    if value.is_empty() {
        return Err(WaveformErr::Validation(format!("empty {} code", name)));
    }

    if value.contains(|c: char| c == '.' || c == '/' || c.is_whitespace()) {
        return Err(WaveformErr::Validation(format!(
            "invalid character in {} code '{}'",
            name, value
        )));
    }

    if let Some(width) = width {
        if value.chars().count() > width {
            return Err(WaveformErr::Validation(format!(
                "{} code '{}' is wider than {} characters",
                name, value, width
            )));
        }
    }

    Ok(())
}

//! Object keys in the public archive and in the product output buckets.
//!
//! These layouts are fixed by the archive, so every product builds its keys here.

use crate::{errors::WaveformErr, nscl::Nscl};
use std::fmt;
use strum_macros::{EnumIter, EnumString, IntoStaticStr};

/// Products written to an output bucket.
#[derive(Clone, Copy, PartialEq, Eq, Debug, EnumString, IntoStaticStr, EnumIter, Hash)]
pub enum Product {
    /// A day file with every Nth sample kept.
    #[strum(to_string = "decimated", serialize = "DECIMATED")]
    Decimated,
    /// A day file with the instrument response removed.
    #[strum(to_string = "noresp", serialize = "NORESP")]
    NoResp,
}

impl Product {
    /// The top level directory of the product in the output bucket.
    pub fn prefix(self) -> &'static str {
        self.into()
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

/// File name, without extension, of a channel's day file in the archive.
pub fn archive_basename(nscl: &Nscl, year: i32, day: u32) -> Result<String, WaveformErr> {
    check_day(year, day)?;

    Ok(format!(
        "{net}{sta:_<5}{chan}{loc:_<2}_{year}{day:03}",
        net = nscl.network(),
        sta = nscl.station(),
        chan = nscl.channel(),
        loc = nscl.key_location(),
        year = year,
        day = day
    ))
}

/// Key of a channel's day file in the continuous waveform archive.
pub fn derive_archive_key(nscl: &Nscl, year: i32, day: u32) -> Result<String, WaveformErr> {
    let basename = archive_basename(nscl, year, day)?;

    Ok(format!(
        "continuous_waveforms/{year}/{year}_{day:03}/{basename}.ms",
        year = year,
        day = day,
        basename = basename
    ))
}

/// Key of a station's StationXML file.
pub fn derive_metadata_key(network: &str, station: &str) -> Result<String, WaveformErr> {
    if network.is_empty() || station.is_empty() {
        return Err(WaveformErr::Validation(
            "metadata keys need a network and a station".to_owned(),
        ));
    }

    Ok(format!(
        "FDSNstationXML/{net}/{net}_{sta}.xml",
        net = network,
        sta = station
    ))
}

/// Key of a product file in an output bucket.
pub fn derive_output_key(
    product: Product,
    year: i32,
    day: u32,
    basename: &str,
) -> Result<String, WaveformErr> {
    check_day(year, day)?;

    if basename.is_empty() || basename.contains('/') {
        return Err(WaveformErr::Validation(format!(
            "invalid output basename '{}'",
            basename
        )));
    }

    Ok(format!(
        "{product}/{year}/{year}_{day:03}/{basename}.ms",
        product = product.prefix(),
        year = year,
        day = day,
        basename = basename
    ))
}

/// The parts of an archive key: year, day of year, and the file name without extension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveKeyParts {
    /// Year directory.
    pub year: i32,
    /// Day of year.
    pub day: u32,
    /// File name with the extension removed.
    pub basename: String,
}

/// Split an archive key into its year, day, and file name.
///
/// Expects exactly `{dir}/{year}/{year}_{ddd}/{file}`.
pub fn parse_archive_key(key: &str) -> Result<ArchiveKeyParts, WaveformErr> {
    let bad_key = || WaveformErr::Validation(format!("malformed archive key '{}'", key));

    let parts: Vec<&str> = key.split('/').collect();
    let (year_dir, year_day, file_name) = match parts.as_slice() {
        [_wf_dir, year_dir, year_day, file_name] => (*year_dir, *year_day, *file_name),
        _ => return Err(bad_key()),
    };

    let year: i32 = year_dir.parse().map_err(|_| bad_key())?;
    let day = match year_day.split('_').collect::<Vec<_>>().as_slice() {
        [y, d] if *y == year_dir => d.parse::<u32>().map_err(|_| bad_key())?,
        _ => return Err(bad_key()),
    };
    check_day(year, day)?;

    let basename = match file_name.rfind('.') {
        Some(idx) if idx > 0 => &file_name[..idx],
        _ => file_name,
    };
    if basename.is_empty() {
        return Err(bad_key());
    }

    Ok(ArchiveKeyParts {
        year,
        day,
        basename: basename.to_owned(),
    })
}

/// Parse a `YYYY,DDD` day string.
pub fn parse_day(day: &str) -> Result<(i32, u32), WaveformErr> {
    let bad_day = || WaveformErr::Validation(format!("day '{}' is not of the form YYYY,DDD", day));

    let (year, doy) = match day.split(',').collect::<Vec<_>>().as_slice() {
        [year, doy] => (year.trim(), doy.trim()),
        _ => return Err(bad_day()),
    };

    let year: i32 = year.parse().map_err(|_| bad_day())?;
    let doy: u32 = doy.parse().map_err(|_| bad_day())?;
    check_day(year, doy)?;

    Ok((year, doy))
}

fn check_day(year: i32, day: u32) -> Result<(), WaveformErr> {
    if !(0..=9999).contains(&year) {
        return Err(WaveformErr::Validation(format!("invalid year {}", year)));
    }

    if chrono::NaiveDate::from_yo_opt(year, day).is_none() {
        return Err(WaveformErr::Validation(format!(
            "invalid day of year {} for {}",
            day, year
        )));
    }

    Ok(())
}

/*--------------------------------------------------------------------------------------------------
                                          Unit Tests
--------------------------------------------------------------------------------------------------*/
#[cfg(test)]
mod unit {
    use super::*;

    use std::str::FromStr;
    use strum::IntoEnumIterator;

    fn nscl(net: &str, sta: &str, chan: &str, loc: &str) -> Nscl {
        Nscl::new(net, sta, chan, loc).unwrap()
    }

    #[test]
    fn test_archive_key() {
        assert_eq!(
            derive_archive_key(&nscl("CI", "WCS2", "BHE", ""), 2016, 123).unwrap(),
            "continuous_waveforms/2016/2016_123/CIWCS2_BHE___2016123.ms"
        );
        assert_eq!(
            derive_archive_key(&nscl("CI", "PASC", "HHZ", "00"), 2020, 5).unwrap(),
            "continuous_waveforms/2020/2020_005/CIPASC_HHZ00_2020005.ms"
        );
        assert_eq!(
            derive_archive_key(&nscl("CI", "ADO", "LHN", "-"), 2019, 45).unwrap(),
            "continuous_waveforms/2019/2019_045/CIADO__LHN___2019045.ms"
        );
    }

    #[test]
    fn test_archive_key_field_widths() {
        let stations = ["A", "AB", "ABC", "ABCD", "ABCDE"];
        let locations = ["", "-", " ", "--", "  ", "0", "00", "1-", " 2"];

        for sta in &stations {
            for loc in &locations {
                let key = derive_archive_key(&nscl("CI", sta, "HHZ", loc), 2016, 1).unwrap();
                let file = key.rsplit('/').next().unwrap();

                // CI + 5 station + 3 channel + 2 location + _ + 7 date + .ms
                assert_eq!(file.len(), 2 + 5 + 3 + 2 + 1 + 7 + 3, "{}", file);

                let sta_field = &file[2..7];
                assert!(sta_field.starts_with(sta));
                assert!(sta_field[sta.len()..].chars().all(|c| c == '_'));

                let loc_field = &file[10..12];
                assert!(!loc_field.contains('-') && !loc_field.contains(' '));
                if loc.is_empty() {
                    assert_eq!(loc_field, "__");
                }
            }
        }
    }

    #[test]
    fn test_archive_key_rejects_bad_days() {
        let id = nscl("CI", "PAS", "HHZ", "");
        assert!(derive_archive_key(&id, 2016, 0).is_err());
        assert!(derive_archive_key(&id, 2016, 366).is_ok());
        assert!(derive_archive_key(&id, 2017, 366).is_err());
        assert!(derive_archive_key(&id, 2017, 1000).is_err());
    }

    #[test]
    fn test_metadata_key() {
        assert_eq!(
            derive_metadata_key("CI", "WCS2").unwrap(),
            "FDSNstationXML/CI/CI_WCS2.xml"
        );
        assert!(derive_metadata_key("", "WCS2").is_err());
        assert!(derive_metadata_key("CI", "").is_err());
    }

    #[test]
    fn test_output_key() {
        assert_eq!(
            derive_output_key(Product::Decimated, 2016, 123, "CIWCS2_BHE___2016123").unwrap(),
            "decimated/2016/2016_123/CIWCS2_BHE___2016123.ms"
        );
        assert_eq!(
            derive_output_key(Product::NoResp, 2016, 7, "CIWCS2_BHE___2016007").unwrap(),
            "noresp/2016/2016_007/CIWCS2_BHE___2016007.ms"
        );
        assert!(derive_output_key(Product::NoResp, 2016, 7, "").is_err());
    }

    #[test]
    fn test_parse_archive_key() {
        let parts =
            parse_archive_key("continuous_waveforms/2016/2016_123/CIWCS2_BHE___2016123.ms")
                .unwrap();
        assert_eq!(parts.year, 2016);
        assert_eq!(parts.day, 123);
        assert_eq!(parts.basename, "CIWCS2_BHE___2016123");

        assert!(parse_archive_key("2016/2016_123/CIWCS2_BHE___2016123.ms").is_err());
        assert!(parse_archive_key("continuous_waveforms/2016/2015_123/x.ms").is_err());
        assert!(parse_archive_key("continuous_waveforms/2016/2016-123/x.ms").is_err());
    }

    #[test]
    fn test_parse_day() {
        assert_eq!(parse_day("2016,123").unwrap(), (2016, 123));
        assert_eq!(parse_day("2016,5").unwrap(), (2016, 5));
        assert!(parse_day("2016-123").is_err());
        assert!(parse_day("2016,400").is_err());
        assert!(parse_day("twenty,1").is_err());
    }

    #[test]
    fn round_trip_strings_for_product() {
        for product in Product::iter() {
            assert_eq!(Product::from_str(product.prefix()).unwrap(), product);
        }
        assert_eq!(Product::from_str("NORESP").unwrap(), Product::NoResp);
    }
}

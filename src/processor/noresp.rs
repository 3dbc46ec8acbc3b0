use super::Processor;

use crate::{
    codec::{self, Format},
    errors::WaveformErr,
    instrument::stationxml,
    keys::{
        archive_basename, derive_archive_key, derive_metadata_key, derive_output_key, parse_day,
        Product,
    },
    nscl::Nscl,
    package::ProductOutput,
    transform::remove_response,
    workspace::Workspace,
};
use log::info;
use serde::Deserialize;

/// Request to remove the instrument response from one channel day.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct NoRespRequest {
    /// Day as `YYYY,DDD`.
    pub day: String,
    /// Channel as `NET.STA.CHAN.LOC`.
    pub nscl: String,
}

impl Processor {
    /// Convert a channel day to ground motion and store it under `noresp/` in the configured
    /// output bucket.
    ///
    /// The corrected samples are truncated to integers to be written as STEIM2 miniSEED.
    pub fn noresp(&self, request: &NoRespRequest) -> Result<ProductOutput, WaveformErr> {
        let output_bucket = self.config.require_output_bucket()?;
        let input_bucket = &self.config.input_bucket;

        let (year, day) = parse_day(&request.day)?;
        let nscl = Nscl::parse(&request.nscl)?;

        let archive_key = derive_archive_key(&nscl, year, day)?;
        let metadata_key = derive_metadata_key(nscl.network(), nscl.station())?;
        let basename = archive_basename(&nscl, year, day)?;
        let output_key = derive_output_key(Product::NoResp, year, day, &basename)?;

        info!(
            "removing response from {} for {},{:03} into {}",
            nscl, year, day, output_bucket
        );

        let ws = Workspace::new()?;
        let traces = self.fetch_traces(&ws, input_bucket, &archive_key)?;

        let xml = self.fetch(&ws, input_bucket, &metadata_key)?;
        let xml = String::from_utf8(xml).map_err(|err| {
            WaveformErr::Response(format!("{} is not UTF-8 text: {}", metadata_key, err))
        })?;
        let response = stationxml::parse(&xml, nscl.network(), nscl.station())?;

        let corrected = remove_response(&traces, &response, &self.config.deconvolution)?;
        let bytes = codec::encode(&corrected, Format::MiniSeed)?;

        self.upload(output_bucket, &output_key, &bytes)?;

        Ok(ProductOutput::new(output_bucket, &output_key))
    }
}

#[cfg(test)]
mod unit {
    use super::super::unit::{processor_with, wcs2_bytes, ARCHIVE_KEY};
    use super::*;
    use crate::{config::Config, instrument::stationxml::unit::WCS2_XML};

    const XML_KEY: &str = "FDSNstationXML/CI/CI_WCS2.xml";

    fn config() -> Config {
        Config {
            output_bucket: Some("noresp-output".to_owned()),
            ..Config::default()
        }
    }

    // Flat velocity response of 0.01 counts per m/s, so corrected values are raw counts times 100.
    const FLAT_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<FDSNStationXML xmlns="http://www.fdsn.org/xml/station/1" schemaVersion="1.1">
  <Network code="CI">
    <Station code="WCS2" startDate="2008-01-01T00:00:00">
      <Channel code="BHE" locationCode="" startDate="2008-01-01T00:00:00">
        <SampleRate>40</SampleRate>
        <Response>
          <InstrumentSensitivity>
            <Value>0.01</Value>
            <Frequency>1.0</Frequency>
            <InputUnits><Name>M/S</Name></InputUnits>
            <OutputUnits><Name>COUNTS</Name></OutputUnits>
          </InstrumentSensitivity>
        </Response>
      </Channel>
    </Station>
  </Network>
</FDSNStationXML>
"#;

    fn request() -> NoRespRequest {
        NoRespRequest {
            day: "2016,123".to_owned(),
            nscl: "CI.WCS2.BHE.".to_owned(),
        }
    }

    #[test]
    fn test_remove_response_day() {
        let bytes = wcs2_bytes();
        let processor = processor_with(
            &[
                ("scedc-pds", ARCHIVE_KEY, &bytes[..]),
                ("scedc-pds", XML_KEY, WCS2_XML.as_bytes()),
            ],
            config(),
        );

        let output = processor.noresp(&request()).unwrap();
        let key = "noresp/2016/2016_123/CIWCS2_BHE___2016123.ms";
        assert_eq!(output.output_key, format!("s3://noresp-output/{}", key));

        // Ground motion in meters per second truncates to integer zeros. The round trip through
        // STEIM2 keeps the length and timing.
        let written = codec::decode(&processor.store().get("noresp-output", key).unwrap()).unwrap();
        let original = codec::decode(&bytes).unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written.traces()[0].len(), original.traces()[0].len());
        assert_eq!(written.traces()[0].start, original.traces()[0].start);
        assert!(written.traces()[0].samples.is_int());
    }

    #[test]
    fn test_corrected_values_scale_by_sensitivity() {
        let bytes = wcs2_bytes();
        let processor = processor_with(
            &[
                ("scedc-pds", ARCHIVE_KEY, &bytes[..]),
                ("scedc-pds", XML_KEY, FLAT_XML.as_bytes()),
            ],
            config(),
        );

        processor.noresp(&request()).unwrap();
        let key = "noresp/2016/2016_123/CIWCS2_BHE___2016123.ms";
        let written = codec::decode(&processor.store().get("noresp-output", key).unwrap()).unwrap();

        let raw = codec::decode(&bytes).unwrap().traces()[0].samples.to_f64();
        let corrected = written.traces()[0].samples.to_f64();
        assert_eq!(corrected.len(), raw.len());
        assert_ne!(corrected, raw);

        // Outside the tapered ends the result is the demeaned counts over the sensitivity,
        // truncated to an integer.
        let mean = raw.iter().sum::<f64>() / raw.len() as f64;
        let taper = raw.len() / 20;
        for i in taper..raw.len() - taper {
            let expected = (raw[i] - mean) / 0.01;
            assert!(
                (corrected[i] - expected).abs() <= 1.0,
                "{}: {} vs {}",
                i,
                corrected[i],
                expected
            );
        }
    }

    #[test]
    fn test_missing_pieces() {
        let bytes = wcs2_bytes();

        // No output bucket configured.
        let processor = processor_with(&[], Config::default());
        match processor.noresp(&request()) {
            Err(WaveformErr::Validation(_)) => {}
            other => panic!("expected validation error, got {:?}", other),
        }

        // No station metadata.
        let processor = processor_with(&[("scedc-pds", ARCHIVE_KEY, &bytes[..])], config());
        assert!(processor.noresp(&request()).unwrap_err().is_retrieval());

        // Metadata without the channel.
        let processor = processor_with(
            &[
                ("scedc-pds", ARCHIVE_KEY, &bytes[..]),
                ("scedc-pds", XML_KEY, WCS2_XML.replace("\"BHE\"", "\"BHZ\"").as_bytes()),
            ],
            config(),
        );
        match processor.noresp(&request()) {
            Err(WaveformErr::Response(_)) => {}
            other => panic!("expected response error, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_day() {
        let processor = processor_with(&[], config());
        let req = NoRespRequest {
            day: "2016-123".to_owned(),
            ..request()
        };
        match processor.noresp(&req) {
            Err(WaveformErr::Validation(_)) => {}
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}

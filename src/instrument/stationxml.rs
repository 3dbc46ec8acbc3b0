//! Read instrument responses from FDSN StationXML.
//!
//! Only what response removal needs is read: channel epochs, the overall sensitivity, and the
//! first pole-zero stage. Elements are matched by local name so any schema namespace works.

use super::{ChannelResponse, PolesZeros, Sensitivity, StationResponse, TransferType};
use crate::{errors::WaveformErr, window::parse_time};
use num_complex::Complex64;
use roxmltree::{Document, Node};

/// Parse the response of `network`.`station` out of a StationXML document.
pub fn parse(xml: &str, network: &str, station: &str) -> Result<StationResponse, WaveformErr> {
    let doc = Document::parse(xml)?;

    let root = doc.root_element();
    if root.tag_name().name() != "FDSNStationXML" {
        return Err(WaveformErr::Response(format!(
            "expected an FDSNStationXML document, found <{}>",
            root.tag_name().name()
        )));
    }

    let mut channels = vec![];
    for net in children(root, "Network").filter(|n| n.attribute("code") == Some(network)) {
        for sta in children(net, "Station").filter(|n| n.attribute("code") == Some(station)) {
            for chan in children(sta, "Channel") {
                if let Some(response) = parse_channel(chan)? {
                    channels.push(response);
                }
            }
        }
    }

    if channels.is_empty() {
        return Err(WaveformErr::Response(format!(
            "no channel responses for {}.{} in StationXML",
            network, station
        )));
    }

    Ok(StationResponse {
        network: network.to_owned(),
        station: station.to_owned(),
        channels,
    })
}

fn parse_channel(chan: Node) -> Result<Option<ChannelResponse>, WaveformErr> {
    let code = required_attribute(chan, "code")?;
    let location = chan.attribute("locationCode").unwrap_or("").to_owned();
    let start = parse_time(required_attribute(chan, "startDate")?)?;
    let end = match chan.attribute("endDate") {
        Some(end) if !end.trim().is_empty() => Some(parse_time(end)?),
        _ => None,
    };

    let response = match child(chan, "Response") {
        Some(response) => response,
        None => return Ok(None),
    };
    let sensitivity = match child(response, "InstrumentSensitivity") {
        Some(sensitivity) => sensitivity,
        None => return Ok(None),
    };

    let sensitivity = Sensitivity {
        value: number(sensitivity, "Value")?,
        frequency: number(sensitivity, "Frequency")?,
        input_units: child(sensitivity, "InputUnits")
            .and_then(|units| child_text(units, "Name"))
            .ok_or_else(|| missing(code, "InputUnits/Name"))?
            .to_owned(),
    };

    let poles_zeros = match children(response, "Stage")
        .filter_map(|stage| child(stage, "PolesZeros"))
        .next()
    {
        Some(pz) => Some(parse_poles_zeros(code, pz)?),
        None => None,
    };

    Ok(Some(ChannelResponse {
        channel: code.to_owned(),
        location,
        start,
        end,
        sensitivity,
        poles_zeros,
    }))
}

fn parse_poles_zeros(code: &str, pz: Node) -> Result<PolesZeros, WaveformErr> {
    let transfer = match child_text(pz, "PzTransferFunctionType").map(str::trim) {
        Some("LAPLACE (RADIANS/SECOND)") => TransferType::LaplaceRadians,
        Some("LAPLACE (HERTZ)") => TransferType::LaplaceHertz,
        other => {
            return Err(WaveformErr::Response(format!(
                "unsupported transfer function type {:?} for channel {}",
                other, code
            )))
        }
    };

    let complex = |node: Node| -> Result<Complex64, WaveformErr> {
        Ok(Complex64::new(
            number(node, "Real")?,
            number(node, "Imaginary")?,
        ))
    };

    Ok(PolesZeros {
        transfer,
        normalization_factor: number(pz, "NormalizationFactor").unwrap_or(0.0),
        normalization_frequency: number(pz, "NormalizationFrequency")?,
        zeros: children(pz, "Zero").map(complex).collect::<Result<_, _>>()?,
        poles: children(pz, "Pole").map(complex).collect::<Result<_, _>>()?,
    })
}

fn children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children()
        .filter(move |n| n.is_element() && n.tag_name().name() == name)
}

fn child<'a, 'input: 'a>(node: Node<'a, 'input>, name: &'static str) -> Option<Node<'a, 'input>> {
    children(node, name).next()
}

fn child_text<'a, 'input: 'a>(node: Node<'a, 'input>, name: &'static str) -> Option<&'a str> {
    child(node, name).and_then(|n| n.text())
}

fn number(node: Node, name: &'static str) -> Result<f64, WaveformErr> {
    let text = child_text(node, name).ok_or_else(|| {
        WaveformErr::Response(format!(
            "missing <{}> in <{}>",
            name,
            node.tag_name().name()
        ))
    })?;

    text.trim().parse().map_err(|_| {
        WaveformErr::Response(format!("<{}> value '{}' is not a number", name, text))
    })
}

fn required_attribute<'a>(node: Node<'a, '_>, name: &str) -> Result<&'a str, WaveformErr> {
    node.attribute(name).ok_or_else(|| {
        WaveformErr::Response(format!(
            "<{}> is missing the {} attribute",
            node.tag_name().name(),
            name
        ))
    })
}

fn missing(code: &str, what: &str) -> WaveformErr {
    WaveformErr::Response(format!("channel {} response has no {}", code, what))
}

#[cfg(test)]
pub(crate) mod unit {
    use super::*;
    use chrono::NaiveDate;

    pub(crate) const WCS2_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<FDSNStationXML xmlns="http://www.fdsn.org/xml/station/1" schemaVersion="1.1">
  <Source>SCEDC</Source>
  <Network code="CI">
    <Station code="WCS2" startDate="2008-01-01T00:00:00">
      <Channel code="BHE" locationCode="" startDate="2008-01-01T00:00:00" endDate="2599-12-31T23:59:59">
        <SampleRate>40</SampleRate>
        <Response>
          <InstrumentSensitivity>
            <Value>6.27368E8</Value>
            <Frequency>1.0</Frequency>
            <InputUnits><Name>M/S</Name></InputUnits>
            <OutputUnits><Name>COUNTS</Name></OutputUnits>
          </InstrumentSensitivity>
          <Stage number="1">
            <PolesZeros>
              <InputUnits><Name>M/S</Name></InputUnits>
              <OutputUnits><Name>V</Name></OutputUnits>
              <PzTransferFunctionType>LAPLACE (RADIANS/SECOND)</PzTransferFunctionType>
              <NormalizationFactor>1.0</NormalizationFactor>
              <NormalizationFrequency>1.0</NormalizationFrequency>
              <Zero number="0"><Real>0</Real><Imaginary>0</Imaginary></Zero>
              <Zero number="1"><Real>0</Real><Imaginary>0</Imaginary></Zero>
              <Pole number="2"><Real>-0.036614</Real><Imaginary>0.037059</Imaginary></Pole>
              <Pole number="3"><Real>-0.036614</Real><Imaginary>-0.037059</Imaginary></Pole>
            </PolesZeros>
            <StageGain><Value>1500</Value><Frequency>1.0</Frequency></StageGain>
          </Stage>
          <Stage number="2">
            <Coefficients>
              <InputUnits><Name>V</Name></InputUnits>
              <OutputUnits><Name>COUNTS</Name></OutputUnits>
              <CfTransferFunctionType>DIGITAL</CfTransferFunctionType>
            </Coefficients>
            <StageGain><Value>418245</Value><Frequency>1.0</Frequency></StageGain>
          </Stage>
        </Response>
      </Channel>
      <Channel code="LOG" locationCode="" startDate="2008-01-01T00:00:00"/>
    </Station>
  </Network>
</FDSNStationXML>
"#;

    #[test]
    fn test_parse_station() {
        let response = parse(WCS2_XML, "CI", "WCS2").unwrap();
        assert_eq!(response.channels.len(), 1);

        let bhe = &response.channels[0];
        assert_eq!(bhe.channel, "BHE");
        assert_eq!(bhe.location, "");
        assert_eq!(
            bhe.start,
            NaiveDate::from_ymd_opt(2008, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
        assert!(bhe.end.is_some());
        assert_eq!(bhe.sensitivity.value, 6.27368e8);
        assert_eq!(bhe.sensitivity.input_units, "M/S");

        let pz = bhe.poles_zeros.as_ref().unwrap();
        assert_eq!(pz.transfer, TransferType::LaplaceRadians);
        assert_eq!(pz.zeros.len(), 2);
        assert_eq!(pz.normalization_factor, 1.0);
        assert_eq!(pz.poles.len(), 2);
        assert_eq!(pz.poles[1], Complex64::new(-0.036614, -0.037059));

        // Flat velocity response in the passband.
        let gain = bhe.evaluate(1.0).norm();
        assert!((gain / 6.27368e8 - 1.0).abs() < 0.01, "{}", gain);
    }

    #[test]
    fn test_wrong_station_is_response_error() {
        match parse(WCS2_XML, "CI", "PAS") {
            Err(WaveformErr::Response(_)) => {}
            other => panic!("expected response error, got {:?}", other),
        }
    }

    #[test]
    fn test_not_stationxml() {
        assert!(parse("<html></html>", "CI", "WCS2").is_err());
        assert!(parse("not xml at all", "CI", "WCS2").is_err());
    }
}

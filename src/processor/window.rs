use super::Processor;

use crate::{
    codec::{self, Format},
    errors::WaveformErr,
    nscl::Nscl,
    package::WaveformRecord,
    trace::TraceSet,
    transform::{merge, trim_all},
    window::{parse_time, plan, RetrievalUnit, WindowRequest},
    workspace::Workspace,
};
use log::{info, warn};
use serde::Deserialize;

/// One window of a batch request.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct WindowSpec {
    /// Network code.
    #[serde(rename = "Network")]
    pub network: String,
    /// Station code.
    #[serde(rename = "Station")]
    pub station: String,
    /// Channel code.
    #[serde(rename = "Channel")]
    pub channel: String,
    /// Location code, may be empty.
    #[serde(rename = "Location", default)]
    pub location: String,
    /// Start of the window, ISO-8601.
    #[serde(rename = "Starttime")]
    pub starttime: String,
    /// End of the window, ISO-8601. Without one the whole day is returned.
    #[serde(rename = "Endtime", default)]
    pub endtime: Option<String>,
}

impl WindowSpec {
    /// Parse the identifiers and times.
    pub fn to_request(&self) -> Result<WindowRequest, WaveformErr> {
        Ok(WindowRequest {
            nscl: Nscl::new(&self.network, &self.station, &self.channel, &self.location)?,
            start: parse_time(&self.starttime)?,
            end: self.endtime.as_deref().map(parse_time).transpose()?,
        })
    }
}

/// A batch of time windows.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct WindowBatch {
    /// The windows, answered in order.
    #[serde(rename = "Windows")]
    pub windows: Vec<WindowSpec>,
}

impl Processor {
    /// Fetch a batch of time windows as structured records.
    ///
    /// Every window is validated before anything is fetched, one bad window fails the whole
    /// batch. Windows whose day file is missing, or that hold no data, are left out of the
    /// result.
    pub fn time_windows(&self, batch: &WindowBatch) -> Result<Vec<WaveformRecord>, WaveformErr> {
        info!("time window request for {} windows", batch.windows.len());

        let requests = batch
            .windows
            .iter()
            .map(WindowSpec::to_request)
            .collect::<Result<Vec<_>, _>>()?;
        let units = plan(&requests).into_iter().collect::<Result<Vec<_>, _>>()?;

        let mut records = Vec::with_capacity(units.len());
        for unit in &units {
            let ws = Workspace::new()?;

            let traces = match self.window_traces(&ws, unit) {
                Ok(traces) => traces,
                Err(err) if err.is_retrieval() || err.is_window() => {
                    warn!("skipping window for {}: {}", unit.nscl, err);
                    continue;
                }
                Err(err) => return Err(err),
            };

            match traces.traces().first() {
                Some(trace) => records.push(WaveformRecord::from(trace)),
                None => warn!("no data for {} in {}", unit.nscl, unit.archive_key),
            }
        }

        info!("returning {} of {} windows", records.len(), units.len());
        Ok(records)
    }

    /// Fetch one time window encoded as a file.
    ///
    /// SAC holds a single trace, so only the first contiguous trace of the window is written in
    /// that format.
    pub fn export_window(
        &self,
        request: &WindowRequest,
        format: Format,
    ) -> Result<Vec<u8>, WaveformErr> {
        let unit = request.resolve()?;

        let ws = Workspace::new()?;
        let traces = self.window_traces(&ws, &unit)?;

        let traces = match format {
            Format::MiniSeed => traces,
            Format::Sac => traces.into_iter().take(1).collect::<Vec<_>>().into(),
        };

        codec::encode(&traces, format)
    }

    fn window_traces(&self, ws: &Workspace, unit: &RetrievalUnit) -> Result<TraceSet, WaveformErr> {
        let traces = self.fetch_traces(ws, &self.config.input_bucket, &unit.archive_key)?;
        let traces = merge(traces);

        match unit.trim {
            Some(window) => trim_all(&traces, window.start(), window.end()),
            None => Ok(traces),
        }
    }
}

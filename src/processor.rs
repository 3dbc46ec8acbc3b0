//! The waveform products.

use crate::{
    codec,
    config::Config,
    errors::WaveformErr,
    store::ObjectStore,
    trace::TraceSet,
    workspace::Workspace,
};
use log::{debug, info};

pub use decimated::DecimateRequest;
pub use noresp::NoRespRequest;
pub use window::{WindowBatch, WindowSpec};

/// Produces derived waveform files and time windows from the archive.
///
/// Holds no per-request state, every product call is independent of the ones before it.
pub struct Processor {
    store: Box<dyn ObjectStore>,
    config: Config,
}

mod decimated;
mod noresp;
mod window;

impl Processor {
    /// Create a processor reading and writing objects through `store`.
    pub fn new(store: Box<dyn ObjectStore>, config: Config) -> Self {
        Processor { store, config }
    }

    /// The settings in use.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The object store in use.
    pub fn store(&self) -> &dyn ObjectStore {
        self.store.as_ref()
    }

    /// Download an object into the workspace and read it back.
    fn fetch(&self, ws: &Workspace, bucket: &str, key: &str) -> Result<Vec<u8>, WaveformErr> {
        info!("downloading {} from {}", key, bucket);

        let bytes = self.store.get(bucket, key)?;
        let staged = ws.stage(key, &bytes)?;
        let read_back = ws.read(&staged)?;

        if read_back.len() != bytes.len() {
            return Err(WaveformErr::retrieval(
                bucket,
                key,
                format!("staged {} of {} bytes", read_back.len(), bytes.len()),
            ));
        }

        Ok(read_back)
    }

    /// Download and decode a miniSEED object. An object without any samples counts as a failed
    /// download.
    fn fetch_traces(
        &self,
        ws: &Workspace,
        bucket: &str,
        key: &str,
    ) -> Result<TraceSet, WaveformErr> {
        let bytes = self.fetch(ws, bucket, key)?;
        let traces = codec::decode(&bytes)?;
        if traces.is_empty() {
            return Err(WaveformErr::retrieval(bucket, key, "object holds no samples"));
        }
        debug!("decoded {} traces from {}", traces.len(), key);
        Ok(traces)
    }

    /// Upload an object.
    fn upload(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<(), WaveformErr> {
        info!("uploading {} bytes to {} in {}", bytes.len(), key, bucket);
        self.store.put(bucket, key, bytes)
    }
}

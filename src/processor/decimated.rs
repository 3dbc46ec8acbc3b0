use super::Processor;

use crate::{
    codec::{self, Format},
    errors::WaveformErr,
    keys::{derive_output_key, parse_archive_key, Product},
    package::ProductOutput,
    transform::decimate_all,
    workspace::Workspace,
};
use log::info;
use serde::Deserialize;

/// Request to decimate one archive day file.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct DecimateRequest {
    /// Archive key of the day file.
    pub s3_key: String,
    /// Bucket holding the day file, defaults to the configured archive bucket.
    #[serde(default)]
    pub s3_input_bucket: Option<String>,
    /// Bucket to write the result to.
    pub s3_output_bucket: String,
    /// Keep one of every this many samples.
    pub decimation_factor: u32,
}

impl Processor {
    /// Decimate a day file and store it under `decimated/` in the output bucket.
    pub fn decimated(&self, request: &DecimateRequest) -> Result<ProductOutput, WaveformErr> {
        let input_bucket = request
            .s3_input_bucket
            .as_deref()
            .unwrap_or(&self.config.input_bucket);

        info!(
            "decimating {} from {} by {} into {}",
            request.s3_key, input_bucket, request.decimation_factor, request.s3_output_bucket
        );

        if request.decimation_factor == 0 {
            return Err(WaveformErr::Validation(
                "decimation factor must be at least 1".to_owned(),
            ));
        }
        if request.s3_output_bucket.trim().is_empty() {
            return Err(WaveformErr::Validation("empty output bucket".to_owned()));
        }

        let parts = parse_archive_key(&request.s3_key)?;
        let output_key =
            derive_output_key(Product::Decimated, parts.year, parts.day, &parts.basename)?;

        let ws = Workspace::new()?;
        let traces = self.fetch_traces(&ws, input_bucket, &request.s3_key)?;
        let decimated = decimate_all(&traces, request.decimation_factor)?;
        let bytes = codec::encode(&decimated, Format::MiniSeed)?;

        self.upload(&request.s3_output_bucket, &output_key, &bytes)?;

        Ok(ProductOutput::new(&request.s3_output_bucket, &output_key))
    }
}

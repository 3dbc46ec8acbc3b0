#![deny(missing_docs)]
//! Package to build derived products from an archive of continuous seismic waveforms.
//!
//! The archive holds one miniSEED file per channel per day, alongside a StationXML file per
//! station describing the instrument response. From those this crate builds decimated day files,
//! day files with the instrument response removed, and time windows packaged as JSON, miniSEED,
//! or SAC.

//
// Public API
//
pub use crate::cmd_line::CommonCmdLineArgs;
pub use crate::codec::{decode, decode_as, encode, Format};
pub use crate::config::Config;
pub use crate::errors::WaveformErr;
pub use crate::handler::{handle, Endpoint, Invocation};
pub use crate::instrument::{
    ChannelResponse, GroundMotion, PolesZeros, Sensitivity, StationResponse, TransferType,
};
pub use crate::keys::{
    archive_basename, derive_archive_key, derive_metadata_key, derive_output_key,
    parse_archive_key, parse_day, ArchiveKeyParts, Product,
};
pub use crate::nscl::{normalize_location, Nscl};
pub use crate::package::{iso_time, ProductOutput, WaveformRecord};
pub use crate::processor::{DecimateRequest, NoRespRequest, Processor, WindowBatch, WindowSpec};
pub use crate::store::{LocalStore, MemoryStore, ObjectStore};
pub use crate::trace::{Samples, Trace, TraceSet};
pub use crate::transform::{
    decimate, decimate_all, merge, merge_with, remove_response, resolve_overlap, trim, trim_all,
    Deconvolution, OutputUnits, OverlapPolicy,
};
pub use crate::window::{parse_time, plan, RetrievalUnit, TimeWindow, WindowRequest};
pub use crate::workspace::Workspace;

/// Parse StationXML documents.
pub use crate::instrument::stationxml;

//
// Implementation only
//
mod cmd_line;
mod codec;
mod config;
mod errors;
mod handler;
mod instrument;
mod keys;
mod nscl;
mod package;
mod processor;
mod store;
mod trace;
mod transform;
mod window;
mod workspace;

//! Numeric processing of traces: decimation, merging and trimming, and removing the instrument
//! response.

mod decimate;
mod deconvolve;
mod merge;

pub use decimate::{decimate, decimate_all};
pub use deconvolve::{remove_response, Deconvolution, OutputUnits};
pub use merge::{merge, merge_with, resolve_overlap, trim, trim_all, OverlapPolicy};

//! Scratch space for one request.

use crate::errors::WaveformErr;
use log::debug;
use std::path::{Path, PathBuf};
use tempdir::TempDir;

/// A temporary directory that is removed, with everything in it, when dropped.
///
/// Each request gets its own so concurrent requests never see each other's files and nothing is
/// left behind, whether the request succeeds or fails.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a fresh workspace.
    pub fn new() -> Result<Self, WaveformErr> {
        let dir = TempDir::new("pds-waveforms")?;
        debug!("created workspace {}", dir.path().display());
        Ok(Workspace { dir })
    }

    /// Directory of the workspace.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `bytes` to a file in the workspace.
    ///
    /// Only the last component of `name` is used, so keys can be passed directly.
    pub fn stage(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, WaveformErr> {
        let file_name = Path::new(name).file_name().ok_or_else(|| {
            WaveformErr::Validation(format!("cannot stage '{}', it has no file name", name))
        })?;

        let path = self.dir.path().join(file_name);
        std::fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Read a staged file back.
    pub fn read(&self, path: &Path) -> Result<Vec<u8>, WaveformErr> {
        Ok(std::fs::read(path)?)
    }
}

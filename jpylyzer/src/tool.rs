use log::{debug, info};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

/// Appended to the image path to name the saved report.
pub const REPORT_EXTENSION: &str = ".jpylyzer.xml";

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to run {binary}: {source}")]
    Spawn {
        binary: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{binary} exited with {status} for {image}: {stderr}")]
    Failed {
        binary: PathBuf,
        image: PathBuf,
        status: String,
        stderr: String,
    },

    #[error("failed to write report {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Location of the jpylyzer executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Jpylyzer {
    binary: PathBuf,
}

impl Default for Jpylyzer {
    fn default() -> Self {
        Jpylyzer::new("jpylyzer")
    }
}

impl Jpylyzer {
    pub fn new<P: Into<PathBuf>>(binary: P) -> Jpylyzer {
        Jpylyzer {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Path the report for `image` is saved under.
    pub fn report_path(image: &Path) -> PathBuf {
        let mut path = OsString::from(image.as_os_str());
        path.push(REPORT_EXTENSION);
        PathBuf::from(path)
    }

    /// Run jpylyzer on `image`, saving its XML report next to the image.
    ///
    /// An existing report is overwritten. Returns the path of the report.
    pub fn run(&self, image: &Path) -> Result<PathBuf, ToolError> {
        debug!("running {} {}", self.binary.display(), image.display());

        // The report is written to stdout; stderr is kept apart from it.
        let output = Command::new(&self.binary)
            .arg(image)
            .output()
            .map_err(|source| ToolError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ToolError::Failed {
                binary: self.binary.clone(),
                image: image.to_path_buf(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        let path = Jpylyzer::report_path(image);
        fs::write(&path, &output.stdout).map_err(|source| ToolError::Write {
            path: path.clone(),
            source,
        })?;
        info!("jpylyzer report written to {}", path.display());

        Ok(path)
    }
}

use crate::SchematronError;
use log::debug;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

/// An XSLT 1.0 processor.
pub trait XsltProcessor {
    /// Apply `stylesheet` to the document at `input`, passing each of
    /// `params` as a string parameter, and return the output document.
    fn transform(
        &self,
        stylesheet: &Path,
        input: &Path,
        params: &[(&str, &str)],
    ) -> Result<Vec<u8>, SchematronError>;

    /// Like [`transform`](XsltProcessor::transform) for a document in memory.
    fn transform_bytes(
        &self,
        stylesheet: &Path,
        input: &[u8],
        params: &[(&str, &str)],
    ) -> Result<Vec<u8>, SchematronError> {
        let mut staged = tempfile::Builder::new()
            .prefix("schematron")
            .suffix(".xml")
            .tempfile()?;
        staged.write_all(input)?;
        staged.flush()?;
        self.transform(stylesheet, staged.path(), params)
    }
}

/// The libxslt command line processor.
#[derive(Debug, Clone)]
pub struct Xsltproc {
    binary: PathBuf,
}

impl Xsltproc {
    pub fn new<P: Into<PathBuf>>(binary: P) -> Xsltproc {
        Xsltproc {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

impl Default for Xsltproc {
    fn default() -> Xsltproc {
        Xsltproc::new("xsltproc")
    }
}

impl XsltProcessor for Xsltproc {
    fn transform(
        &self,
        stylesheet: &Path,
        input: &Path,
        params: &[(&str, &str)],
    ) -> Result<Vec<u8>, SchematronError> {
        let mut command = Command::new(&self.binary);
        for (name, value) in params {
            command.arg("--stringparam").arg(name).arg(value);
        }
        command.arg(stylesheet).arg(input);
        debug!("running {:?}", command);

        let output = command.output().map_err(|source| SchematronError::Spawn {
            binary: self.binary.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(SchematronError::Transform {
                stylesheet: stylesheet.to_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        Ok(output.stdout)
    }
}

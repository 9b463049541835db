use jp2match::{compare, log_comparison, Comparison};
use jp2profile::JP2Profile;
use jpylyzer::{is_valid, load_report, Jpylyzer, ReportError, ToolError};
use log::{error, info, warn};
use schematron::{Schematron, SchematronError, XsltProcessor, Xsltproc};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Report(#[from] ReportError),
}

const JP2_EXTENSION: &str = "jp2";

/// Everything learned about one checked file.
///
/// `schematron` is `None` when no schema was given. A schematron failure is
/// kept next to the other results and does not replace them.
#[derive(Debug)]
pub struct Verdict {
    pub valid: bool,
    pub comparison: Comparison,
    pub schematron: Option<Result<bool, SchematronError>>,
}

#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub verdict: Result<Verdict, CheckError>,
}

impl FileOutcome {
    /// A verdict was reached and the file matches the profile.
    pub fn passed(&self) -> bool {
        match &self.verdict {
            Ok(verdict) => verdict.comparison.matches(),
            Err(_) => false,
        }
    }
}

/// Where the jpylyzer report of each checked file comes from.
#[derive(Debug, Clone)]
pub enum ReportSource {
    /// Run jpylyzer on each image.
    Run(Jpylyzer),
    /// The checked files are jpylyzer reports already.
    Existing,
}

pub struct Checker<X: XsltProcessor = Xsltproc> {
    profile: JP2Profile,
    source: ReportSource,
    schematron: Option<(Schematron, X)>,
}

impl Checker {
    pub fn new(profile: JP2Profile, source: ReportSource) -> Checker {
        Checker {
            profile,
            source,
            schematron: None,
        }
    }
}

impl<X: XsltProcessor> Checker<X> {
    pub fn with_schematron<Y: XsltProcessor>(self, schematron: Schematron, processor: Y) -> Checker<Y> {
        Checker {
            profile: self.profile,
            source: self.source,
            schematron: Some((schematron, processor)),
        }
    }

    fn report(&self, path: &Path) -> Result<PathBuf, CheckError> {
        match &self.source {
            ReportSource::Run(jpylyzer) => Ok(jpylyzer.run(path)?),
            ReportSource::Existing => Ok(path.to_owned()),
        }
    }

    fn verdict(&self, path: &Path) -> Result<Verdict, CheckError> {
        let report = self.report(path)?;
        let fields = load_report(&report)?;

        let valid = is_valid(&fields);
        let comparison = compare(&fields, &self.profile);
        log_comparison(&comparison);

        let schematron = match &self.schematron {
            Some((schematron, processor)) => {
                let checked = schematron.check_report(processor, &report);
                if let Err(e) = &checked {
                    error!("{}: schematron check failed: {}", path.display(), e);
                }
                Some(checked)
            }
            None => None,
        };

        Ok(Verdict {
            valid,
            comparison,
            schematron,
        })
    }

    pub fn check_file(&self, path: &Path) -> FileOutcome {
        info!("checking {}", path.display());
        let verdict = self.verdict(path);
        if let Err(e) = &verdict {
            error!("{}: {}", path.display(), e);
        }
        FileOutcome {
            path: path.to_owned(),
            verdict,
        }
    }

    // Jpylyzer is only run on .jp2 files; existing reports are taken as given.
    fn accepts(&self, path: &Path) -> bool {
        match &self.source {
            ReportSource::Run(_) => path
                .extension()
                .and_then(OsStr::to_str)
                .map_or(false, |extension| extension.eq_ignore_ascii_case(JP2_EXTENSION)),
            ReportSource::Existing => true,
        }
    }

    /// Check every file in turn. A file that cannot be checked does not stop
    /// the others. Files jpylyzer is not run on are skipped.
    pub fn check_files<P: AsRef<Path>>(&self, paths: &[P]) -> Vec<FileOutcome> {
        paths
            .iter()
            .map(AsRef::as_ref)
            .filter(|path| {
                let accepted = self.accepts(path);
                if !accepted {
                    warn!("{} is not a .jp2 file, skipped", path.display());
                }
                accepted
            })
            .map(|path| self.check_file(path))
            .collect()
    }
}

//! Schematron validation of jpylyzer reports.
//!
//! A Schematron schema is compiled to an XSLT stylesheet with the ISO
//! Schematron skeleton, in three stages: inclusion, abstract pattern
//! expansion and SVRL generation. Applying the compiled stylesheet to a
//! report yields an SVRL document, and the report passes when it holds no
//! failed assertions.
//!
//! The compiled stylesheet is cached and only regenerated when it is missing
//! or older than the schema.

use log::{debug, info};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

mod xslt;

pub use xslt::{XsltProcessor, Xsltproc};

const ISO_DSDL_INCLUDE: &str = "iso_dsdl_include.xsl";
const ISO_ABSTRACT_EXPAND: &str = "iso_abstract_expand.xsl";
const ISO_SVRL: &str = "iso_svrl_for_xslt1.xsl";

const FAILED_ASSERT: &str = "failed-assert";

#[derive(Debug, Error)]
pub enum SchematronError {
    #[error("schema {path} not found")]
    SchemaMissing { path: PathBuf },

    #[error("failed to run {binary}: {source}")]
    Spawn {
        binary: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("transform with {stylesheet} failed: {stderr}")]
    Transform { stylesheet: PathBuf, stderr: String },

    #[error("malformed validation output: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Whether the compiled stylesheet must be (re)generated from the schema.
pub fn needs_compile(schema: &Path, compiled: &Path) -> io::Result<bool> {
    let compiled_modified = match fs::metadata(compiled) {
        Ok(metadata) => metadata.modified()?,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(true),
        Err(error) => return Err(error),
    };
    let schema_modified = fs::metadata(schema)?.modified()?;
    Ok(schema_modified > compiled_modified)
}

/// Number of failed assertions in an SVRL document.
pub fn count_failed_asserts(svrl: &str) -> Result<usize, SchematronError> {
    let document = roxmltree::Document::parse(svrl)?;
    Ok(document
        .descendants()
        .filter(|node| node.has_tag_name(FAILED_ASSERT))
        .count())
}

/// A Schematron schema and where its compiled form is kept.
#[derive(Debug, Clone)]
pub struct Schematron {
    schema: PathBuf,
    skeleton_dir: PathBuf,
    compiled: PathBuf,
}

impl Schematron {
    /// `skeleton_dir` holds the ISO Schematron skeleton stylesheets. The
    /// compiled stylesheet is kept next to the schema as `<schema>.xsl`.
    pub fn new<S: Into<PathBuf>, D: Into<PathBuf>>(schema: S, skeleton_dir: D) -> Schematron {
        let schema = schema.into();
        let mut compiled = schema.clone().into_os_string();
        compiled.push(".xsl");
        Schematron {
            schema,
            skeleton_dir: skeleton_dir.into(),
            compiled: PathBuf::from(compiled),
        }
    }

    pub fn with_compiled<P: Into<PathBuf>>(mut self, compiled: P) -> Schematron {
        self.compiled = compiled.into();
        self
    }

    pub fn schema(&self) -> &Path {
        &self.schema
    }

    pub fn compiled(&self) -> &Path {
        &self.compiled
    }

    /// Compile the schema to its validating stylesheet.
    pub fn compile<X: XsltProcessor>(&self, processor: &X) -> Result<(), SchematronError> {
        if !self.schema.exists() {
            return Err(SchematronError::SchemaMissing {
                path: self.schema.clone(),
            });
        }
        info!(
            "compiling {} to {}",
            self.schema.display(),
            self.compiled.display()
        );

        let included = processor.transform_bytes(
            &self.skeleton_dir.join(ISO_DSDL_INCLUDE),
            &fs::read(&self.schema)?,
            &[],
        )?;
        let expanded = processor.transform_bytes(
            &self.skeleton_dir.join(ISO_ABSTRACT_EXPAND),
            &included,
            &[],
        )?;
        // Report every failed assertion rather than stopping at the first.
        let compiled = processor.transform_bytes(
            &self.skeleton_dir.join(ISO_SVRL),
            &expanded,
            &[("terminate", "false")],
        )?;

        fs::write(&self.compiled, compiled)?;
        Ok(())
    }

    /// Validate a jpylyzer report, compiling the schema first if the
    /// compiled stylesheet is stale.
    pub fn check_report<X: XsltProcessor>(
        &self,
        processor: &X,
        report: &Path,
    ) -> Result<bool, SchematronError> {
        if !self.schema.exists() {
            return Err(SchematronError::SchemaMissing {
                path: self.schema.clone(),
            });
        }
        if needs_compile(&self.schema, &self.compiled)? {
            self.compile(processor)?;
        } else {
            debug!("using compiled schema {}", self.compiled.display());
        }

        let svrl = processor.transform(&self.compiled, report, &[])?;
        let failed = count_failed_asserts(&String::from_utf8_lossy(&svrl))?;
        debug!("{} failed assertions for {}", failed, report.display());
        Ok(failed == 0)
    }
}

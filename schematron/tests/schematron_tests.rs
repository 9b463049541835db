use std::cell::RefCell;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use schematron::{
    count_failed_asserts, needs_compile, Schematron, SchematronError, XsltProcessor, Xsltproc,
};

const PASSED: &str = r#"<?xml version="1.0"?>
<svrl:schematron-output xmlns:svrl="http://purl.oclc.org/dsdl/svrl">
  <svrl:active-pattern/>
  <svrl:fired-rule context="/jpylyzer"/>
</svrl:schematron-output>"#;

const FAILED: &str = r#"<?xml version="1.0"?>
<svrl:schematron-output xmlns:svrl="http://purl.oclc.org/dsdl/svrl">
  <svrl:fired-rule context="/jpylyzer"/>
  <svrl:failed-assert test="isValidJP2 = 'True'" location="/jpylyzer">
    <svrl:text>not valid JP2</svrl:text>
  </svrl:failed-assert>
  <svrl:failed-assert test="layers = '12'" location="/jpylyzer/properties">
    <svrl:text>wrong number of layers</svrl:text>
  </svrl:failed-assert>
</svrl:schematron-output>"#;

// Records the stylesheets it applies. Reports containing "bad" fail.
#[derive(Default)]
struct FakeProcessor {
    calls: RefCell<Vec<(String, Vec<(String, String)>)>>,
}

impl FakeProcessor {
    fn stylesheets(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .map(|(stylesheet, _)| stylesheet.clone())
            .collect()
    }
}

impl XsltProcessor for FakeProcessor {
    fn transform(
        &self,
        stylesheet: &Path,
        input: &Path,
        params: &[(&str, &str)],
    ) -> Result<Vec<u8>, SchematronError> {
        let name = stylesheet
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.calls.borrow_mut().push((
            name.clone(),
            params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ));

        let document = fs::read_to_string(input)?;
        if name.starts_with("iso_") {
            Ok(format!("<!-- {} -->\n{}", name, document).into_bytes())
        } else if document.contains("bad") {
            Ok(FAILED.as_bytes().to_vec())
        } else {
            Ok(PASSED.as_bytes().to_vec())
        }
    }
}

fn schema_in(dir: &Path) -> PathBuf {
    let schema = dir.join("profile.sch");
    fs::write(&schema, "<schema/>").unwrap();
    schema
}

fn report_in(dir: &Path, name: &str, content: &str) -> PathBuf {
    let report = dir.join(name);
    fs::write(&report, content).unwrap();
    report
}

#[test]
fn test_count_failed_asserts() {
    assert_eq!(count_failed_asserts(PASSED).unwrap(), 0);
    assert_eq!(count_failed_asserts(FAILED).unwrap(), 2);
    assert!(count_failed_asserts("<svrl:schematron-output").is_err());
}

#[test]
fn test_compile_stages() {
    let dir = tempfile::tempdir().unwrap();
    let schematron = Schematron::new(schema_in(dir.path()), dir.path().join("skeleton"));
    let processor = FakeProcessor::default();

    schematron.compile(&processor).unwrap();

    assert_eq!(
        processor.stylesheets(),
        vec![
            "iso_dsdl_include.xsl",
            "iso_abstract_expand.xsl",
            "iso_svrl_for_xslt1.xsl"
        ]
    );
    let calls = processor.calls.borrow();
    assert!(calls[0].1.is_empty());
    assert_eq!(calls[2].1, vec![("terminate".to_owned(), "false".to_owned())]);

    let compiled = fs::read_to_string(schematron.compiled()).unwrap();
    assert!(compiled.starts_with("<!-- iso_svrl_for_xslt1.xsl -->"));
    assert!(compiled.contains("<schema/>"));
    assert_eq!(schematron.compiled(), dir.path().join("profile.sch.xsl"));
}

#[test]
fn test_check_report_compiles_once() {
    let dir = tempfile::tempdir().unwrap();
    let schematron = Schematron::new(schema_in(dir.path()), dir.path());
    let processor = FakeProcessor::default();

    let good = report_in(dir.path(), "good.xml", "<jpylyzer/>");
    let bad = report_in(dir.path(), "bad.xml", "<jpylyzer>bad</jpylyzer>");

    assert!(schematron.check_report(&processor, &good).unwrap());
    assert!(!schematron.check_report(&processor, &bad).unwrap());

    assert_eq!(
        processor.stylesheets(),
        vec![
            "iso_dsdl_include.xsl",
            "iso_abstract_expand.xsl",
            "iso_svrl_for_xslt1.xsl",
            "profile.sch.xsl",
            "profile.sch.xsl",
        ]
    );
}

#[test]
fn test_stale_compiled_schema() {
    let dir = tempfile::tempdir().unwrap();
    let schema = schema_in(dir.path());
    let compiled = dir.path().join("compiled.xsl");

    assert!(needs_compile(&schema, &compiled).unwrap());

    fs::write(&compiled, "<xsl:stylesheet/>").unwrap();
    let past = SystemTime::now() - Duration::from_secs(3600);
    File::options()
        .write(true)
        .open(&schema)
        .unwrap()
        .set_modified(past)
        .unwrap();
    assert!(!needs_compile(&schema, &compiled).unwrap());

    let future = SystemTime::now() + Duration::from_secs(3600);
    File::options()
        .write(true)
        .open(&schema)
        .unwrap()
        .set_modified(future)
        .unwrap();
    assert!(needs_compile(&schema, &compiled).unwrap());

    let schematron = Schematron::new(&schema, dir.path()).with_compiled(&compiled);
    let processor = FakeProcessor::default();
    let report = report_in(dir.path(), "report.xml", "<jpylyzer/>");
    assert!(schematron.check_report(&processor, &report).unwrap());
    assert_eq!(processor.stylesheets().len(), 4);
}

#[test]
fn test_missing_schema() {
    let dir = tempfile::tempdir().unwrap();
    let schematron = Schematron::new(dir.path().join("absent.sch"), dir.path());
    let report = report_in(dir.path(), "report.xml", "<jpylyzer/>");

    let result = schematron.check_report(&FakeProcessor::default(), &report);
    assert!(matches!(result, Err(SchematronError::SchemaMissing { .. })));
}

#[test]
fn test_missing_xsltproc() {
    let dir = tempfile::tempdir().unwrap();
    let report = report_in(dir.path(), "report.xml", "<jpylyzer/>");
    let processor = Xsltproc::new(dir.path().join("no-such-xsltproc"));

    let result = processor.transform(&dir.path().join("style.xsl"), &report, &[]);
    assert!(matches!(result, Err(SchematronError::Spawn { .. })));
}

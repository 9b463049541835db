use std::fs;
use std::path::{Path, PathBuf};

use jpylyzer::{load_report, Jpylyzer, ToolError};

#[test]
fn test_report_path() {
    assert_eq!(
        Jpylyzer::report_path(Path::new("/data/scan.jp2")),
        PathBuf::from("/data/scan.jp2.jpylyzer.xml")
    );
}

#[test]
fn test_missing_binary() {
    let jpylyzer = Jpylyzer::new("/nonexistent/bin/jpylyzer");
    let result = jpylyzer.run(Path::new("scan.jp2"));
    assert!(matches!(result, Err(ToolError::Spawn { .. })));
}

// The shell stands in for jpylyzer, and the "image" it is handed is a script
// printing what jpylyzer would.
#[cfg(unix)]
fn fake_image(dir: &Path, script: &str) -> PathBuf {
    let path = dir.join("scan.jp2");
    fs::write(&path, script).unwrap();
    path
}

#[cfg(unix)]
#[test]
fn test_run_saves_report() {
    let dir = tempfile::tempdir().unwrap();
    let image = fake_image(
        dir.path(),
        "echo '<jpylyzer><isValidJP2>True</isValidJP2></jpylyzer>'\n",
    );

    let report = Jpylyzer::new("/bin/sh")
        .run(&image)
        .expect("jpylyzer should run");
    assert_eq!(report, dir.path().join("scan.jp2.jpylyzer.xml"));

    let fields = load_report(&report).expect("report should load");
    assert!(jpylyzer::is_valid(&fields));
}

#[cfg(unix)]
#[test]
fn test_run_reports_failure() {
    let dir = tempfile::tempdir().unwrap();
    let image = fake_image(dir.path(), "echo 'no such file' >&2\nexit 2\n");

    match Jpylyzer::new("/bin/sh").run(&image) {
        Err(ToolError::Failed { stderr, .. }) => assert_eq!(stderr, "no such file"),
        other => panic!("unexpected result {:?}", other),
    }
    assert!(!Jpylyzer::report_path(&image).exists());
}

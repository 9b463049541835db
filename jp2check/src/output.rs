use crate::check::{FileOutcome, Verdict};
use schematron::SchematronError;
use std::io;
use std::str;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("invalid format {format:?}, expected text or xml")]
pub struct UnknownFormat {
    format: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Xml,
}

impl str::FromStr for Format {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Format::Text),
            "xml" => Ok(Format::Xml),
            _ => Err(UnknownFormat {
                format: s.to_owned(),
            }),
        }
    }
}

pub fn write_outcomes<W: io::Write>(
    writer: &mut W,
    outcomes: &[FileOutcome],
    format: Format,
) -> io::Result<()> {
    match format {
        Format::Text => write_text(writer, outcomes),
        Format::Xml => write_xml(writer, outcomes),
    }
}

fn schematron_text(schematron: &Option<Result<bool, SchematronError>>) -> String {
    match schematron {
        Some(Ok(true)) => "passed".to_owned(),
        Some(Ok(false)) => "failed".to_owned(),
        Some(Err(e)) => format!("error: {}", e),
        None => "not checked".to_owned(),
    }
}

fn write_text_verdict<W: io::Write>(writer: &mut W, verdict: &Verdict) -> io::Result<()> {
    let comparison = &verdict.comparison;
    write!(writer, "  valid: {}\n", verdict.valid)?;
    write!(writer, "  matches profile: {}\n", comparison.matches())?;
    write!(
        writer,
        "  schematron: {}\n",
        schematron_text(&verdict.schematron)
    )?;
    for mismatch in comparison.mismatches() {
        write!(writer, "  mismatch {}\n", mismatch)?;
    }
    for size in comparison.surplus_precincts() {
        write!(
            writer,
            "  warning: precinctSize({0},{0}) not in profile\n",
            size
        )?;
    }
    for (field, value) in comparison.unconsumed() {
        write!(writer, "  warning: unchecked field {}: {}\n", field, value)?;
    }
    Ok(())
}

pub fn write_text<W: io::Write>(writer: &mut W, outcomes: &[FileOutcome]) -> io::Result<()> {
    for outcome in outcomes {
        write!(writer, "{}\n", outcome.path.display())?;
        match &outcome.verdict {
            Ok(verdict) => write_text_verdict(writer, verdict)?,
            Err(e) => write!(writer, "  error: {}\n", e)?,
        }
    }
    Ok(())
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn write_xml_verdict<W: io::Write>(writer: &mut W, verdict: &Verdict) -> io::Result<()> {
    let comparison = &verdict.comparison;
    write!(writer, "    <valid>{}</valid>\n", verdict.valid)?;
    write!(
        writer,
        "    <matchesProfile>{}</matchesProfile>\n",
        comparison.matches()
    )?;
    match &verdict.schematron {
        Some(Ok(passed)) => write!(writer, "    <schematron>{}</schematron>\n", passed)?,
        Some(Err(e)) => write!(
            writer,
            "    <schematronError>{}</schematronError>\n",
            escape(&e.to_string())
        )?,
        None => {}
    }

    if !comparison.mismatches().is_empty() {
        writer.write_all(b"    <mismatches>\n")?;
        for mismatch in comparison.mismatches() {
            write!(
                writer,
                "      <mismatch field=\"{}\">{}</mismatch>\n",
                escape(mismatch.field()),
                escape(mismatch.value())
            )?;
        }
        writer.write_all(b"    </mismatches>\n")?;
    }

    if !comparison.surplus_precincts().is_empty() {
        writer.write_all(b"    <surplusPrecincts>\n")?;
        for size in comparison.surplus_precincts() {
            write!(writer, "      <precinctSize>{}</precinctSize>\n", size)?;
        }
        writer.write_all(b"    </surplusPrecincts>\n")?;
    }

    if !comparison.unconsumed().is_empty() {
        writer.write_all(b"    <unchecked>\n")?;
        for (field, value) in comparison.unconsumed() {
            write!(
                writer,
                "      <field name=\"{}\">{}</field>\n",
                escape(field),
                escape(value)
            )?;
        }
        writer.write_all(b"    </unchecked>\n")?;
    }

    Ok(())
}

pub fn write_xml<W: io::Write>(writer: &mut W, outcomes: &[FileOutcome]) -> io::Result<()> {
    writer.write_all(b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n")?;
    writer.write_all(b"<jp2check>\n")?;
    for outcome in outcomes {
        write!(
            writer,
            "  <file path=\"{}\">\n",
            escape(&outcome.path.display().to_string())
        )?;
        match &outcome.verdict {
            Ok(verdict) => write_xml_verdict(writer, verdict)?,
            Err(e) => write!(writer, "    <error>{}</error>\n", escape(&e.to_string()))?,
        }
        writer.write_all(b"  </file>\n")?;
    }
    writer.write_all(b"</jp2check>\n")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::{Checker, ReportSource};
    use jp2profile::JP2Profile;
    use jpylyzer::{extract_fields, FieldMap};
    use std::path::{Path, PathBuf};

    fn report_path(filename: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("jpylyzer")
            .join("tests")
            .join("reports")
            .join(filename)
    }

    fn outcomes() -> Vec<FileOutcome> {
        let checker = Checker::new(JP2Profile::default(), ReportSource::Existing);
        checker.check_files(&[
            report_path("kakadu_blprofile.jpylyzer.xml"),
            report_path("no_such_report.jpylyzer.xml"),
        ])
    }

    fn render(outcomes: &[FileOutcome], format: Format) -> String {
        let mut buffer = vec![];
        write_outcomes(&mut buffer, outcomes, format).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_format() {
        assert_eq!("text".parse::<Format>().unwrap(), Format::Text);
        assert_eq!("xml".parse::<Format>().unwrap(), Format::Xml);
        assert!("json".parse::<Format>().is_err());
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("a<b & \"c\""), "a&lt;b &amp; &quot;c&quot;");
    }

    #[test]
    fn test_text() {
        let text = render(&outcomes(), Format::Text);
        let lines: Vec<&str> = text.lines().collect();

        assert!(lines[0].ends_with("kakadu_blprofile.jpylyzer.xml"));
        assert_eq!(lines[1], "  valid: true");
        assert_eq!(lines[2], "  matches profile: true");
        assert_eq!(lines[3], "  schematron: not checked");
        assert!(lines[4].ends_with("no_such_report.jpylyzer.xml"));
        assert!(lines[5].starts_with("  error: "));
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn test_xml() {
        let mut fields: FieldMap = extract_fields(
            &std::fs::read_to_string(report_path("kakadu_blprofile.jpylyzer.xml")).unwrap(),
        )
        .unwrap();
        fields.insert("levels", "5");
        fields.insert("comment", "<none>");
        let profile = JP2Profile::builder()
            .decomposition_levels(2)
            .precinct_sizes(vec![256, 256, 128])
            .build()
            .unwrap();
        let outcome = FileOutcome {
            path: PathBuf::from("a&b.jp2"),
            verdict: Ok(Verdict {
                valid: true,
                comparison: jp2match::compare(&fields, &profile),
                schematron: Some(Ok(false)),
            }),
        };

        let xml = render(&[outcome], Format::Xml);
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<jp2check>\n"));
        assert!(xml.contains("  <file path=\"a&amp;b.jp2\">\n"));
        assert!(xml.contains("    <matchesProfile>false</matchesProfile>\n"));
        assert!(xml.contains("    <schematron>false</schematron>\n"));
        assert!(xml.contains("      <mismatch field=\"levels\">5</mismatch>\n"));
        assert!(xml.contains("      <precinctSize>128</precinctSize>\n"));
        assert!(xml.contains("      <field name=\"comment\">&lt;none&gt;</field>\n"));
        assert!(xml.ends_with("  </file>\n</jp2check>\n"));
    }

    #[test]
    fn test_schematron_error() {
        let fields = jpylyzer::load_report(report_path("kakadu_blprofile.jpylyzer.xml")).unwrap();
        let outcome = FileOutcome {
            path: PathBuf::from("scan.jp2"),
            verdict: Ok(Verdict {
                valid: true,
                comparison: jp2match::compare(&fields, &JP2Profile::default()),
                schematron: Some(Err(SchematronError::Transform {
                    stylesheet: PathBuf::from("profile.sch.xsl"),
                    stderr: "<bad>".to_owned(),
                })),
            }),
        };
        let outcomes = [outcome];

        let text = render(&outcomes, Format::Text);
        assert!(text.contains("  matches profile: true\n"));
        assert!(text.contains("  schematron: error: transform with profile.sch.xsl failed: <bad>\n"));

        let xml = render(&outcomes, Format::Xml);
        assert!(xml.contains("    <matchesProfile>true</matchesProfile>\n"));
        assert!(xml.contains(
            "    <schematronError>transform with profile.sch.xsl failed: &lt;bad&gt;</schematronError>\n"
        ));
    }
}

use clap::Parser;
use std::error::Error;
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use std::str::FromStr;

use jp2cmd::{generate_command, Encoder};
use jp2profile::{load_profile_file, save_profile, JP2Profile};
use jpylyzer::Jpylyzer;
use log::info;
use schematron::{Schematron, Xsltproc};

mod check;
mod output;

use check::{Checker, FileOutcome, ReportSource};
use output::{write_outcomes, Format};

#[derive(Parser)]
struct Opts {
    /// Profile properties file, the built-in archival profile when absent
    #[clap(short, long, global = true)]
    profile: Option<PathBuf>,

    #[clap(subcommand)]
    subcommand: SubCommand,
}

#[derive(Parser)]
enum SubCommand {
    /// Check .jp2 files against the profile
    Check(Check),

    /// Print encoder arguments producing files that match the profile
    Command(EncoderCommand),

    /// Print the profile as a properties XML document (stdout)
    Profile,
}

#[derive(Parser)]
struct Check {
    /// Paths to .jp2 files, or to jpylyzer reports with --reports
    #[clap(required = true)]
    files: Vec<PathBuf>,

    /// Treat the files as existing jpylyzer XML reports
    #[clap(long)]
    reports: bool,

    /// Jpylyzer executable
    #[clap(long, env = "JPYLYZER", default_value = "jpylyzer")]
    jpylyzer: PathBuf,

    /// Schematron schema the jpylyzer reports are also validated against
    #[clap(long)]
    schema: Option<PathBuf>,

    /// Directory of the ISO Schematron skeleton stylesheets, the schema's
    /// directory when absent
    #[clap(long, requires = "schema")]
    skeleton_dir: Option<PathBuf>,

    /// XSLT 1.0 processor executable
    #[clap(long, env = "XSLTPROC", default_value = "xsltproc")]
    xsltproc: PathBuf,

    /// Output format, text or xml
    #[clap(short, long, default_value = "text")]
    format: String,
}

#[derive(Parser)]
struct EncoderCommand {
    /// Encoder to print arguments for: kakadu, openjpeg, jasper or jj2000.
    /// All of them when absent.
    #[clap(short, long)]
    encoder: Option<String>,
}

fn profile(path: Option<&Path>) -> Result<JP2Profile, Box<dyn Error>> {
    match path {
        Some(path) => {
            info!("using profile {}", path.display());
            Ok(load_profile_file(path)?)
        }
        None => Ok(JP2Profile::default()),
    }
}

fn check(profile: JP2Profile, c: Check) -> Result<Vec<FileOutcome>, Box<dyn Error>> {
    let format = Format::from_str(&c.format)?;

    let source = if c.reports {
        ReportSource::Existing
    } else {
        ReportSource::Run(Jpylyzer::new(c.jpylyzer))
    };
    let checker = Checker::new(profile, source);

    let outcomes = match c.schema {
        Some(schema) => {
            let skeleton_dir = match c.skeleton_dir {
                Some(dir) => dir,
                None => schema
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_default(),
            };
            checker
                .with_schematron(Schematron::new(schema, skeleton_dir), Xsltproc::new(c.xsltproc))
                .check_files(&c.files[..])
        }
        None => checker.check_files(&c.files[..]),
    };

    write_outcomes(&mut io::stdout(), &outcomes, format)?;
    Ok(outcomes)
}

fn run() -> Result<bool, Box<dyn Error>> {
    env_logger::init();

    let opts: Opts = Opts::parse();
    let profile = profile(opts.profile.as_deref())?;

    match opts.subcommand {
        SubCommand::Check(c) => {
            let outcomes = check(profile, c)?;
            let failed = outcomes.iter().filter(|outcome| !outcome.passed()).count();
            if failed > 0 {
                info!("{} of {} files failed the check", failed, outcomes.len());
                return Ok(false);
            }
        }
        SubCommand::Command(c) => {
            let encoders = match c.encoder {
                Some(name) => vec![Encoder::from_str(&name)?],
                None => Encoder::ALL.to_vec(),
            };
            for encoder in encoders {
                println!("{}: {}", encoder, generate_command(&profile, encoder).join(" "));
            }
        }
        SubCommand::Profile => {
            save_profile(&mut io::stdout(), &profile)?;
        }
    }

    Ok(true)
}

fn main() -> Result<(), Box<dyn Error>> {
    match run() {
        Err(e) => Err(e.to_string().into()),
        Ok(true) => Ok(()),
        Ok(false) => process::exit(1),
    }
}

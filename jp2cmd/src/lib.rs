//! Encoder command lines.
//!
//! Each supported encoder takes the settings of a [`JP2Profile`] in its own
//! argument syntax, with its own quirks:
//!
//! - Kakadu takes rates as bits per sample of 24 bit input, and "-" for a
//!   lossless layer.
//! - OpenJPEG wants one more decomposition level than jpylyzer reports, and
//!   its rates in descending order.
//! - JasPer takes a single precinct size for every resolution level.
//! - JJ2000 names progression orders instead of abbreviating them.

use jp2profile::{JP2Profile, ProgressionOrder};
use log::debug;
use std::fmt;
use std::str;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("unknown encoder {name:?}, expected kakadu, openjpeg, jasper or jj2000")]
pub struct UnknownEncoder {
    name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoder {
    Kakadu,
    OpenJpeg,
    Jasper,
    Jj2000,
}

impl Encoder {
    pub const ALL: [Encoder; 4] = [
        Encoder::Kakadu,
        Encoder::OpenJpeg,
        Encoder::Jasper,
        Encoder::Jj2000,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Encoder::Kakadu => "kakadu",
            Encoder::OpenJpeg => "openjpeg",
            Encoder::Jasper => "jasper",
            Encoder::Jj2000 => "jj2000",
        }
    }
}

impl fmt::Display for Encoder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl str::FromStr for Encoder {
    type Err = UnknownEncoder;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        Encoder::ALL
            .iter()
            .copied()
            .find(|encoder| encoder.name() == name)
            .ok_or(UnknownEncoder { name: s.to_owned() })
    }
}

/// Command line arguments for `encoder` encoding to `profile`.
///
/// The encoder executable and the input and output files are left to the
/// caller.
pub fn generate_command(profile: &JP2Profile, encoder: Encoder) -> Vec<String> {
    let command = match encoder {
        Encoder::Kakadu => kakadu_command(profile),
        Encoder::OpenJpeg => openjpeg_command(profile),
        Encoder::Jasper => jasper_command(profile),
        Encoder::Jj2000 => jj2000_command(profile),
    };
    debug!("{} command {:?}", encoder, command);
    command
}

fn join<T, F: Fn(&T) -> String>(values: &[T], separator: &str, format: F) -> String {
    values
        .iter()
        .map(format)
        .collect::<Vec<String>>()
        .join(separator)
}

// Rates relative to 24 bits per pixel.
fn bits_per_pixel(rate: f64) -> String {
    format!("{:.3}", 24.0 / rate)
}

fn kakadu_command(profile: &JP2Profile) -> Vec<String> {
    let mut command = vec![];

    if profile.irreversible() {
        command.push("Creversible=no".to_owned());
    } else {
        command.push("Creversible=yes".to_owned());
    }
    command.push(format!("Corder={}", profile.progression_order()));
    command.push(format!("Clevels={}", profile.decomposition_levels()));

    if profile.end_of_packet_header_markers() {
        command.push("Cuse_eph=yes".to_owned());
    }
    if profile.start_of_packet_markers() {
        command.push("Cuse_sop=yes".to_owned());
    }

    command.push("ORGgen_plt=yes".to_owned());

    if profile.has_precincts() {
        command.push(format!(
            "Cprecincts={}",
            join(profile.precinct_sizes(), ",", |p| format!("{{{0},{0}}}", p))
        ));
    }

    let codeblock_size = profile.codeblock_size();
    command.push(format!("Cblk={{{0},{0}}}", codeblock_size));

    if profile.coder_bypass() {
        command.push("Cmodes=BYPASS".to_owned());
    }

    command.push("-rate".to_owned());
    command.push(join(profile.compression_rates(), ",", |rate| {
        if *rate == 1.0 {
            "-".to_owned()
        } else {
            bits_per_pixel(*rate)
        }
    }));

    command
}

fn openjpeg_command(profile: &JP2Profile) -> Vec<String> {
    let mut command = vec![];

    if profile.irreversible() {
        command.push("-I".to_owned());
    }

    command.push("-p".to_owned());
    command.push(profile.progression_order().to_string());

    // Jpylyzer reports n - 1 levels for files OpenJPEG encoded with -n n.
    command.push("-n".to_owned());
    command.push((profile.decomposition_levels() as u32 + 1).to_string());

    if profile.end_of_packet_header_markers() {
        command.push("-EPH".to_owned());
    }
    if profile.start_of_packet_markers() {
        command.push("-SOP".to_owned());
    }

    if profile.has_precincts() {
        command.push("-c".to_owned());
        command.push(join(profile.precinct_sizes(), ",", |p| {
            format!("[{0},{0}]", p)
        }));
    }

    let codeblock_size = profile.codeblock_size();
    command.push("-b".to_owned());
    command.push(format!("{0},{0}", codeblock_size));

    if profile.coder_bypass() {
        command.push("-M".to_owned());
        command.push("1".to_owned());
    }

    let mut rates = profile.compression_rates().to_vec();
    rates.reverse();
    command.push("-r".to_owned());
    command.push(join(&rates, ",", |rate| format!("{:.3}", rate)));

    command
}

fn jasper_option(command: &mut Vec<String>, option: String) {
    command.push("--output-option".to_owned());
    command.push(option);
}

fn jasper_command(profile: &JP2Profile) -> Vec<String> {
    let mut command = vec!["--output-format".to_owned(), "jp2".to_owned()];

    if profile.irreversible() {
        jasper_option(&mut command, "mode=real".to_owned());
    }

    jasper_option(
        &mut command,
        format!(
            "prg={}",
            profile.progression_order().as_str().to_ascii_lowercase()
        ),
    );
    jasper_option(
        &mut command,
        format!("numrlvls={}", profile.decomposition_levels()),
    );

    if profile.end_of_packet_header_markers() {
        jasper_option(&mut command, "eph".to_owned());
    }
    if profile.start_of_packet_markers() {
        jasper_option(&mut command, "sop".to_owned());
    }

    if let Some(precinct) = profile.precinct_sizes().first() {
        jasper_option(&mut command, format!("prcwidth={}", precinct));
        jasper_option(&mut command, format!("prcheight={}", precinct));
    }

    let codeblock_size = profile.codeblock_size();
    jasper_option(&mut command, format!("cblkwidth={}", codeblock_size));
    jasper_option(&mut command, format!("cblkheight={}", codeblock_size));

    if profile.coder_bypass() {
        jasper_option(&mut command, "lazy".to_owned());
    }

    // The overall rate bounds every layer rate, so it comes from the
    // least compressed layer.
    let rates = profile.compression_rates();
    if let Some(rate) = rates.first() {
        jasper_option(&mut command, format!("rate={}", 1.0 / rate));
    }
    if rates.len() > 1 {
        let mut layers = rates[1..].to_vec();
        layers.reverse();
        jasper_option(
            &mut command,
            format!(
                "ilyrrates={}",
                join(&layers, ",", |rate| format!("{:.3}", 1.0 / rate))
            ),
        );
    }

    command
}

fn jj2000_progression_type(order: ProgressionOrder) -> &'static str {
    match order {
        ProgressionOrder::Lrcp => "layer",
        ProgressionOrder::Rlcp => "res",
        ProgressionOrder::Rpcl => "res-pos",
        ProgressionOrder::Pcrl => "pos-comp",
        ProgressionOrder::Cprl => "comp-pos",
    }
}

fn on_off(value: bool) -> String {
    if value {
        "on".to_owned()
    } else {
        "off".to_owned()
    }
}

fn jj2000_command(profile: &JP2Profile) -> Vec<String> {
    let mut command = vec!["-file_format".to_owned(), "on".to_owned()];

    command.push("-lossless".to_owned());
    command.push(on_off(!profile.irreversible()));

    command.push("-Aptype".to_owned());
    command.push(jj2000_progression_type(profile.progression_order()).to_owned());

    command.push("-Wlev".to_owned());
    command.push(profile.decomposition_levels().to_string());

    command.push("-Peph".to_owned());
    command.push(on_off(profile.end_of_packet_header_markers()));
    command.push("-Psop".to_owned());
    command.push(on_off(profile.start_of_packet_markers()));

    if profile.has_precincts() {
        command.push("-Cpp".to_owned());
        command.push(join(profile.precinct_sizes(), " ", |p| {
            format!("{0} {0}", p)
        }));
    }

    let codeblock_size = profile.codeblock_size().to_string();
    command.push("-Cblksiz".to_owned());
    command.push(codeblock_size.clone());
    command.push(codeblock_size);

    command.push("-Cbypass".to_owned());
    command.push(on_off(profile.coder_bypass()));

    let mut rates = profile.compression_rates().to_vec();
    rates.reverse();
    command.push("-Alayers".to_owned());
    command.push(join(&rates, " ", |rate| bits_per_pixel(*rate)));

    command
}

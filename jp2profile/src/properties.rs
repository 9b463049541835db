// Profiles persist as Java-style properties XML:
//
//   <properties>
//     <entry key="order">RPCL</entry>
//     ...
//   </properties>
//
// Booleans are "yes"/"no", rate and precinct lists are comma separated and a
// precinct list of "no" means the profile has no precincts.

use crate::{JP2Profile, ProfileError, ProgressionOrder};
use log::{debug, warn};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

pub(crate) mod keys {
    pub const ORDER: &str = "order";
    pub const SOP: &str = "sop";
    pub const EPH: &str = "eph";
    pub const LEVELS: &str = "levels";
    pub const CODEBLOCK_SIZE: &str = "codeBlockSize";
    pub const CODING_BYPASS: &str = "codingBypass";
    pub const TRANSFORMATION: &str = "transformation";
    pub const TILED: &str = "tiled";
    pub const TILE_DIM: &str = "tileDim";
    pub const COMPRESSION_RATES: &str = "compressionRates";
    pub const PRECINCTS: &str = "precincts";
}

const IRREVERSIBLE: &str = "irreversible";
const REVERSIBLE: &str = "reversible";
const NO_PRECINCTS: &str = "no";

struct Entries<'a> {
    entries: HashMap<&'a str, &'a str>,
}

impl<'a> Entries<'a> {
    fn get(&self, key: &'static str) -> Result<&'a str, ProfileError> {
        match self.entries.get(key) {
            Some(value) => Ok(value.trim()),
            None => Err(ProfileError::MissingKey { key }),
        }
    }

    fn flag(&self, key: &'static str) -> Result<bool, ProfileError> {
        let value = self.get(key)?;
        match value.to_ascii_lowercase().as_str() {
            "yes" => Ok(true),
            "no" => Ok(false),
            _ => Err(invalid(key, value)),
        }
    }

    fn parse<T: std::str::FromStr>(&self, key: &'static str) -> Result<T, ProfileError> {
        let value = self.get(key)?;
        value.parse().map_err(|_| invalid(key, value))
    }

    fn list<T: std::str::FromStr>(&self, key: &'static str) -> Result<Vec<T>, ProfileError> {
        let value = self.get(key)?;
        value
            .split(',')
            .map(|item| item.trim().parse().map_err(|_| invalid(key, value)))
            .collect()
    }
}

fn invalid(key: &'static str, value: &str) -> ProfileError {
    ProfileError::InvalidValue {
        key,
        value: value.to_owned(),
    }
}

/// Load a profile from a properties XML document.
pub fn load_profile<R: io::Read>(reader: &mut R) -> Result<JP2Profile, ProfileError> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;

    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    };
    let document = roxmltree::Document::parse_with_options(&text, options)?;

    let mut entries = HashMap::new();
    for entry in document
        .root_element()
        .children()
        .filter(|node| node.has_tag_name("entry"))
    {
        match entry.attribute("key") {
            Some(key) => {
                if entries.insert(key, entry.text().unwrap_or("")).is_some() {
                    warn!("duplicate profile key {:?}, using last value", key);
                }
            }
            None => warn!("profile entry without key ignored"),
        }
    }
    let entries = Entries { entries };

    let progression_order: ProgressionOrder = entries.get(keys::ORDER)?.parse()?;
    let levels = entries.parse(keys::LEVELS)?;

    let tiles = if entries.flag(keys::TILED)? {
        Some(entries.parse(keys::TILE_DIM)?)
    } else {
        None
    };

    let precincts = if entries
        .get(keys::PRECINCTS)?
        .eq_ignore_ascii_case(NO_PRECINCTS)
    {
        vec![]
    } else {
        entries.list(keys::PRECINCTS)?
    };

    let profile = JP2Profile::builder()
        .progression_order(progression_order)
        .start_of_packet_markers(entries.flag(keys::SOP)?)
        .end_of_packet_header_markers(entries.flag(keys::EPH)?)
        .decomposition_levels(levels)
        .codeblock_size(entries.parse(keys::CODEBLOCK_SIZE)?)
        .coder_bypass(entries.flag(keys::CODING_BYPASS)?)
        .irreversible(
            entries
                .get(keys::TRANSFORMATION)?
                .eq_ignore_ascii_case(IRREVERSIBLE),
        )
        .tiles(tiles)
        .precinct_sizes(precincts)
        .compression_rates(entries.list(keys::COMPRESSION_RATES)?)
        .build()?;

    debug!("loaded profile {:?}", profile);
    Ok(profile)
}

pub fn load_profile_file<P: AsRef<Path>>(path: P) -> Result<JP2Profile, ProfileError> {
    let mut file = fs::File::open(path)?;
    load_profile(&mut file)
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn join<T: ToString>(values: &[T]) -> String {
    values
        .iter()
        .map(|value| value.to_string())
        .collect::<Vec<String>>()
        .join(",")
}

fn encode_entry<W: io::Write>(writer: &mut W, key: &str, value: &str) -> io::Result<()> {
    write!(writer, "  <entry key=\"{}\">{}</entry>\n", key, value)
}

/// Write a profile as a properties XML document readable by [`load_profile`].
pub fn save_profile<W: io::Write>(writer: &mut W, profile: &JP2Profile) -> io::Result<()> {
    writer.write_all(b"<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"no\"?>\n")?;
    writer.write_all(
        b"<!DOCTYPE properties SYSTEM \"http://java.sun.com/dtd/properties.dtd\">\n",
    )?;
    writer.write_all(b"<properties>\n")?;

    encode_entry(writer, keys::ORDER, profile.progression_order().as_str())?;
    encode_entry(writer, keys::SOP, yes_no(profile.start_of_packet_markers()))?;
    encode_entry(writer, keys::EPH, yes_no(profile.end_of_packet_header_markers()))?;
    encode_entry(
        writer,
        keys::LEVELS,
        &profile.decomposition_levels().to_string(),
    )?;
    encode_entry(
        writer,
        keys::CODEBLOCK_SIZE,
        &profile.codeblock_size().to_string(),
    )?;
    encode_entry(writer, keys::CODING_BYPASS, yes_no(profile.coder_bypass()))?;
    encode_entry(
        writer,
        keys::TRANSFORMATION,
        if profile.irreversible() {
            IRREVERSIBLE
        } else {
            REVERSIBLE
        },
    )?;
    encode_entry(writer, keys::TILED, yes_no(profile.tiled()))?;
    if profile.tiled() {
        encode_entry(writer, keys::TILE_DIM, &profile.tile_dimension().to_string())?;
    }
    encode_entry(
        writer,
        keys::COMPRESSION_RATES,
        &join(profile.compression_rates()),
    )?;
    if profile.has_precincts() {
        encode_entry(writer, keys::PRECINCTS, &join(profile.precinct_sizes()))?;
    } else {
        encode_entry(writer, keys::PRECINCTS, NO_PRECINCTS)?;
    }

    writer.write_all(b"</properties>\n")?;
    Ok(())
}

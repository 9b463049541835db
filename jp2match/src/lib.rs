//! Profile matching.
//!
//! [`compare`] checks the encoding settings a jpylyzer report describes
//! against a [`JP2Profile`], field by field. Every expected field which does
//! not match is collected, so one pass yields the complete list. Fields the
//! report holds but no rule looks at are returned as unconsumed.

use jp2profile::JP2Profile;
use jpylyzer::{keys, FieldError, FieldMap};
use log::{debug, info, warn};
use std::fmt;

mod multiset;

use multiset::PrecinctMultiset;

/// Value recorded for a field the report does not contain.
pub const MISSING: &str = "missing";

const IRREVERSIBLE_TRANSFORMATION: &str = "9-7 irreversible";

/// A field whose reported value does not match the profile.
///
/// For precinct sizes the value is the expected size the report lacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    field: String,
    value: String,
}

impl Mismatch {
    pub fn new<F: Into<String>, V: Into<String>>(field: F, value: V) -> Mismatch {
        Mismatch {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_missing(&self) -> bool {
        self.value == MISSING
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.value)
    }
}

/// Outcome of comparing one report against one profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Comparison {
    mismatches: Vec<Mismatch>,
    surplus_precincts: Vec<u32>,
    unconsumed: Vec<(String, String)>,
}

impl Comparison {
    pub fn matches(&self) -> bool {
        self.mismatches.is_empty()
    }

    pub fn mismatches(&self) -> &[Mismatch] {
        &self.mismatches
    }

    pub fn mismatch(&self, field: &str) -> Option<&Mismatch> {
        self.mismatches
            .iter()
            .find(|mismatch| mismatch.field == field)
    }

    /// Precinct sizes the report declares beyond those the profile lists.
    /// These never fail a match.
    pub fn surplus_precincts(&self) -> &[u32] {
        &self.surplus_precincts
    }

    /// Report fields no rule examined, with their values.
    pub fn unconsumed(&self) -> &[(String, String)] {
        &self.unconsumed
    }
}

struct Matcher<'a> {
    fields: FieldMap,
    profile: &'a JP2Profile,
    comparison: Comparison,
}

impl<'a> Matcher<'a> {
    fn record<V: Into<String>>(&mut self, field: &str, value: V) {
        let mismatch = Mismatch::new(field, value);
        debug!("mismatch {}", mismatch);
        self.comparison.mismatches.push(mismatch);
    }

    // Removes `key` from the working fields. A missing or unreadable value is
    // recorded as a mismatch and yields None.
    fn take<T>(&mut self, key: &str, parsed: Result<T, FieldError>) -> Option<(T, String)> {
        let raw = self.fields.remove(key);
        match (parsed, raw) {
            (Ok(value), Some(raw)) => Some((value, raw)),
            (Err(FieldError::Invalid { value, .. }), _) => {
                self.record(key, value);
                None
            }
            _ => {
                self.record(key, MISSING);
                None
            }
        }
    }

    fn take_text(&mut self, key: &str) -> Option<String> {
        let parsed = self.fields.text(key).map(str::to_owned);
        self.take(key, parsed).map(|(value, _)| value)
    }

    fn take_flag(&mut self, key: &str) -> Option<(bool, String)> {
        let parsed = self.fields.flag(key);
        self.take(key, parsed)
    }

    fn take_integer(&mut self, key: &str) -> Option<(u32, String)> {
        let parsed = self.fields.integer(key);
        self.take(key, parsed)
    }

    fn check<T: PartialEq>(&mut self, key: &str, taken: Option<(T, String)>, expected: T) {
        if let Some((value, raw)) = taken {
            if value != expected {
                self.record(key, raw);
            }
        }
    }

    fn check_flag(&mut self, key: &str, expected: bool) {
        let taken = self.take_flag(key);
        self.check(key, taken, expected);
    }

    fn check_integer(&mut self, key: &str, expected: u32) {
        let taken = self.take_integer(key);
        self.check(key, taken, expected);
    }

    fn check_progression_order(&mut self) {
        let expected = self.profile.progression_order().as_str();
        if let Some(order) = self.take_text(keys::ORDER) {
            if !order.trim().eq_ignore_ascii_case(expected) {
                self.record(keys::ORDER, order);
            }
        }
    }

    fn check_precincts(&mut self) {
        let enabled = self.take_flag(keys::PRECINCTS);

        if let Some((true, _)) = enabled {
            self.check_precinct_sizes();
        }

        let expected = self.profile.has_precincts();
        self.check(keys::PRECINCTS, enabled, expected);
    }

    // Each precinct size of the profile must appear in the report. Sizes the
    // report has beyond those are surplus.
    fn check_precinct_sizes(&mut self) {
        let count = match self.take_integer(keys::PRECINCT_SIZE) {
            Some((count, _)) => count as usize,
            None => return,
        };

        // Only the entries present are visited, whatever count the report
        // claims. Entries dropped during extraction are skipped.
        let mut indexes: Vec<usize> = self
            .fields
            .iter()
            .filter_map(|(key, _)| key.strip_prefix(keys::PRECINCT_SIZE)?.parse::<usize>().ok())
            .filter(|i| *i < count)
            .collect();
        indexes.sort_unstable();
        if indexes.len() < count {
            debug!(
                "{} of {} precinct sizes present in report",
                indexes.len(),
                count
            );
        }

        let mut observed = PrecinctMultiset::default();
        for i in indexes {
            let key = keys::precinct_size(i);
            match self.fields.integer(&key) {
                Ok(size) => observed.insert(size),
                Err(FieldError::Missing { .. }) => {}
                Err(FieldError::Invalid { value, .. }) => self.record(&key, value),
            }
            self.fields.remove(&key);
        }

        let profile = self.profile;
        for size in profile.precinct_sizes() {
            if !observed.take(*size) {
                self.record(keys::PRECINCT_SIZE, size.to_string());
            }
        }

        self.comparison.surplus_precincts = observed.into_surplus();
    }

    // Tile sizes are only reported, and only compared, for more than a
    // single tile.
    fn check_tiles(&mut self) {
        let (tiles, raw) = match self.take_integer(keys::NUMBER_OF_TILES) {
            Some(taken) => taken,
            None => return,
        };

        let tiled = tiles > 1;
        if tiled {
            let dimension = self.profile.tile_dimension();
            self.check_integer(keys::TILE_X_DIM, dimension);
            self.check_integer(keys::TILE_Y_DIM, dimension);
        }

        if tiled != self.profile.tiled() {
            self.record(keys::NUMBER_OF_TILES, raw);
        }
    }

    fn check_transformation(&mut self) {
        if let Some(transformation) = self.take_text(keys::TRANSFORMATION) {
            let irreversible = transformation
                .trim()
                .eq_ignore_ascii_case(IRREVERSIBLE_TRANSFORMATION);
            if irreversible != self.profile.irreversible() {
                self.record(keys::TRANSFORMATION, transformation);
            }
        }
    }

    fn finish(mut self) -> Comparison {
        self.comparison.unconsumed = self.fields.into_iter().collect();
        self.comparison
    }
}

/// Compare the fields of a jpylyzer report against `profile`.
///
/// The validity flag is not part of the comparison; see
/// [`jpylyzer::is_valid`].
pub fn compare(fields: &FieldMap, profile: &JP2Profile) -> Comparison {
    let mut matcher = Matcher {
        fields: fields.clone(),
        profile,
        comparison: Comparison::default(),
    };

    matcher.fields.remove(keys::IS_VALID);

    matcher.check_progression_order();

    // Jpylyzer reports one level fewer than OpenJPEG was given with -n, so
    // profiles state the level count jpylyzer reports.
    matcher.check_integer(keys::LEVELS, profile.decomposition_levels() as u32);

    matcher.check_flag(keys::SOP, profile.start_of_packet_markers());
    matcher.check_flag(keys::EPH, profile.end_of_packet_header_markers());

    matcher.check_precincts();

    matcher.check_integer(keys::LAYERS, profile.layers() as u32);

    let codeblock_size = profile.codeblock_size() as u32;
    matcher.check_integer(keys::CODEBLOCK_WIDTH, codeblock_size);
    matcher.check_integer(keys::CODEBLOCK_HEIGHT, codeblock_size);

    matcher.check_tiles();

    matcher.check_flag(keys::CODING_BYPASS, profile.coder_bypass());

    matcher.check_transformation();

    matcher.finish()
}

/// Log the diagnostics of a comparison.
pub fn log_comparison(comparison: &Comparison) {
    for size in comparison.surplus_precincts() {
        warn!(
            "precinctSize({0},{0}) in jpylyzer output but not specified in profile",
            size
        );
    }

    for (field, value) in comparison.unconsumed() {
        warn!("unchecked field {}: {}", field, value);
    }

    if !comparison.matches() {
        info!("settings in jpylyzer output that don't match the profile:");
        for mismatch in comparison.mismatches() {
            info!("  {}", mismatch);
        }
    }
}

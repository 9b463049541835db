//! Jpylyzer report access.
//!
//! Jpylyzer validates a JP2 file and describes its boxes and codestream
//! marker segments as an XML report. This crate flattens the parts of that
//! report which describe encoding settings into a [`FieldMap`], runs the
//! jpylyzer binary, and answers whether jpylyzer considered the file valid.

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::iter::FromIterator;
use thiserror::Error;

mod extract;
mod tool;

pub use extract::{extract_fields, load_report, ReportError};
pub use tool::{Jpylyzer, ToolError, REPORT_EXTENSION};

/// Field names of a [`FieldMap`], as used by jpylyzer's report elements.
pub mod keys {
    pub const IS_VALID: &str = "isValid";
    pub const ORDER: &str = "order";
    pub const PRECINCTS: &str = "precincts";
    pub const SOP: &str = "sop";
    pub const EPH: &str = "eph";
    pub const LAYERS: &str = "layers";
    pub const LEVELS: &str = "levels";
    pub const CODEBLOCK_WIDTH: &str = "codeBlockWidth";
    pub const CODEBLOCK_HEIGHT: &str = "codeBlockHeight";
    pub const CODING_BYPASS: &str = "codingBypass";
    pub const TRANSFORMATION: &str = "transformation";

    /// Number of precinct sizes, each stored under `precinctSize<i>`.
    pub const PRECINCT_SIZE: &str = "precinctSize";
    pub const NUMBER_OF_TILES: &str = "numberOfTiles";
    pub const TILE_X_DIM: &str = "xTsiz";
    pub const TILE_Y_DIM: &str = "yTsiz";

    pub fn precinct_size(index: usize) -> String {
        format!("{}{}", PRECINCT_SIZE, index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("field {key:?} missing")]
    Missing { key: String },

    #[error("field {key:?} has unexpected value {value:?}")]
    Invalid { key: String, value: String },
}

/// Raw field values extracted from one jpylyzer report.
///
/// A field which the report does not contain is absent from the map, which
/// is not the same as a field holding "no" or "0".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap {
    fields: BTreeMap<String, String>,
}

impl FieldMap {
    pub fn new() -> FieldMap {
        FieldMap::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) -> Option<String> {
        self.fields.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.fields.remove(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.fields.iter()
    }

    /// A "yes"/"no" field.
    pub fn flag(&self, key: &str) -> Result<bool, FieldError> {
        let value = self.require(key)?;
        let flag = value.trim();
        if flag.eq_ignore_ascii_case("yes") {
            Ok(true)
        } else if flag.eq_ignore_ascii_case("no") {
            Ok(false)
        } else {
            Err(invalid(key, value))
        }
    }

    pub fn integer(&self, key: &str) -> Result<u32, FieldError> {
        let value = self.require(key)?;
        value.trim().parse().map_err(|_| invalid(key, value))
    }

    pub fn text(&self, key: &str) -> Result<&str, FieldError> {
        self.require(key)
    }

    fn require(&self, key: &str) -> Result<&str, FieldError> {
        match self.get(key) {
            Some(value) => Ok(value),
            None => Err(FieldError::Missing {
                key: key.to_owned(),
            }),
        }
    }
}

fn invalid(key: &str, value: &str) -> FieldError {
    FieldError::Invalid {
        key: key.to_owned(),
        value: value.to_owned(),
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = FieldMap::new();
        for (key, value) in iter {
            fields.insert(key, value);
        }
        fields
    }
}

impl IntoIterator for FieldMap {
    type Item = (String, String);
    type IntoIter = btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

/// Whether jpylyzer reported the file as a valid JP2.
///
/// This says nothing about whether the file follows a profile.
pub fn is_valid(fields: &FieldMap) -> bool {
    match fields.get(keys::IS_VALID) {
        Some(value) => value.trim().eq_ignore_ascii_case("true"),
        None => false,
    }
}

use crate::keys;
use crate::{FieldError, FieldMap};
use log::{debug, error, warn};
use roxmltree::Node;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("malformed jpylyzer report: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("unexpected root element {name:?}, expected \"jpylyzer\"")]
    UnexpectedRoot { name: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

const ROOT: &str = "jpylyzer";
const FILE: &str = "file";
const IS_VALID_JP2: &str = "isValidJP2";
const PROPERTIES: &str = "properties";
const CONTIGUOUS_CODESTREAM_BOX: &str = "contiguousCodestreamBox";
const COD: &str = "cod";
const SIZ: &str = "siz";
const PRECINCT_SIZE_X: &str = "precinctSizeX";
const PRECINCT_SIZE_Y: &str = "precinctSizeY";

// Coding style default (COD) fields copied as they are.
const COD_FIELDS: [&str; 10] = [
    keys::ORDER,
    keys::PRECINCTS,
    keys::SOP,
    keys::EPH,
    keys::LAYERS,
    keys::LEVELS,
    keys::CODEBLOCK_WIDTH,
    keys::CODEBLOCK_HEIGHT,
    keys::CODING_BYPASS,
    keys::TRANSFORMATION,
];

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|child| child.has_tag_name(name))
}

fn children<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Vec<Node<'a, 'input>> {
    node.children()
        .filter(|child| child.has_tag_name(name))
        .collect()
}

fn text<'a>(node: Node<'a, '_>) -> &'a str {
    node.text().unwrap_or("").trim()
}

fn copy_field(fields: &mut FieldMap, parent: Node, key: &str) {
    match child(parent, key) {
        Some(node) => {
            fields.insert(key, text(node));
        }
        None => debug!("report has no {:?} element", key),
    }
}

/// Flatten a jpylyzer XML report into a [`FieldMap`].
///
/// Reports from jpylyzer 1.x (`/jpylyzer/isValidJP2`) and from later versions
/// which wrap each file in a `file` element (`/jpylyzer/file/isValid`) are
/// both read. Elements are matched by local name, so the report namespace
/// does not matter.
pub fn extract_fields(xml: &str) -> Result<FieldMap, ReportError> {
    let document = roxmltree::Document::parse(xml)?;
    let root = document.root_element();
    if root.tag_name().name() != ROOT {
        return Err(ReportError::UnexpectedRoot {
            name: root.tag_name().name().to_owned(),
        });
    }

    let base = child(root, FILE).unwrap_or(root);
    let mut fields = FieldMap::new();

    match child(base, IS_VALID_JP2).or_else(|| child(base, keys::IS_VALID)) {
        Some(node) => {
            fields.insert(keys::IS_VALID, text(node));
        }
        None => debug!("report has no validity element"),
    }

    let codestream = child(base, PROPERTIES).and_then(|node| child(node, CONTIGUOUS_CODESTREAM_BOX));
    if codestream.is_none() {
        warn!("report has no contiguous codestream box properties");
    }

    if let Some(cod) = codestream.and_then(|node| child(node, COD)) {
        for key in COD_FIELDS.iter() {
            copy_field(&mut fields, cod, key);
        }
        if let Ok(true) = fields.flag(keys::PRECINCTS) {
            extract_precincts(&mut fields, cod);
        }
    }

    if let Some(siz) = codestream.and_then(|node| child(node, SIZ)) {
        copy_field(&mut fields, siz, keys::NUMBER_OF_TILES);
        match fields.integer(keys::NUMBER_OF_TILES) {
            Ok(tiles) if tiles > 1 => {
                copy_field(&mut fields, siz, keys::TILE_X_DIM);
                copy_field(&mut fields, siz, keys::TILE_Y_DIM);
            }
            Ok(_) => {}
            Err(FieldError::Invalid { value, .. }) => {
                warn!("unreadable number of tiles {:?}, tile size skipped", value)
            }
            Err(FieldError::Missing { .. }) => {}
        }
    }

    Ok(fields)
}

// Precinct sizes are listed per resolution level as precinctSizeX and
// precinctSizeY pairs. Only square precincts can be stored; any other pair
// is dropped.
fn extract_precincts(fields: &mut FieldMap, cod: Node) {
    let widths = children(cod, PRECINCT_SIZE_X);
    let heights = children(cod, PRECINCT_SIZE_Y);
    fields.insert(keys::PRECINCT_SIZE, widths.len().to_string());

    for (i, width) in widths.iter().enumerate() {
        let width = text(*width);
        let height = match heights.get(i) {
            Some(height) => text(*height),
            None => {
                error!("precinct size {} has a width but no height, dropped", i);
                continue;
            }
        };

        match (width.parse::<u32>(), height.parse::<u32>()) {
            (Ok(x), Ok(y)) if x == y => {
                fields.insert(keys::precinct_size(i), x.to_string());
            }
            (Ok(x), Ok(y)) => {
                error!("precinct size {} is not square ({}, {}), dropped", i, x, y)
            }
            _ => error!(
                "precinct size {} unreadable ({:?}, {:?}), dropped",
                i, width, height
            ),
        }
    }
}

pub fn load_report<P: AsRef<Path>>(path: P) -> Result<FieldMap, ReportError> {
    let path = path.as_ref();
    let xml = fs::read_to_string(path)?;
    debug!("extracting fields from {}", path.display());
    extract_fields(&xml)
}

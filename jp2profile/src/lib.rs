//! JPEG 2000 encoding profile.
//!
//! A profile describes the encoding settings an archival JP2 file is expected
//! to carry: progression order, codestream markers, decomposition levels,
//! code-block size, precincts, quality layers and the wavelet transformation.
//!
//! Profiles are immutable once built. Use [`JP2Profile::default`] for the
//! built-in archival profile, [`ProfileBuilder`] to derive a variation of it,
//! or [`load_profile`] to read one from a properties XML document.

use log::debug;
use std::fmt;
use std::str;
use thiserror::Error;

mod properties;

pub use properties::{load_profile, load_profile_file, save_profile};

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile key {key:?} missing")]
    MissingKey { key: &'static str },

    #[error("invalid value {value:?} for profile key {key:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("invalid progression order {value:?}")]
    InvalidProgressionOrder { value: String },

    #[error("precinct sizes {precincts:?} are not in descending order")]
    PrecinctsNotDescending { precincts: Vec<u32> },

    #[error("{count} precinct sizes given for {levels} decomposition levels, expected {}", .levels + 1)]
    PrecinctCount { count: usize, levels: u8 },

    #[error("precinct size {size} is not a power of two")]
    PrecinctNotPowerOfTwo { size: u32 },

    #[error("code-block size {size} is not a power of two between 4 and 1024")]
    InvalidCodeblockSize { size: u16 },

    #[error("at least one compression rate is required")]
    NoCompressionRates,

    #[error("compression rates {rates:?} are not positive and ascending")]
    CompressionRatesNotAscending { rates: Vec<f64> },

    #[error("tiled profile requires a non-zero tile dimension")]
    MissingTileDimension,

    #[error("malformed profile document: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// Progression order of packets in the codestream (SGcod, A.6.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgressionOrder {
    // Layer-resolution level-component-position progression
    Lrcp,

    // Resolution level-layer-component-position progression
    Rlcp,

    // Resolution level-position-component-layer progression
    Rpcl,

    // Position-component-resolution level-layer progression
    Pcrl,

    // Component-position-resolution level-layer progression
    Cprl,
}

impl ProgressionOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressionOrder::Lrcp => "LRCP",
            ProgressionOrder::Rlcp => "RLCP",
            ProgressionOrder::Rpcl => "RPCL",
            ProgressionOrder::Pcrl => "PCRL",
            ProgressionOrder::Cprl => "CPRL",
        }
    }
}

impl fmt::Display for ProgressionOrder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl str::FromStr for ProgressionOrder {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LRCP" => Ok(ProgressionOrder::Lrcp),
            "RLCP" => Ok(ProgressionOrder::Rlcp),
            "RPCL" => Ok(ProgressionOrder::Rpcl),
            "PCRL" => Ok(ProgressionOrder::Pcrl),
            "CPRL" => Ok(ProgressionOrder::Cprl),
            _ => Err(ProfileError::InvalidProgressionOrder {
                value: s.to_owned(),
            }),
        }
    }
}

/// Encoding profile of a JP2 file.
///
/// Precinct sizes are listed largest first, one per resolution level, so a
/// profile with precincts has `decomposition_levels + 1` of them. An empty
/// list means the codestream uses the default (maximal) precincts.
///
/// Compression rates are ratios against the uncompressed image, one per
/// quality layer, in ascending order (1:1 for the first, lossless layer).
#[derive(Debug, Clone, PartialEq)]
pub struct JP2Profile {
    progression_order: ProgressionOrder,
    start_of_packet_markers: bool,
    end_of_packet_header_markers: bool,
    decomposition_levels: u8,
    codeblock_size: u16,
    coder_bypass: bool,
    irreversible: bool,
    tiled: bool,
    tile_dimension: u32,
    precinct_sizes: Vec<u32>,
    compression_rates: Vec<f64>,
}

impl Default for JP2Profile {
    fn default() -> Self {
        JP2Profile {
            progression_order: ProgressionOrder::Rpcl,
            start_of_packet_markers: false,
            end_of_packet_header_markers: false,
            decomposition_levels: 6,
            codeblock_size: 64,
            coder_bypass: false,
            // The first layer is 1:1, which only the 5-3 reversible filter
            // can reach.
            irreversible: false,
            tiled: false,
            tile_dimension: 0,
            precinct_sizes: vec![256, 256, 128, 128, 128, 128, 128],
            compression_rates: vec![
                1.0, 2.4, 2.75, 3.4, 4.6, 7.0, 11.25, 20.0, 40.0, 80.0, 160.0, 320.0,
            ],
        }
    }
}

impl JP2Profile {
    pub fn builder() -> ProfileBuilder {
        ProfileBuilder::default()
    }

    pub fn progression_order(&self) -> ProgressionOrder {
        self.progression_order
    }

    /// SOP marker segments before every packet.
    pub fn start_of_packet_markers(&self) -> bool {
        self.start_of_packet_markers
    }

    /// EPH markers after every packet header.
    pub fn end_of_packet_header_markers(&self) -> bool {
        self.end_of_packet_header_markers
    }

    pub fn decomposition_levels(&self) -> u8 {
        self.decomposition_levels
    }

    /// Code-block width and height.
    pub fn codeblock_size(&self) -> u16 {
        self.codeblock_size
    }

    pub fn coder_bypass(&self) -> bool {
        self.coder_bypass
    }

    /// 9-7 irreversible (lossy) filter when true, 5-3 reversible otherwise.
    pub fn irreversible(&self) -> bool {
        self.irreversible
    }

    pub fn tiled(&self) -> bool {
        self.tiled
    }

    pub fn tile_dimension(&self) -> u32 {
        self.tile_dimension
    }

    pub fn precinct_sizes(&self) -> &[u32] {
        &self.precinct_sizes
    }

    pub fn has_precincts(&self) -> bool {
        !self.precinct_sizes.is_empty()
    }

    pub fn compression_rates(&self) -> &[f64] {
        &self.compression_rates
    }

    /// Number of quality layers.
    pub fn layers(&self) -> usize {
        self.compression_rates.len()
    }
}

/// Builder for [`JP2Profile`], seeded with the built-in archival profile.
#[derive(Debug, Clone, Default)]
pub struct ProfileBuilder {
    profile: JP2Profile,
}

impl ProfileBuilder {
    pub fn progression_order(mut self, progression_order: ProgressionOrder) -> Self {
        self.profile.progression_order = progression_order;
        self
    }

    pub fn start_of_packet_markers(mut self, enabled: bool) -> Self {
        self.profile.start_of_packet_markers = enabled;
        self
    }

    pub fn end_of_packet_header_markers(mut self, enabled: bool) -> Self {
        self.profile.end_of_packet_header_markers = enabled;
        self
    }

    pub fn decomposition_levels(mut self, levels: u8) -> Self {
        self.profile.decomposition_levels = levels;
        self
    }

    pub fn codeblock_size(mut self, size: u16) -> Self {
        self.profile.codeblock_size = size;
        self
    }

    pub fn coder_bypass(mut self, enabled: bool) -> Self {
        self.profile.coder_bypass = enabled;
        self
    }

    pub fn irreversible(mut self, irreversible: bool) -> Self {
        self.profile.irreversible = irreversible;
        self
    }

    /// Tiles of `dimension` x `dimension`, or a single tile when `None`.
    pub fn tiles(mut self, dimension: Option<u32>) -> Self {
        match dimension {
            Some(dimension) => {
                self.profile.tiled = true;
                self.profile.tile_dimension = dimension;
            }
            None => {
                self.profile.tiled = false;
                self.profile.tile_dimension = 0;
            }
        }
        self
    }

    pub fn precinct_sizes(mut self, precincts: Vec<u32>) -> Self {
        self.profile.precinct_sizes = precincts;
        self
    }

    pub fn compression_rates(mut self, rates: Vec<f64>) -> Self {
        self.profile.compression_rates = rates;
        self
    }

    pub fn build(self) -> Result<JP2Profile, ProfileError> {
        let profile = self.profile;

        let precincts = &profile.precinct_sizes;
        if precincts.windows(2).any(|pair| pair[0] < pair[1]) {
            return Err(ProfileError::PrecinctsNotDescending {
                precincts: precincts.clone(),
            });
        }
        if let Some(size) = precincts.iter().find(|size| !size.is_power_of_two()) {
            return Err(ProfileError::PrecinctNotPowerOfTwo { size: *size });
        }
        if !precincts.is_empty() && precincts.len() != profile.decomposition_levels as usize + 1 {
            return Err(ProfileError::PrecinctCount {
                count: precincts.len(),
                levels: profile.decomposition_levels,
            });
        }

        // A.18: code-block dimensions range from 2^2 to 2^10.
        let codeblock_size = profile.codeblock_size;
        if !codeblock_size.is_power_of_two() || codeblock_size < 4 || codeblock_size > 1024 {
            return Err(ProfileError::InvalidCodeblockSize {
                size: codeblock_size,
            });
        }

        let rates = &profile.compression_rates;
        if rates.is_empty() {
            return Err(ProfileError::NoCompressionRates);
        }
        let positive = rates.iter().all(|rate| *rate > 0.0);
        let ascending = rates.windows(2).all(|pair| pair[0] <= pair[1]);
        if !positive || !ascending {
            return Err(ProfileError::CompressionRatesNotAscending {
                rates: rates.clone(),
            });
        }

        if profile.tiled && profile.tile_dimension == 0 {
            return Err(ProfileError::MissingTileDimension);
        }

        debug!("built profile {:?}", profile);
        Ok(profile)
    }
}

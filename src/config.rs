use std::collections::BTreeMap;

use crate::error::{IsocapError, IsocapResult};

/// Largest supported footprint edge, in tiles.
pub const MAX_FOOTPRINT_TILES: u32 = 32;

/// Object footprint in tile units. Drives the camera's orthographic scale,
/// the render resolution and the bounding proxy dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FootprintDimensions {
    pub x: u32,
    pub y: u32,
}

impl FootprintDimensions {
    pub fn new(x: u32, y: u32) -> IsocapResult<Self> {
        let footprint = Self { x, y };
        footprint.validate()?;
        Ok(footprint)
    }

    pub fn validate(&self) -> IsocapResult<()> {
        if self.x < 1 || self.y < 1 {
            return Err(IsocapError::scene("footprint dimensions must be >= 1"));
        }
        if self.x > MAX_FOOTPRINT_TILES || self.y > MAX_FOOTPRINT_TILES {
            return Err(IsocapError::scene(format!(
                "footprint dimensions must be <= {MAX_FOOTPRINT_TILES} tiles"
            )));
        }
        Ok(())
    }

    /// Tiles beyond the 1x1 base, summed over both axes.
    pub fn extra_tiles(&self) -> u32 {
        (self.x - 1) + (self.y - 1)
    }
}

impl Default for FootprintDimensions {
    fn default() -> Self {
        Self { x: 1, y: 1 }
    }
}

/// Compass direction of one capture, with its rig rotation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    NorthWest,
    NorthEast,
    SouthEast,
    SouthWest,
}

impl Direction {
    /// Fixed capture order.
    pub const ALL: [Direction; 4] = [
        Direction::NorthWest,
        Direction::NorthEast,
        Direction::SouthEast,
        Direction::SouthWest,
    ];

    /// Short label used in output file names.
    pub fn label(&self) -> &'static str {
        match self {
            Direction::NorthWest => "nw",
            Direction::NorthEast => "ne",
            Direction::SouthEast => "se",
            Direction::SouthWest => "sw",
        }
    }

    /// Rig rotation about the z axis, in degrees.
    pub fn angle_degrees(&self) -> f64 {
        match self {
            Direction::NorthWest => 0.0,
            Direction::NorthEast => -90.0,
            Direction::SouthEast => -180.0,
            Direction::SouthWest => -270.0,
        }
    }
}

/// Which of the four directions an export captures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DirectionSet {
    pub nw: bool,
    pub ne: bool,
    pub se: bool,
    pub sw: bool,
}

impl DirectionSet {
    pub fn all() -> Self {
        Self {
            nw: true,
            ne: true,
            se: true,
            sw: true,
        }
    }

    pub fn contains(&self, direction: Direction) -> bool {
        match direction {
            Direction::NorthWest => self.nw,
            Direction::NorthEast => self.ne,
            Direction::SouthEast => self.se,
            Direction::SouthWest => self.sw,
        }
    }

    /// Enabled directions in the fixed capture order.
    pub fn enabled(&self) -> Vec<Direction> {
        Direction::ALL
            .into_iter()
            .filter(|d| self.contains(*d))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        !(self.nw || self.ne || self.se || self.sw)
    }
}

impl Default for DirectionSet {
    fn default() -> Self {
        Self::all()
    }
}

/// Depth capture resolution tier, as a percentage of the base resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionTier {
    Small,
    Medium,
    Large,
}

impl ResolutionTier {
    /// Tier order of the depth pass loop.
    pub const ALL: [ResolutionTier; 3] = [
        ResolutionTier::Small,
        ResolutionTier::Medium,
        ResolutionTier::Large,
    ];

    pub fn percentage(&self) -> u32 {
        match self {
            ResolutionTier::Small => 25,
            ResolutionTier::Medium => 50,
            ResolutionTier::Large => 100,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ResolutionTier::Small => "small",
            ResolutionTier::Medium => "medium",
            ResolutionTier::Large => "large",
        }
    }
}

/// Sprite and palette identifiers of one frame, as consumed by the asset
/// compiler.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FrameIds {
    pub sprite_id: i32,
    pub sprite_id_reverse_x: bool,
    pub sprite_id_reverse_y: bool,
    pub palette_id: i32,
}

/// Everything the export pipeline reads from the scene configuration.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub footprint: FootprintDimensions,
    pub directions: DirectionSet,

    /// Widest frame range ever rendered. Grows monotonically; shrinking it
    /// again is a manual edit.
    pub observed_frame_start: i32,
    pub observed_frame_end: i32,

    pub default_ids: FrameIds,
    /// Per-frame id overrides, keyed by frame number.
    pub frame_ids: BTreeMap<i32, FrameIds>,

    /// When set, depth comes from the raw z pass in a single tier sweep;
    /// otherwise depth is encoded by the override material and a second
    /// `_extra` sweep is rendered.
    pub high_precision_depth: bool,

    pub render_all_variants: bool,
    pub compile_all_variants: bool,

    pub auto_split: bool,
    pub auto_update_xml: bool,
    pub auto_compile: bool,
    pub advanced_compile: bool,

    pub creator_name: String,
    pub format_string: String,
}

impl CaptureConfig {
    pub fn validate(&self) -> IsocapResult<()> {
        self.footprint.validate()?;
        if self.observed_frame_start > self.observed_frame_end {
            return Err(IsocapError::scene(
                "observed frame range start must not exceed its end",
            ));
        }
        Ok(())
    }

    /// Widens the observed range to include `[start, end]`.
    pub fn widen_observed_range(&mut self, start: i32, end: i32) {
        self.observed_frame_start = self.observed_frame_start.min(start);
        self.observed_frame_end = self.observed_frame_end.max(end);
    }

    pub fn ids_for_frame(&self, frame: i32) -> FrameIds {
        self.frame_ids.get(&frame).copied().unwrap_or(self.default_ids)
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            footprint: FootprintDimensions::default(),
            directions: DirectionSet::all(),
            observed_frame_start: 1,
            observed_frame_end: 1,
            default_ids: FrameIds::default(),
            frame_ids: BTreeMap::new(),
            high_precision_depth: false,
            render_all_variants: false,
            compile_all_variants: false,
            auto_split: false,
            auto_update_xml: false,
            auto_compile: false,
            advanced_compile: false,
            creator_name: String::new(),
            format_string: "{name}{object}{variant}".to_string(),
        }
    }
}

use std::fmt;
use std::ops::RangeInclusive;

use anyhow::{anyhow, bail, Result};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::json;

use crate::error_codes::CodedError;

pub const GRID_ROWS: u32 = 3;
pub const GRID_COLS: u32 = 6;

/// One of the 18 fixed screen sampler region names, `wl<row><col>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegionName {
    row: u8,
    col: u8,
}

macro_rules! region {
    ($row:literal, $col:literal) => {
        RegionName { row: $row, col: $col }
    };
}

pub const ALL_REGION_NAMES: [RegionName; 18] = [
    region!(1, 1),
    region!(1, 2),
    region!(1, 3),
    region!(1, 4),
    region!(1, 5),
    region!(1, 6),
    region!(2, 1),
    region!(2, 2),
    region!(2, 3),
    region!(2, 4),
    region!(2, 5),
    region!(2, 6),
    region!(3, 1),
    region!(3, 2),
    region!(3, 3),
    region!(3, 4),
    region!(3, 5),
    region!(3, 6),
];

/// The five regions a freshly created screen sampler profile is renamed to.
pub const PARTIAL_REGION_NAMES: [RegionName; 5] = [
    region!(1, 1),
    region!(1, 2),
    region!(1, 3),
    region!(1, 4),
    region!(1, 5),
];

pub const MISSING_REGION_NAMES: [RegionName; 13] = [
    region!(1, 6),
    region!(2, 1),
    region!(2, 2),
    region!(2, 3),
    region!(2, 4),
    region!(2, 5),
    region!(2, 6),
    region!(3, 1),
    region!(3, 2),
    region!(3, 3),
    region!(3, 4),
    region!(3, 5),
    region!(3, 6),
];

impl RegionName {
    /// 1-based row and column.
    pub fn new(row: u8, col: u8) -> Option<Self> {
        let in_grid = (1..=GRID_ROWS as u8).contains(&row) && (1..=GRID_COLS as u8).contains(&col);
        in_grid.then_some(Self { row, col })
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let digits = raw.strip_prefix("wl")?.as_bytes();
        let [row, col] = digits else {
            return None;
        };
        if !row.is_ascii_digit() || !col.is_ascii_digit() {
            return None;
        }
        Self::new(row - b'0', col - b'0')
    }

    pub fn as_str(self) -> &'static str {
        const NAMES: [[&str; 6]; 3] = [
            ["wl11", "wl12", "wl13", "wl14", "wl15", "wl16"],
            ["wl21", "wl22", "wl23", "wl24", "wl25", "wl26"],
            ["wl31", "wl32", "wl33", "wl34", "wl35", "wl36"],
        ];
        NAMES[usize::from(self.row - 1)][usize::from(self.col - 1)]
    }
}

impl fmt::Display for RegionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for RegionName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeometryParams {
    /// Pixel height of one scan cell.
    pub grid_size: u32,
    /// Horizontal stretch factor.
    pub aspect_scale: f64,
    /// Horizontal pixel offset applied to every region.
    pub shift: i32,
    /// Inward buffer trimmed from each cell's edges.
    pub margin: u32,
}

impl Default for GeometryParams {
    fn default() -> Self {
        GeometryPreset::Default.params()
    }
}

impl GeometryParams {
    pub fn validate(&self) -> Result<()> {
        if self.grid_size == 0 {
            return Err(anyhow!(CodedError::usage(
                "INVALID_GEOMETRY",
                "grid_size must be > 0",
            )
            .with_details(json!({ "field": "grid_size", "provided": self.grid_size }))));
        }
        if !self.aspect_scale.is_finite() || self.aspect_scale <= 0.0 {
            return Err(anyhow!(CodedError::usage(
                "INVALID_GEOMETRY",
                format!("aspect_scale must be a positive number, got {}", self.aspect_scale),
            )
            .with_details(json!({ "field": "aspect_scale", "provided": self.aspect_scale }))));
        }
        if self.margin >= self.grid_size {
            return Err(anyhow!(CodedError::usage(
                "INVALID_GEOMETRY",
                format!(
                    "margin {} must be smaller than grid_size {}",
                    self.margin, self.grid_size
                ),
            )
            .with_details(json!({ "field": "margin", "provided": self.margin }))));
        }
        Ok(())
    }
}

/// Named starting points for [`GeometryParams`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryPreset {
    Default,
    Mac,
    Windows,
}

impl GeometryPreset {
    pub fn from_keyword(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "mac" | "macos" => Ok(Self::Mac),
            "windows" | "win" => Ok(Self::Windows),
            _ => Err(anyhow!(CodedError::usage(
                "INVALID_PRESET",
                format!("invalid geometry preset '{value}'"),
            )
            .with_details(json!({
                "provided": value,
                "allowed": ["default", "mac", "windows"]
            })))),
        }
    }

    // G Hub on Windows samples a slightly wider, shifted and inset window.
    pub fn params(self) -> GeometryParams {
        match self {
            Self::Default | Self::Mac => GeometryParams {
                grid_size: 5,
                aspect_scale: 1.0,
                shift: 0,
                margin: 0,
            },
            Self::Windows => GeometryParams {
                grid_size: 5,
                aspect_scale: 1.2,
                shift: 2,
                margin: 1,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for ScreenSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Inclusive validation ranges for [`ScreenSize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenBounds {
    pub width: RangeInclusive<u32>,
    pub height: RangeInclusive<u32>,
}

impl Default for ScreenBounds {
    fn default() -> Self {
        Self {
            width: 1024..=9000,
            height: 768..=5000,
        }
    }
}

impl ScreenBounds {
    pub fn validate(&self, screen: ScreenSize) -> Result<()> {
        if self.width.is_empty() || self.height.is_empty() {
            bail!("screen bounds are empty: {:?} by {:?}", self.width, self.height);
        }
        if !self.width.contains(&screen.width) {
            return Err(anyhow!(CodedError::usage(
                "INVALID_SCREEN_SIZE",
                format!("{} is not a valid screen width", screen.width),
            )
            .with_details(json!({
                "field": "width",
                "provided": screen.width,
                "min": self.width.start(),
                "max": self.width.end()
            }))));
        }
        if !self.height.contains(&screen.height) {
            return Err(anyhow!(CodedError::usage(
                "INVALID_SCREEN_SIZE",
                format!("{} is not a valid screen height", screen.height),
            )
            .with_details(json!({
                "field": "height",
                "provided": screen.height,
                "min": self.height.start(),
                "max": self.height.end()
            }))));
        }
        Ok(())
    }
}

/// Inset rectangle: `top`/`bottom` are fractions of screen height measured
/// from the top and bottom edges, `left`/`right` fractions of screen width
/// measured from the left and right edges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RegionRect {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

/// Generated rectangles for all 18 regions, in grid order.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionCoords {
    rects: [(RegionName, RegionRect); 18],
}

impl RegionCoords {
    pub fn get(&self, name: RegionName) -> Option<&RegionRect> {
        self.rects
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, rect)| rect)
    }

    pub fn get_by_str(&self, raw: &str) -> Option<&RegionRect> {
        RegionName::parse(raw).and_then(|name| self.get(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = (RegionName, &RegionRect)> {
        self.rects.iter().map(|(name, rect)| (*name, rect))
    }
}

impl Serialize for RegionCoords {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.rects.len()))?;
        for (name, rect) in &self.rects {
            map.serialize_entry(name, rect)?;
        }
        map.end()
    }
}

/// Computes the 6x3 grid of sampler rectangles anchored to the bottom-left
/// corner of the screen. Values are not clamped to `[0, 1]`.
pub fn generate(screen: ScreenSize, params: &GeometryParams) -> RegionCoords {
    let width = f64::from(screen.width);
    let height = f64::from(screen.height);
    let grid = i64::from(params.grid_size);
    let margin = i64::from(params.margin);
    let shift = f64::from(params.shift);

    let rects = ALL_REGION_NAMES.map(|name| {
        let row = i64::from(name.row - 1);
        let col = i64::from(name.col - 1);

        let sq_bottom = i64::from(screen.height) - grid * (2 - row);
        let sq_top = sq_bottom - grid + margin;
        let sq_left = params.aspect_scale * grid as f64 * col as f64 + shift;
        let sq_right = params.aspect_scale * (grid * (col + 1) - margin) as f64 + shift;

        let rect = RegionRect {
            top: sq_top as f64 / height,
            bottom: (height - sq_bottom as f64) / height,
            left: sq_left / width,
            right: (width - sq_right) / width,
        };
        (name, rect)
    });

    tracing::debug!(%screen, ?params, "generated sampler grid");
    RegionCoords { rects }
}

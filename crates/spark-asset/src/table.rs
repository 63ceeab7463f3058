//! Static table of the images the engine is constructed with

use serde::{Deserialize, Serialize};
use spark_core::ImageHandle;

const DEFAULT_TILES: &[&str] = &[
    "assets/tiles/g1.bmp",
    "assets/tiles/g2.bmp",
    "assets/tiles/g3.bmp",
    "assets/tiles/g5.bmp",
    "assets/tiles/g6.bmp",
    "assets/tiles/g7.bmp",
    "assets/tiles/g8.bmp",
    "assets/tiles/g9.bmp",
    "assets/tiles/g_stripes.bmp",
    "assets/tiles/bunker1.bmp",
    "assets/tiles/ice1.bmp",
    "assets/tiles/ice.bmp",
    "assets/tiles/ice_side.bmp",
    "assets/tiles/ice_corner.bmp",
    "assets/tiles/water.bmp",
    "assets/tiles/road.bmp",
    "assets/tiles/road_corner.bmp",
    "assets/tiles/road_cross.bmp",
    "assets/tiles/road_t.bmp",
    "assets/tiles/spawn.bmp",
];

/// Paths of the effect images handed to the renderer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectPaths {
    pub explosion: String,
    pub guided_missile: String,
}

impl Default for EffectPaths {
    fn default() -> Self {
        Self {
            explosion: "assets/explosion.png".to_string(),
            guided_missile: "assets/weapons/guided_missile.png".to_string(),
        }
    }
}

/// Every image path to load, relative to the asset base.
///
/// Tile order matters: map cells index into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetTable {
    pub tiles: Vec<String>,
    pub effects: EffectPaths,
}

impl Default for AssetTable {
    fn default() -> Self {
        Self {
            tiles: DEFAULT_TILES.iter().map(|p| p.to_string()).collect(),
            effects: EffectPaths::default(),
        }
    }
}

impl AssetTable {
    /// Number of images the table describes
    pub fn image_count(&self) -> usize {
        self.tiles.len() + 2
    }

    /// Create an empty handle for every entry, tiles first.
    pub fn handles(&self) -> ImageSet {
        ImageSet {
            tiles: self.tiles.iter().map(ImageHandle::new).collect(),
            explosion: ImageHandle::new(self.effects.explosion.as_str()),
            guided_missile: ImageHandle::new(self.effects.guided_missile.as_str()),
        }
    }
}

/// Handles for every image in an [`AssetTable`]. Bytes may still be in flight.
#[derive(Debug, Clone)]
pub struct ImageSet {
    pub tiles: Vec<ImageHandle>,
    pub explosion: ImageHandle,
    pub guided_missile: ImageHandle,
}

impl ImageSet {
    /// All handles, tiles first, then explosion and guided missile
    pub fn iter(&self) -> impl Iterator<Item = &ImageHandle> {
        self.tiles
            .iter()
            .chain([&self.explosion, &self.guided_missile])
    }

    /// Effect sprites: explosion, then guided missile
    pub fn effects(&self) -> [ImageHandle; 2] {
        [self.explosion.clone(), self.guided_missile.clone()]
    }

    /// How many images have arrived so far
    pub fn loaded(&self) -> usize {
        self.iter().filter(|h| h.is_loaded()).count()
    }
}

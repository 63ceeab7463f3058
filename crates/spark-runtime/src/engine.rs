//! Contract of the external simulation engine
//!
//! The engine (entities, physics, drawing) lives outside this workspace. The
//! frame loop only needs to construct it once and then call it four times
//! per frame, in a fixed order.

use crate::input::DirectionalInput;
use serde::{Deserialize, Serialize};
use spark_core::{ImageHandle, Result, SparkError};
use std::cell::{Ref, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

/// Engine settings passed to every engine call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Snap drawing offsets to whole pixels
    pub align_to_pixels: bool,
    /// Draw debug overlays
    pub show_debug: bool,
    /// Multiplier applied to simulation time
    pub time_scale: f64,
    /// Engine-specific settings not known to the frame loop
    pub extra: BTreeMap<String, toml::Value>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            align_to_pixels: true,
            show_debug: false,
            time_scale: 1.0,
            extra: BTreeMap::new(),
        }
    }
}

/// The one shared copy of the engine settings.
///
/// The bootstrap owns it. The frame loop takes a read borrow for the length
/// of one frame; anything else (debug tooling, the terminal) writes through
/// [`SharedConfig::update`] between frames. A write that lands while a frame
/// holds the config fails with [`SparkError::ConfigBusy`].
#[derive(Debug, Clone, Default)]
pub struct SharedConfig {
    inner: Rc<RefCell<EngineConfig>>,
}

impl SharedConfig {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            inner: Rc::new(RefCell::new(config)),
        }
    }

    /// Borrow the settings for reading
    pub fn read(&self) -> Result<Ref<'_, EngineConfig>> {
        self.inner.try_borrow().map_err(|_| SparkError::ConfigBusy)
    }

    /// Apply a change to the settings
    pub fn update(&self, change: impl FnOnce(&mut EngineConfig)) -> Result<()> {
        let mut config = self.inner.try_borrow_mut().map_err(|_| SparkError::ConfigBusy)?;
        change(&mut config);
        Ok(())
    }

    /// Owned copy of the current settings
    pub fn snapshot(&self) -> Result<EngineConfig> {
        Ok(self.read()?.clone())
    }
}

/// Everything the engine is constructed from
pub struct EngineInit<'a> {
    pub config: &'a EngineConfig,
    pub width: u32,
    pub height: u32,
    /// Tile images, in asset-table order. Some may still be loading.
    pub images: &'a [ImageHandle],
    /// Effect sprites (explosion, guided missile). Some may still be loading.
    pub effects: &'a [ImageHandle],
    /// Texture list, passed through unparsed
    pub manifest: &'a str,
    /// Level text, passed through unparsed
    pub map: &'a str,
}

/// Builds the engine once the sequential resources are in.
///
/// The factory owns the drawing surface the engine renders into.
pub trait EngineFactory {
    type Engine: Engine + 'static;

    fn construct(&mut self, init: EngineInit<'_>) -> Result<Self::Engine>;
}

/// Per-frame engine calls, invoked in declaration order.
///
/// Any call may fail; a failure skips the remaining calls for that frame and
/// halts the frame loop for good.
pub trait Engine {
    /// Forward the current directional signals
    fn feed_input(&mut self, config: &EngineConfig, input: DirectionalInput) -> Result<()>;

    /// Advance the simulation to `timestamp` (ms since start)
    fn advance(&mut self, config: &EngineConfig, timestamp: f64) -> Result<()>;

    /// Draw the frame
    fn render(
        &mut self,
        config: &EngineConfig,
        overlay: &ImageHandle,
        align_to_pixels: bool,
    ) -> Result<()>;

    /// End-of-frame bookkeeping
    fn finalize_frame(&mut self) -> Result<()>;
}

//! Layered player configuration
//!
//! Config is loaded with these layers of precedence (highest wins):
//! 1. Command line flags (applied by the binary)
//! 2. Environment variables: `SPARK_ASSET_BASE`, `SPARK_LOG`
//! 3. Explicit file passed with `--config`
//! 4. Project-local: `.spark/config.toml`
//! 5. Global: `~/.spark/config.toml`

use serde::{Deserialize, Serialize};
use spark_asset::{AssetTable, EffectPaths, LoadPlan};
use spark_core::{Result, SparkError};
use spark_runtime::{EngineConfig, HostOptions, InputConfig, Key};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const ENV_ASSET_BASE: &str = "SPARK_ASSET_BASE";
pub const ENV_LOG: &str = "SPARK_LOG";

/// Accepted display refresh rates, in Hz
const REFRESH_RANGE: std::ops::RangeInclusive<f64> = 1.0..=1000.0;

/// `[assets]` as written in a config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsFile {
    /// URL (`http://`, `https://`) or directory the paths are relative to
    pub base: Option<String>,
    pub manifest: Option<String>,
    pub map: Option<String>,
    pub tiles: Option<Vec<String>>,
    pub effects: EffectsFile,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectsFile {
    pub explosion: Option<String>,
    pub guided_missile: Option<String>,
}

/// `[display]`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayFile {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub refresh_hz: Option<f64>,
}

/// `[input]`: key names per direction
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InputFile {
    pub left: Option<Vec<Key>>,
    pub right: Option<Vec<Key>>,
    pub up: Option<Vec<Key>>,
    pub down: Option<Vec<Key>>,
}

/// `[engine]`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineFile {
    pub align_to_pixels: Option<bool>,
    pub show_debug: Option<bool>,
    pub time_scale: Option<f64>,
    pub extra: BTreeMap<String, toml::Value>,
}

/// `[logging]`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingFile {
    /// `env_logger` filter, e.g. "info" or "spark_asset=debug"
    pub filter: Option<String>,
}

/// Top-level config file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfigFile {
    pub assets: AssetsFile,
    pub display: DisplayFile,
    pub input: InputFile,
    pub engine: EngineFile,
    pub logging: LoggingFile,
}

/// Drawing surface size and refresh rate
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
    pub refresh_hz: f64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            refresh_hz: 60.0,
        }
    }
}

/// Resolved configuration with all layers applied
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    /// Where resources are fetched from
    pub asset_base: String,
    pub plan: LoadPlan,
    pub display: DisplayConfig,
    pub input: InputConfig,
    pub engine: EngineConfig,
    pub log_filter: Option<String>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self::resolve(PlayerConfigFile::default())
    }
}

impl PlayerConfig {
    /// Load config with layered precedence: global < project < `explicit` < env vars
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = PlayerConfigFile::default();

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                log::debug!("reading global config {}", global_path.display());
                merge_into(&mut config, Self::load_file(&global_path)?);
            }
        }

        let local_path = PathBuf::from(".spark/config.toml");
        if local_path.exists() {
            log::debug!("reading project config {}", local_path.display());
            merge_into(&mut config, Self::load_file(&local_path)?);
        }

        if let Some(path) = explicit {
            merge_into(&mut config, Self::load_file(path)?);
        }

        apply_env_overrides(&mut config, |name| std::env::var(name).ok());
        Self::resolve_checked(config)
    }

    /// Load config from a specific file path only, plus env overrides
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let mut config = Self::load_file(path)?;
        apply_env_overrides(&mut config, |name| std::env::var(name).ok());
        Self::resolve_checked(config)
    }

    /// Options for the host loop. `frame_limit` comes from the command line.
    pub fn host_options(&self, frame_limit: Option<u64>) -> HostOptions {
        HostOptions {
            refresh_hz: self.display.refresh_hz,
            frame_limit,
        }
    }

    /// Whether the asset base is an HTTP(S) URL rather than a directory
    pub fn is_remote(&self) -> bool {
        self.asset_base.starts_with("http://") || self.asset_base.starts_with("https://")
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".spark").join("config.toml"))
    }

    fn load_file(path: &Path) -> Result<PlayerConfigFile> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            SparkError::TomlParseError(format!("failed to parse config {}: {}", path.display(), e))
        })
    }

    fn resolve_checked(file: PlayerConfigFile) -> Result<Self> {
        let config = Self::resolve(file);
        if config.display.width == 0 || config.display.height == 0 {
            return Err(SparkError::Config(format!(
                "display size must be non-zero, got {}x{}",
                config.display.width, config.display.height
            )));
        }
        if !REFRESH_RANGE.contains(&config.display.refresh_hz) {
            return Err(SparkError::Config(format!(
                "refresh_hz must be between {} and {}, got {}",
                REFRESH_RANGE.start(),
                REFRESH_RANGE.end(),
                config.display.refresh_hz
            )));
        }
        Ok(config)
    }

    fn resolve(file: PlayerConfigFile) -> Self {
        let plan_defaults = LoadPlan::default();
        let effect_defaults = EffectPaths::default();
        let display_defaults = DisplayConfig::default();
        let input_defaults = InputConfig::default();
        let engine_defaults = EngineConfig::default();

        let assets = file.assets;
        let plan = LoadPlan {
            manifest: assets.manifest.unwrap_or(plan_defaults.manifest),
            map: assets.map.unwrap_or(plan_defaults.map),
            assets: AssetTable {
                tiles: assets.tiles.unwrap_or(plan_defaults.assets.tiles),
                effects: EffectPaths {
                    explosion: assets.effects.explosion.unwrap_or(effect_defaults.explosion),
                    guided_missile: assets
                        .effects
                        .guided_missile
                        .unwrap_or(effect_defaults.guided_missile),
                },
            },
        };

        Self {
            asset_base: assets.base.unwrap_or_else(|| ".".to_string()),
            plan,
            display: DisplayConfig {
                width: file.display.width.unwrap_or(display_defaults.width),
                height: file.display.height.unwrap_or(display_defaults.height),
                refresh_hz: file.display.refresh_hz.unwrap_or(display_defaults.refresh_hz),
            },
            input: InputConfig {
                left: file.input.left.unwrap_or(input_defaults.left),
                right: file.input.right.unwrap_or(input_defaults.right),
                up: file.input.up.unwrap_or(input_defaults.up),
                down: file.input.down.unwrap_or(input_defaults.down),
            },
            engine: EngineConfig {
                align_to_pixels: file
                    .engine
                    .align_to_pixels
                    .unwrap_or(engine_defaults.align_to_pixels),
                show_debug: file.engine.show_debug.unwrap_or(engine_defaults.show_debug),
                time_scale: file.engine.time_scale.unwrap_or(engine_defaults.time_scale),
                extra: file.engine.extra,
            },
            log_filter: file.logging.filter,
        }
    }
}

fn overlay<T>(base: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *base = value;
    }
}

fn merge_into(base: &mut PlayerConfigFile, top: PlayerConfigFile) {
    overlay(&mut base.assets.base, top.assets.base);
    overlay(&mut base.assets.manifest, top.assets.manifest);
    overlay(&mut base.assets.map, top.assets.map);
    overlay(&mut base.assets.tiles, top.assets.tiles);
    overlay(&mut base.assets.effects.explosion, top.assets.effects.explosion);
    overlay(
        &mut base.assets.effects.guided_missile,
        top.assets.effects.guided_missile,
    );

    overlay(&mut base.display.width, top.display.width);
    overlay(&mut base.display.height, top.display.height);
    overlay(&mut base.display.refresh_hz, top.display.refresh_hz);

    overlay(&mut base.input.left, top.input.left);
    overlay(&mut base.input.right, top.input.right);
    overlay(&mut base.input.up, top.input.up);
    overlay(&mut base.input.down, top.input.down);

    overlay(&mut base.engine.align_to_pixels, top.engine.align_to_pixels);
    overlay(&mut base.engine.show_debug, top.engine.show_debug);
    overlay(&mut base.engine.time_scale, top.engine.time_scale);
    base.engine.extra.extend(top.engine.extra);

    overlay(&mut base.logging.filter, top.logging.filter);
}

fn apply_env_overrides(config: &mut PlayerConfigFile, var: impl Fn(&str) -> Option<String>) {
    if let Some(base) = var(ENV_ASSET_BASE) {
        config.assets.base = Some(base);
    }
    if let Some(filter) = var(ENV_LOG) {
        config.logging.filter = Some(filter);
    }
}

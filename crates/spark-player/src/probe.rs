//! Headless stand-in engine
//!
//! Moves a single point across the map under directional input and computes
//! the camera the real renderer would use, without drawing anything. Useful
//! for exercising the loading and frame loop end to end from a terminal.

use spark_core::{ImageHandle, Result, SparkError};
use spark_runtime::{DirectionalInput, Engine, EngineConfig, EngineFactory, EngineInit};

/// Edge length of a map cell in pixels
pub const TILE_SIZE: f64 = 64.0;

/// Velocity change per frame per held direction (px/ms)
const ACCELERATION: f64 = 0.01;

/// Map cells: each value is `tile_index * 4 + rotation`
pub type CellGrid = Vec<Vec<usize>>;

/// Parse whitespace-separated map cells, one row per line.
pub fn parse_map(text: &str) -> Result<CellGrid> {
    let mut rows = Vec::new();
    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let row = line
            .split_whitespace()
            .map(|cell| {
                cell.parse::<usize>().map_err(|e| {
                    SparkError::engine_fault(format!("map line {}: bad cell {cell:?}: {e}", number + 1))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        rows.push(row);
    }

    let Some(width) = rows.first().map(Vec::len) else {
        return Err(SparkError::engine_fault("map is empty"));
    };
    if rows.iter().any(|row| row.len() != width) {
        return Err(SparkError::engine_fault("map rows differ in length"));
    }
    Ok(rows)
}

/// The stand-in engine
#[derive(Debug)]
pub struct ProbeEngine {
    surface: (f64, f64),
    map: CellGrid,
    tiles: Vec<ImageHandle>,
    effects: Vec<ImageHandle>,
    texture_names: Vec<String>,
    pos: (f64, f64),
    vel: (f64, f64),
    prev_update: f64,
    camera: (f64, f64),
    frames: u64,
    debug_texts: Vec<String>,
}

impl ProbeEngine {
    pub fn new(init: EngineInit<'_>) -> Result<Self> {
        let map = parse_map(init.map)?;
        let highest_tile = map.iter().flatten().map(|cell| cell / 4).max().unwrap_or(0);
        if highest_tile >= init.images.len() {
            return Err(SparkError::engine_fault(format!(
                "map uses tile {highest_tile} but only {} tile images were given",
                init.images.len()
            )));
        }

        let texture_names = init
            .manifest
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();

        log::info!(
            "probe engine: {}x{} map, {} tiles, {} effects, {}x{} surface",
            map[0].len(),
            map.len(),
            init.images.len(),
            init.effects.len(),
            init.width,
            init.height
        );

        Ok(Self {
            surface: (init.width as f64, init.height as f64),
            map,
            tiles: init.images.to_vec(),
            effects: init.effects.to_vec(),
            texture_names,
            pos: (640.0, 640.0),
            vel: (0.02, 0.01),
            prev_update: 0.0,
            camera: (0.0, 0.0),
            frames: 0,
            debug_texts: Vec::new(),
        })
    }

    /// Map size in pixels
    pub fn map_size(&self) -> (f64, f64) {
        (
            self.map[0].len() as f64 * TILE_SIZE,
            self.map.len() as f64 * TILE_SIZE,
        )
    }

    pub fn position(&self) -> (f64, f64) {
        self.pos
    }

    pub fn velocity(&self) -> (f64, f64) {
        self.vel
    }

    /// Top-left corner of the view as of the last render
    pub fn camera(&self) -> (f64, f64) {
        self.camera
    }

    /// Frames finalized so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn texture_names(&self) -> &[String] {
        &self.texture_names
    }

    /// Tile images whose bytes have arrived
    pub fn tiles_loaded(&self) -> usize {
        self.tiles.iter().filter(|t| t.is_loaded()).count()
    }

    pub fn effects(&self) -> &[ImageHandle] {
        &self.effects
    }
}

impl Engine for ProbeEngine {
    fn feed_input(&mut self, _config: &EngineConfig, input: DirectionalInput) -> Result<()> {
        let signal = |on: bool| if on { ACCELERATION } else { 0.0 };
        self.vel.0 += signal(input.right) - signal(input.left);
        self.vel.1 += signal(input.down) - signal(input.up);
        Ok(())
    }

    fn advance(&mut self, config: &EngineConfig, timestamp: f64) -> Result<()> {
        let dt = (timestamp - self.prev_update) * config.time_scale;
        self.pos.0 += self.vel.0 * dt;
        self.pos.1 += self.vel.1 * dt;

        let (max_x, max_y) = self.map_size();
        if self.pos.0 <= 0.0 || self.pos.0 >= max_x {
            self.pos.0 = self.pos.0.clamp(0.0, max_x);
            self.vel.0 = 0.0;
        }
        if self.pos.1 <= 0.0 || self.pos.1 >= max_y {
            self.pos.1 = self.pos.1.clamp(0.0, max_y);
            self.vel.1 = 0.0;
        }

        self.prev_update = timestamp;
        Ok(())
    }

    fn render(
        &mut self,
        config: &EngineConfig,
        overlay: &ImageHandle,
        align_to_pixels: bool,
    ) -> Result<()> {
        let (map_w, map_h) = self.map_size();
        let half = (self.surface.0 / 2.0, self.surface.1 / 2.0);
        if map_w < self.surface.0 || map_h < self.surface.1 {
            return Err(SparkError::engine_fault(format!(
                "map ({map_w}x{map_h}) is smaller than the surface ({}x{})",
                self.surface.0, self.surface.1
            )));
        }

        let center = (
            self.pos.0.clamp(half.0, map_w - half.0),
            self.pos.1.clamp(half.1, map_h - half.1),
        );
        let mut top_left = (center.0 - half.0, center.1 - half.1);
        if align_to_pixels {
            top_left = (top_left.0.floor(), top_left.1.floor());
        }
        self.camera = top_left;

        if config.show_debug {
            self.debug_texts
                .push(format!("pos: ({:.2}, {:.2})", self.pos.0, self.pos.1));
            self.debug_texts
                .push(format!("vel: ({:.4}, {:.4})", self.vel.0, self.vel.1));
            self.debug_texts.push(format!(
                "overlay {} loaded: {}",
                overlay.path(),
                overlay.is_loaded()
            ));
        }
        log::trace!(
            "render camera=({:.1}, {:.1}) pos=({:.2}, {:.2})",
            top_left.0,
            top_left.1,
            self.pos.0,
            self.pos.1
        );
        Ok(())
    }

    fn finalize_frame(&mut self) -> Result<()> {
        self.frames += 1;
        for text in self.debug_texts.drain(..) {
            log::debug!("{text}");
        }
        Ok(())
    }
}

/// Builds [`ProbeEngine`]s. Headless, so there is no surface to own.
#[derive(Debug, Default)]
pub struct ProbeFactory;

impl EngineFactory for ProbeFactory {
    type Engine = ProbeEngine;

    fn construct(&mut self, init: EngineInit<'_>) -> Result<ProbeEngine> {
        ProbeEngine::new(init)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_map(cells: usize, value: usize) -> String {
        let row = vec![value.to_string(); cells].join(" ");
        vec![row; cells].join("\n")
    }

    fn engine(map: &str, width: u32, height: u32) -> Result<ProbeEngine> {
        let config = EngineConfig::default();
        let images = vec![ImageHandle::new("t0.bmp"), ImageHandle::new("t1.bmp")];
        let effects = [ImageHandle::new("boom.png")];
        ProbeFactory.construct(EngineInit {
            config: &config,
            width,
            height,
            images: &images,
            effects: &effects,
            manifest: "g1\ng2\n",
            map,
        })
    }

    #[test]
    fn parse_map_rows() {
        let map = parse_map("0 4 1\n\n2 3 7\n").unwrap();
        assert_eq!(map, vec![vec![0, 4, 1], vec![2, 3, 7]]);
    }

    #[test]
    fn parse_map_rejects_garbage() {
        assert!(matches!(parse_map(""), Err(SparkError::EngineFault(_))));
        assert!(matches!(parse_map("0 x"), Err(SparkError::EngineFault(_))));
        assert!(matches!(parse_map("0 0\n0"), Err(SparkError::EngineFault(_))));
    }

    #[test]
    fn construct_checks_tile_indices() {
        // Cell 8 is tile 2, only tiles 0 and 1 exist
        let err = engine(&square_map(4, 8), 64, 64).unwrap_err();
        assert!(matches!(err, SparkError::EngineFault(_)));

        let probe = engine(&square_map(4, 5), 64, 64).unwrap();
        assert_eq!(probe.texture_names(), ["g1", "g2"]);
        assert_eq!(probe.map_size(), (256.0, 256.0));
        assert_eq!(probe.effects()[0].path(), "boom.png");
    }

    #[test]
    fn input_accelerates_and_walls_stop() {
        let config = EngineConfig::default();
        let mut probe = engine(&square_map(20, 0), 640, 480).unwrap();

        probe
            .feed_input(
                &config,
                DirectionalInput {
                    left: true,
                    ..DirectionalInput::default()
                },
            )
            .unwrap();
        let vel = probe.velocity();
        assert!((vel.0 - (0.02 - ACCELERATION)).abs() < 1e-12);
        assert!((vel.1 - 0.01).abs() < 1e-12);

        probe.advance(&config, 100.0).unwrap();
        assert!((probe.position().0 - 641.0).abs() < 1e-9);
        assert!((probe.position().1 - 641.0).abs() < 1e-9);

        // Far in the future the point hits the bottom-right corner
        probe.advance(&config, 1_000_000.0).unwrap();
        assert_eq!(probe.position(), probe.map_size());
        assert_eq!(probe.velocity(), (0.0, 0.0));
    }

    #[test]
    fn render_clamps_camera_and_aligns() {
        let config = EngineConfig::default();
        let overlay = ImageHandle::new("guided_missile.png");
        let mut probe = engine(&square_map(20, 0), 640, 480).unwrap();

        probe.advance(&config, 10.05).unwrap();
        probe.render(&config, &overlay, true).unwrap();
        let camera = probe.camera();
        assert_eq!(camera, (camera.0.floor(), camera.1.floor()));

        probe.render(&config, &overlay, false).unwrap();
        assert!(probe.camera().0.fract() != 0.0);

        probe.finalize_frame().unwrap();
        assert_eq!(probe.frames(), 1);
    }

    #[test]
    fn render_faults_on_map_smaller_than_surface() {
        let config = EngineConfig::default();
        let overlay = ImageHandle::new("guided_missile.png");
        let mut probe = engine(&square_map(4, 0), 640, 480).unwrap();
        let err = probe.render(&config, &overlay, true).unwrap_err();
        assert!(matches!(err, SparkError::EngineFault(_)));
    }
}

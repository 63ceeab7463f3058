//! Startup orchestration: resources in, engine constructed, frame loop running.

use spark_asset::{ImageSet, ResourcePipeline, Transport};
use spark_core::Result;
use spark_runtime::{EngineFactory, EngineInit, FrameScheduler, Host, SharedConfig, SharedInput};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Where the run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Waiting on the manifest and map. A failed fetch leaves the run here.
    Loading,
    /// Engine constructed, frames being delivered
    Playing,
    /// Construction or a frame failed
    Halted,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPhase::Loading => write!(f, "loading"),
            RunPhase::Playing => write!(f, "playing"),
            RunPhase::Halted => write!(f, "halted"),
        }
    }
}

/// Surface size handed to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapOptions {
    pub width: u32,
    pub height: u32,
}

struct BootstrapState<F: EngineFactory> {
    host: Host,
    factory: F,
    config: SharedConfig,
    input: SharedInput,
    options: BootstrapOptions,
    images: Option<ImageSet>,
    engine: Option<Rc<RefCell<F::Engine>>>,
    scheduler: Option<FrameScheduler<F::Engine>>,
    construction_failed: bool,
}

/// Owns the engine and the scheduler for the length of a run.
pub struct Bootstrap<F: EngineFactory + 'static> {
    state: Rc<RefCell<BootstrapState<F>>>,
}

impl<F: EngineFactory + 'static> Bootstrap<F> {
    /// Start loading. Once both text resources are in, the engine is built
    /// from them and the first frame is queued.
    pub fn start<T: Transport + 'static>(
        host: &Host,
        pipeline: &ResourcePipeline<T>,
        factory: F,
        config: SharedConfig,
        input: SharedInput,
        options: BootstrapOptions,
    ) -> Self {
        let state = Rc::new(RefCell::new(BootstrapState {
            host: host.clone(),
            factory,
            config,
            input,
            options,
            images: None,
            engine: None,
            scheduler: None,
            construction_failed: false,
        }));

        let weak = Rc::downgrade(&state);
        let images = pipeline.load(move |manifest, map| on_resources(&weak, &manifest, &map));
        state.borrow_mut().images = Some(images);

        Self { state }
    }

    pub fn phase(&self) -> RunPhase {
        let state = self.state.borrow();
        match &state.scheduler {
            _ if state.construction_failed => RunPhase::Halted,
            Some(scheduler) if scheduler.is_halted() => RunPhase::Halted,
            Some(_) => RunPhase::Playing,
            None => RunPhase::Loading,
        }
    }

    /// The constructed engine, once loading is done
    pub fn engine(&self) -> Option<Rc<RefCell<F::Engine>>> {
        self.state.borrow().engine.clone()
    }

    /// Directional input the frame loop feeds the engine
    pub fn input(&self) -> SharedInput {
        self.state.borrow().input.clone()
    }

    pub fn config(&self) -> SharedConfig {
        self.state.borrow().config.clone()
    }

    /// Image handles issued at startup
    pub fn images(&self) -> Option<ImageSet> {
        self.state.borrow().images.clone()
    }

    pub fn frames_completed(&self) -> u64 {
        self.state
            .borrow()
            .scheduler
            .as_ref()
            .map_or(0, FrameScheduler::frames_completed)
    }

    /// One-line summary for logs
    pub fn debug_report(&self) -> String {
        let state = self.state.borrow();
        let (loaded, total) = state
            .images
            .as_ref()
            .map_or((0, 0), |images| (images.loaded(), images.iter().count()));
        let settings = match state.config.read() {
            Ok(config) => format!(
                "align_to_pixels={} show_debug={} time_scale={}",
                config.align_to_pixels, config.show_debug, config.time_scale
            ),
            Err(e) => e.to_string(),
        };
        drop(state);
        format!(
            "phase={} frames={} images={loaded}/{total} {settings}",
            self.phase(),
            self.frames_completed()
        )
    }
}

fn on_resources<F: EngineFactory + 'static>(
    weak: &Weak<RefCell<BootstrapState<F>>>,
    manifest: &str,
    map: &str,
) {
    let Some(state) = weak.upgrade() else {
        log::debug!("resources arrived after the run was torn down");
        return;
    };
    let mut state = state.borrow_mut();
    if state.engine.is_some() || state.construction_failed {
        log::warn!("resources delivered twice, ignoring");
        return;
    }

    match construct(&mut state, manifest, map) {
        Ok(engine) => {
            let engine = Rc::new(RefCell::new(engine));
            let overlay = state
                .images
                .as_ref()
                .map(|images| images.guided_missile.clone());
            let Some(overlay) = overlay else {
                log::error!("image set missing when resources arrived");
                return;
            };
            let scheduler = FrameScheduler::start(
                &state.host,
                engine.clone(),
                state.input.clone(),
                state.config.clone(),
                overlay,
            );
            state.engine = Some(engine);
            state.scheduler = Some(scheduler);
            log::info!("engine constructed, frame loop started");
        }
        Err(e) => {
            log::error!("engine construction failed: {e}");
            state.construction_failed = true;
            state.host.fail(e);
        }
    }
}

fn construct<F: EngineFactory>(
    state: &mut BootstrapState<F>,
    manifest: &str,
    map: &str,
) -> Result<F::Engine> {
    let config = state.config.read()?;
    let tiles = state
        .images
        .as_ref()
        .map(|images| images.tiles.as_slice())
        .unwrap_or_default();
    let effects = state.images.as_ref().map(ImageSet::effects);
    state.factory.construct(EngineInit {
        config: &config,
        width: state.options.width,
        height: state.options.height,
        images: tiles,
        effects: effects.as_ref().map_or(&[][..], |effects| &effects[..]),
        manifest,
        map,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use spark_asset::{LoadPlan, TextCallback};
    use spark_core::{ImageHandle, SparkError};
    use spark_runtime::{DirectionalInput, Engine, EngineConfig, InputTracker, Key};

    /// Answers every text fetch on the next host turn with a fixed body.
    struct Canned {
        host: Host,
    }

    impl Transport for Canned {
        fn fetch_text(&self, path: &str, done: TextCallback) {
            let body = format!("contents of {path}");
            self.host.spawn_local(move || done(Ok(body)));
        }

        fn fetch_image(&self, _target: &ImageHandle) {}

        fn locate(&self, path: &str) -> String {
            path.to_string()
        }
    }

    struct Idle;

    impl Engine for Idle {
        fn feed_input(&mut self, _: &EngineConfig, _: DirectionalInput) -> Result<()> {
            Ok(())
        }
        fn advance(&mut self, _: &EngineConfig, _: f64) -> Result<()> {
            Ok(())
        }
        fn render(&mut self, _: &EngineConfig, _: &ImageHandle, _: bool) -> Result<()> {
            Ok(())
        }
        fn finalize_frame(&mut self) -> Result<()> {
            Ok(())
        }
    }

    /// (width, tile count, effect paths, manifest, map) per construction
    type Seen = Rc<RefCell<Vec<(u32, usize, Vec<String>, String, String)>>>;

    struct Factory {
        fail: bool,
        seen: Seen,
    }

    impl EngineFactory for Factory {
        type Engine = Idle;

        fn construct(&mut self, init: EngineInit<'_>) -> Result<Idle> {
            self.seen.borrow_mut().push((
                init.width,
                init.images.len(),
                init.effects.iter().map(|e| e.path().to_string()).collect(),
                init.manifest.to_string(),
                init.map.to_string(),
            ));
            if self.fail {
                return Err(SparkError::engine_fault("no surface"));
            }
            Ok(Idle)
        }
    }

    fn boot(fail: bool) -> (Host, Bootstrap<Factory>, Seen) {
        let host = Host::default();
        let pipeline = ResourcePipeline::new(Canned { host: host.clone() }, LoadPlan::default());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let bootstrap = Bootstrap::start(
            &host,
            &pipeline,
            Factory {
                fail,
                seen: seen.clone(),
            },
            SharedConfig::default(),
            InputTracker::default().shared(),
            BootstrapOptions {
                width: 320,
                height: 200,
            },
        );
        (host, bootstrap, seen)
    }

    #[test]
    fn loading_until_resources_arrive() {
        let (host, bootstrap, seen) = boot(false);
        assert_eq!(bootstrap.phase(), RunPhase::Loading);
        assert!(bootstrap.engine().is_none());
        assert_eq!(host.pending_frames(), 0);

        host.run_until_stalled();

        assert_eq!(bootstrap.phase(), RunPhase::Playing);
        assert!(bootstrap.engine().is_some());
        assert_eq!(host.pending_frames(), 1);

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        let (width, tiles, effects, manifest, map) = &seen[0];
        assert_eq!(*width, 320);
        assert_eq!(*tiles, LoadPlan::default().assets.tiles.len());
        assert_eq!(
            effects,
            &["assets/explosion.png", "assets/weapons/guided_missile.png"]
        );
        assert_eq!(manifest, "contents of assets/texture_list.txt");
        assert_eq!(map, "contents of maps/Atrium.map");
    }

    #[test]
    fn input_handle_is_shared_with_the_run() {
        let (host, bootstrap, _) = boot(false);
        host.run_until_stalled();

        bootstrap
            .input()
            .borrow_mut()
            .on_key_transition(Key::ArrowUp, true);
        assert!(bootstrap.input().borrow().snapshot().up);
    }

    #[test]
    fn construction_failure_halts_and_reports() {
        let (host, bootstrap, seen) = boot(true);
        let err = host.run().unwrap_err();

        assert!(matches!(err, SparkError::EngineFault(_)));
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(bootstrap.phase(), RunPhase::Halted);
        assert_eq!(host.pending_frames(), 0);
    }

    #[test]
    fn report_mentions_phase_and_settings() {
        let (host, bootstrap, _) = boot(false);
        host.run_until_stalled();
        host.fire_frame(16.0);

        let report = bootstrap.debug_report();
        assert!(report.starts_with("phase=playing frames=1 "), "{report}");
        assert!(report.contains("align_to_pixels=true"), "{report}");
    }
}

//! Frame scheduler: drives the engine once per display refresh.
//!
//! Two states. `Scheduled` holds the handle of the queued next frame;
//! `Halted` is terminal and entered on the first engine fault. Each frame
//! queues its successor before doing any work, so a fault can cancel the
//! successor and nothing runs after it.

use crate::engine::{Engine, SharedConfig};
use crate::host::{Host, ScheduleHandle};
use crate::input::{DirectionalInput, SharedInput};
use spark_core::{ImageHandle, Result, SparkError};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// A frame is queued under this handle
    Scheduled(ScheduleHandle),
    /// A frame faulted; no frame will ever be queued again
    Halted,
}

struct SchedulerInner<E: Engine> {
    host: Host,
    engine: Rc<RefCell<E>>,
    input: SharedInput,
    config: SharedConfig,
    overlay: ImageHandle,
    state: SchedulerState,
    frames_completed: u64,
}

/// Repeating per-frame driver for an [`Engine`].
///
/// Dropping every `FrameScheduler` handle stops the loop at the next frame.
pub struct FrameScheduler<E: Engine + 'static> {
    inner: Rc<RefCell<SchedulerInner<E>>>,
}

impl<E: Engine + 'static> Clone for FrameScheduler<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<E: Engine + 'static> FrameScheduler<E> {
    /// Queue the first frame and return the running scheduler.
    pub fn start(
        host: &Host,
        engine: Rc<RefCell<E>>,
        input: SharedInput,
        config: SharedConfig,
        overlay: ImageHandle,
    ) -> Self {
        let inner = Rc::new_cyclic(|weak: &Weak<RefCell<SchedulerInner<E>>>| {
            let weak = weak.clone();
            let first = host.request_frame(move |timestamp| tick(&weak, timestamp));
            RefCell::new(SchedulerInner {
                host: host.clone(),
                engine,
                input,
                config,
                overlay,
                state: SchedulerState::Scheduled(first),
                frames_completed: 0,
            })
        });
        log::debug!("frame scheduler started");
        Self { inner }
    }

    pub fn state(&self) -> SchedulerState {
        self.inner.borrow().state
    }

    pub fn is_halted(&self) -> bool {
        self.state() == SchedulerState::Halted
    }

    /// Frames that ran all four engine calls successfully
    pub fn frames_completed(&self) -> u64 {
        self.inner.borrow().frames_completed
    }
}

fn tick<E: Engine + 'static>(weak: &Weak<RefCell<SchedulerInner<E>>>, timestamp: f64) {
    let Some(inner) = weak.upgrade() else {
        return;
    };
    let mut this = inner.borrow_mut();
    if this.state == SchedulerState::Halted {
        return;
    }

    let next_weak = weak.clone();
    let next = this
        .host
        .request_frame(move |timestamp| tick(&next_weak, timestamp));
    this.state = SchedulerState::Scheduled(next);

    let input = this.input.borrow().snapshot();
    match run_frame(&this.engine, &this.config, input, &this.overlay, timestamp) {
        Ok(()) => {
            this.frames_completed += 1;
            log::trace!("frame {} done at {timestamp:.1}ms", this.frames_completed);
        }
        Err(fault) => {
            this.host.cancel_frame(next);
            this.state = SchedulerState::Halted;
            log::error!(
                "frame at {timestamp:.1}ms failed after {} good frames, halting: {fault}",
                this.frames_completed
            );
            this.host.fail(fault);
        }
    }
}

fn run_frame<E: Engine>(
    engine: &RefCell<E>,
    config: &SharedConfig,
    input: DirectionalInput,
    overlay: &ImageHandle,
    timestamp: f64,
) -> Result<()> {
    let mut engine = engine
        .try_borrow_mut()
        .map_err(|_| SparkError::engine_fault("engine is borrowed outside the frame loop"))?;
    let config = config.read()?;

    engine.feed_input(&config, input)?;
    engine.advance(&config, timestamp)?;
    engine.render(&config, overlay, config.align_to_pixels)?;
    engine.finalize_frame()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;
    use crate::input::{InputTracker, Key};

    #[derive(Default)]
    struct Recorder {
        calls: Vec<(u32, &'static str)>,
        inputs: Vec<DirectionalInput>,
        frame: u32,
        fail_at: Option<(u32, &'static str)>,
    }

    impl Recorder {
        fn call(&mut self, name: &'static str) -> Result<()> {
            self.calls.push((self.frame, name));
            if self.fail_at == Some((self.frame, name)) {
                return Err(SparkError::engine_fault(format!("{name} failed")));
            }
            Ok(())
        }
    }

    impl Engine for Recorder {
        fn feed_input(&mut self, _: &EngineConfig, input: DirectionalInput) -> Result<()> {
            self.frame += 1;
            self.inputs.push(input);
            self.call("feed_input")
        }

        fn advance(&mut self, _: &EngineConfig, _: f64) -> Result<()> {
            self.call("advance")
        }

        fn render(&mut self, _: &EngineConfig, _: &ImageHandle, _: bool) -> Result<()> {
            self.call("render")
        }

        fn finalize_frame(&mut self) -> Result<()> {
            self.call("finalize_frame")
        }
    }

    fn start(host: &Host, engine: Recorder) -> (FrameScheduler<Recorder>, Rc<RefCell<Recorder>>, SharedInput) {
        let engine = Rc::new(RefCell::new(engine));
        let input = InputTracker::default().shared();
        let scheduler = FrameScheduler::start(
            host,
            engine.clone(),
            input.clone(),
            SharedConfig::default(),
            ImageHandle::new("effects/guided_missile.png"),
        );
        (scheduler, engine, input)
    }

    #[test]
    fn first_frame_queued_on_start() {
        let host = Host::default();
        let (scheduler, engine, _) = start(&host, Recorder::default());

        assert!(matches!(scheduler.state(), SchedulerState::Scheduled(_)));
        assert_eq!(host.pending_frames(), 1);
        assert!(engine.borrow().calls.is_empty());
    }

    #[test]
    fn each_frame_queues_exactly_one_successor() {
        let host = Host::default();
        let (scheduler, engine, _) = start(&host, Recorder::default());

        for n in 1..=3 {
            host.fire_frame(n as f64 * 16.0);
            assert_eq!(host.pending_frames(), 1);
        }
        assert_eq!(scheduler.frames_completed(), 3);
        assert_eq!(
            engine.borrow().calls[..4],
            [
                (1, "feed_input"),
                (1, "advance"),
                (1, "render"),
                (1, "finalize_frame"),
            ]
        );
    }

    #[test]
    fn fault_on_frame_five_halts_for_good() {
        let host = Host::default();
        let (scheduler, engine, _) = start(
            &host,
            Recorder {
                fail_at: Some((5, "render")),
                ..Recorder::default()
            },
        );

        for n in 1..=5 {
            host.fire_frame(n as f64 * 16.0);
        }

        assert!(scheduler.is_halted());
        assert_eq!(host.pending_frames(), 0);
        assert!(host.has_fault());
        assert_eq!(scheduler.frames_completed(), 4);

        // Nothing left to deliver
        assert_eq!(host.fire_frame(96.0), 0);

        let calls = &engine.borrow().calls;
        assert_eq!(calls.len(), 4 * 4 + 3);
        for frame in 1..=4 {
            let names: Vec<_> = calls.iter().filter(|(f, _)| *f == frame).map(|(_, n)| *n).collect();
            assert_eq!(names, ["feed_input", "advance", "render", "finalize_frame"]);
        }
        let last: Vec<_> = calls.iter().filter(|(f, _)| *f == 5).map(|(_, n)| *n).collect();
        assert_eq!(last, ["feed_input", "advance", "render"]);
        assert!(calls.iter().all(|(f, _)| *f <= 5));
    }

    #[test]
    fn fault_is_returned_by_host_run() {
        let host = Host::new(crate::host::HostOptions {
            refresh_hz: 1000.0,
            frame_limit: Some(50),
        });
        let (_scheduler, _, _) = start(
            &host,
            Recorder {
                fail_at: Some((2, "advance")),
                ..Recorder::default()
            },
        );

        let err = host.run().unwrap_err();
        assert!(matches!(err, SparkError::EngineFault(_)));
        assert_eq!(host.frames_delivered(), 2);
    }

    #[test]
    fn input_snapshot_forwarded_each_frame() {
        let host = Host::default();
        let (_scheduler, engine, input) = start(&host, Recorder::default());

        host.fire_frame(16.0);
        input.borrow_mut().on_key_transition(Key::ArrowUp, true);
        host.fire_frame(32.0);

        let inputs = &engine.borrow().inputs;
        assert!(!inputs[0].up);
        assert!(inputs[1].up);
    }

    #[test]
    fn dropped_scheduler_stops_ticking() {
        let host = Host::default();
        let (scheduler, engine, _) = start(&host, Recorder::default());
        drop(scheduler);
        host.fire_frame(16.0);
        assert!(engine.borrow().calls.is_empty());
    }
}

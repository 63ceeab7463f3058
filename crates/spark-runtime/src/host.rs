//! Host loop: the single-threaded cooperative scheduler everything runs on.
//!
//! The host owns three queues:
//! - **local tasks** - closures queued with [`Host::spawn_local`]
//! - **frame callbacks** - requested once per display refresh, cancellable
//! - **completions** - results produced on helper threads (HTTP requests,
//!   terminal input) and delivered back onto the host thread
//!
//! Helper threads only ever send plain data through the channel. The code
//! that consumes it runs on the host thread, so state shared between
//! callbacks lives in `Rc<RefCell<_>>` without any locking.

use crate::clock::FrameClock;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use spark_core::{Result, SparkError};
use std::any::Any;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::marker::PhantomData;
use std::rc::Rc;
use std::time::Instant;

type LocalTask = Box<dyn FnOnce()>;
type FrameCallback = Box<dyn FnOnce(f64)>;
type Payload = Box<dyn Any + Send>;

/// Token for a pending frame callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScheduleHandle(u64);

impl ScheduleHandle {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Host loop options
#[derive(Debug, Clone)]
pub struct HostOptions {
    /// Display refresh rate frames are paced at
    pub refresh_hz: f64,
    /// Stop `run` after this many frames have been delivered
    pub frame_limit: Option<u64>,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            refresh_hz: 60.0,
            frame_limit: None,
        }
    }
}

enum Route {
    Once(Box<dyn FnOnce(Payload)>),
    Stream(Box<dyn FnMut(Payload)>),
}

struct Message {
    route: u64,
    /// `None` when the sender was dropped without completing
    payload: Option<Payload>,
}

#[derive(Default)]
struct HostState {
    tasks: VecDeque<LocalTask>,
    frames: Vec<(ScheduleHandle, FrameCallback)>,
    routes: HashMap<u64, Route>,
    pending_once: usize,
    next_id: u64,
    frames_delivered: u64,
    fault: Option<SparkError>,
    stop_requested: bool,
}

impl HostState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Single-threaded cooperative host loop.
///
/// Cloning a `Host` gives another handle to the same loop.
#[derive(Clone)]
pub struct Host {
    state: Rc<RefCell<HostState>>,
    clock: Rc<RefCell<FrameClock>>,
    tx: Sender<Message>,
    rx: Receiver<Message>,
    options: HostOptions,
}

impl Default for Host {
    fn default() -> Self {
        Self::new(HostOptions::default())
    }
}

impl Host {
    pub fn new(options: HostOptions) -> Self {
        let (tx, rx) = unbounded();
        Self {
            state: Rc::new(RefCell::new(HostState::default())),
            clock: Rc::new(RefCell::new(FrameClock::with_refresh_rate(options.refresh_hz))),
            tx,
            rx,
            options,
        }
    }

    /// Queue a closure to run on a later turn of the loop
    pub fn spawn_local(&self, task: impl FnOnce() + 'static) {
        self.state.borrow_mut().tasks.push_back(Box::new(task));
    }

    /// Request `callback` to run on the next frame, with the frame timestamp in ms.
    ///
    /// Callbacks requested while a frame is being delivered run on the following frame.
    pub fn request_frame(&self, callback: impl FnOnce(f64) + 'static) -> ScheduleHandle {
        let mut state = self.state.borrow_mut();
        let handle = ScheduleHandle(state.next_id());
        state.frames.push((handle, Box::new(callback)));
        handle
    }

    /// Cancel a pending frame callback. Returns false if it already ran or was cancelled.
    pub fn cancel_frame(&self, handle: ScheduleHandle) -> bool {
        let mut state = self.state.borrow_mut();
        let before = state.frames.len();
        state.frames.retain(|(h, _)| *h != handle);
        state.frames.len() != before
    }

    pub fn is_frame_pending(&self, handle: ScheduleHandle) -> bool {
        self.state.borrow().frames.iter().any(|(h, _)| *h == handle)
    }

    /// Register a one-shot completion.
    ///
    /// The returned [`Completer`] can be moved to another thread; `on_done`
    /// runs on the host thread once it is completed. Until then the pending
    /// completion keeps [`Host::run`] waiting, however long that takes.
    pub fn completer<T, F>(&self, on_done: F) -> Completer<T>
    where
        T: Send + 'static,
        F: FnOnce(T) + 'static,
    {
        let mut state = self.state.borrow_mut();
        let route = state.next_id();
        state.routes.insert(
            route,
            Route::Once(Box::new(move |payload: Payload| match payload.downcast::<T>() {
                Ok(value) => on_done(*value),
                Err(_) => log::error!("completion {route} delivered an unexpected payload type"),
            })),
        );
        state.pending_once += 1;
        Completer {
            route,
            tx: Some(self.tx.clone()),
            _marker: PhantomData,
        }
    }

    /// Register a repeating delivery route (e.g. input events from a polling thread).
    ///
    /// Unlike completers, open mailboxes do not keep [`Host::run`] alive.
    pub fn mailbox<T, F>(&self, mut handler: F) -> Mailbox<T>
    where
        T: Send + 'static,
        F: FnMut(T) + 'static,
    {
        let mut state = self.state.borrow_mut();
        let route = state.next_id();
        state.routes.insert(
            route,
            Route::Stream(Box::new(move |payload: Payload| match payload.downcast::<T>() {
                Ok(value) => handler(*value),
                Err(_) => log::error!("mailbox {route} received an unexpected payload type"),
            })),
        );
        Mailbox {
            route,
            tx: self.tx.clone(),
            _marker: PhantomData,
        }
    }

    /// Report a terminal fault. `run` returns it as soon as the current turn ends.
    pub fn fail(&self, fault: SparkError) {
        let mut state = self.state.borrow_mut();
        if state.fault.is_some() {
            log::warn!("additional fault after the first was reported: {fault}");
            return;
        }
        state.fault = Some(fault);
    }

    /// Ask `run` to return `Ok` once the current turn ends
    pub fn stop(&self) {
        self.state.borrow_mut().stop_requested = true;
    }

    pub fn has_fault(&self) -> bool {
        self.state.borrow().fault.is_some()
    }

    /// Take the reported fault, if any
    pub fn take_fault(&self) -> Option<SparkError> {
        self.state.borrow_mut().fault.take()
    }

    pub fn frames_delivered(&self) -> u64 {
        self.state.borrow().frames_delivered
    }

    pub fn pending_frames(&self) -> usize {
        self.state.borrow().frames.len()
    }

    pub fn pending_completions(&self) -> usize {
        self.state.borrow().pending_once
    }

    /// Milliseconds since the host was created
    pub fn now_ms(&self) -> f64 {
        self.clock.borrow().now_ms()
    }

    /// Run local tasks and already-arrived completions until none are left.
    ///
    /// Never blocks and never delivers frames. Returns how many items ran.
    pub fn run_until_stalled(&self) -> usize {
        let mut ran = 0;
        loop {
            let task = self.state.borrow_mut().tasks.pop_front();
            if let Some(task) = task {
                task();
                ran += 1;
                continue;
            }
            match self.rx.try_recv() {
                Ok(message) => {
                    self.dispatch(message);
                    ran += 1;
                }
                Err(_) => return ran,
            }
        }
    }

    /// Deliver one frame to every callback pending at the start of the frame.
    ///
    /// Returns how many callbacks ran.
    pub fn fire_frame(&self, timestamp: f64) -> usize {
        let due: Vec<ScheduleHandle> = {
            let mut state = self.state.borrow_mut();
            if state.frames.is_empty() {
                return 0;
            }
            state.frames_delivered += 1;
            state.frames.iter().map(|(h, _)| *h).collect()
        };

        let mut ran = 0;
        for handle in due {
            let callback = {
                let mut state = self.state.borrow_mut();
                state
                    .frames
                    .iter()
                    .position(|(h, _)| *h == handle)
                    .map(|index| state.frames.remove(index).1)
            };
            // Cancelled by an earlier callback in this same frame
            let Some(callback) = callback else {
                continue;
            };
            callback(timestamp);
            ran += 1;
        }
        ran
    }

    /// Drive the loop until there is nothing left to do.
    ///
    /// Returns `Err` with the first reported fault, or `Ok` when the frame
    /// limit is reached or no tasks, frames, or completions remain.
    pub fn run(&self) -> Result<()> {
        loop {
            self.run_until_stalled();

            if let Some(fault) = self.take_fault() {
                return Err(fault);
            }

            if std::mem::take(&mut self.state.borrow_mut().stop_requested) {
                log::info!("stop requested after {} frames", self.frames_delivered());
                return Ok(());
            }

            if let Some(limit) = self.options.frame_limit {
                if self.frames_delivered() >= limit {
                    log::info!("frame limit of {limit} reached, stopping host");
                    return Ok(());
                }
            }

            if self.pending_frames() > 0 {
                let now = Instant::now();
                let wait = self.clock.borrow().time_until_next_frame(now);
                if wait.is_zero() {
                    let timestamp = self.clock.borrow_mut().mark_frame(now);
                    self.fire_frame(timestamp);
                } else {
                    match self.rx.recv_timeout(wait) {
                        Ok(message) => self.dispatch(message),
                        Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => {
                            return Err(SparkError::Config("host channel disconnected".into()))
                        }
                    }
                }
            } else if self.pending_completions() > 0 {
                match self.rx.recv() {
                    Ok(message) => self.dispatch(message),
                    Err(_) => return Err(SparkError::Config("host channel disconnected".into())),
                }
            } else {
                log::debug!("host idle after {} frames", self.frames_delivered());
                return Ok(());
            }
        }
    }

    fn dispatch(&self, message: Message) {
        let route = self.state.borrow_mut().routes.remove(&message.route);
        match (route, message.payload) {
            (Some(Route::Once(on_done)), payload) => {
                self.state.borrow_mut().pending_once -= 1;
                match payload {
                    Some(payload) => on_done(payload),
                    None => log::debug!("completion {} abandoned by its sender", message.route),
                }
            }
            (Some(Route::Stream(mut handler)), Some(payload)) => {
                handler(payload);
                self.state
                    .borrow_mut()
                    .routes
                    .insert(message.route, Route::Stream(handler));
            }
            (Some(Route::Stream(handler)), None) => {
                self.state
                    .borrow_mut()
                    .routes
                    .insert(message.route, Route::Stream(handler));
            }
            (None, _) => log::warn!("dropping message for unknown route {}", message.route),
        }
    }
}

/// Sending half of a one-shot completion. `Send`, so it can move to a worker thread.
///
/// Dropping it without calling [`Completer::complete`] releases the host
/// from waiting; the completion callback is never run.
pub struct Completer<T> {
    route: u64,
    tx: Option<Sender<Message>>,
    _marker: PhantomData<fn(T)>,
}

impl<T: Send + 'static> Completer<T> {
    /// Deliver the result to the host thread.
    pub fn complete(mut self, value: T) {
        let Some(tx) = self.tx.take() else {
            return;
        };
        let message = Message {
            route: self.route,
            payload: Some(Box::new(value)),
        };
        if tx.send(message).is_err() {
            log::debug!("host gone before completion {} arrived", self.route);
        }
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Message {
                route: self.route,
                payload: None,
            });
        }
    }
}

/// Sending half of a repeating delivery route
pub struct Mailbox<T> {
    route: u64,
    tx: Sender<Message>,
    _marker: PhantomData<fn(T)>,
}

impl<T> Clone for Mailbox<T> {
    fn clone(&self) -> Self {
        Self {
            route: self.route,
            tx: self.tx.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Send + 'static> Mailbox<T> {
    /// Post a value. Returns false if the host is gone.
    pub fn post(&self, value: T) -> bool {
        self.tx
            .send(Message {
                route: self.route,
                payload: Some(Box::new(value)),
            })
            .is_ok()
    }
}

//! Spark Runtime - Frame loop infrastructure
//!
//! Provides the building blocks the player drives once per display refresh:
//! - `Host` - single-threaded cooperative loop (tasks, frame callbacks, completions)
//! - `FrameClock` - refresh pacing and frame timestamps
//! - `InputTracker` - key transitions to directional signals
//! - `Engine` / `EngineFactory` - contract of the external simulation
//! - `FrameScheduler` - per-frame engine driver that halts on the first fault

mod clock;
mod engine;
mod host;
mod input;
mod scheduler;

pub use clock::FrameClock;
pub use engine::{Engine, EngineConfig, EngineFactory, EngineInit, SharedConfig};
pub use host::{Completer, Host, HostOptions, Mailbox, ScheduleHandle};
pub use input::{
    Direction, DirectionalInput, InputConfig, InputTracker, Key, KeyBindings, SharedInput,
    MIN_KEYS_PER_DIRECTION,
};
pub use scheduler::{FrameScheduler, SchedulerState};

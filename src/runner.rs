//! Controller-facing API for the periodic runner.
//!
//! A [`PeriodicRunner`] owns one worker thread, created at construction, that
//! invokes the routine at the configured period. Every controller operation
//! is a signal or state mutation; the routine only ever executes on the
//! worker's thread.
//!
//! Lifecycle methods take `&mut self`, so overlapping pause/resume calls are
//! excluded by construction rather than left undefined.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use pacer::{PeriodicRunner, RunnerConfig};
//!
//! let mut runner = PeriodicRunner::spawn(
//!     RunnerConfig::new(Duration::from_millis(20)),
//!     || {
//!         // periodic work
//!         Ok(())
//!     },
//! )?;
//!
//! std::thread::sleep(Duration::from_millis(50));
//! runner.pause()?;
//! runner.resume()?;
//! runner.shutdown(); // interrupts the pending wait, joins the worker
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Caveat
//!
//! There is no mid-tick cancellation: once the routine begins executing it
//! runs to completion, and both `pause` and teardown wait for it. A routine
//! that hangs therefore hangs the worker and blocks both indefinitely.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;

use crate::gate::{ParkGate, WaitGate};
use crate::trace::debug;

mod worker;

use worker::Worker;

/// Error type a routine may return from a single tick.
pub type RoutineError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub(crate) type Routine = Box<dyn FnMut() -> Result<(), RoutineError> + Send + 'static>;
pub(crate) type ErrorHandler = Box<dyn FnMut(&TickError) + Send + 'static>;

/// Error spawning the runner.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// The worker thread could not be created.
    #[error("failed to spawn worker thread: {0}")]
    Thread(#[from] std::io::Error),
}

/// Invalid lifecycle transition requested by the controller.
///
/// Surfaced synchronously at the call site; the caller decides whether to
/// treat it as fatal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    /// `pause` was called while the runner was already paused.
    #[error("runner is already paused")]
    AlreadyPaused,
    /// `resume` was called while the runner was not paused.
    #[error("runner is not paused")]
    NotPaused,
}

/// Failure of one invocation of the periodic routine.
///
/// Delivered to the error handler; the worker always continues to the next
/// tick.
#[derive(Debug, Error)]
pub enum TickError {
    /// The routine returned an error.
    #[error("periodic routine failed: {0}")]
    Failed(#[source] RoutineError),
    /// The routine panicked; the payload is captured as a message where
    /// possible.
    #[error("panic in periodic routine: {0}")]
    Panicked(String),
}

/// Shared control flags, carried as the interrupt gate's payload so that
/// writes publish through the same exclusion the worker synchronizes on.
pub(crate) struct Control {
    pub(crate) period: Duration,
    pub(crate) catch_up: bool,
    pub(crate) exiting: bool,
    pub(crate) paused: bool,
    pub(crate) on_error: ErrorHandler,
}

/// Runner configuration (immutable after spawn, except where setters exist).
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Logical period between tick starts.
    pub period: Duration,
    /// Start ticking immediately, or stay paused until `resume`.
    pub auto_start: bool,
    /// Anchor each deadline to the previous one (`true`, preserves cadence
    /// over the long run) or to the actual finish time (`false`).
    pub catch_up: bool,
    /// Name given to the worker thread.
    pub thread_name: String,
}

impl RunnerConfig {
    /// Configuration with the given period and default policies.
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            auto_start: true,
            catch_up: true,
            thread_name: "pacer-worker".into(),
        }
    }
}

struct Core {
    interrupt: Arc<WaitGate<Control>>,
    pause: Arc<ParkGate>,
    worker: JoinHandle<()>,
}

/// Handle to a periodic worker thread.
///
/// Dropping the handle interrupts any pending wait, joins the worker, and
/// returns once the worker has exited - bounded by at most one in-progress
/// routine invocation, never by the period.
///
/// A default-constructed handle is inert: it has no routine and no thread,
/// and every operation is a no-op.
#[derive(Default)]
pub struct PeriodicRunner {
    core: Option<Core>,
}

impl PeriodicRunner {
    /// Spawns the worker thread and, unless `config.auto_start` is off,
    /// starts ticking. The first tick of a started runner fires immediately.
    ///
    /// Errors returned by `routine` (and panics raised by it) are forwarded
    /// to the error handler; see [`PeriodicRunner::set_error_handler`]. The
    /// default handler writes the error description to stderr.
    ///
    /// # Errors
    ///
    /// Returns [`SpawnError`] if the worker thread cannot be created.
    pub fn spawn<F>(config: RunnerConfig, routine: F) -> Result<Self, SpawnError>
    where
        F: FnMut() -> Result<(), RoutineError> + Send + 'static,
    {
        let paused = !config.auto_start;
        // While paused (or pending start) the interrupt gate is held open and
        // the pause gate closed; while running, the reverse.
        let interrupt = Arc::new(WaitGate::new(
            paused,
            Control {
                period: config.period,
                catch_up: config.catch_up,
                exiting: false,
                paused,
                on_error: Box::new(default_error_handler),
            },
        ));
        let pause = Arc::new(ParkGate::new(config.auto_start));

        let worker = Worker::new(Arc::clone(&interrupt), Arc::clone(&pause), Box::new(routine));
        let handle = thread::Builder::new()
            .name(config.thread_name)
            .spawn(move || worker.run())?;

        debug!(period_ms = config.period.as_millis() as u64, "runner spawned");
        Ok(Self {
            core: Some(Core {
                interrupt,
                pause,
                worker: handle,
            }),
        })
    }

    /// Pauses the runner; equivalent to [`PeriodicRunner::pause_with`] with
    /// `reset_time = true`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::AlreadyPaused`] if the runner is already paused.
    pub fn pause(&mut self) -> Result<(), StateError> {
        self.pause_with(true)
    }

    /// Signals the worker to stop after any in-flight tick and blocks until
    /// it has parked - never for the remainder of a timed wait.
    ///
    /// With `reset_time = true` the first post-resume tick is scheduled one
    /// full period after `resume`; with `false` the pre-pause deadline
    /// stands.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::AlreadyPaused`] if the runner is already paused.
    pub fn pause_with(&mut self, reset_time: bool) -> Result<(), StateError> {
        let Some(core) = &self.core else {
            return Ok(());
        };
        core.interrupt.with(|ctl| {
            if ctl.paused {
                return Err(StateError::AlreadyPaused);
            }
            ctl.paused = true;
            Ok(())
        })?;
        // Close the pause gate before raising the interrupt so the worker
        // cannot slip through a gate left open by an earlier resume. The
        // reset request travels with the gate and is delivered to the worker
        // at the wake that ends this paused episode.
        core.pause.close_with(reset_time);
        core.interrupt.open();
        core.pause.wait_parked();
        debug!("runner paused");
        Ok(())
    }

    /// Resumes a paused runner.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::NotPaused`] if the runner is not paused.
    pub fn resume(&mut self) -> Result<(), StateError> {
        let Some(core) = &self.core else {
            return Ok(());
        };
        core.interrupt.with(|ctl| {
            if !ctl.paused {
                return Err(StateError::NotPaused);
            }
            ctl.paused = false;
            Ok(())
        })?;
        // Re-arm the interrupt gate before releasing the worker.
        core.interrupt.close();
        core.pause.open();
        debug!("runner resumed");
        Ok(())
    }

    /// Updates the period. Takes effect from the next deadline computation; a
    /// wait already in progress completes using the period current when it
    /// began.
    pub fn set_period(&mut self, period: Duration) {
        if let Some(core) = &self.core {
            core.interrupt.with(|ctl| ctl.period = period);
        }
    }

    /// Toggles the catch-up policy for subsequent ticks.
    pub fn set_catch_up(&mut self, enabled: bool) {
        if let Some(core) = &self.core {
            core.interrupt.with(|ctl| ctl.catch_up = enabled);
        }
    }

    /// Replaces the error handler invoked when a tick fails.
    ///
    /// The replacement is serialized against worker dispatch through the
    /// gate's exclusion. The handler must not panic.
    pub fn set_error_handler<H>(&mut self, handler: H)
    where
        H: FnMut(&TickError) + Send + 'static,
    {
        if let Some(core) = &self.core {
            core.interrupt.with(|ctl| ctl.on_error = Box::new(handler));
        }
    }

    /// Explicit teardown; identical to dropping the handle.
    pub fn shutdown(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        let Some(core) = self.core.take() else {
            return;
        };
        core.interrupt.open_with(|ctl| ctl.exiting = true);
        core.pause.open();
        let _ = core.worker.join();
        debug!("worker joined");
    }
}

impl Drop for PeriodicRunner {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn default_error_handler(err: &TickError) {
    eprintln!("pacer: {err}");
}

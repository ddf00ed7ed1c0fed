//! Periodic worker thread with pause/resume and prompt shutdown.
//!
//! [`PeriodicRunner`] owns one dedicated thread that invokes a caller-supplied
//! routine at a fixed logical period. The controller never runs the routine
//! itself; it only flips gates that the worker observes:
//!
//! - the wait between ticks is a deadline-bounded block on a gate, not a
//!   sleep-and-check loop, so the worker consumes zero CPU while idle and
//!   reacts immediately to pause or shutdown;
//! - dropping the runner interrupts any pending wait and joins the worker,
//!   waiting only for an in-progress tick, never for the rest of the period;
//! - a failing tick is forwarded to a per-instance error handler and never
//!   terminates the worker or the process.

mod gate;
pub mod runner;
mod trace;

#[doc(inline)]
pub use runner::{
    PeriodicRunner, RoutineError, RunnerConfig, SpawnError, StateError, TickError,
};

pub use trace::init_tracing;

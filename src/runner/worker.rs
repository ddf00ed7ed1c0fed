//! Worker loop: the side of the runner that owns all timing decisions.
//!
//! The loop is a four-state machine. Waiting: a deadline-bounded block on the
//! interrupt gate. Running: executing the routine, not interruptible. Paused:
//! parked on the pause gate. Exited: terminal, the thread returns.
//!
//! A single `wait_open_until` covers both the non-blocking interrupt check
//! and the timed wait: the gate reports an already-open signal before it
//! looks at the deadline. A timeout is the normal case and means a tick is
//! due.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use minstant::Instant;

use crate::gate::{ParkGate, WaitGate};
use crate::trace::{debug, warn};

use super::{Control, Routine, TickError};

pub(crate) struct Worker {
    interrupt: Arc<WaitGate<Control>>,
    pause: Arc<ParkGate>,
    routine: Routine,
}

impl Worker {
    pub(crate) fn new(
        interrupt: Arc<WaitGate<Control>>,
        pause: Arc<ParkGate>,
        routine: Routine,
    ) -> Self {
        Self {
            interrupt,
            pause,
            routine,
        }
    }

    pub(crate) fn run(mut self) {
        debug!("worker loop started");
        // The baseline is the thread start, so a started runner fires its
        // first tick immediately.
        let mut deadline = Instant::now();
        loop {
            if self.interrupt.wait_open_until(deadline) {
                // Interrupted: shutdown or a pause request.
                if self.interrupt.with(|ctl| ctl.exiting) {
                    break;
                }
                debug!("worker parking");
                // The note carried by the pause gate is the reset request of
                // whichever pause initiated this paused episode.
                let reset = self.pause.park();
                if reset {
                    let period = self.interrupt.with(|ctl| ctl.period);
                    deadline = Instant::now() + period;
                }
                continue;
            }

            // Timed out: a tick is due.
            self.run_tick();

            // Period and policy are re-read here, so controller updates apply
            // from this computation onward, never retroactively.
            let (period, catch_up) = self.interrupt.with(|ctl| (ctl.period, ctl.catch_up));
            deadline = if catch_up {
                deadline + period
            } else {
                Instant::now() + period
            };
        }
        debug!("worker loop exited");
    }

    /// Guarded call site: a failing routine never unwinds past here and
    /// never terminates the loop.
    fn run_tick(&mut self) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (self.routine)()));
        let err = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(err)) => TickError::Failed(err),
            Err(payload) => TickError::Panicked(panic_message(payload.as_ref())),
        };
        warn!(error = %err, "tick failed");
        self.interrupt.with(|ctl| (ctl.on_error)(&err));
    }
}

/// Normalizes a panic payload into a printable message.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_owned()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown error in periodic routine".to_owned()
    }
}

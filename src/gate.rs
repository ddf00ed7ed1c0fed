//! Blocking gate primitives coordinating the controller and the worker.
//!
//! A gate is a binary signal, not a lock: the side that *releases* it never
//! holds data behind it, and the side that *waits* on it is waiting for
//! permission to change state, not for exclusive access.
//!
//! Two shapes are needed:
//!
//! - [`WaitGate`] - deadline-bounded wait, used to interrupt the worker's
//!   sleep between ticks. It carries a payload so that control flags ride the
//!   same mutex as the signal itself; observing the gate is then also the
//!   synchronization point for the flags.
//! - [`ParkGate`] - indefinite wait with a parked handshake, used to block
//!   the worker while paused and to let the controller wait until the worker
//!   has actually parked.
//!
//! Both gates recover from mutex poisoning: a panic in a user callback on one
//! thread must not wedge the other thread. Condition waits use `while` loops,
//! so spurious wakeups are harmless.

use std::sync::{Condvar, Mutex, MutexGuard};

use minstant::Instant;

struct WaitState<T> {
    open: bool,
    value: T,
}

/// Binary interruptible gate with a deadline-bounded wait.
///
/// Contract:
/// - [`WaitGate::open`] wakes a blocked waiter immediately, regardless of how
///   much of its deadline remains.
/// - A gate opened before a wait begins makes that wait succeed without
///   blocking.
pub(crate) struct WaitGate<T> {
    state: Mutex<WaitState<T>>,
    cond: Condvar,
}

impl<T> WaitGate<T> {
    pub(crate) fn new(open: bool, value: T) -> Self {
        Self {
            state: Mutex::new(WaitState { open, value }),
            cond: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, WaitState<T>> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Opens the gate and wakes any waiter.
    pub(crate) fn open(&self) {
        self.lock().open = true;
        self.cond.notify_all();
    }

    /// Mutates the payload, then opens the gate and wakes any waiter.
    ///
    /// The payload write and the signal are published atomically: a waiter
    /// that observes the open gate observes the mutation.
    pub(crate) fn open_with(&self, f: impl FnOnce(&mut T)) {
        let mut state = self.lock();
        f(&mut state.value);
        state.open = true;
        self.cond.notify_all();
    }

    /// Re-arms the gate.
    pub(crate) fn close(&self) {
        self.lock().open = false;
    }

    /// Blocks until the gate is open or `deadline` passes.
    ///
    /// Returns `true` if the gate is open, `false` on timeout. The open check
    /// precedes the deadline check, so a deadline already in the past still
    /// reports an already-open gate.
    pub(crate) fn wait_open_until(&self, deadline: Instant) -> bool {
        let mut state = self.lock();
        loop {
            if state.open {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            state = match self.cond.wait_timeout(state, deadline.duration_since(now)) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    /// Locks the payload for a read or update under the gate's exclusion.
    pub(crate) fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.lock().value)
    }
}

struct ParkState {
    open: bool,
    parked: bool,
    note: bool,
}

/// Indefinite-wait gate with a parked handshake.
///
/// The closer may attach a one-shot boolean note; the parked thread receives
/// it atomically at the wake that releases it, so a note can never be paired
/// with the wrong park/release episode.
pub(crate) struct ParkGate {
    state: Mutex<ParkState>,
    cond: Condvar,
}

impl ParkGate {
    pub(crate) fn new(open: bool) -> Self {
        Self {
            state: Mutex::new(ParkState {
                open,
                parked: false,
                note: false,
            }),
            cond: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ParkState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, ParkState>) -> MutexGuard<'a, ParkState> {
        match self.cond.wait(guard) {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Opens the gate, waking a parked waiter.
    pub(crate) fn open(&self) {
        self.lock().open = true;
        self.cond.notify_all();
    }

    /// Re-arms the gate so the next [`ParkGate::park`] blocks, recording the
    /// note to hand to the parked thread when it is next released.
    pub(crate) fn close_with(&self, note: bool) {
        let mut state = self.lock();
        state.open = false;
        state.note = note;
    }

    /// Marks the caller parked, blocks while the gate is closed, then clears
    /// the parked mark and takes the pending note before returning.
    ///
    /// Everything happens under a single lock hold, so a handshake waiter can
    /// never observe a stale parked mark after the caller has moved on, and
    /// the note is consumed by exactly the wake it was attached to.
    pub(crate) fn park(&self) -> bool {
        let mut state = self.lock();
        state.parked = true;
        self.cond.notify_all();
        while !state.open {
            state = self.wait(state);
        }
        state.parked = false;
        let note = state.note;
        state.note = false;
        note
    }

    /// Blocks until a [`ParkGate::park`] caller is parked.
    pub(crate) fn wait_parked(&self) {
        let mut state = self.lock();
        while !state.parked {
            state = self.wait(state);
        }
    }
}

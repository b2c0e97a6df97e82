//! Per-module state-change lock
//!
//! A timed, reentrant exclusive lock that also records which transitions are
//! in flight. Acquisition blocks up to a fixed timeout, then checks the
//! requested transition against the nesting table in [`crate::transition`].
//!
//! # Ownership
//!
//! The lock is owned by a thread. The owning thread may acquire it again for
//! a nested transition; every successful [`StateChangeLock::lock`] must be
//! paired with an [`StateChangeLock::unlock`] for the same event.

use crate::transition::can_nest;
use crate::LockError;
use modula_core::{EventSet, ModuleEvent};
use parking_lot::{Condvar, Mutex};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Default)]
struct LockState {
    owner: Option<ThreadId>,
    holds: usize,
    in_flight: EventSet,
}

/// Timed reentrant lock guarding a module's lifecycle transitions
#[derive(Debug)]
pub struct StateChangeLock {
    state: Mutex<LockState>,
    released: Condvar,
    timeout: Duration,
}

impl StateChangeLock {
    /// Create an unlocked lock with the given acquisition timeout
    pub fn new(timeout: Duration) -> Self {
        Self {
            state: Mutex::new(LockState::default()),
            released: Condvar::new(),
            timeout,
        }
    }

    /// Acquisition timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Acquire the lock for a transition
    ///
    /// Waits up to the configured timeout for another thread to release the
    /// lock. Once available, `event` must be allowed to nest inside the
    /// transitions this thread already has in flight; otherwise the lock is
    /// left exactly as it was.
    ///
    /// # Errors
    ///
    /// - [`LockError::Timeout`] if another thread kept the lock for the whole timeout
    /// - [`LockError::InvalidNesting`] if `event` may not nest inside the in-flight set
    pub fn lock(&self, event: ModuleEvent) -> Result<(), LockError> {
        let me = thread::current().id();
        let deadline = Instant::now() + self.timeout;
        let mut state = self.state.lock();

        loop {
            if state.owner.is_none() || state.owner == Some(me) {
                break;
            }
            if Instant::now() >= deadline {
                debug!(target: "modula::module", ?event, in_flight = ?state.in_flight, "State change lock timed out");
                return Err(LockError::Timeout(self.timeout));
            }
            self.released.wait_until(&mut state, deadline);
        }

        if !can_nest(state.in_flight, event) {
            return Err(LockError::InvalidNesting {
                requested: event,
                in_flight: state.in_flight,
            });
        }

        state.owner = Some(me);
        state.holds += 1;
        state.in_flight.insert(event);
        Ok(())
    }

    /// Release the lock for a transition
    ///
    /// # Errors
    ///
    /// [`LockError::NotOwner`] if the calling thread does not hold the lock
    /// for `event`. The lock is left untouched in that case.
    pub fn unlock(&self, event: ModuleEvent) -> Result<(), LockError> {
        let me = thread::current().id();
        let mut state = self.state.lock();

        if state.owner != Some(me) || !state.in_flight.contains(event) {
            return Err(LockError::NotOwner(event));
        }

        state.in_flight.remove(event);
        state.holds -= 1;
        if state.holds == 0 {
            state.owner = None;
            state.in_flight = EventSet::empty();
            drop(state);
            self.released.notify_one();
        }
        Ok(())
    }

    /// Transitions currently in flight
    pub fn in_flight(&self) -> EventSet {
        self.state.lock().in_flight
    }

    /// Whether the calling thread holds the lock
    pub fn is_held_by_current_thread(&self) -> bool {
        self.state.lock().owner == Some(thread::current().id())
    }
}

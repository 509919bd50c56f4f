// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::sync::{Arc, Condvar, Mutex};
use std::time::Instant;

/// Represents the current cancel state.
#[derive(PartialEq)]
enum CancelState {
    Untouched,
    Cancelled,
}

/// A cancel handle is shared with voices and the sequencer's step thread.
/// Teardown is part of the stop contract: whoever holds the handle must
/// observe a cancel promptly rather than relying on drop order.
#[derive(Clone)]
pub struct CancelHandle {
    /// Set once the underlying operation should stop.
    cancelled: Arc<Mutex<CancelState>>,
    /// Notifies blocked waiters of a cancel.
    condvar: Arc<Condvar>,
}

impl CancelHandle {
    /// Creates a new cancel handle.
    pub fn new() -> CancelHandle {
        CancelHandle {
            cancelled: Arc::new(Mutex::new(CancelState::Untouched)),
            condvar: Arc::new(Condvar::new()),
        }
    }

    /// Returns true if the operation has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.lock().expect("Error getting lock") == CancelState::Cancelled
    }

    /// Blocks until the handle is cancelled or the deadline passes.
    /// Returns true if the wait ended because of a cancel. The sequencer
    /// step thread uses this so a stop interrupts a pending step sleep
    /// instead of waiting the interval out.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let mut state = self.cancelled.lock().expect("Error getting lock");
        loop {
            if *state == CancelState::Cancelled {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (next, _timeout) = self
                .condvar
                .wait_timeout(state, deadline - now)
                .expect("Error getting lock");
            state = next;
        }
    }

    /// Cancel the operation.
    pub fn cancel(&self) {
        let mut cancel_state = self.cancelled.lock().expect("Error getting lock");
        if *cancel_state == CancelState::Untouched {
            *cancel_state = CancelState::Cancelled;
            self.condvar.notify_all();
        }
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_cancel_handle_cancelled() {
        let cancel_handle = CancelHandle::new();
        assert!(!cancel_handle.is_cancelled());

        let join = {
            let cancel_handle = cancel_handle.clone();
            thread::spawn(move || {
                cancel_handle.wait_until(Instant::now() + Duration::from_secs(30))
            })
        };

        cancel_handle.cancel();
        assert!(join.join().expect("join failed"));
        assert!(cancel_handle.is_cancelled());
    }

    #[test]
    fn test_wait_until_deadline_elapses() {
        let cancel_handle = CancelHandle::new();
        let deadline = Instant::now() + Duration::from_millis(20);

        assert!(!cancel_handle.wait_until(deadline));
        assert!(Instant::now() >= deadline);
        assert!(!cancel_handle.is_cancelled());
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let cancel_handle = CancelHandle::new();
        cancel_handle.cancel();
        cancel_handle.cancel();
        assert!(cancel_handle.is_cancelled());
    }
}

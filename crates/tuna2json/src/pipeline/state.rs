//! State — pipeline shutdown state machine.
//!
//! ```text
//! Running -> Draining -> Flushing -> Terminated
//!    \          |           |
//!     +---------+-----------+--> Cancelled
//! ```

use std::sync::atomic::{AtomicU8, Ordering};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ShutdownState {
    /// All stages active.
    Running = 0,
    /// Work queue closed; workers finishing in-flight lines.
    Draining = 1,
    /// Workers exited; output queue closed; sink flushing.
    Flushing = 2,
    /// Sink exited after draining everything.
    Terminated = 3,
    /// Fatal output error; queued items are discarded.
    Cancelled = 4,
}

impl ShutdownState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShutdownState::Running => "running",
            ShutdownState::Draining => "draining",
            ShutdownState::Flushing => "flushing",
            ShutdownState::Terminated => "terminated",
            ShutdownState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ShutdownState::Terminated | ShutdownState::Cancelled)
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => ShutdownState::Running,
            1 => ShutdownState::Draining,
            2 => ShutdownState::Flushing,
            3 => ShutdownState::Terminated,
            _ => ShutdownState::Cancelled,
        }
    }

    fn can_move_to(self, next: ShutdownState) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == ShutdownState::Cancelled || next as u8 == self as u8 + 1
    }
}

#[derive(Debug)]
pub struct ShutdownTracker {
    state: AtomicU8,
}

impl Default for ShutdownTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownTracker {
    pub fn new() -> Self {
        Self { state: AtomicU8::new(ShutdownState::Running as u8) }
    }

    pub fn current(&self) -> ShutdownState {
        ShutdownState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move to `next` if it is a legal successor of the current state.
    /// Returns false when the transition was refused.
    pub fn advance(&self, next: ShutdownState) -> bool {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            let from = ShutdownState::from_u8(current);
            if !from.can_move_to(next) {
                return false;
            }
            match self.state.compare_exchange_weak(
                current,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    debug!(from = from.as_str(), to = next.as_str(), "pipeline state transition");
                    return true;
                }
                Err(actual) => current = actual,
            }
        }
    }
}

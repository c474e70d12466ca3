//! Logical thread lifecycle state

use core::fmt;

/// State of a logical thread
///
/// ```text
///            create
///              │
///              ▼
///   ┌──────► Ready ──────────┐ scheduled
///   │          ▲             ▼
///   │ unblock  │  yield   Running ──── exit ───► Zombie
///   │          └─────────────┤
///   │                        │ block
///   └────── Blocked ◄────────┘
/// ```
///
/// Exactly one thread is Running at a time. A Zombie keeps its stack until
/// the run loop reclaims it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Runnable, sitting in the ready queue
    Ready,

    /// Currently executing
    Running,

    /// Waiting for an explicit unblock
    Blocked,

    /// Finished, awaiting reclamation
    Zombie,
}

impl ThreadState {
    /// Check whether `self -> next` is a legal lifecycle transition
    pub const fn can_transition_to(&self, next: ThreadState) -> bool {
        matches!(
            (self, next),
            (ThreadState::Ready, ThreadState::Running)
                | (ThreadState::Running, ThreadState::Ready)
                | (ThreadState::Running, ThreadState::Blocked)
                | (ThreadState::Running, ThreadState::Zombie)
                | (ThreadState::Blocked, ThreadState::Ready)
        )
    }
}

impl fmt::Display for ThreadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadState::Ready => write!(f, "READY"),
            ThreadState::Running => write!(f, "RUNNING"),
            ThreadState::Blocked => write!(f, "BLOCKED"),
            ThreadState::Zombie => write!(f, "ZOMBIE"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(ThreadState::Blocked.to_string(), "BLOCKED");
    }

    #[test]
    fn test_legal_transitions() {
        use ThreadState::*;
        assert!(Ready.can_transition_to(Running));
        assert!(Running.can_transition_to(Ready));
        assert!(Running.can_transition_to(Blocked));
        assert!(Running.can_transition_to(Zombie));
        assert!(Blocked.can_transition_to(Ready));
    }

    #[test]
    fn test_illegal_transitions() {
        use ThreadState::*;
        assert!(!Ready.can_transition_to(Blocked));
        assert!(!Ready.can_transition_to(Zombie));
        assert!(!Blocked.can_transition_to(Running));
        assert!(!Zombie.can_transition_to(Ready));
        assert!(!Zombie.can_transition_to(Running));
        assert!(!Running.can_transition_to(Running));
    }
}

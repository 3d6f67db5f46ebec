//! Lifecycle states.
//!
//! # State Transitions
//! ```text
//! Idle → NotifierUp:              ensure_open() called
//! NotifierUp → NetworkRequested:  notification sink registered
//! NetworkRequested → NetworkUp:   network reports Connected
//! NetworkUp → ChannelOpen:        open_channel returns a non-zero handle
//! ChannelOpen → Closing:          close(), or network/channel dropped
//! Closing → Idle:                 channel, network, notifier released in that order
//! Closing → Faulted:              a handle failed to return to zero
//! ```

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LifecycleState {
    #[default]
    Idle,
    NotifierUp,
    NetworkRequested,
    NetworkUp,
    ChannelOpen,
    Closing,
    /// Terminal: a release failed and the handle table can no longer be trusted.
    Faulted,
}

impl LifecycleState {
    pub fn label(self) -> &'static str {
        match self {
            LifecycleState::Idle => "idle",
            LifecycleState::NotifierUp => "notifier_up",
            LifecycleState::NetworkRequested => "network_requested",
            LifecycleState::NetworkUp => "network_up",
            LifecycleState::ChannelOpen => "channel_open",
            LifecycleState::Closing => "closing",
            LifecycleState::Faulted => "faulted",
        }
    }

    /// Part-way through acquisition.
    pub fn is_acquiring(self) -> bool {
        matches!(
            self,
            LifecycleState::NotifierUp | LifecycleState::NetworkRequested | LifecycleState::NetworkUp
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquiring_states() {
        assert!(LifecycleState::NetworkRequested.is_acquiring());
        assert!(!LifecycleState::Idle.is_acquiring());
        assert!(!LifecycleState::ChannelOpen.is_acquiring());
        assert_eq!(LifecycleState::default(), LifecycleState::Idle);
    }
}

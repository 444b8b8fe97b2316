//! Live task status updates.
//!
//! A tracking session prefers the server-sent event stream for a task and
//! falls back to fixed-interval polling when the stream is unavailable,
//! ineligible or fails.

pub mod controller;
pub mod transport;

use std::fmt;

pub use controller::{LiveUpdateController, LiveUpdateHandler, LiveUpdateOptions};
pub use transport::{PushChannel, PushMessage, PushTransport, SseTransport, TransportError};

/// Controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LiveMode {
    #[default]
    Idle,
    Pushing,
    Pulling,
}

impl LiveMode {
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Idle)
    }

    /// Reported mode for an active state.
    pub fn tracking_mode(self) -> Option<TrackingMode> {
        match self {
            Self::Idle => None,
            Self::Pushing => Some(TrackingMode::Push),
            Self::Pulling => Some(TrackingMode::Pull),
        }
    }
}

/// Inputs that drive [`LiveMode`] transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveEvent {
    /// `start()` was called; `push_available` is true when the runtime has a
    /// push transport and the session is eligible for it.
    Start { push_available: bool },
    /// The push channel failed to open, errored or closed.
    ChannelError,
    Stop,
}

/// Mode-change notification delivered to handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingMode {
    /// Live over the event stream
    Push,
    /// Polling
    Pull,
}

impl fmt::Display for TrackingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Push => f.write_str("live"),
            Self::Pull => f.write_str("polling"),
        }
    }
}

/// Controller transition table.
pub fn transition(mode: LiveMode, event: LiveEvent) -> LiveMode {
    match (mode, event) {
        (_, LiveEvent::Stop) => LiveMode::Idle,
        (LiveMode::Idle, LiveEvent::Start { push_available: true }) => LiveMode::Pushing,
        (LiveMode::Idle, LiveEvent::Start { push_available: false }) => LiveMode::Pulling,
        (LiveMode::Pushing, LiveEvent::ChannelError) => LiveMode::Pulling,
        (mode, _) => mode,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_picks_mode_from_push_availability() {
        assert_eq!(
            transition(LiveMode::Idle, LiveEvent::Start { push_available: true }),
            LiveMode::Pushing
        );
        assert_eq!(
            transition(LiveMode::Idle, LiveEvent::Start { push_available: false }),
            LiveMode::Pulling
        );
    }

    #[test]
    fn start_while_active_is_noop() {
        assert_eq!(
            transition(LiveMode::Pulling, LiveEvent::Start { push_available: true }),
            LiveMode::Pulling
        );
        assert_eq!(
            transition(LiveMode::Pushing, LiveEvent::Start { push_available: false }),
            LiveMode::Pushing
        );
    }

    #[test]
    fn channel_error_only_affects_push_mode() {
        assert_eq!(
            transition(LiveMode::Pushing, LiveEvent::ChannelError),
            LiveMode::Pulling
        );
        assert_eq!(
            transition(LiveMode::Pulling, LiveEvent::ChannelError),
            LiveMode::Pulling
        );
        assert_eq!(transition(LiveMode::Idle, LiveEvent::ChannelError), LiveMode::Idle);
    }

    #[test]
    fn stop_always_returns_to_idle() {
        for mode in [LiveMode::Idle, LiveMode::Pushing, LiveMode::Pulling] {
            assert_eq!(transition(mode, LiveEvent::Stop), LiveMode::Idle);
        }
    }
}

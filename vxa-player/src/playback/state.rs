//! Stream lifecycle states

use std::fmt;

/// Lifecycle state of one stream
///
/// ```text
/// Opening ─> Paused <─> Playing ─> Finished
///              │  ▲        │          │
///              ▼  │        ▼          │
///             Seeking <────┴──────────┘
///
/// any ─> Closing ─> Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamState {
    /// Decoder and sink being set up
    Opening,
    /// Ready, sink not pulling
    Paused,
    Playing,
    /// Reposition in progress on the decode worker
    Seeking,
    /// All decoded data has been played; the handle stays valid
    Finished,
    /// Teardown in progress, commands are ignored
    Closing,
    /// Torn down and removed from the registry
    Closed,
}

impl StreamState {
    /// Whether control commands (play, pause, seek, volume) apply
    pub fn accepts_commands(self) -> bool {
        !matches!(self, Self::Opening | Self::Closing | Self::Closed)
    }

    pub fn is_closing(self) -> bool {
        matches!(self, Self::Closing | Self::Closed)
    }
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Opening => "opening",
            Self::Paused => "paused",
            Self::Playing => "playing",
            Self::Seeking => "seeking",
            Self::Finished => "finished",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_acceptance() {
        assert!(StreamState::Paused.accepts_commands());
        assert!(StreamState::Finished.accepts_commands());
        assert!(StreamState::Seeking.accepts_commands());
        assert!(!StreamState::Opening.accepts_commands());
        assert!(!StreamState::Closing.accepts_commands());
        assert!(!StreamState::Closed.accepts_commands());
    }

    #[test]
    fn test_display() {
        assert_eq!(StreamState::Playing.to_string(), "playing");
        assert_eq!(StreamState::Closed.to_string(), "closed");
    }
}

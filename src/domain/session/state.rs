//! Recording session state machine

use std::fmt;
use thiserror::Error;

/// Recording session states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Configuring,
    Capturing,
    Stopping,
    Closed,
}

impl SessionState {
    /// Get the string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Configuring => "configuring",
            Self::Capturing => "capturing",
            Self::Stopping => "stopping",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error when an invalid state transition is attempted
#[derive(Debug, Clone, Error)]
#[error("Invalid state transition: cannot {action} while in {current_state} state")]
pub struct InvalidStateTransition {
    pub current_state: SessionState,
    pub action: String,
}

/// Recording session entity.
/// Single-use: once closed it never leaves the closed state.
///
/// State machine:
///   IDLE -> CONFIGURING (begin_configuring)
///   CONFIGURING -> CAPTURING (begin_capturing)
///   CONFIGURING -> CLOSED (abort)
///   CAPTURING -> STOPPING (begin_stopping)
///   CAPTURING -> CLOSED (abort)
///   STOPPING -> CLOSED (close)
#[derive(Debug, Default)]
pub struct RecordingSession {
    state: SessionState,
}

impl RecordingSession {
    /// Create a new session in idle state
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
        }
    }

    /// Get the current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_capturing(&self) -> bool {
        self.state == SessionState::Capturing
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    /// Transition from IDLE to CONFIGURING
    pub fn begin_configuring(&mut self) -> Result<(), InvalidStateTransition> {
        self.transition(SessionState::Idle, SessionState::Configuring, "configure")
    }

    /// Transition from CONFIGURING to CAPTURING
    pub fn begin_capturing(&mut self) -> Result<(), InvalidStateTransition> {
        self.transition(
            SessionState::Configuring,
            SessionState::Capturing,
            "start capturing",
        )
    }

    /// Transition from CAPTURING to STOPPING
    pub fn begin_stopping(&mut self) -> Result<(), InvalidStateTransition> {
        self.transition(SessionState::Capturing, SessionState::Stopping, "stop")
    }

    /// Transition from STOPPING to CLOSED
    pub fn close(&mut self) -> Result<(), InvalidStateTransition> {
        self.transition(SessionState::Stopping, SessionState::Closed, "close")
    }

    /// Transition from CONFIGURING or CAPTURING straight to CLOSED
    pub fn abort(&mut self) -> Result<(), InvalidStateTransition> {
        match self.state {
            SessionState::Configuring | SessionState::Capturing => {
                self.state = SessionState::Closed;
                Ok(())
            }
            current_state => Err(InvalidStateTransition {
                current_state,
                action: "abort".to_string(),
            }),
        }
    }

    fn transition(
        &mut self,
        from: SessionState,
        to: SessionState,
        action: &str,
    ) -> Result<(), InvalidStateTransition> {
        if self.state != from {
            return Err(InvalidStateTransition {
                current_state: self.state,
                action: action.to_string(),
            });
        }
        self.state = to;
        Ok(())
    }
}

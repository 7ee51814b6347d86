//! Recording pipeline errors

use std::fmt::Display;
use thiserror::Error;

use crate::domain::session::InvalidStateTransition;

/// Broad class of a pipeline failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Device, format, session, buffer, or file creation failed
    Setup,
    /// Appending packets to the output failed
    Write,
    /// Handing a drained buffer back to capture failed
    Resubmit,
    /// Stopping capture or finalizing the output failed
    Stop,
    /// The pipeline was driven out of order
    InvalidState,
}

/// Errors from the recording pipeline.
///
/// Each variant names the collaborator call that failed.
#[derive(Debug, Clone, Error)]
pub enum RecorderError {
    #[error("{operation} failed: {message}")]
    Setup {
        operation: &'static str,
        message: String,
    },

    #[error("{operation} failed: {message}")]
    Write {
        operation: &'static str,
        message: String,
    },

    #[error("{operation} failed: {message}")]
    Resubmit {
        operation: &'static str,
        message: String,
    },

    #[error("{operation} failed: {message}")]
    Stop {
        operation: &'static str,
        message: String,
    },

    #[error(transparent)]
    InvalidState(#[from] InvalidStateTransition),
}

impl RecorderError {
    /// Error mapper for a setup call, for use with `map_err`
    pub fn setup<E: Display>(operation: &'static str) -> impl FnOnce(E) -> Self {
        move |e| Self::Setup {
            operation,
            message: e.to_string(),
        }
    }

    /// Error mapper for a write call
    pub fn write<E: Display>(operation: &'static str) -> impl FnOnce(E) -> Self {
        move |e| Self::Write {
            operation,
            message: e.to_string(),
        }
    }

    /// Error mapper for a resubmission call
    pub fn resubmit<E: Display>(operation: &'static str) -> impl FnOnce(E) -> Self {
        move |e| Self::Resubmit {
            operation,
            message: e.to_string(),
        }
    }

    /// Error mapper for a stop or finalize call
    pub fn stop<E: Display>(operation: &'static str) -> impl FnOnce(E) -> Self {
        move |e| Self::Stop {
            operation,
            message: e.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Setup { .. } => ErrorKind::Setup,
            Self::Write { .. } => ErrorKind::Write,
            Self::Resubmit { .. } => ErrorKind::Resubmit,
            Self::Stop { .. } => ErrorKind::Stop,
            Self::InvalidState(_) => ErrorKind::InvalidState,
        }
    }

    /// Name of the failing operation, if any
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            Self::Setup { operation, .. }
            | Self::Write { operation, .. }
            | Self::Resubmit { operation, .. }
            | Self::Stop { operation, .. } => Some(*operation),
            Self::InvalidState(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::SessionState;

    #[test]
    fn mapper_keeps_operation_and_message() {
        let err = Err::<(), _>("device unplugged")
            .map_err(RecorderError::setup("create capture session"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Setup);
        assert_eq!(err.operation(), Some("create capture session"));
        assert_eq!(
            err.to_string(),
            "create capture session failed: device unplugged"
        );
    }

    #[test]
    fn kinds_are_distinct() {
        assert_eq!(RecorderError::write::<&str>("w")("x").kind(), ErrorKind::Write);
        assert_eq!(RecorderError::resubmit::<&str>("r")("x").kind(), ErrorKind::Resubmit);
        assert_eq!(RecorderError::stop::<&str>("s")("x").kind(), ErrorKind::Stop);
    }

    #[test]
    fn invalid_state_has_no_operation() {
        let err = RecorderError::from(InvalidStateTransition {
            current_state: SessionState::Closed,
            action: "stop".to_string(),
        });
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert!(err.operation().is_none());
    }
}

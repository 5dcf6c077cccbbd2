use dotrelay_domain::DomainError;
use std::fmt;

/// Lifecycle of a [`super::UdpFrontEnd`]. Only forward, single-step moves
/// are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontEndState {
    Created,
    Running,
    ReadStopped,
    WriteStopped,
}

impl FrontEndState {
    pub fn as_str(self) -> &'static str {
        match self {
            FrontEndState::Created => "created",
            FrontEndState::Running => "running",
            FrontEndState::ReadStopped => "read-stopped",
            FrontEndState::WriteStopped => "write-stopped",
        }
    }

    fn next(self) -> Option<FrontEndState> {
        match self {
            FrontEndState::Created => Some(FrontEndState::Running),
            FrontEndState::Running => Some(FrontEndState::ReadStopped),
            FrontEndState::ReadStopped => Some(FrontEndState::WriteStopped),
            FrontEndState::WriteStopped => None,
        }
    }

    pub fn transition(&mut self, to: FrontEndState) -> Result<(), DomainError> {
        if self.next() != Some(to) {
            return Err(DomainError::InvalidStateTransition {
                from: self.as_str(),
                to: to.as_str(),
            });
        }
        *self = to;
        Ok(())
    }
}

impl fmt::Display for FrontEndState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_lifecycle() {
        let mut state = FrontEndState::Created;
        state.transition(FrontEndState::Running).unwrap();
        state.transition(FrontEndState::ReadStopped).unwrap();
        state.transition(FrontEndState::WriteStopped).unwrap();
        assert_eq!(state, FrontEndState::WriteStopped);
    }

    #[test]
    fn test_skipping_a_phase_is_rejected() {
        let mut state = FrontEndState::Running;
        let err = state.transition(FrontEndState::WriteStopped).unwrap_err();
        assert!(matches!(
            err,
            DomainError::InvalidStateTransition {
                from: "running",
                to: "write-stopped"
            }
        ));
        assert_eq!(state, FrontEndState::Running);
    }

    #[test]
    fn test_no_transition_after_write_stopped() {
        let mut state = FrontEndState::WriteStopped;
        assert!(state.transition(FrontEndState::Running).is_err());
        assert!(state.transition(FrontEndState::WriteStopped).is_err());
    }
}

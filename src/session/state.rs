//! Session lifecycle state.

/// Lifecycle of a session as seen by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Created, no worker thread yet.
    #[default]
    Created,
    /// A worker thread is bound and running commands.
    Running,
    /// The worker thread has finished.
    Finished,
}

impl SessionState {
    /// Check if transition to target state is valid.
    ///
    /// Valid transitions:
    /// - Created -> Running
    /// - Created -> Finished (session discarded before it ran)
    /// - Running -> Finished
    pub fn can_transition_to(&self, target: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (*self, target),
            (Created, Running) | (Created, Finished) | (Running, Finished)
        )
    }

    /// Attempt to transition to a new state.
    pub fn transition_to(&mut self, target: SessionState) -> crate::Result<()> {
        if self.can_transition_to(target) {
            *self = target;
            Ok(())
        } else {
            Err(crate::error::ShellContextError::InvalidStateTransition {
                from: *self,
                to: target,
            })
        }
    }

    /// Check if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        let mut state = SessionState::Created;
        assert!(state.transition_to(SessionState::Running).is_ok());
        assert!(state.transition_to(SessionState::Finished).is_ok());
        assert!(state.is_terminal());
    }

    #[test]
    fn test_created_can_finish_directly() {
        let mut state = SessionState::default();
        assert!(state.transition_to(SessionState::Finished).is_ok());
    }

    #[test]
    fn test_no_restart() {
        let mut state = SessionState::Finished;
        assert!(state.transition_to(SessionState::Running).is_err());
        assert_eq!(state, SessionState::Finished);

        let mut running = SessionState::Running;
        assert!(running.transition_to(SessionState::Running).is_err());
        assert!(running.transition_to(SessionState::Created).is_err());
    }
}

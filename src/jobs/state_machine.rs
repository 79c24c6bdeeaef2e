use thiserror::Error;

use crate::models::ReviewStatus;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition {
        from: ReviewStatus,
        to: ReviewStatus,
    },

    #[error("Progress can only be reported while running (status is {status})")]
    NotRunning { status: ReviewStatus },

    #[error("Follow-up is only available for completed reviews (status is {status})")]
    NotCompleted { status: ReviewStatus },
}

pub struct JobStateMachine;

impl JobStateMachine {
    pub fn validate_transition(
        from: ReviewStatus,
        to: ReviewStatus,
    ) -> Result<(), TransitionError> {
        if Self::allowed_transitions(from).contains(&to) {
            Ok(())
        } else {
            Err(TransitionError::InvalidTransition { from, to })
        }
    }

    fn allowed_transitions(from: ReviewStatus) -> &'static [ReviewStatus] {
        match from {
            ReviewStatus::Pending => &[ReviewStatus::Running],
            ReviewStatus::Running => &[ReviewStatus::Completed, ReviewStatus::Failed],
            ReviewStatus::Completed | ReviewStatus::Failed => &[],
        }
    }

    pub fn can_transition(from: ReviewStatus, to: ReviewStatus) -> bool {
        Self::validate_transition(from, to).is_ok()
    }
}

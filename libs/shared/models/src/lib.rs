pub mod error;
pub mod scheduling;

pub use error::{AppError, SchedulingError, SchedulingResult, Unavailable};
pub use scheduling::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_spellings_fold_to_canonical() {
        assert_eq!(QueueStatus::normalize("no show").unwrap(), QueueStatus::NoShow);
        assert_eq!(QueueStatus::normalize("No_Show").unwrap(), QueueStatus::NoShow);
        assert_eq!(QueueStatus::normalize("in progress").unwrap(), QueueStatus::InConsultation);
        assert_eq!(QueueStatus::normalize("in consultation").unwrap(), QueueStatus::InConsultation);
        assert_eq!(QueueStatus::normalize("done").unwrap(), QueueStatus::Completed);
        assert_eq!(QueueStatus::normalize("").unwrap(), QueueStatus::Waiting);
        assert_eq!(QueueStatus::normalize("   ").unwrap(), QueueStatus::Waiting);
    }

    #[test]
    fn test_unknown_status_is_invalid_input() {
        let err = QueueStatus::normalize("teleported").unwrap_err();
        assert!(matches!(err, SchedulingError::InvalidInput(_)));
    }

    #[test]
    fn test_status_serde_accepts_legacy_spellings() {
        let status: QueueStatus = serde_json::from_str("\"in_progress\"").unwrap();
        assert_eq!(status, QueueStatus::InConsultation);
        assert_eq!(serde_json::to_string(&QueueStatus::NoShow).unwrap(), "\"no_show\"");
    }

    #[test]
    fn test_urgent_ranks_before_normal() {
        assert!(QueuePriority::Urgent.rank() < QueuePriority::Normal.rank());
    }
}

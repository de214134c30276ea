use super::types::StageStatus;

/// New flag value given whether the stage's artifact exists.
///
/// Demotes a completed flag whose artifact is gone; never promotes.
pub fn reconcile_flag(current: StageStatus, artifact_exists: bool) -> StageStatus {
    match (current, artifact_exists) {
        (StageStatus::Completed, false) => StageStatus::Pending,
        (status, _) => status,
    }
}

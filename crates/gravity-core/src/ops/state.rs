// ── Operation to cluster state transitions ──
//
// Three tables give the cluster state an operation drives when it starts,
// succeeds and fails. A type missing from a table leaves the cluster state
// unchanged at that point of the lifecycle.

use crate::model::{OperationState, OperationType, SiteState};

/// Cluster state while an operation of the given type runs.
pub const OPERATION_STARTED_TO_CLUSTER_STATE: &[(OperationType, SiteState)] = &[
    (OperationType::Install, SiteState::Installing),
    (OperationType::Expand, SiteState::Expanding),
    (OperationType::Shrink, SiteState::Shrinking),
    (OperationType::Update, SiteState::Updating),
    (OperationType::Uninstall, SiteState::Uninstalling),
    (OperationType::GarbageCollect, SiteState::CollectingGarbage),
    (OperationType::UpdateEnviron, SiteState::UpdatingClusterEnvars),
    (OperationType::UpdateConfig, SiteState::UpdatingClusterConfig),
    (OperationType::Reconfigure, SiteState::Reconfiguring),
];

/// Cluster state once an operation completes.
///
/// Uninstall has no entry: the cluster record goes away with it.
pub const OPERATION_SUCCEEDED_TO_CLUSTER_STATE: &[(OperationType, SiteState)] = &[
    (OperationType::Install, SiteState::Active),
    (OperationType::Expand, SiteState::Active),
    (OperationType::Shrink, SiteState::Active),
    (OperationType::Update, SiteState::Active),
    (OperationType::GarbageCollect, SiteState::Active),
    (OperationType::UpdateEnviron, SiteState::Active),
    (OperationType::UpdateConfig, SiteState::Active),
    (OperationType::Reconfigure, SiteState::Active),
];

/// Cluster state once an operation fails.
///
/// Update and shrink are absent: the cluster keeps its in-progress state
/// until the operation is rolled back or resumed.
pub const OPERATION_FAILED_TO_CLUSTER_STATE: &[(OperationType, SiteState)] = &[
    (OperationType::Install, SiteState::Failed),
    (OperationType::Expand, SiteState::Active),
    (OperationType::Uninstall, SiteState::Failed),
    (OperationType::GarbageCollect, SiteState::Active),
    (OperationType::UpdateEnviron, SiteState::Active),
    (OperationType::UpdateConfig, SiteState::Active),
    (OperationType::Reconfigure, SiteState::Failed),
];

fn lookup(table: &[(OperationType, SiteState)], op_type: OperationType) -> Option<SiteState> {
    table
        .iter()
        .find(|(t, _)| *t == op_type)
        .map(|(_, state)| *state)
}

pub fn started_cluster_state(op_type: OperationType) -> Option<SiteState> {
    lookup(OPERATION_STARTED_TO_CLUSTER_STATE, op_type)
}

pub fn succeeded_cluster_state(op_type: OperationType) -> Option<SiteState> {
    lookup(OPERATION_SUCCEEDED_TO_CLUSTER_STATE, op_type)
}

pub fn failed_cluster_state(op_type: OperationType) -> Option<SiteState> {
    lookup(OPERATION_FAILED_TO_CLUSTER_STATE, op_type)
}

/// Cluster state after an operation enters `state`, if it changes.
pub fn cluster_state_for(op_type: OperationType, state: OperationState) -> Option<SiteState> {
    match state {
        OperationState::Completed => succeeded_cluster_state(op_type),
        OperationState::Failed => failed_cluster_state(op_type),
        _ => None,
    }
}

/// State a newly created operation starts in.
pub fn initial_operation_state(op_type: OperationType) -> OperationState {
    match op_type {
        OperationType::Install => OperationState::InstallInitiated,
        OperationType::Expand => OperationState::ExpandInitiated,
        OperationType::Shrink => OperationState::ShrinkInProgress,
        OperationType::Update => OperationState::UpdateInProgress,
        OperationType::Uninstall => OperationState::UninstallInProgress,
        OperationType::GarbageCollect => OperationState::GarbageCollectInProgress,
        OperationType::UpdateEnviron => OperationState::UpdateEnvironInProgress,
        OperationType::UpdateConfig => OperationState::UpdateConfigInProgress,
        OperationType::Reconfigure => OperationState::ReconfigureInProgress,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn failed_expand_keeps_cluster_active() {
        assert_eq!(
            failed_cluster_state(OperationType::Expand),
            Some(SiteState::Active)
        );
        assert_eq!(
            failed_cluster_state(OperationType::Install),
            Some(SiteState::Failed)
        );
    }

    #[test]
    fn failed_update_leaves_state_unchanged() {
        assert_eq!(failed_cluster_state(OperationType::Update), None);
        assert_eq!(failed_cluster_state(OperationType::Shrink), None);
    }

    #[test]
    fn every_type_has_a_started_state() {
        for op_type in OperationType::iter() {
            assert!(
                started_cluster_state(op_type).is_some(),
                "{op_type} has no started state"
            );
        }
    }

    #[test]
    fn in_progress_states_do_not_move_cluster() {
        assert_eq!(
            cluster_state_for(OperationType::Install, OperationState::InstallDeploying),
            None
        );
        assert_eq!(
            cluster_state_for(OperationType::Install, OperationState::Completed),
            Some(SiteState::Active)
        );
    }
}

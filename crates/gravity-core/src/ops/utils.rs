// ── Operation helpers ──
//
// Lookups rely on the backend returning operations newest first: the
// "last" operation is index 0 and nothing here re-sorts.

use tracing::info;

use crate::error::{CoreError, Result};
use crate::model::{
    OperationState, OperationType, ProgressEntry, ProgressState, SiteKey, SiteOperation,
    SiteOperationKey,
};
use crate::operator::{ActivateSiteRequest, Operator, SetOperationStateRequest};
use crate::ops::filter::OperationsFilter;

/// Message of a failed operation when the caller gives none.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Operation failure";

const FAILURE_PREFIX: &str = "Operation failure: ";

const COMPLETED_MESSAGE: &str = "Operation has completed";

/// Newest operation of the cluster.
pub async fn get_last_operation(operator: &dyn Operator, key: &SiteKey) -> Result<SiteOperation> {
    let ops = operator
        .get_site_operations(key, &OperationsFilter::default())
        .await?;
    ops.into_iter()
        .next()
        .ok_or_else(|| CoreError::not_found("operation", format!("no operations for {key}")))
}

/// Newest finished (completed or failed) operation.
pub async fn get_last_finished_operation(
    operator: &dyn Operator,
    key: &SiteKey,
) -> Result<SiteOperation> {
    match_operation(operator, key, SiteOperation::is_finished).await
}

/// Newest operation matching `predicate`.
pub async fn match_operation<F>(
    operator: &dyn Operator,
    key: &SiteKey,
    predicate: F,
) -> Result<SiteOperation>
where
    F: Fn(&SiteOperation) -> bool + Send,
{
    let ops = operator
        .get_site_operations(key, &OperationsFilter::default())
        .await?;
    ops.into_iter()
        .find(|op| predicate(op))
        .ok_or_else(|| CoreError::not_found("operation", format!("no matching operation for {key}")))
}

/// All unfinished operations, newest first.
pub async fn get_active_operations(
    operator: &dyn Operator,
    key: &SiteKey,
) -> Result<Vec<SiteOperation>> {
    let filter = OperationsFilter {
        active: true,
        ..Default::default()
    };
    operator.get_site_operations(key, &filter).await
}

/// The newest unfinished operation.
pub async fn get_active_operation(operator: &dyn Operator, key: &SiteKey) -> Result<SiteOperation> {
    get_active_operations(operator, key)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| CoreError::not_found("operation", format!("no active operations for {key}")))
}

/// The install operation, provided it completed.
pub async fn get_completed_install_operation(
    operator: &dyn Operator,
    key: &SiteKey,
) -> Result<SiteOperation> {
    let filter = OperationsFilter {
        types: vec![OperationType::Install],
        complete: true,
        ..Default::default()
    };
    operator
        .get_site_operations(key, &filter)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| CoreError::not_found("operation", format!("no completed install for {key}")))
}

/// Active operations, taken from a newest-first slice.
pub fn active_operations(ops: &[SiteOperation]) -> Vec<&SiteOperation> {
    ops.iter().filter(|op| !op.is_finished()).collect()
}

/// Mark the operation completed with a terminal progress entry.
pub async fn complete_operation(operator: &dyn Operator, key: &SiteOperationKey) -> Result<()> {
    info!(operation = %key, "Completing operation");
    operator
        .set_operation_state(
            key,
            SetOperationStateRequest {
                state: OperationState::Completed,
                progress: Some(ProgressEntry::terminal(
                    key,
                    ProgressState::Completed,
                    COMPLETED_MESSAGE,
                )),
            },
        )
        .await
}

/// Terminal progress message for a failure. Never empty.
pub fn failure_message(message: &str) -> String {
    if message.is_empty() {
        DEFAULT_FAILURE_MESSAGE.to_owned()
    } else {
        format!("{FAILURE_PREFIX}{message}")
    }
}

/// Mark the operation failed with a terminal progress entry.
pub async fn fail_operation(
    operator: &dyn Operator,
    key: &SiteOperationKey,
    message: &str,
) -> Result<()> {
    info!(operation = %key, message, "Failing operation");
    operator
        .set_operation_state(
            key,
            SetOperationStateRequest {
                state: OperationState::Failed,
                progress: Some(ProgressEntry::terminal(
                    key,
                    ProgressState::Failed,
                    failure_message(message),
                )),
            },
        )
        .await
}

/// Fail the operation, then make the cluster active again whatever the
/// failure was.
pub async fn fail_operation_and_reset_cluster(
    operator: &dyn Operator,
    key: &SiteOperationKey,
    message: &str,
) -> Result<()> {
    fail_operation(operator, key, message).await?;
    operator
        .activate_site(ActivateSiteRequest {
            key: key.site_key(),
        })
        .await
}

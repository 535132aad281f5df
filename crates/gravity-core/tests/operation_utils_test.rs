// Operation helpers in `ops::utils` driven through a real `OperatorService`.
#![allow(clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::sync::Arc;

use pretty_assertions::assert_eq;

use gravity_core::model::{COMPLETED, FINAL_STEP, Manifest, NodeProfile, ServerProfileRequest};
use gravity_core::operator::{
    Accounts, CreateSiteExpandOperationRequest, CreateSiteInstallOperationRequest, Install,
    Operations, Sites,
};
use gravity_core::ops::utils::{
    complete_operation, fail_operation_and_reset_cluster, get_active_operation,
    get_last_finished_operation, get_last_operation,
};
use gravity_core::{
    Application, IdentityService, Locator, MemoryBackend, MemoryCatalog, NewAccount, NewSite,
    OperationState, OperationType, OperatorService, ProgressState, SiteKey, SiteOperationKey,
    SiteState,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn package() -> Locator {
    Locator::new("gravitational.io", "telekube", "5.5.0")
}

async fn setup() -> (OperatorService, SiteKey) {
    let catalog = MemoryCatalog::new();
    catalog.add(Application {
        package: package(),
        manifest: Manifest {
            profiles: vec![NodeProfile {
                name: "master".into(),
                description: String::new(),
                requirements: Default::default(),
            }],
            ..Default::default()
        },
    });
    let service = OperatorService::new(
        Arc::new(MemoryBackend::new()),
        Arc::new(IdentityService::new()),
        Arc::new(catalog),
    );
    let account = service
        .create_account(NewAccount {
            id: None,
            org: "example.com".into(),
        })
        .await
        .unwrap();
    let site = service
        .create_site(NewSite::new(&account.id, "example.com", package()))
        .await
        .unwrap();
    (service, site.key())
}

async fn started_install(service: &OperatorService, key: &SiteKey) -> SiteOperationKey {
    let op_key = service
        .create_site_install_operation(CreateSiteInstallOperationRequest::new(key.clone()))
        .await
        .unwrap();
    service.site_install_operation_start(&op_key).await.unwrap();
    op_key
}

// ── Completion ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_complete_operation_writes_final_progress() {
    let (service, key) = setup().await;
    let op_key = started_install(&service, &key).await;

    complete_operation(&service, &op_key).await.unwrap();

    let op = service.get_site_operation(&op_key).await.unwrap();
    assert_eq!(op.state, OperationState::Completed);
    let progress = service.get_site_operation_progress(&op_key).await.unwrap();
    assert_eq!(progress.state, ProgressState::Completed);
    assert_eq!(progress.completion, COMPLETED);
    assert_eq!(progress.step, FINAL_STEP);
    assert_eq!(progress.message, "Operation has completed");
    assert_eq!(service.get_site(&key).await.unwrap().state, SiteState::Active);
}

#[tokio::test]
async fn test_failed_install_resets_cluster_to_active() {
    let (service, key) = setup().await;
    let op_key = started_install(&service, &key).await;

    fail_operation_and_reset_cluster(&service, &op_key, "disk full")
        .await
        .unwrap();

    let op = service.get_site_operation(&op_key).await.unwrap();
    assert_eq!(op.state, OperationState::Failed);
    let progress = service.get_site_operation_progress(&op_key).await.unwrap();
    assert_eq!(progress.state, ProgressState::Failed);
    assert_eq!(progress.completion, COMPLETED);
    assert_eq!(progress.message, "Operation failure: disk full");
    assert_eq!(service.get_site(&key).await.unwrap().state, SiteState::Active);
}

#[tokio::test]
async fn test_failure_without_message_uses_default() {
    let (service, key) = setup().await;
    let op_key = started_install(&service, &key).await;

    fail_operation_and_reset_cluster(&service, &op_key, "")
        .await
        .unwrap();

    let progress = service.get_site_operation_progress(&op_key).await.unwrap();
    assert_eq!(progress.message, "Operation failure");
    assert_eq!(service.get_site(&key).await.unwrap().state, SiteState::Active);
}

#[tokio::test]
async fn test_finished_operation_cannot_be_completed_again() {
    let (service, key) = setup().await;
    let op_key = started_install(&service, &key).await;
    complete_operation(&service, &op_key).await.unwrap();

    let err = fail_operation_and_reset_cluster(&service, &op_key, "late")
        .await
        .unwrap_err();
    assert!(err.is_compare_failed());
    let op = service.get_site_operation(&op_key).await.unwrap();
    assert_eq!(op.state, OperationState::Completed);
}

// ── Lookups ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_last_operation_is_newest() {
    let (service, key) = setup().await;
    let install = started_install(&service, &key).await;
    complete_operation(&service, &install).await.unwrap();

    let expand = service
        .create_site_expand_operation(CreateSiteExpandOperationRequest {
            key: key.clone(),
            profiles: BTreeMap::from([(
                "master".to_owned(),
                ServerProfileRequest {
                    count: 1,
                    instance_type: None,
                },
            )]),
            created_by: String::new(),
        })
        .await
        .unwrap();

    let last = get_last_operation(&service, &key).await.unwrap();
    assert_eq!(last.id, expand.operation_id);
    assert_eq!(last.operation_type(), OperationType::Expand);

    let finished = get_last_finished_operation(&service, &key).await.unwrap();
    assert_eq!(finished.id, install.operation_id);

    let active = get_active_operation(&service, &key).await.unwrap();
    assert_eq!(active.id, expand.operation_id);
}

#[tokio::test]
async fn test_last_operation_of_empty_cluster_is_not_found() {
    let (service, key) = setup().await;

    let err = get_last_operation(&service, &key).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(get_active_operation(&service, &key)
        .await
        .unwrap_err()
        .is_not_found());
}

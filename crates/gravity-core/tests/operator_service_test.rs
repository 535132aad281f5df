// Lifecycle tests for `OperatorService` over the in-memory backend.
#![allow(clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use pretty_assertions::assert_eq;

use gravity_core::model::{
    EndpointSpec, Flavor, FlavorNode, LogEntry, LogForwarder, Manifest, NodeProfile,
    Requirements, ServerInfo, ServerInfos, ServerProfileRequest,
};
use gravity_core::operator::{
    Accounts, CreateClusterGarbageCollectOperationRequest, CreateSiteExpandOperationRequest,
    CreateSiteInstallOperationRequest, CreateSiteShrinkOperationRequest,
    CreateSiteUninstallOperationRequest, CreateUpdateEnvOperationRequest, Endpoints, Install,
    LogForwarders, OperationUpdateRequest, Operations, RuntimeEnvironment,
    SetOperationStateRequest, Sites, Status, Tokens, ValidateServersRequest, Validation,
};
use gravity_core::ops::checks::{BandwidthRequest, DiskRequest, PortsRequest, ValidateRequest};
use gravity_core::ops::{AgentService, Probe};
use gravity_core::users::Identity as _;
use gravity_core::{
    Application, IdentityService, Locator, MemoryBackend, MemoryCatalog, NewAccount, NewSite,
    OperationState, OperationType, OperationsFilter, OperatorService, ProgressEntry,
    ProgressState, Result, Server, SiteKey, SiteOperationKey, SiteState,
};

// ── Helpers ─────────────────────────────────────────────────────────

const DOMAIN: &str = "example.com";

fn package() -> Locator {
    Locator::new("gravitational.io", "telekube", "5.5.0")
}

fn app() -> Application {
    Application {
        package: package(),
        manifest: Manifest {
            profiles: vec![NodeProfile {
                name: "master".into(),
                description: "control plane".into(),
                requirements: Requirements::default(),
            }],
            flavors: vec![Flavor {
                name: "single".into(),
                nodes: vec![FlavorNode {
                    profile: "master".into(),
                    count: 1,
                }],
            }],
            endpoints: vec![EndpointSpec {
                name: "ui".into(),
                description: "cluster control panel".into(),
                port: 32009,
                scheme: "https".into(),
            }],
        },
    }
}

fn server(ip: &str, hostname: &str) -> Server {
    Server {
        advertise_ip: ip.into(),
        hostname: hostname.into(),
        role: "master".into(),
        cluster_role: Default::default(),
        instance_type: None,
    }
}

fn profiles(count: u32) -> BTreeMap<String, ServerProfileRequest> {
    BTreeMap::from([(
        "master".to_owned(),
        ServerProfileRequest {
            count,
            instance_type: None,
        },
    )])
}

fn service() -> OperatorService {
    let catalog = MemoryCatalog::new();
    catalog.add(app());
    OperatorService::new(
        Arc::new(MemoryBackend::new()),
        Arc::new(IdentityService::new()),
        Arc::new(catalog),
    )
}

/// Service with one account and one not-installed cluster.
async fn setup() -> (OperatorService, SiteKey) {
    seed(service()).await
}

async fn seed(service: OperatorService) -> (OperatorService, SiteKey) {
    let account = service
        .create_account(NewAccount {
            id: None,
            org: DOMAIN.into(),
        })
        .await
        .unwrap();
    let site = service
        .create_site(NewSite::new(&account.id, DOMAIN, package()))
        .await
        .unwrap();
    (service, site.key())
}

async fn set_state(service: &OperatorService, key: &SiteOperationKey, state: OperationState) {
    let progress = state
        .is_finished()
        .then(|| {
            let terminal = if state.is_completed() {
                ProgressState::Completed
            } else {
                ProgressState::Failed
            };
            ProgressEntry::terminal(key, terminal, format!("operation {state}"))
        });
    service
        .set_operation_state(key, SetOperationStateRequest { state, progress })
        .await
        .unwrap();
}

/// Answers for one reported server and records every call.
#[derive(Default)]
struct RecordingAgents {
    calls: Mutex<Vec<String>>,
}

impl RecordingAgents {
    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentService for RecordingAgents {
    async fn get_server_infos(&self, key: &SiteOperationKey) -> Result<ServerInfos> {
        self.record(format!("infos {}", key.operation_id));
        Ok(ServerInfos(vec![ServerInfo {
            hostname: "node-1".into(),
            advertise_addr: "10.0.0.1".into(),
            role: "master".into(),
            os: Default::default(),
            num_cpus: 4,
            memory_mb: 8192,
            volumes: Vec::new(),
        }]))
    }

    async fn exec(&self, _key: &SiteOperationKey, addr: &str, _args: &[String]) -> Result<Bytes> {
        self.record(format!("exec {addr}"));
        Ok(Bytes::new())
    }

    async fn check_ports(&self, _key: &SiteOperationKey, _req: PortsRequest) -> Result<Vec<Probe>> {
        self.record("ports".into());
        Ok(Vec::new())
    }

    async fn check_bandwidth(
        &self,
        _key: &SiteOperationKey,
        _req: BandwidthRequest,
    ) -> Result<Vec<Probe>> {
        self.record("bandwidth".into());
        Ok(Vec::new())
    }

    async fn check_disks(
        &self,
        _key: &SiteOperationKey,
        addr: &str,
        _req: DiskRequest,
    ) -> Result<Vec<Probe>> {
        self.record(format!("disks {addr}"));
        Ok(Vec::new())
    }

    async fn validate(
        &self,
        _key: &SiteOperationKey,
        addr: &str,
        req: ValidateRequest,
    ) -> Result<Vec<Probe>> {
        self.record(format!("validate {addr} {}", req.profile));
        Ok(vec![Probe::warning("kernel", "old kernel")])
    }

    async fn stop_agents(&self, _key: &SiteOperationKey) -> Result<()> {
        Ok(())
    }
}

/// Install the cluster on one node and return the install key.
async fn install(service: &OperatorService, key: &SiteKey) -> SiteOperationKey {
    let mut req = CreateSiteInstallOperationRequest::new(key.clone());
    req.profiles = profiles(1);
    req.flavor = Some("single".into());
    let op_key = service.create_site_install_operation(req).await.unwrap();

    service
        .update_install_operation_state(
            &op_key,
            OperationUpdateRequest {
                profiles: BTreeMap::new(),
                servers: vec![server("10.0.0.1", "node-1")],
            },
        )
        .await
        .unwrap();
    service.site_install_operation_start(&op_key).await.unwrap();
    set_state(service, &op_key, OperationState::Completed).await;
    op_key
}

// ── Clusters and install ────────────────────────────────────────────

#[tokio::test]
async fn test_new_cluster_is_not_installed() {
    let (service, key) = setup().await;

    let site = service.get_site(&key).await.unwrap();
    assert_eq!(site.state, SiteState::NotInstalled);
    assert_eq!(site.app.package, package());
    assert!(site.cluster_state.servers.is_empty());
}

#[tokio::test]
async fn test_install_operation_starts_installing() {
    let (service, key) = setup().await;

    let op_key = service
        .create_site_install_operation(CreateSiteInstallOperationRequest::new(key.clone()))
        .await
        .unwrap();

    let progress = service.get_site_operation_progress(&op_key).await.unwrap();
    assert_eq!(progress.state, ProgressState::InProgress);
    assert_eq!(progress.completion, 0);

    let op = service.get_site_operation(&op_key).await.unwrap();
    assert_eq!(op.operation_type(), OperationType::Install);
    assert_eq!(op.state, OperationState::InstallInitiated);

    let site = service.get_site(&key).await.unwrap();
    assert_eq!(site.state, SiteState::Installing);

    // The agents of the install get a provisioning token.
    let tokens = service
        .users()
        .get_site_provisioning_tokens(DOMAIN)
        .await
        .unwrap();
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].operation_id.as_deref(), Some(op_key.operation_id.as_str()));
}

#[tokio::test]
async fn test_install_twice_is_rejected() {
    let (service, key) = setup().await;
    service
        .create_site_install_operation(CreateSiteInstallOperationRequest::new(key.clone()))
        .await
        .unwrap();

    let err = service
        .create_site_install_operation(CreateSiteInstallOperationRequest::new(key))
        .await
        .unwrap_err();
    assert!(err.is_compare_failed());
}

#[tokio::test]
async fn test_install_with_unknown_flavor_is_rejected() {
    let (service, key) = setup().await;
    let mut req = CreateSiteInstallOperationRequest::new(key.clone());
    req.flavor = Some("ha".into());

    let err = service.create_site_install_operation(req).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(
        service.get_site(&key).await.unwrap().state,
        SiteState::NotInstalled
    );
}

#[tokio::test]
async fn test_completed_install_activates_cluster() {
    let (service, key) = setup().await;
    let op_key = install(&service, &key).await;

    let site = service.get_site(&key).await.unwrap();
    assert_eq!(site.state, SiteState::Active);
    assert_eq!(site.cluster_state.servers.len(), 1);
    assert_eq!(site.cluster_state.servers[0].hostname, "node-1");

    let progress = service.get_site_operation_progress(&op_key).await.unwrap();
    assert!(progress.is_completed());

    let nodes = service.get_cluster_nodes(&key).await.unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].profile, "master");

    let endpoints = service.get_application_endpoints(&key).await.unwrap();
    assert_eq!(endpoints[0].addresses, ["https://10.0.0.1:32009"]);
}

#[tokio::test]
async fn test_finished_operation_cannot_change_state() {
    let (service, key) = setup().await;
    let op_key = install(&service, &key).await;

    let err = service
        .set_operation_state(
            &op_key,
            SetOperationStateRequest {
                state: OperationState::Failed,
                progress: None,
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_compare_failed());
}

#[tokio::test]
async fn test_failed_install_fails_cluster() {
    let (service, key) = setup().await;
    let op_key = service
        .create_site_install_operation(CreateSiteInstallOperationRequest::new(key.clone()))
        .await
        .unwrap();

    set_state(&service, &op_key, OperationState::Failed).await;

    assert_eq!(service.get_site(&key).await.unwrap().state, SiteState::Failed);
}

#[tokio::test]
async fn test_deleting_unstarted_install_restores_cluster() {
    let (service, key) = setup().await;
    let op_key = service
        .create_site_install_operation(CreateSiteInstallOperationRequest::new(key.clone()))
        .await
        .unwrap();

    service.delete_site_operation(&op_key).await.unwrap();

    assert_eq!(
        service.get_site(&key).await.unwrap().state,
        SiteState::NotInstalled
    );
    assert!(service.get_site_operation(&op_key).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_started_operation_cannot_be_deleted() {
    let (service, key) = setup().await;
    let op_key = service
        .create_site_install_operation(CreateSiteInstallOperationRequest::new(key))
        .await
        .unwrap();
    service.site_install_operation_start(&op_key).await.unwrap();

    let err = service.delete_site_operation(&op_key).await.unwrap_err();
    assert!(err.is_compare_failed());
}

#[tokio::test]
async fn test_started_operation_cannot_rewind() {
    let (service, key) = setup().await;
    let op_key = service
        .create_site_install_operation(CreateSiteInstallOperationRequest::new(key))
        .await
        .unwrap();
    service.site_install_operation_start(&op_key).await.unwrap();
    set_state(&service, &op_key, OperationState::InstallDeploying).await;

    for state in [OperationState::InstallInitiated, OperationState::InstallPrechecks] {
        let err = service
            .set_operation_state(&op_key, SetOperationStateRequest { state, progress: None })
            .await
            .unwrap_err();
        assert!(err.is_compare_failed(), "{state}: {err}");
    }

    let op = service.get_site_operation(&op_key).await.unwrap();
    assert_eq!(op.state, OperationState::InstallDeploying);
    let err = service.delete_site_operation(&op_key).await.unwrap_err();
    assert!(err.is_compare_failed());
}

#[tokio::test]
async fn test_operation_rejects_state_of_other_type() {
    let (service, key) = setup().await;
    let op_key = service
        .create_site_install_operation(CreateSiteInstallOperationRequest::new(key.clone()))
        .await
        .unwrap();

    let err = service
        .set_operation_state(
            &op_key,
            SetOperationStateRequest {
                state: OperationState::ExpandDeploying,
                progress: None,
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_bad_parameter());

    let op = service.get_site_operation(&op_key).await.unwrap();
    assert_eq!(op.state, OperationState::InstallInitiated);
    assert_eq!(service.get_site(&key).await.unwrap().state, SiteState::Installing);
}

// ── Day-two operations ──────────────────────────────────────────────

#[tokio::test]
async fn test_failed_expand_keeps_cluster_active() {
    let (service, key) = setup().await;
    install(&service, &key).await;

    let op_key = service
        .create_site_expand_operation(CreateSiteExpandOperationRequest {
            key: key.clone(),
            profiles: profiles(1),
            created_by: "admin@example.com".into(),
        })
        .await
        .unwrap();
    assert_eq!(service.get_site(&key).await.unwrap().state, SiteState::Expanding);

    set_state(&service, &op_key, OperationState::Failed).await;

    assert_eq!(service.get_site(&key).await.unwrap().state, SiteState::Active);
}

#[tokio::test]
async fn test_expand_merges_servers() {
    let (service, key) = setup().await;
    install(&service, &key).await;

    let op_key = service
        .create_site_expand_operation(CreateSiteExpandOperationRequest {
            key: key.clone(),
            profiles: profiles(1),
            created_by: String::new(),
        })
        .await
        .unwrap();
    service
        .update_expand_operation_state(
            &op_key,
            OperationUpdateRequest {
                profiles: BTreeMap::new(),
                servers: vec![server("10.0.0.2", "node-2")],
            },
        )
        .await
        .unwrap();
    service.site_expand_operation_start(&op_key).await.unwrap();
    set_state(&service, &op_key, OperationState::Completed).await;

    let site = service.get_site(&key).await.unwrap();
    let hosts: Vec<&str> = site
        .cluster_state
        .servers
        .iter()
        .map(|s| s.hostname.as_str())
        .collect();
    assert_eq!(hosts, ["node-1", "node-2"]);
}

#[tokio::test]
async fn test_install_servers_rejected_on_expand() {
    let (service, key) = setup().await;
    let op_key = install(&service, &key).await;

    let err = service
        .update_expand_operation_state(&op_key, OperationUpdateRequest::default())
        .await
        .unwrap_err();
    assert!(err.is_bad_parameter());
}

#[tokio::test]
async fn test_active_operation_blocks_another() {
    let (service, key) = setup().await;
    install(&service, &key).await;

    service
        .create_cluster_garbage_collect_operation(CreateClusterGarbageCollectOperationRequest {
            key: key.clone(),
        })
        .await
        .unwrap();
    let err = service
        .create_cluster_garbage_collect_operation(CreateClusterGarbageCollectOperationRequest {
            key: key.clone(),
        })
        .await
        .unwrap_err();
    assert!(err.is_compare_failed());

    let active = service
        .get_site_operations(
            &key,
            &OperationsFilter {
                active: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].operation_type(), OperationType::GarbageCollect);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_operations_leave_one_active() {
    let (service, key) = setup().await;
    install(&service, &key).await;
    let service = Arc::new(service);

    let attempts: Vec<_> = (0..8)
        .map(|_| {
            let service = Arc::clone(&service);
            let key = key.clone();
            tokio::spawn(async move {
                service
                    .create_cluster_garbage_collect_operation(
                        CreateClusterGarbageCollectOperationRequest { key },
                    )
                    .await
            })
        })
        .collect();

    let mut created = 0;
    for attempt in attempts {
        match attempt.await.unwrap() {
            Ok(_) => created += 1,
            Err(err) => assert!(err.is_compare_failed(), "{err}"),
        }
    }
    assert_eq!(created, 1);

    let active = service
        .get_site_operations(
            &key,
            &OperationsFilter {
                active: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(active.len(), 1);
}

#[tokio::test]
async fn test_shrink_refuses_last_server() {
    let (service, key) = setup().await;
    install(&service, &key).await;

    let err = service
        .create_site_shrink_operation(CreateSiteShrinkOperationRequest {
            key,
            servers: vec!["node-1".into()],
            force: false,
            node_removed: false,
            created_by: String::new(),
        })
        .await
        .unwrap_err();
    assert!(err.is_bad_parameter());
}

#[tokio::test]
async fn test_completed_env_update_is_stored() {
    let (service, key) = setup().await;
    install(&service, &key).await;

    let env = BTreeMap::from([("HTTP_PROXY".to_owned(), "http://proxy:3128".to_owned())]);
    let op_key = service
        .create_update_env_operation(CreateUpdateEnvOperationRequest {
            key: key.clone(),
            env: env.clone(),
        })
        .await
        .unwrap();
    assert!(service
        .get_cluster_environment_variables(&key)
        .await
        .unwrap()
        .env
        .is_empty());

    set_state(&service, &op_key, OperationState::Completed).await;

    let stored = service.get_cluster_environment_variables(&key).await.unwrap();
    assert_eq!(stored.env, env);
}

#[tokio::test]
async fn test_completed_uninstall_deletes_cluster() {
    let (service, key) = setup().await;
    install(&service, &key).await;

    let op_key = service
        .create_site_uninstall_operation(CreateSiteUninstallOperationRequest {
            key: key.clone(),
            force: false,
        })
        .await
        .unwrap();
    assert_eq!(
        service.get_site(&key).await.unwrap().state,
        SiteState::Uninstalling
    );

    set_state(&service, &op_key, OperationState::Completed).await;

    assert!(service.get_site(&key).await.unwrap_err().is_not_found());
}

// ── Logs and documents ──────────────────────────────────────────────

#[tokio::test]
async fn test_operation_logs_stream_in_order() {
    let (service, key) = setup().await;
    let op_key = service
        .create_site_install_operation(CreateSiteInstallOperationRequest::new(key))
        .await
        .unwrap();

    for (asset, message) in [("installer", "starting"), ("node-1", "pulling images")] {
        service
            .create_log_entry(
                &op_key,
                LogEntry {
                    asset: asset.into(),
                    message: message.into(),
                },
            )
            .await
            .unwrap();
    }

    let lines: Vec<String> = service
        .get_site_operation_logs(&op_key)
        .await
        .unwrap()
        .map(|line| line.unwrap())
        .collect()
        .await;
    assert_eq!(lines, ["[installer] starting", "[node-1] pulling images"]);
}

#[tokio::test]
async fn test_duplicate_log_forwarder_is_rejected() {
    let (service, key) = setup().await;
    let forwarder = LogForwarder {
        name: "syslog".into(),
        address: "192.168.1.10:514".into(),
        protocol: "udp".into(),
    };

    service
        .create_log_forwarder(&key, forwarder.clone())
        .await
        .unwrap();
    let err = service
        .create_log_forwarder(&key, forwarder)
        .await
        .unwrap_err();
    assert!(err.is_already_exists());
    assert_eq!(service.get_log_forwarders(&key).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_update_missing_log_forwarder_is_not_found() {
    let (service, key) = setup().await;
    let err = service
        .update_log_forwarder(
            &key,
            LogForwarder {
                name: "missing".into(),
                address: "10.0.0.9:514".into(),
                protocol: "tcp".into(),
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_domain_name_validation() {
    let (service, _) = setup().await;

    assert!(service.validate_domain_name("fresh.example.com").await.is_ok());
    assert!(service
        .validate_domain_name(DOMAIN)
        .await
        .unwrap_err()
        .is_already_exists());
    assert!(service
        .validate_domain_name("bad_name")
        .await
        .unwrap_err()
        .is_bad_parameter());
}

/// Install operation with `servers` registered but not started.
async fn pending_install(
    service: &OperatorService,
    key: &SiteKey,
    servers: Vec<Server>,
) -> SiteOperationKey {
    let mut req = CreateSiteInstallOperationRequest::new(key.clone());
    req.profiles = profiles(1);
    let op_key = service.create_site_install_operation(req).await.unwrap();
    service
        .update_install_operation_state(
            &op_key,
            OperationUpdateRequest {
                profiles: BTreeMap::new(),
                servers,
            },
        )
        .await
        .unwrap();
    op_key
}

#[tokio::test]
async fn test_validate_servers_runs_agent_checks() {
    let agents = Arc::new(RecordingAgents::default());
    let (service, key) = seed(service().with_agents(agents.clone())).await;
    let op_key = pending_install(&service, &key, vec![server("10.0.0.1", "node-1")]).await;

    let resp = service
        .validate_servers(ValidateServersRequest {
            key,
            operation_id: None,
            servers: Vec::new(),
        })
        .await
        .unwrap();

    assert_eq!(resp.warnings().len(), 1);
    assert!(resp.failures().is_empty());
    assert_eq!(
        agents.calls(),
        [
            format!("infos {}", op_key.operation_id),
            "validate 10.0.0.1 master".to_owned(),
        ]
    );
}

#[tokio::test]
async fn test_validate_servers_needs_agent_information() {
    let agents = Arc::new(RecordingAgents::default());
    let (service, key) = seed(service().with_agents(agents.clone())).await;
    let op_key = pending_install(&service, &key, vec![server("10.0.0.2", "node-2")]).await;

    let err = service
        .validate_servers(ValidateServersRequest {
            key,
            operation_id: Some(op_key.operation_id.clone()),
            servers: Vec::new(),
        })
        .await
        .unwrap_err();
    assert!(err.is_bad_parameter());
    assert_eq!(agents.calls(), [format!("infos {}", op_key.operation_id)]);
}

#[tokio::test]
async fn test_validate_servers_without_agents_checks_reported_servers() {
    let (service, key) = setup().await;
    let reported = ServerInfo {
        hostname: "node-1".into(),
        advertise_addr: "10.0.0.1".into(),
        role: "worker".into(),
        os: Default::default(),
        num_cpus: 1,
        memory_mb: 1024,
        volumes: Vec::new(),
    };

    let err = service
        .validate_servers(ValidateServersRequest {
            key,
            operation_id: None,
            servers: vec![reported],
        })
        .await
        .unwrap_err();
    assert!(err.is_bad_parameter());
}

#[tokio::test]
async fn test_trusted_cluster_token_is_stable() {
    let (service, key) = setup().await;

    let first = service.get_trusted_cluster_token(&key).await.unwrap();
    let second = service.get_trusted_cluster_token(&key).await.unwrap();
    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_agent_report_needs_agent_service() {
    let (service, key) = setup().await;
    let op_key = service
        .create_site_install_operation(CreateSiteInstallOperationRequest::new(key))
        .await
        .unwrap();

    let err = service
        .get_site_install_operation_agent_report(&op_key)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "not_implemented");
}

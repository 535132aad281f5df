// ── Local operator service ──
//
// The in-process `Operator`: everything lives in a storage backend, an
// identity store and an application catalog. Agents, certificate signing
// and controller leadership are optional collaborators; calls that need a
// missing one fail with `Unsupported`.
//
// At most one operation per cluster is active at any time. A service
// serializes operation creation, so the check and the insert cannot
// interleave within one process. Controllers sharing a backend are not
// covered: two of them can still race to create operations on the same
// cluster. Creating an operation writes the record, its first progress
// entry and the cluster state the operation drives while running, in that
// order.

mod cluster;
mod identity;
mod operations;
mod sites;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::apps::Applications;
use crate::error::{CoreError, Result};
use crate::model::{
    Account, NewAccount, OperationDetails, ProgressEntry, Server, Site, SiteKey, SiteOperation,
    SiteOperationKey, SiteState,
};
use crate::operator::{Accounts, Operator};
use crate::ops::agents::AgentService;
use crate::ops::leader::Leadership;
use crate::ops::state::{initial_operation_state, started_cluster_state};
use crate::ops::utils::active_operations;
use crate::storage::{Backend, ObjectKey};
use crate::users::{self, CertAuthority};

/// Public address used in invite and reset links when none is configured.
pub const DEFAULT_PUBLIC_URL: &str = "https://localhost:3009";

// ── Document kinds ───────────────────────────────────────────────────

pub(crate) const SMTP: &str = "smtp";
pub(crate) const ALERT: &str = "alert";
pub(crate) const LOG_FORWARDER: &str = "log_forwarder";
pub(crate) const CERTIFICATE: &str = "certificate";
pub(crate) const ENVIRONMENT: &str = "environment";
pub(crate) const CONFIGURATION: &str = "configuration";
pub(crate) const PERSISTENT_STORAGE: &str = "persistent_storage";
pub(crate) const AUTH_GATEWAY: &str = "auth_gateway";
pub(crate) const TRUSTED_CLUSTER_TOKEN: &str = "trusted_cluster_token";
pub(crate) const PERIODIC_UPDATES: &str = "periodic_updates";
pub(crate) const AUDIT_EVENT: &str = "audit_event";

/// Name of a document stored once per cluster.
const SINGLETON: &str = "default";

/// An operation about to be created.
pub(crate) struct NewOperation {
    pub key: SiteKey,
    pub details: OperationDetails,
    pub created_by: String,
    pub servers: Vec<Server>,
    /// Create even when another operation is active.
    pub force: bool,
}

impl NewOperation {
    pub fn new(key: SiteKey, details: OperationDetails) -> Self {
        Self {
            key,
            details,
            created_by: String::new(),
            servers: Vec::new(),
            force: false,
        }
    }
}

/// In-process operator over a storage backend.
pub struct OperatorService {
    backend: Arc<dyn Backend>,
    users: Arc<dyn users::Identity>,
    apps: Arc<dyn Applications>,
    agents: Option<Arc<dyn AgentService>>,
    authority: Option<Arc<dyn CertAuthority>>,
    leadership: Option<Arc<dyn Leadership>>,
    public_url: String,
    /// Held from the active-operation check until the new record is stored.
    creating: Mutex<()>,
}

impl OperatorService {
    pub fn new(
        backend: Arc<dyn Backend>,
        users: Arc<dyn users::Identity>,
        apps: Arc<dyn Applications>,
    ) -> Self {
        Self {
            backend,
            users,
            apps,
            agents: None,
            authority: None,
            leadership: None,
            public_url: DEFAULT_PUBLIC_URL.to_owned(),
            creating: Mutex::new(()),
        }
    }

    pub fn with_agents(mut self, agents: Arc<dyn AgentService>) -> Self {
        self.agents = Some(agents);
        self
    }

    pub fn with_authority(mut self, authority: Arc<dyn CertAuthority>) -> Self {
        self.authority = Some(authority);
        self
    }

    pub fn with_leadership(mut self, leadership: Arc<dyn Leadership>) -> Self {
        self.leadership = Some(leadership);
        self
    }

    /// Base URL of the links in invite and reset tokens.
    pub fn with_public_url(mut self, url: impl Into<String>) -> Self {
        self.public_url = url.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn users(&self) -> &Arc<dyn users::Identity> {
        &self.users
    }

    // ── Collaborators ────────────────────────────────────────────────

    fn agents(&self) -> Result<&Arc<dyn AgentService>> {
        self.agents
            .as_ref()
            .ok_or_else(|| CoreError::unsupported("agent coordination"))
    }

    fn authority(&self) -> Result<&Arc<dyn CertAuthority>> {
        self.authority
            .as_ref()
            .ok_or_else(|| CoreError::unsupported("certificate signing"))
    }

    fn leadership(&self) -> Result<&Arc<dyn Leadership>> {
        self.leadership
            .as_ref()
            .ok_or_else(|| CoreError::unsupported("leader election"))
    }

    // ── Sites ────────────────────────────────────────────────────────

    async fn site(&self, key: &SiteKey) -> Result<Site> {
        key.check()?;
        self.backend.get_site(key).await
    }

    async fn set_site_state(&self, key: &SiteKey, state: SiteState) -> Result<()> {
        let mut site = self.backend.get_site(key).await?;
        if site.state == state {
            return Ok(());
        }
        info!(cluster = %site.domain, from = %site.state, to = %state, "Cluster state changed");
        site.state = state;
        self.backend.update_site(site).await
    }

    // ── Operations ───────────────────────────────────────────────────

    async fn operation(&self, key: &SiteOperationKey) -> Result<SiteOperation> {
        key.check()?;
        self.backend.get_operation(key).await
    }

    /// Store a new operation with its first progress entry and move the
    /// cluster into the state the operation drives.
    pub(crate) async fn create_operation(&self, new: NewOperation) -> Result<SiteOperationKey> {
        let site = self.site(&new.key).await?;

        let creating = self.creating.lock().await;
        if !new.force {
            let existing = self.backend.get_operations(&new.key).await?;
            if let Some(active) = active_operations(&existing).first() {
                return Err(CoreError::compare_failed(format!(
                    "operation {} ({}) is in progress on cluster {}",
                    active.id,
                    active.operation_type(),
                    site.domain
                )));
            }
        }

        let op_type = new.details.operation_type();
        let now = Utc::now();
        let op = SiteOperation {
            id: uuid::Uuid::new_v4().to_string(),
            account_id: site.account_id.clone(),
            site_domain: site.domain.clone(),
            state: initial_operation_state(op_type),
            details: new.details,
            provisioner: site.provisioner.clone(),
            created: now,
            created_by: new.created_by,
            updated: now,
            servers: new.servers,
        };
        let op = self.backend.create_operation(op).await?;
        drop(creating);
        let key = op.key();

        self.backend
            .create_progress_entry(ProgressEntry::in_progress(
                &key,
                "Operation has been created",
            ))
            .await?;
        if let Some(state) = started_cluster_state(op_type) {
            self.set_site_state(&new.key, state).await?;
        }

        info!(
            cluster = %key.site_domain,
            operation = %key.operation_id,
            kind = %op_type,
            "Operation created"
        );
        Ok(key)
    }

    // ── Documents ────────────────────────────────────────────────────

    async fn put_document<T: Serialize + Sync>(
        &self,
        cluster: &str,
        kind: &'static str,
        name: &str,
        value: &T,
    ) -> Result<()> {
        let value = serde_json::to_value(value)
            .map_err(|e| CoreError::Internal(format!("encoding {kind}: {e}")))?;
        debug!(cluster, kind, name, "Storing document");
        self.backend
            .upsert_object(ObjectKey::new(cluster, kind, name), value)
            .await
    }

    async fn get_document<T: DeserializeOwned>(
        &self,
        cluster: &str,
        kind: &'static str,
        name: &str,
    ) -> Result<T> {
        let value = self
            .backend
            .get_object(&ObjectKey::new(cluster, kind, name))
            .await?;
        serde_json::from_value(value)
            .map_err(|e| CoreError::Internal(format!("decoding {kind}: {e}")))
    }

    /// Singleton document, or its default when never written.
    async fn get_document_or_default<T: DeserializeOwned + Default>(
        &self,
        cluster: &str,
        kind: &'static str,
    ) -> Result<T> {
        match self.get_document(cluster, kind, SINGLETON).await {
            Err(e) if e.is_not_found() => Ok(T::default()),
            other => other,
        }
    }

    async fn list_documents<T: DeserializeOwned>(
        &self,
        cluster: &str,
        kind: &'static str,
    ) -> Result<Vec<T>> {
        self.backend
            .list_objects(cluster, kind)
            .await?
            .into_iter()
            .map(|value| {
                serde_json::from_value(value)
                    .map_err(|e| CoreError::Internal(format!("decoding {kind}: {e}")))
            })
            .collect()
    }

    async fn delete_document(&self, cluster: &str, kind: &'static str, name: &str) -> Result<()> {
        self.backend
            .delete_object(&ObjectKey::new(cluster, kind, name))
            .await
    }
}

// ── Accounts ─────────────────────────────────────────────────────────

#[async_trait]
impl Accounts for OperatorService {
    async fn create_account(&self, req: NewAccount) -> Result<Account> {
        req.check()?;
        let account = Account {
            id: req.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            org: req.org,
        };
        let account = self.backend.create_account(account).await?;
        info!(account = %account.id, org = %account.org, "Account created");
        Ok(account)
    }

    async fn get_account(&self, account_id: &str) -> Result<Account> {
        self.backend.get_account(account_id).await
    }

    async fn get_accounts(&self) -> Result<Vec<Account>> {
        self.backend.get_accounts().await
    }
}

impl Operator for OperatorService {}

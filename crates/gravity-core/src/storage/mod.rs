//! Storage backend consumed by the local operator.
//!
//! The backend is the single source of truth and the serialization point
//! for concurrent operator calls. Operations are returned newest first;
//! every "last operation" helper depends on that order.

pub mod memory;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::model::{
    Account, LogEntry, ProgressEntry, Site, SiteKey, SiteOperation, SiteOperationKey,
};

pub use memory::MemoryBackend;

/// Address of a cluster-scoped document (SMTP config, alerts, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    pub cluster: String,
    pub kind: &'static str,
    pub name: String,
}

impl ObjectKey {
    pub fn new(cluster: impl Into<String>, kind: &'static str, name: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            kind,
            name: name.into(),
        }
    }
}

#[async_trait]
pub trait Backend: Send + Sync {
    // ── Accounts ─────────────────────────────────────────────────────
    async fn create_account(&self, account: Account) -> Result<Account>;
    async fn get_account(&self, id: &str) -> Result<Account>;
    async fn get_accounts(&self) -> Result<Vec<Account>>;

    // ── Sites ────────────────────────────────────────────────────────
    /// Fails with `AlreadyExists` when the domain is taken.
    async fn create_site(&self, site: Site) -> Result<Site>;
    async fn update_site(&self, site: Site) -> Result<()>;
    async fn get_site(&self, key: &SiteKey) -> Result<Site>;
    async fn get_sites(&self, account_id: &str) -> Result<Vec<Site>>;
    async fn get_site_by_domain(&self, domain: &str) -> Result<Site>;
    async fn get_local_site(&self) -> Result<Site>;
    /// Removes the cluster together with its operations and documents.
    async fn delete_site(&self, key: &SiteKey) -> Result<()>;

    // ── Operations ───────────────────────────────────────────────────
    async fn create_operation(&self, op: SiteOperation) -> Result<SiteOperation>;
    async fn update_operation(&self, op: SiteOperation) -> Result<()>;
    async fn get_operation(&self, key: &SiteOperationKey) -> Result<SiteOperation>;
    /// Newest first.
    async fn get_operations(&self, key: &SiteKey) -> Result<Vec<SiteOperation>>;
    async fn delete_operation(&self, key: &SiteOperationKey) -> Result<()>;

    // ── Progress and logs ────────────────────────────────────────────
    async fn create_progress_entry(&self, entry: ProgressEntry) -> Result<()>;
    async fn get_last_progress_entry(&self, key: &SiteOperationKey) -> Result<ProgressEntry>;
    async fn append_log(&self, key: &SiteOperationKey, entry: LogEntry) -> Result<()>;
    async fn get_logs(&self, key: &SiteOperationKey) -> Result<Vec<LogEntry>>;

    // ── Cluster documents ────────────────────────────────────────────
    async fn upsert_object(&self, key: ObjectKey, value: Value) -> Result<()>;
    async fn get_object(&self, key: &ObjectKey) -> Result<Value>;
    async fn list_objects(&self, cluster: &str, kind: &'static str) -> Result<Vec<Value>>;
    async fn delete_object(&self, key: &ObjectKey) -> Result<()>;
}

// ── In-memory storage backend ──
//
// Concurrent maps keyed by natural identifiers. Operations carry an
// insertion sequence number so listings come back newest first without
// relying on timestamps.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::Value;

use super::{Backend, ObjectKey};
use crate::error::{CoreError, Result};
use crate::model::{
    Account, LogEntry, ProgressEntry, Site, SiteKey, SiteOperation, SiteOperationKey,
};

struct Sequenced<T> {
    seq: u64,
    value: T,
}

/// Process-local backend for tests, the install wizard and tooling.
#[derive(Default)]
pub struct MemoryBackend {
    accounts: DashMap<String, Account>,
    /// Keyed by domain; domains are unique across accounts.
    sites: DashMap<String, Site>,
    operations: DashMap<SiteOperationKey, Sequenced<SiteOperation>>,
    /// Keyed by (site domain, operation id).
    progress: DashMap<(String, String), Vec<ProgressEntry>>,
    logs: DashMap<SiteOperationKey, Vec<LogEntry>>,
    objects: DashMap<ObjectKey, Value>,
    sequence: AtomicU64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_seq(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }
}

fn site_not_found(domain: &str) -> CoreError {
    CoreError::not_found("cluster", domain)
}

#[async_trait]
impl Backend for MemoryBackend {
    // ── Accounts ─────────────────────────────────────────────────────

    async fn create_account(&self, account: Account) -> Result<Account> {
        match self.accounts.entry(account.id.clone()) {
            Entry::Occupied(_) => Err(CoreError::already_exists(format!(
                "account {} already exists",
                account.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(account.clone());
                Ok(account)
            }
        }
    }

    async fn get_account(&self, id: &str) -> Result<Account> {
        self.accounts
            .get(id)
            .map(|a| a.clone())
            .ok_or_else(|| CoreError::not_found("account", id))
    }

    async fn get_accounts(&self) -> Result<Vec<Account>> {
        let mut accounts: Vec<Account> = self.accounts.iter().map(|a| a.clone()).collect();
        accounts.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(accounts)
    }

    // ── Sites ────────────────────────────────────────────────────────

    async fn create_site(&self, site: Site) -> Result<Site> {
        if !self.accounts.contains_key(&site.account_id) {
            return Err(CoreError::not_found("account", &site.account_id));
        }
        match self.sites.entry(site.domain.clone()) {
            Entry::Occupied(_) => Err(CoreError::already_exists(format!(
                "cluster {} already exists",
                site.domain
            ))),
            Entry::Vacant(slot) => {
                slot.insert(site.clone());
                Ok(site)
            }
        }
    }

    async fn update_site(&self, site: Site) -> Result<()> {
        match self.sites.get_mut(&site.domain) {
            Some(mut existing) if existing.account_id == site.account_id => {
                *existing = site;
                Ok(())
            }
            _ => Err(site_not_found(&site.domain)),
        }
    }

    async fn get_site(&self, key: &SiteKey) -> Result<Site> {
        self.sites
            .get(&key.site_domain)
            .filter(|s| s.account_id == key.account_id)
            .map(|s| s.clone())
            .ok_or_else(|| site_not_found(&key.site_domain))
    }

    async fn get_sites(&self, account_id: &str) -> Result<Vec<Site>> {
        let mut sites: Vec<Site> = self
            .sites
            .iter()
            .filter(|s| s.account_id == account_id)
            .map(|s| s.clone())
            .collect();
        sites.sort_by(|a, b| a.domain.cmp(&b.domain));
        Ok(sites)
    }

    async fn get_site_by_domain(&self, domain: &str) -> Result<Site> {
        self.sites
            .get(domain)
            .map(|s| s.clone())
            .ok_or_else(|| site_not_found(domain))
    }

    async fn get_local_site(&self) -> Result<Site> {
        self.sites
            .iter()
            .find(|s| s.local)
            .map(|s| s.clone())
            .ok_or_else(|| CoreError::not_found("cluster", "local cluster"))
    }

    async fn delete_site(&self, key: &SiteKey) -> Result<()> {
        if self
            .sites
            .remove_if(&key.site_domain, |_, s| s.account_id == key.account_id)
            .is_none()
        {
            return Err(site_not_found(&key.site_domain));
        }
        self.operations.retain(|k, _| k.site_domain != key.site_domain);
        self.progress.retain(|(domain, _), _| *domain != key.site_domain);
        self.logs.retain(|k, _| k.site_domain != key.site_domain);
        self.objects.retain(|k, _| k.cluster != key.site_domain);
        Ok(())
    }

    // ── Operations ───────────────────────────────────────────────────

    async fn create_operation(&self, op: SiteOperation) -> Result<SiteOperation> {
        let seq = self.next_seq();
        match self.operations.entry(op.key()) {
            Entry::Occupied(_) => Err(CoreError::already_exists(format!(
                "operation {} already exists",
                op.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(Sequenced {
                    seq,
                    value: op.clone(),
                });
                Ok(op)
            }
        }
    }

    async fn update_operation(&self, op: SiteOperation) -> Result<()> {
        match self.operations.get_mut(&op.key()) {
            Some(mut existing) => {
                existing.value = op;
                Ok(())
            }
            None => Err(CoreError::not_found("operation", op.id)),
        }
    }

    async fn get_operation(&self, key: &SiteOperationKey) -> Result<SiteOperation> {
        self.operations
            .get(key)
            .map(|op| op.value.clone())
            .ok_or_else(|| CoreError::not_found("operation", &key.operation_id))
    }

    async fn get_operations(&self, key: &SiteKey) -> Result<Vec<SiteOperation>> {
        let mut ops: Vec<(u64, SiteOperation)> = self
            .operations
            .iter()
            .filter(|op| {
                op.key().account_id == key.account_id && op.key().site_domain == key.site_domain
            })
            .map(|op| (op.seq, op.value.clone()))
            .collect();
        ops.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(ops.into_iter().map(|(_, op)| op).collect())
    }

    async fn delete_operation(&self, key: &SiteOperationKey) -> Result<()> {
        if self.operations.remove(key).is_none() {
            return Err(CoreError::not_found("operation", &key.operation_id));
        }
        self.progress
            .remove(&(key.site_domain.clone(), key.operation_id.clone()));
        self.logs.remove(key);
        Ok(())
    }

    // ── Progress and logs ────────────────────────────────────────────

    async fn create_progress_entry(&self, entry: ProgressEntry) -> Result<()> {
        self.progress
            .entry((entry.site_domain.clone(), entry.operation_id.clone()))
            .or_default()
            .push(entry);
        Ok(())
    }

    async fn get_last_progress_entry(&self, key: &SiteOperationKey) -> Result<ProgressEntry> {
        self.progress
            .get(&(key.site_domain.clone(), key.operation_id.clone()))
            .and_then(|entries| entries.last().cloned())
            .ok_or_else(|| CoreError::not_found("progress entry", &key.operation_id))
    }

    async fn append_log(&self, key: &SiteOperationKey, entry: LogEntry) -> Result<()> {
        self.logs.entry(key.clone()).or_default().push(entry);
        Ok(())
    }

    async fn get_logs(&self, key: &SiteOperationKey) -> Result<Vec<LogEntry>> {
        Ok(self
            .logs
            .get(key)
            .map(|entries| entries.clone())
            .unwrap_or_default())
    }

    // ── Cluster documents ────────────────────────────────────────────

    async fn upsert_object(&self, key: ObjectKey, value: Value) -> Result<()> {
        self.objects.insert(key, value);
        Ok(())
    }

    async fn get_object(&self, key: &ObjectKey) -> Result<Value> {
        self.objects
            .get(key)
            .map(|v| v.clone())
            .ok_or_else(|| CoreError::not_found(key.kind, &key.name))
    }

    async fn list_objects(&self, cluster: &str, kind: &'static str) -> Result<Vec<Value>> {
        let mut objects: Vec<(String, Value)> = self
            .objects
            .iter()
            .filter(|entry| entry.key().cluster == cluster && entry.key().kind == kind)
            .map(|entry| (entry.key().name.clone(), entry.value().clone()))
            .collect();
        objects.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(objects.into_iter().map(|(_, v)| v).collect())
    }

    async fn delete_object(&self, key: &ObjectKey) -> Result<()> {
        self.objects
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| CoreError::not_found(key.kind, &key.name))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::model::{
        Application, ClusterState, Locator, OperationDetails, OperationState, SiteState,
    };

    fn site(domain: &str) -> Site {
        Site {
            domain: domain.into(),
            account_id: "a1".into(),
            state: SiteState::NotInstalled,
            reason: String::new(),
            app: Application {
                package: Locator::new("example.com", "app", "1.0.0"),
                manifest: Default::default(),
            },
            cluster_state: ClusterState::default(),
            provisioner: "onprem".into(),
            created: Utc::now(),
            created_by: String::new(),
            labels: Default::default(),
            local: false,
            final_install_step_complete: false,
        }
    }

    fn op(id: &str) -> SiteOperation {
        SiteOperation {
            id: id.into(),
            account_id: "a1".into(),
            site_domain: "example.com".into(),
            state: OperationState::GarbageCollectInProgress,
            details: OperationDetails::GarbageCollect,
            provisioner: "onprem".into(),
            created: Utc::now(),
            created_by: String::new(),
            updated: Utc::now(),
            servers: Vec::new(),
        }
    }

    async fn backend() -> MemoryBackend {
        let backend = MemoryBackend::new();
        backend
            .create_account(Account {
                id: "a1".into(),
                org: "example.com".into(),
            })
            .await
            .unwrap();
        backend.create_site(site("example.com")).await.unwrap();
        backend
    }

    #[tokio::test]
    async fn operations_list_newest_first() {
        let backend = backend().await;
        for id in ["op1", "op2", "op3"] {
            backend.create_operation(op(id)).await.unwrap();
        }
        let ops = backend
            .get_operations(&SiteKey::new("a1", "example.com"))
            .await
            .unwrap();
        let ids: Vec<&str> = ops.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["op3", "op2", "op1"]);
    }

    #[tokio::test]
    async fn duplicate_domain_rejected() {
        let backend = backend().await;
        let err = backend.create_site(site("example.com")).await.unwrap_err();
        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn site_lookup_checks_account() {
        let backend = backend().await;
        let err = backend
            .get_site(&SiteKey::new("other", "example.com"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn delete_site_drops_operations() {
        let backend = backend().await;
        backend.create_operation(op("op1")).await.unwrap();
        let key = SiteKey::new("a1", "example.com");
        backend.delete_site(&key).await.unwrap();
        assert!(backend.get_operations(&key).await.unwrap().is_empty());
        assert!(backend.get_site(&key).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn last_progress_entry_wins() {
        let backend = backend().await;
        let key = SiteKey::new("a1", "example.com").operation("op1");
        backend
            .create_progress_entry(ProgressEntry::in_progress(&key, "first"))
            .await
            .unwrap();
        backend
            .create_progress_entry(ProgressEntry::in_progress(&key, "second"))
            .await
            .unwrap();
        let last = backend.get_last_progress_entry(&key).await.unwrap();
        assert_eq!(last.message, "second");
    }
}

// ── Remote client pool ──
//
// One client per endpoint URL, built on first use and kept for the life
// of the pool. Two callers racing on a cold endpoint may both build a
// client; the first insert wins and the other is dropped.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::debug;
use url::Url;

use crate::config::{AuthCredentials, PortalConfig, TlsVerification};
use crate::error::Result;
use crate::operator::Operator;
use crate::remote::RemoteOperator;

/// Builds an operator client for an endpoint.
pub trait ClientFactory: Send + Sync {
    fn build(&self, endpoint: &Url) -> Result<Arc<dyn Operator>>;
}

/// Builds [`RemoteOperator`]s sharing one set of credentials.
#[derive(Debug, Clone)]
pub struct RemoteClientFactory {
    pub auth: AuthCredentials,
    pub tls: TlsVerification,
    pub timeout: Duration,
}

impl RemoteClientFactory {
    pub fn new(auth: AuthCredentials) -> Self {
        Self {
            auth,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl ClientFactory for RemoteClientFactory {
    fn build(&self, endpoint: &Url) -> Result<Arc<dyn Operator>> {
        let config = PortalConfig {
            url: endpoint.clone(),
            auth: self.auth.clone(),
            tls: self.tls.clone(),
            timeout: self.timeout,
        };
        Ok(Arc::new(RemoteOperator::connect(&config)?))
    }
}

pub struct ClientPool {
    clients: DashMap<String, Arc<dyn Operator>>,
    factory: Arc<dyn ClientFactory>,
}

impl ClientPool {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            clients: DashMap::new(),
            factory,
        }
    }

    /// Client for `endpoint`, building it on first use.
    pub fn get(&self, endpoint: &Url) -> Result<Arc<dyn Operator>> {
        if let Some(client) = self.clients.get(endpoint.as_str()) {
            return Ok(Arc::clone(&client));
        }

        debug!(%endpoint, "Building operator client");
        let client = self.factory.build(endpoint)?;
        let entry = self.clients.entry(endpoint.to_string()).or_insert(client);
        Ok(Arc::clone(&entry))
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

//! Application catalog collaborator.
//!
//! The package service itself lives outside this crate; the operator only
//! needs to resolve a locator to its manifest, find the newest version of a
//! package and fetch an installer tarball.

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use crate::error::{CoreError, Result};
use crate::model::{Application, Locator};

#[async_trait]
pub trait Applications: Send + Sync {
    async fn get_app(&self, locator: &Locator) -> Result<Application>;
    /// Newest version of `repository/name`.
    async fn get_latest(&self, repository: &str, name: &str) -> Result<Application>;
    async fn get_app_installer(&self, locator: &Locator, cache_images: bool) -> Result<Bytes>;
}

/// Catalog held in memory, for tests and the standalone wizard.
#[derive(Default)]
pub struct MemoryCatalog {
    apps: DashMap<String, Application>,
    installers: DashMap<String, Bytes>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, app: Application) {
        self.apps.insert(app.package.to_string(), app);
    }

    pub fn add_installer(&self, locator: &Locator, tarball: Bytes) {
        self.installers.insert(locator.to_string(), tarball);
    }
}

/// Orders dotted numeric versions; non-numeric parts compare as text.
fn version_key(version: &str) -> Vec<(u64, String)> {
    version
        .split(['.', '-', '+'])
        .map(|part| (part.parse().unwrap_or(0), part.to_owned()))
        .collect()
}

/// `candidate` orders after `current`.
pub fn is_newer_version(candidate: &str, current: &str) -> bool {
    version_key(candidate) > version_key(current)
}

#[async_trait]
impl Applications for MemoryCatalog {
    async fn get_app(&self, locator: &Locator) -> Result<Application> {
        self.apps
            .get(&locator.to_string())
            .map(|a| a.clone())
            .ok_or_else(|| CoreError::not_found("application", locator.to_string()))
    }

    async fn get_latest(&self, repository: &str, name: &str) -> Result<Application> {
        let versions: BTreeMap<Vec<(u64, String)>, Application> = self
            .apps
            .iter()
            .filter(|a| a.package.repository == repository && a.package.name == name)
            .map(|a| (version_key(&a.package.version), a.clone()))
            .collect();
        versions
            .into_values()
            .next_back()
            .ok_or_else(|| CoreError::not_found("application", format!("{repository}/{name}")))
    }

    async fn get_app_installer(&self, locator: &Locator, _cache_images: bool) -> Result<Bytes> {
        if !self.apps.contains_key(&locator.to_string()) {
            return Err(CoreError::not_found("application", locator.to_string()));
        }
        self.installers
            .get(&locator.to_string())
            .map(|b| b.clone())
            .ok_or_else(|| CoreError::not_found("installer", locator.to_string()))
    }
}

//! Shared helpers for command handlers.

use chrono::{DateTime, Utc};

use gravity_core::operator::Sites;
use gravity_core::{Operator, Site, SiteKey, SiteOperationKey};

use crate::config::Target;
use crate::error::CliError;

/// Cluster name from the argument, else the flag / profile default.
pub fn cluster_name(target: &Target, explicit: Option<String>) -> Result<String, CliError> {
    explicit
        .or_else(|| target.cluster.clone())
        .ok_or(CliError::NoCluster)
}

/// Look a cluster up by account and name, or by name alone when no
/// account is configured.
pub async fn resolve_site(
    operator: &dyn Operator,
    target: &Target,
    name: &str,
) -> Result<Site, CliError> {
    let site = match target.account {
        Some(ref account) => operator.get_site(&SiteKey::new(account, name)).await?,
        None => operator.get_site_by_domain(name).await?,
    };
    tracing::debug!(cluster = %site.domain, account = %site.account_id, "resolved cluster");
    Ok(site)
}

/// Key of the selected cluster.
pub async fn resolve_site_key(
    operator: &dyn Operator,
    target: &Target,
) -> Result<SiteKey, CliError> {
    let name = cluster_name(target, None)?;
    match target.account {
        Some(ref account) => Ok(SiteKey::new(account, name)),
        None => Ok(resolve_site(operator, target, &name).await?.key()),
    }
}

/// Key of operation `id` of the selected cluster.
pub async fn resolve_operation_key(
    operator: &dyn Operator,
    target: &Target,
    id: &str,
) -> Result<SiteOperationKey, CliError> {
    Ok(resolve_site_key(operator, target).await?.operation(id))
}

/// Timestamp as shown in tables.
pub fn format_time(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

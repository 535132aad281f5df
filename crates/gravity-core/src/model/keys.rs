// ── Cluster and operation identifiers ──

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Identifies one cluster within one account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SiteKey {
    pub account_id: String,
    pub site_domain: String,
}

impl SiteKey {
    pub fn new(account_id: impl Into<String>, site_domain: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            site_domain: site_domain.into(),
        }
    }

    /// Both fields must be set.
    pub fn check(&self) -> Result<()> {
        if self.account_id.is_empty() {
            return Err(CoreError::bad_parameter("missing parameter AccountID"));
        }
        if self.site_domain.is_empty() {
            return Err(CoreError::bad_parameter("missing parameter SiteDomain"));
        }
        Ok(())
    }

    /// Key for operation `operation_id` of this cluster.
    pub fn operation(&self, operation_id: impl Into<String>) -> SiteOperationKey {
        SiteOperationKey {
            account_id: self.account_id.clone(),
            site_domain: self.site_domain.clone(),
            operation_id: operation_id.into(),
        }
    }
}

impl fmt::Display for SiteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cluster({}/{})", self.account_id, self.site_domain)
    }
}

/// Identifies one operation instance of one cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SiteOperationKey {
    pub account_id: String,
    pub site_domain: String,
    pub operation_id: String,
}

impl SiteOperationKey {
    pub fn check(&self) -> Result<()> {
        self.site_key().check()?;
        if self.operation_id.is_empty() {
            return Err(CoreError::bad_parameter("missing parameter OperationID"));
        }
        Ok(())
    }

    pub fn site_key(&self) -> SiteKey {
        SiteKey {
            account_id: self.account_id.clone(),
            site_domain: self.site_domain.clone(),
        }
    }
}

impl fmt::Display for SiteOperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "operation({}/{}/{})",
            self.account_id, self.site_domain, self.operation_id
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn site_key_requires_both_fields() {
        assert!(SiteKey::new("", "x").check().unwrap_err().is_bad_parameter());
        assert!(SiteKey::new("x", "").check().unwrap_err().is_bad_parameter());
        assert!(SiteKey::new("", "").check().unwrap_err().is_bad_parameter());
        assert!(SiteKey::new("a1", "example.com").check().is_ok());
    }

    #[test]
    fn operation_key_requires_operation_id() {
        let key = SiteKey::new("a1", "example.com").operation("");
        assert!(key.check().unwrap_err().is_bad_parameter());

        let key = SiteKey::new("a1", "example.com").operation("op1");
        assert!(key.check().is_ok());
        assert_eq!(key.site_key(), SiteKey::new("a1", "example.com"));
    }

    #[test]
    fn operation_key_inherits_site_checks() {
        let key = SiteOperationKey {
            account_id: String::new(),
            site_domain: "example.com".into(),
            operation_id: "op1".into(),
        };
        assert!(key.check().unwrap_err().is_bad_parameter());
    }
}

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// An account owns zero or more clusters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub org: String,
}

/// Request to create an account. The ID is generated when absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewAccount {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub org: String,
}

impl NewAccount {
    pub fn check(&self) -> Result<()> {
        if self.org.is_empty() {
            return Err(CoreError::bad_parameter("missing parameter Org"));
        }
        Ok(())
    }
}

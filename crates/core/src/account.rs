use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const DEFAULT_ACCOUNT_ID: &str = "BOA-5670";

/// Account designation stamped onto every transformed row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(String);

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccountError {
    #[error("Account id must not be empty")]
    Empty,
    #[error("Account id must not contain commas or line breaks: {0:?}")]
    InvalidCharacter(String),
}

impl AccountId {
    pub fn new(id: &str) -> Result<Self, AccountError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(AccountError::Empty);
        }
        if id.contains([',', '\n', '\r']) {
            return Err(AccountError::InvalidCharacter(id.to_string()));
        }
        Ok(AccountId(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Per-row sequence label, numbered from 1: `BOA-5670-0001`.
    pub fn seq(&self, n: usize) -> String {
        format!("{}-{:04}", self.0, n)
    }
}

impl Default for AccountId {
    fn default() -> Self {
        AccountId(DEFAULT_ACCOUNT_ID.to_string())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

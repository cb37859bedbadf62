//! Directory-service credential contract

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Outcome of a credential check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verification {
    Success,
    InvalidCredentials,
    /// The directory service could not be reached or set up
    ServiceInitError,
}

/// Verifies a user name/password pair against a directory service.
///
/// Implementations must release any per-call connection on every exit path.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Check `password` for the service identity (e.g. an LDAP bind DN)
    async fn verify(&self, identity: &str, password: &str) -> Verification;
}

/// Service identity template with a single `%s` placeholder for the user name.
///
/// `%%` stands for a literal percent sign. The user name is inserted
/// verbatim and never re-scanned, so it cannot add placeholders of its own.
/// It is not escaped for the directory service either.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityTemplate {
    raw: String,
    prefix: String,
    suffix: String,
}

impl IdentityTemplate {
    pub fn parse(template: &str) -> Result<Self> {
        let mut prefix = String::new();
        let mut suffix = String::new();
        let mut placeholders = 0;
        let mut chars = template.chars();

        while let Some(c) = chars.next() {
            let out = if placeholders == 0 {
                &mut prefix
            } else {
                &mut suffix
            };

            if c != '%' {
                out.push(c);
                continue;
            }

            match chars.next() {
                Some('%') => out.push('%'),
                Some('s') => placeholders += 1,
                Some(other) => {
                    return Err(Error::InvalidTemplate(format!(
                        "unsupported directive %{} in {:?}",
                        other, template
                    )))
                }
                None => {
                    return Err(Error::InvalidTemplate(format!(
                        "dangling % at end of {:?}",
                        template
                    )))
                }
            }
        }

        if placeholders != 1 {
            return Err(Error::InvalidTemplate(format!(
                "expected exactly one %s in {:?}, found {}",
                template, placeholders
            )));
        }

        Ok(Self {
            raw: template.to_string(),
            prefix,
            suffix,
        })
    }

    /// Substitute the user name
    pub fn render(&self, user: &str) -> String {
        let mut identity = String::with_capacity(self.prefix.len() + user.len() + self.suffix.len());
        identity.push_str(&self.prefix);
        identity.push_str(user);
        identity.push_str(&self.suffix);
        identity
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for IdentityTemplate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for IdentityTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Verifier backed by a fixed identity/password table
#[derive(Debug, Default)]
pub struct StaticVerifier {
    users: HashMap<String, String>,
    offline: bool,
}

impl StaticVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an identity (already rendered from the template)
    pub fn with_user(mut self, identity: impl Into<String>, password: impl Into<String>) -> Self {
        self.users.insert(identity.into(), password.into());
        self
    }

    /// Behave like an unreachable directory service
    pub fn offline() -> Self {
        Self {
            users: HashMap::new(),
            offline: true,
        }
    }
}

impl FromIterator<(String, String)> for StaticVerifier {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            users: iter.into_iter().collect(),
            offline: false,
        }
    }
}

#[async_trait]
impl CredentialVerifier for StaticVerifier {
    async fn verify(&self, identity: &str, password: &str) -> Verification {
        if self.offline {
            warn!("Static verifier is offline");
            return Verification::ServiceInitError;
        }

        match self.users.get(identity) {
            Some(expected) if !password.is_empty() && expected == password => {
                info!("{:?} successfully authenticated", identity);
                Verification::Success
            }
            _ => {
                warn!("Credential check for {:?} failed", identity);
                Verification::InvalidCredentials
            }
        }
    }
}

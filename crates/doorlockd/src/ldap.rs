//! LDAP credential verification

use std::time::Duration;

use async_trait::async_trait;
use ldap3::{LdapConnAsync, LdapConnSettings};
use tracing::{debug, error, info, warn};

use doorlock_core::{CredentialVerifier, Verification};

/// Verifies credentials with an LDAPv3 simple bind.
///
/// Every check opens its own connection and unbinds it before returning.
pub struct LdapVerifier {
    uri: String,
    timeout: Duration,
}

impl LdapVerifier {
    pub fn new(uri: impl Into<String>, timeout: Duration) -> Self {
        Self {
            uri: uri.into(),
            timeout,
        }
    }
}

#[async_trait]
impl CredentialVerifier for LdapVerifier {
    async fn verify(&self, identity: &str, password: &str) -> Verification {
        // An empty simple bind is an anonymous bind and would always succeed
        if password.is_empty() {
            warn!("Refusing empty password for {:?}", identity);
            return Verification::InvalidCredentials;
        }

        let settings = LdapConnSettings::new().set_conn_timeout(self.timeout);
        let (conn, mut ldap) = match LdapConnAsync::with_settings(settings, &self.uri).await {
            Ok(pair) => pair,
            Err(e) => {
                error!("LDAP initialize error for {}: {}", self.uri, e);
                return Verification::ServiceInitError;
            }
        };
        ldap3::drive!(conn);

        ldap.with_timeout(self.timeout);
        let verification = match ldap.simple_bind(identity, password).await {
            Ok(result) => match result.success() {
                Ok(_) => {
                    info!("{:?} successfully authenticated", identity);
                    Verification::Success
                }
                Err(e) => {
                    error!("Credential check for {:?} failed: {}", identity, e);
                    Verification::InvalidCredentials
                }
            },
            Err(e) => {
                error!("LDAP bind for {:?} did not complete: {}", identity, e);
                Verification::ServiceInitError
            }
        };

        if let Err(e) = ldap.unbind().await {
            debug!("LDAP unbind failed: {}", e);
        }

        verification
    }
}

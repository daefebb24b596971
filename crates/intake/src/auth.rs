//! Login and session tokens.
//!
//! A reporting entity logs in with its ERR ID and PIN and receives an opaque
//! token. Tokens live in a TTL cache; an expired or unknown token resolves to
//! no principal and the chat connection is refused.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::sync::Cache;
use uuid::Uuid;

use crate::error::ProviderError;

/// The authenticated reporting entity behind a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub err_id: String,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn verify(&self, err_id: &str, pin: &str) -> Result<bool, ProviderError>;
}

pub struct Authenticator {
    credentials: Arc<dyn CredentialStore>,
    sessions: Cache<String, Principal>,
}

impl Authenticator {
    pub fn new(credentials: Arc<dyn CredentialStore>, ttl: Duration) -> Self {
        Self {
            credentials,
            sessions: Cache::builder().time_to_live(ttl).build(),
        }
    }

    /// Returns a new session token, or `None` for bad credentials.
    pub async fn login(&self, err_id: &str, pin: &str) -> Result<Option<String>, ProviderError> {
        let err_id = err_id.trim().to_uppercase();
        if err_id.is_empty() || pin.is_empty() {
            return Ok(None);
        }

        if !self.credentials.verify(&err_id, pin).await? {
            log::info!("Rejected login for {}", err_id);
            return Ok(None);
        }

        let token = Uuid::new_v4().to_string();
        self.sessions.insert(token.clone(), Principal { err_id });
        Ok(Some(token))
    }

    pub fn resolve(&self, token: &str) -> Option<Principal> {
        self.sessions.get(token)
    }

    pub fn logout(&self, token: &str) {
        self.sessions.invalidate(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticCredentials;

    #[async_trait]
    impl CredentialStore for StaticCredentials {
        async fn verify(&self, err_id: &str, pin: &str) -> Result<bool, ProviderError> {
            Ok(err_id == "ERR1" && pin == "4321")
        }
    }

    fn authenticator(ttl: Duration) -> Authenticator {
        Authenticator::new(Arc::new(StaticCredentials), ttl)
    }

    #[tokio::test]
    async fn test_login_and_resolve() {
        let auth = authenticator(Duration::from_secs(3600));
        let token = auth.login(" err1 ", "4321").await.unwrap().unwrap();
        assert_eq!(
            auth.resolve(&token),
            Some(Principal {
                err_id: "ERR1".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_bad_pin() {
        let auth = authenticator(Duration::from_secs(3600));
        assert_eq!(auth.login("ERR1", "0000").await.unwrap(), None);
        assert_eq!(auth.login("", "4321").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_logout() {
        let auth = authenticator(Duration::from_secs(3600));
        let token = auth.login("ERR1", "4321").await.unwrap().unwrap();
        auth.logout(&token);
        assert_eq!(auth.resolve(&token), None);
    }

    #[tokio::test]
    async fn test_token_expires() {
        let auth = authenticator(Duration::from_millis(50));
        let token = auth.login("ERR1", "4321").await.unwrap().unwrap();
        std::thread::sleep(Duration::from_millis(120));
        assert_eq!(auth.resolve(&token), None);
    }

    #[test]
    fn test_unknown_token() {
        let auth = authenticator(Duration::from_secs(3600));
        assert_eq!(auth.resolve("not-a-token"), None);
    }
}

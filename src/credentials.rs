use std::sync::Arc;

use crate::error::CalendarError;
use crate::google::AuthInfo;
use crate::identity::{GOOGLE, IdentityProvider};

/// Turns a user id into Google credentials for one Calendar API call.
///
/// Refresh-token rotation belongs to the identity provider; this only asks
/// for a token and packages it.
#[derive(Clone)]
pub struct CredentialResolver {
    identity: Arc<dyn IdentityProvider>,
    client_id: String,
}

impl CredentialResolver {
    pub fn new(identity: Arc<dyn IdentityProvider>, client_id: impl Into<String>) -> Self {
        Self {
            identity,
            client_id: client_id.into(),
        }
    }

    pub async fn resolve(&self, user_id: &str) -> Result<AuthInfo, CalendarError> {
        let token = self.identity.access_token(user_id, GOOGLE).await?;
        if token.access_token.trim().is_empty() {
            return Err(CalendarError::NoTokenAvailable);
        }

        Ok(AuthInfo {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            client_id: Some(self.client_id.clone()),
            scopes: token.scopes,
            expires_at: token.expires_at,
        })
    }

    /// Drop stored Google tokens after the provider refused them for good.
    pub async fn revoke(&self, user_id: &str) -> Result<(), CalendarError> {
        self.identity.clear_credentials(user_id, GOOGLE).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::AppResult;
    use crate::identity::ProviderToken;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory identity provider for exercising layers above the store.
    #[derive(Default)]
    pub struct StaticIdentity {
        pub tokens: Mutex<HashMap<String, String>>,
        pub cleared: Mutex<Vec<String>>,
    }

    impl StaticIdentity {
        pub fn with_token(user_id: &str, access_token: &str) -> Self {
            let identity = Self::default();
            identity
                .tokens
                .lock()
                .unwrap()
                .insert(user_id.to_string(), access_token.to_string());
            identity
        }
    }

    #[async_trait]
    impl IdentityProvider for StaticIdentity {
        async fn session_user(&self, bearer_token: &str) -> AppResult<Option<String>> {
            Ok(bearer_token.strip_prefix("session-").map(str::to_string))
        }

        async fn access_token(
            &self,
            user_id: &str,
            _provider_id: &str,
        ) -> Result<ProviderToken, CalendarError> {
            let tokens = self.tokens.lock().unwrap();
            let access_token = tokens
                .get(user_id)
                .cloned()
                .ok_or(CalendarError::NoAccountLinked)?;
            Ok(ProviderToken {
                access_token,
                refresh_token: None,
                expires_at: None,
                scopes: vec![],
            })
        }

        async fn clear_credentials(
            &self,
            user_id: &str,
            _provider_id: &str,
        ) -> Result<(), CalendarError> {
            self.tokens.lock().unwrap().remove(user_id);
            self.cleared.lock().unwrap().push(user_id.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_resolve_packages_token() {
        let resolver = CredentialResolver::new(
            Arc::new(StaticIdentity::with_token("u1", "at-1")),
            "client-id",
        );
        let auth = resolver.resolve("u1").await.unwrap();
        assert_eq!(auth.access_token, "at-1");
        assert_eq!(auth.client_id.as_deref(), Some("client-id"));
    }

    #[tokio::test]
    async fn test_resolve_without_account() {
        let resolver = CredentialResolver::new(Arc::new(StaticIdentity::default()), "client-id");
        let err = resolver.resolve("u1").await.unwrap_err();
        assert!(matches!(err, CalendarError::NoAccountLinked));
    }

    #[tokio::test]
    async fn test_resolve_rejects_blank_token() {
        let resolver =
            CredentialResolver::new(Arc::new(StaticIdentity::with_token("u1", "")), "client-id");
        let err = resolver.resolve("u1").await.unwrap_err();
        assert!(matches!(err, CalendarError::NoTokenAvailable));
    }

    #[tokio::test]
    async fn test_revoke_clears() {
        let identity = Arc::new(StaticIdentity::with_token("u1", "at-1"));
        let resolver = CredentialResolver::new(identity.clone(), "client-id");
        resolver.revoke("u1").await.unwrap();
        assert_eq!(*identity.cleared.lock().unwrap(), vec!["u1".to_string()]);
        assert!(resolver.resolve("u1").await.is_err());
    }
}

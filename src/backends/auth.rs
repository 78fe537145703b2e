// SPDX-License-Identifier: GPL-3.0-only

//! Bearer token acquisition
//!
//! Exchanges a client id/secret pair for a bearer token at the token
//! endpoint. The rest of the crate treats the token as an opaque string.

use super::transport::{Credentials, HttpRequest, Transport};
use crate::errors::AuthError;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Opaque bearer credential with an optional expiry
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken {
    token: String,
    expires_on: Option<DateTime<Utc>>,
}

impl BearerToken {
    /// Token without a known expiry
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expires_on: None,
        }
    }

    pub fn with_expiry(token: impl Into<String>, expires_on: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_on: Some(expires_on),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.token
    }

    pub fn expires_on(&self) -> Option<DateTime<Utc>> {
        self.expires_on
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_on.is_some_and(|expiry| expiry <= now)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Non-empty and not past its expiry
    pub fn is_usable(&self) -> bool {
        !self.token.trim().is_empty() && !self.is_expired()
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerToken")
            .field("token", &"***")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

/// Token endpoint response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    token: String,
    #[serde(default)]
    expires_on: Option<String>,
}

/// Parse `expiresOn`; unknown formats are treated as "no expiry"
fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(expiry) => Some(expiry.with_timezone(&Utc)),
        Err(e) => {
            debug!(expires_on = raw, error = %e, "Unrecognized token expiry format");
            None
        }
    }
}

/// Fetches bearer tokens from the token endpoint
pub struct TokenProvider<T: Transport> {
    transport: Arc<T>,
    auth_url: String,
}

impl<T: Transport> TokenProvider<T> {
    pub fn new(transport: Arc<T>, auth_url: impl Into<String>) -> Self {
        Self {
            transport,
            auth_url: auth_url.into(),
        }
    }

    /// Exchange client credentials for a bearer token
    pub async fn fetch_token(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> Result<BearerToken, AuthError> {
        if client_id.trim().is_empty() || client_secret.trim().is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        info!(url = %self.auth_url, "Requesting access token");

        let request = HttpRequest {
            url: self.auth_url.clone(),
            content_type: None,
            credentials: Credentials::Basic {
                username: client_id.to_string(),
                password: client_secret.to_string(),
            },
            body: Vec::new(),
        };

        let response = self.transport.post(request).await.map_err(|e| {
            error!(error = %e, "Authentication request failed");
            AuthError::Transport(e)
        })?;

        if !response.is_success() {
            error!(status = response.status, "Authentication rejected");
            return Err(AuthError::BadStatus(response.status));
        }

        let decoded: AuthResponse = serde_json::from_slice(&response.body)
            .map_err(|e| AuthError::Decode(e.to_string()))?;

        if decoded.token.trim().is_empty() {
            return Err(AuthError::Decode("empty token".to_string()));
        }

        let expires_on = decoded.expires_on.as_deref().and_then(parse_expiry);
        info!(expires_on = ?expires_on, "Authentication successful");

        Ok(BearerToken {
            token: decoded.token,
            expires_on,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::transport::HttpResponse;
    use std::future::Future;
    use std::sync::Mutex;

    struct StaticTransport {
        response: Result<HttpResponse, String>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl StaticTransport {
        fn new(response: Result<HttpResponse, String>) -> Arc<Self> {
            Arc::new(Self {
                response,
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    impl Transport for StaticTransport {
        fn post(
            &self,
            request: HttpRequest,
        ) -> impl Future<Output = Result<HttpResponse, String>> + Send {
            self.requests.lock().unwrap().push(request);
            let response = self.response.clone();
            async move { response }
        }
    }

    fn ok(body: &str) -> Result<HttpResponse, String> {
        Ok(HttpResponse {
            status: 200,
            body: body.as_bytes().to_vec(),
        })
    }

    #[tokio::test]
    async fn test_fetch_token_uses_basic_auth() {
        let transport =
            StaticTransport::new(ok(r#"{"token":"abc","expiresOn":"2030-01-01T00:00:00Z"}"#));
        let provider = TokenProvider::new(transport.clone(), "https://auth.test/token");

        let token = provider.fetch_token("id", "secret").await.unwrap();
        assert_eq!(token.as_str(), "abc");
        assert!(token.expires_on().is_some());
        assert!(token.is_usable());

        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, "https://auth.test/token");
        assert_eq!(
            requests[0].credentials,
            Credentials::Basic {
                username: "id".into(),
                password: "secret".into()
            }
        );
    }

    #[tokio::test]
    async fn test_missing_credentials_skip_network() {
        let transport = StaticTransport::new(ok(r#"{"token":"abc"}"#));
        let provider = TokenProvider::new(transport.clone(), "https://auth.test/token");

        assert_eq!(
            provider.fetch_token("", "secret").await,
            Err(AuthError::MissingCredentials)
        );
        assert!(transport.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_token_errors() {
        let provider = TokenProvider::new(
            StaticTransport::new(Ok(HttpResponse {
                status: 403,
                body: Vec::new(),
            })),
            "https://auth.test/token",
        );
        assert_eq!(
            provider.fetch_token("id", "secret").await,
            Err(AuthError::BadStatus(403))
        );

        let provider = TokenProvider::new(StaticTransport::new(ok("not json")), "u");
        assert!(matches!(
            provider.fetch_token("id", "secret").await,
            Err(AuthError::Decode(_))
        ));

        let provider = TokenProvider::new(StaticTransport::new(Err("refused".into())), "u");
        assert_eq!(
            provider.fetch_token("id", "secret").await,
            Err(AuthError::Transport("refused".into()))
        );
    }

    #[test]
    fn test_token_expiry() {
        let expiry = DateTime::parse_from_rfc3339("2025-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let token = BearerToken::with_expiry("abc", expiry);

        let before = expiry - chrono::Duration::minutes(1);
        let after = expiry + chrono::Duration::minutes(1);
        assert!(!token.is_expired_at(before));
        assert!(token.is_expired_at(after));
        assert!(!BearerToken::new("abc").is_expired());
        assert!(!BearerToken::new("  ").is_usable());
    }

    #[test]
    fn test_unparseable_expiry_is_ignored() {
        assert!(parse_expiry("next tuesday").is_none());
        assert!(parse_expiry("2030-01-01T00:00:00+02:00").is_some());
    }

    #[test]
    fn test_debug_hides_token() {
        let token = BearerToken::new("super-secret");
        assert!(!format!("{:?}", token).contains("super-secret"));
    }
}

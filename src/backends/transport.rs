// SPDX-License-Identifier: GPL-3.0-only

//! HTTP transport abstraction
//!
//! One POST per call, no retries. Retry policy belongs to the caller.

use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Authorization attached to a request
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    None,
    /// HTTP Basic (token endpoint)
    Basic { username: String, password: String },
    /// Bearer token (query endpoint)
    Bearer(String),
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print secrets
        match self {
            Credentials::None => write!(f, "Credentials::None"),
            Credentials::Basic { username, .. } => {
                write!(f, "Credentials::Basic({}, ***)", username)
            }
            Credentials::Bearer(_) => write!(f, "Credentials::Bearer(***)"),
        }
    }
}

/// Outgoing POST request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub content_type: Option<String>,
    pub credentials: Credentials,
    pub body: Vec<u8>,
}

/// Response status and body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends a single POST and returns whatever the server answered
///
/// `Err` is reserved for network-level failures; non-2xx statuses are
/// returned as responses.
pub trait Transport: Send + Sync {
    fn post(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, String>> + Send;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with a per-request timeout
    pub fn new(timeout: Duration) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(format!("vps-relocalizer/{}", env!("GIT_VERSION")))
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {}", e))?;

        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn post(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, String>> + Send {
        let client = self.client.clone();

        async move {
            debug!(url = %request.url, size = request.body.len(), "POST");

            let mut builder = client.post(&request.url);
            if let Some(content_type) = &request.content_type {
                builder = builder.header(reqwest::header::CONTENT_TYPE, content_type);
            }
            builder = match &request.credentials {
                Credentials::None => builder,
                Credentials::Basic { username, password } => {
                    builder.basic_auth(username, Some(password))
                }
                Credentials::Bearer(token) => builder.bearer_auth(token),
            };

            let response = builder
                .body(request.body)
                .send()
                .await
                .map_err(|e| e.to_string())?;

            let status = response.status().as_u16();
            let body = response.bytes().await.map_err(|e| e.to_string())?.to_vec();

            debug!(status, size = body.len(), "Response received");
            Ok(HttpResponse { status, body })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_debug_hides_secrets() {
        let basic = Credentials::Basic {
            username: "client".into(),
            password: "hunter2".into(),
        };
        let bearer = Credentials::Bearer("abc.def".into());

        assert!(!format!("{:?}", basic).contains("hunter2"));
        assert!(!format!("{:?}", bearer).contains("abc.def"));
    }

    #[test]
    fn test_success_range() {
        let response = |status| HttpResponse {
            status,
            body: Vec::new(),
        };
        assert!(response(200).is_success());
        assert!(response(204).is_success());
        assert!(!response(301).is_success());
        assert!(!response(401).is_success());
    }
}

//! HTTP client for login and registration.
//!
//! Both endpoints answer with `{"access_token": "...", "token_type": "bearer"}` on
//! success and `{"detail": ...}` on failure.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use streamchat_core::{AccessToken, ErrorBody};

use crate::error::{AuthError, Result};
use crate::provider::CredentialProvider;
use crate::AuthConfig;

/// Request payload for email/password login.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    /// User's email address.
    pub email: String,
    /// User's password.
    pub password: String,
}

/// Request payload for account registration.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    /// User's email address.
    pub email: String,
    /// User's password.
    pub password: String,
    /// Display name.
    pub full_name: String,
}

/// Raw token response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
}

/// Client for the credential endpoints.
#[derive(Debug, Clone)]
pub struct AuthClient {
    config: AuthConfig,
    client: reqwest::Client,
}

impl AuthClient {
    /// Create a new client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: AuthConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self { config, client })
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Post a JSON body and turn the response into a token.
    async fn post_for_token<B: Serialize + Sync>(&self, url: &str, body: &B) -> Result<AccessToken> {
        let response = self.client.post(url).json(body).send().await?;
        Self::handle_response(response).await
    }

    /// Handle the HTTP response and convert to an `AccessToken`.
    async fn handle_response(response: reqwest::Response) -> Result<AccessToken> {
        let status = response.status();

        if status.is_success() {
            let raw: TokenResponse = response
                .json()
                .await
                .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;

            if raw.access_token.is_empty() {
                return Err(AuthError::InvalidResponse("empty access_token".to_string()));
            }
            if let Some(kind) = raw.token_type.as_deref() {
                if !kind.eq_ignore_ascii_case("bearer") {
                    tracing::warn!(token_type = kind, "Unexpected token type");
                }
            }

            return Ok(AccessToken::new(raw.access_token));
        }

        let body: ErrorBody = response.json().await.unwrap_or_default();
        let message = body
            .message()
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());

        match status.as_u16() {
            401 => Err(AuthError::InvalidCredentials(message)),
            code @ 400..=499 => Err(AuthError::Rejected {
                status: code,
                message,
            }),
            code => Err(AuthError::Server {
                status: code,
                message,
            }),
        }
    }
}

#[async_trait]
impl CredentialProvider for AuthClient {
    async fn login(&self, req: LoginRequest) -> Result<AccessToken> {
        tracing::debug!(email = %req.email, "Logging in");
        self.post_for_token(&self.config.login_url(), &req).await
    }

    async fn register(&self, req: RegisterRequest) -> Result<AccessToken> {
        tracing::debug!(email = %req.email, "Registering account");
        self.post_for_token(&self.config.register_url(), &req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> AuthClient {
        AuthClient::new(AuthConfig::new(server.uri())).unwrap()
    }

    fn login_request() -> LoginRequest {
        LoginRequest {
            email: "ada@example.com".to_string(),
            password: "secret".to_string(),
        }
    }

    #[test]
    fn register_request_serializes() {
        let req = RegisterRequest {
            email: "ada@example.com".to_string(),
            password: "secret".to_string(),
            full_name: "Ada".to_string(),
        };

        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("full_name"));
        assert!(json.contains("ada@example.com"));
    }

    #[tokio::test]
    async fn login_returns_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .and(body_json(serde_json::json!({
                "email": "ada@example.com",
                "password": "secret"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok-1",
                "token_type": "bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let token = client_for(&server).login(login_request()).await.unwrap();
        assert_eq!(token.expose(), "tok-1");
    }

    #[tokio::test]
    async fn login_maps_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(serde_json::json!({ "detail": "bad password" })),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).login(login_request()).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials(ref m) if m == "bad password"));
    }

    #[tokio::test]
    async fn register_maps_conflict_detail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/register"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({ "detail": "email already registered" })),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .register(RegisterRequest {
                email: "ada@example.com".to_string(),
                password: "secret".to_string(),
                full_name: "Ada".to_string(),
            })
            .await
            .unwrap_err();

        match err {
            AuthError::Rejected { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "email already registered");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn server_error_without_body_uses_reason() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client_for(&server).login(login_request()).await.unwrap_err();
        assert!(err.is_retriable());
        assert!(matches!(err, AuthError::Server { status: 503, .. }));
    }

    #[tokio::test]
    async fn malformed_success_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client_for(&server).login(login_request()).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidResponse(_)));
    }
}

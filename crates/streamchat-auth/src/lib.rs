//! Credential provider client for streamchat.
//!
//! This crate obtains the opaque bearer token used by every other part of the
//! client:
//!
//! - Email/password login
//! - Account registration
//! - A [`CredentialProvider`] trait so callers can swap in a mock
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────────┐
//! │   CLI / App      │────▶│  CredentialProvider  │
//! │                  │     │  (trait)             │
//! └──────────────────┘     └──────────┬───────────┘
//!                                     │
//!                          ┌──────────▼───────────┐
//!                          │  AuthClient          │
//!                          │  (reqwest)           │
//!                          └──────────┬───────────┘
//!                                     │ HTTP
//!                          ┌──────────▼───────────┐
//!                          │  /auth/login         │
//!                          │  /auth/register      │
//!                          └──────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use streamchat_auth::{AuthClient, AuthConfig, CredentialProvider, LoginRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = AuthClient::new(AuthConfig::new("http://127.0.0.1:8000"))?;
//!
//! let token = client
//!     .login(LoginRequest {
//!         email: "ada@example.com".to_string(),
//!         password: "hunter2".to_string(),
//!     })
//!     .await?;
//!
//! println!("logged in: {token:?}");
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod client;
pub mod error;
pub mod provider;

pub use client::{AuthClient, LoginRequest, RegisterRequest};
pub use error::{AuthError, Result};
pub use provider::CredentialProvider;

#[cfg(any(test, feature = "test-utils"))]
pub use provider::MockCredentialProvider;

use std::time::Duration;

/// Configuration for the credential provider.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Base URL of the API (e.g., `http://127.0.0.1:8000`).
    pub base_url: String,
    /// Per-request timeout, in seconds.
    pub request_timeout_seconds: u64,
}

impl AuthConfig {
    /// Create a configuration for the given base URL with default settings.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    /// Get the login endpoint URL.
    #[must_use]
    pub fn login_url(&self) -> String {
        format!("{}/auth/login", self.base_url)
    }

    /// Get the registration endpoint URL.
    #[must_use]
    pub fn register_url(&self) -> String {
        format!("{}/auth/register", self.base_url)
    }

    /// Get the request timeout as a Duration.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            request_timeout_seconds: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = AuthConfig::default();
        assert_eq!(config.base_url, "http://127.0.0.1:8000");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn config_urls() {
        let config = AuthConfig::new("https://chat.example.com/");
        assert_eq!(config.login_url(), "https://chat.example.com/auth/login");
        assert_eq!(
            config.register_url(),
            "https://chat.example.com/auth/register"
        );
    }

    #[test]
    fn auth_error_retriable() {
        assert!(AuthError::Server {
            status: 503,
            message: "down".into()
        }
        .is_retriable());
        assert!(!AuthError::InvalidCredentials("nope".into()).is_retriable());
        assert!(!AuthError::Rejected {
            status: 400,
            message: "taken".into()
        }
        .is_retriable());
    }
}

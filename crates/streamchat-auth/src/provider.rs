//! Credential provider abstraction.

use async_trait::async_trait;

use streamchat_core::AccessToken;

use crate::client::{LoginRequest, RegisterRequest};
use crate::error::Result;

/// Something that can exchange user credentials for an access token.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Authenticate with email and password.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials are refused or the provider is unreachable.
    async fn login(&self, req: LoginRequest) -> Result<AccessToken>;

    /// Create an account and return a token for it.
    ///
    /// # Errors
    ///
    /// Returns an error if the account cannot be created or the provider is unreachable.
    async fn register(&self, req: RegisterRequest) -> Result<AccessToken>;
}

/// In-memory provider for tests.
///
/// Accounts are stored as `(email, password)` pairs and every successful call
/// returns a token of the form `token-<email>`.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct MockCredentialProvider {
    accounts: parking_lot::Mutex<Vec<(String, String)>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockCredentialProvider {
    /// Create a provider with no accounts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider with one account already registered.
    #[must_use]
    pub fn with_account(email: &str, password: &str) -> Self {
        let provider = Self::new();
        provider
            .accounts
            .lock()
            .push((email.to_string(), password.to_string()));
        provider
    }

    fn token_for(email: &str) -> AccessToken {
        AccessToken::new(format!("token-{email}"))
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl CredentialProvider for MockCredentialProvider {
    async fn login(&self, req: LoginRequest) -> Result<AccessToken> {
        let accounts = self.accounts.lock();
        if accounts
            .iter()
            .any(|(email, password)| *email == req.email && *password == req.password)
        {
            Ok(Self::token_for(&req.email))
        } else {
            Err(crate::AuthError::InvalidCredentials(
                "incorrect email or password".to_string(),
            ))
        }
    }

    async fn register(&self, req: RegisterRequest) -> Result<AccessToken> {
        let mut accounts = self.accounts.lock();
        if accounts.iter().any(|(email, _)| *email == req.email) {
            return Err(crate::AuthError::Rejected {
                status: 400,
                message: "email already registered".to_string(),
            });
        }
        accounts.push((req.email.clone(), req.password));
        Ok(Self::token_for(&req.email))
    }
}

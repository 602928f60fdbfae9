//! Authentication hook for validating account identity.
//!
//! Realmforge doesn't implement authentication itself. It defines the
//! [`Authenticator`] trait: one async method that turns the token from the
//! `auth` handshake into an [`Account`], and the server calls it once per
//! connection.

use realmforge_protocol::AccountId;
use serde::{Deserialize, Serialize};

use crate::SessionError;

/// Language region of an account. Picks the notice texts it receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RegionType {
    #[default]
    En,
    De,
    Fr,
    Es,
}

/// An authenticated account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    #[serde(default)]
    pub region: RegionType,
}

/// Validates a client's auth token and returns the account behind it.
///
/// # Example
///
/// ```rust
/// use realmforge_protocol::AccountId;
/// use realmforge_session::{Account, Authenticator, RegionType, SessionError};
///
/// /// Accepts numeric tokens and uses them as the account id.
/// /// Only for development.
/// struct DevAuthenticator;
///
/// impl Authenticator for DevAuthenticator {
///     async fn authenticate(&self, token: &str) -> Result<Account, SessionError> {
///         let id: i64 = token
///             .parse()
///             .map_err(|_| SessionError::AuthFailed("token must be a number".into()))?;
///         Ok(Account { id: AccountId(id), name: format!("dev{id}"), region: RegionType::En })
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Validates the given token.
    ///
    /// # Returns
    /// - `Ok(Account)` — the token is valid
    /// - `Err(SessionError::AuthFailed)` — the token is invalid or expired
    fn authenticate(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<Account, SessionError>> + Send;
}

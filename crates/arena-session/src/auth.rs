//! Authentication hook for validating player identity.
//!
//! The server does not decide who may play. That is the job of an
//! [`Authenticator`]: it takes the token a client sent with `Login` and
//! returns a [`PlayerId`] or an error. Production deployments plug in their
//! own (an account database, a signed-token check); development and tests
//! use [`DevAuthenticator`].

use crate::{PlayerId, SessionError};

/// Validates a client's login token and returns their identity.
///
/// Called from the analyzer context only, so implementations are plain
/// `&mut self` objects and may keep a connection to their backing store.
///
/// # Example
///
/// ```rust
/// use std::collections::HashMap;
/// use arena_session::{Authenticator, PlayerId, SessionError};
///
/// /// Accepts only tokens from a fixed table.
/// struct TableAuthenticator(HashMap<String, PlayerId>);
///
/// impl Authenticator for TableAuthenticator {
///     fn authenticate(&mut self, token: &str) -> Result<PlayerId, SessionError> {
///         self.0
///             .get(token)
///             .copied()
///             .ok_or_else(|| SessionError::AuthFailed("unknown token".into()))
///     }
/// }
/// ```
pub trait Authenticator: Send + 'static {
    /// Validates `token` and returns the player it belongs to.
    fn authenticate(&mut self, token: &str) -> Result<PlayerId, SessionError>;

    /// Releases the backing store. Called once during server shutdown.
    fn close(&mut self) {}
}

/// Accepts any numeric token and uses it as the player id.
///
/// For local play and tests only.
#[derive(Debug, Default, Clone, Copy)]
pub struct DevAuthenticator;

impl Authenticator for DevAuthenticator {
    fn authenticate(&mut self, token: &str) -> Result<PlayerId, SessionError> {
        let id: u64 = token
            .trim()
            .parse()
            .map_err(|_| SessionError::AuthFailed("token must be a number".into()))?;
        Ok(PlayerId(id))
    }
}

// Identity: who is signed in, as seen by the pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Environment variable read by [`EnvIdentity`].
pub const USER_ENV_VAR: &str = "LIVE_DETECT_USER";

/// Identifier of the signed-in user, as issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Source of the current user. Sessions are never started without one.
pub trait IdentityProvider: Send + Sync {
    fn current_user(&self) -> Option<UserId>;
}

/// Fixed identity, for hosts that authenticate up front.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(Option<UserId>);

impl StaticIdentity {
    pub fn signed_in(user: UserId) -> Self {
        Self(Some(user))
    }

    pub fn signed_out() -> Self {
        Self(None)
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user(&self) -> Option<UserId> {
        self.0.clone()
    }
}

/// Reads the user id from an environment variable on every call.
#[derive(Debug, Clone)]
pub struct EnvIdentity {
    var: String,
}

impl EnvIdentity {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvIdentity {
    fn default() -> Self {
        Self::new(USER_ENV_VAR)
    }
}

impl IdentityProvider for EnvIdentity {
    fn current_user(&self) -> Option<UserId> {
        std::env::var(&self.var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(UserId::new)
    }
}

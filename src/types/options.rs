//! Service configuration: token settings for the authentication layer and policy options.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_MAX_REFRESH_SECS, DEFAULT_REALM, DEFAULT_TOKEN_HEAD_NAME, DEFAULT_TOKEN_TTL_SECS,
    MAX_TOKEN_LIFETIME_SECS,
};
use crate::error::{Result, RowguardError};

fn default_true() -> bool {
    true
}

/// Top-level configuration, usually loaded from JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub policy: PolicyOptions,
}

impl ServiceConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw).map_err(|err| RowguardError::InvalidConfig {
            reason: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.auth.validate()
    }
}

/// Signed-token settings for the authentication middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_realm")]
    pub realm: String,
    /// HMAC secret used to sign tokens. Must be set.
    #[serde(default)]
    pub signing_key: String,
    /// Lifetime of an issued token.
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
    /// Window, counted from the original login, during which a token may be refreshed.
    #[serde(default = "default_max_refresh_secs")]
    pub max_refresh_secs: u64,
    #[serde(default = "default_token_head_name")]
    pub token_head_name: String,
}

fn default_realm() -> String {
    DEFAULT_REALM.to_string()
}

fn default_token_ttl_secs() -> u64 {
    DEFAULT_TOKEN_TTL_SECS
}

fn default_max_refresh_secs() -> u64 {
    DEFAULT_MAX_REFRESH_SECS
}

fn default_token_head_name() -> String {
    DEFAULT_TOKEN_HEAD_NAME.to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            realm: default_realm(),
            signing_key: String::new(),
            token_ttl_secs: default_token_ttl_secs(),
            max_refresh_secs: default_max_refresh_secs(),
            token_head_name: default_token_head_name(),
        }
    }
}

impl AuthConfig {
    /// Start a fluent builder for `AuthConfig`.
    #[must_use]
    pub fn builder() -> AuthConfigBuilder {
        AuthConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.signing_key.trim().is_empty() {
            return Err(RowguardError::InvalidConfig {
                reason: "auth.signing_key must be set".to_string(),
            });
        }
        if self.token_ttl_secs == 0 {
            return Err(RowguardError::InvalidConfig {
                reason: "auth.token_ttl_secs must be greater than zero".to_string(),
            });
        }
        if self.token_ttl_secs > MAX_TOKEN_LIFETIME_SECS
            || self.max_refresh_secs > MAX_TOKEN_LIFETIME_SECS
        {
            return Err(RowguardError::InvalidConfig {
                reason: format!("auth token lifetimes must not exceed {MAX_TOKEN_LIFETIME_SECS}s"),
            });
        }
        if self.token_head_name.trim().is_empty() || self.token_head_name.contains(' ') {
            return Err(RowguardError::InvalidConfig {
                reason: "auth.token_head_name must be a single non-empty word".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct AuthConfigBuilder {
    inner: AuthConfig,
}

impl AuthConfigBuilder {
    pub fn realm(mut self, realm: impl Into<String>) -> Self {
        self.inner.realm = realm.into();
        self
    }

    pub fn signing_key(mut self, key: impl Into<String>) -> Self {
        self.inner.signing_key = key.into();
        self
    }

    pub fn token_ttl_secs(mut self, secs: u64) -> Self {
        self.inner.token_ttl_secs = secs;
        self
    }

    pub fn max_refresh_secs(mut self, secs: u64) -> Self {
        self.inner.max_refresh_secs = secs;
        self
    }

    pub fn token_head_name(mut self, name: impl Into<String>) -> Self {
        self.inner.token_head_name = name.into();
        self
    }

    #[must_use]
    pub fn build(self) -> AuthConfig {
        self.inner
    }
}

/// Knobs applied when a [`crate::privacy::Policy`] is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyOptions {
    /// Reject chains whose last rule may skip, so every chain ends in an explicit verdict.
    #[serde(default = "default_true")]
    pub require_terminal_rule: bool,
}

impl Default for PolicyOptions {
    fn default() -> Self {
        Self {
            require_terminal_rule: true,
        }
    }
}

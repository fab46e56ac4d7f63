//! API key handling
//!
//! The credential is an opaque string. It is checked for the expected prefix
//! before a direct call is allowed, but its content is never interpreted, and
//! it is masked in all formatted output.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::db::KeyValueStore;
use crate::Result;

/// Settings key holding the user's API key
pub const CREDENTIAL_KEY: &str = "ml_apikey";

/// Environment variable consulted when no key is stored
pub const CREDENTIAL_ENV_VAR: &str = "ANTHROPIC_API_KEY";

/// Prefix every Anthropic API key starts with
pub const CREDENTIAL_PREFIX: &str = "sk-ant-";

/// Opaque API key
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap user input; `None` when the input is blank
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Prefix check only; the key itself is validated by the upstream service
    pub fn looks_well_formed(&self) -> bool {
        self.0.starts_with(CREDENTIAL_PREFIX)
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Short masked form for display, e.g. `sk-ant-…a1b2`
    pub fn masked(&self) -> String {
        let tail: String = self
            .0
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        if self.looks_well_formed() && self.0.len() > CREDENTIAL_PREFIX.len() + 4 {
            format!("{}…{}", CREDENTIAL_PREFIX, tail)
        } else {
            format!("…{}", tail)
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({})", self.masked())
    }
}

/// Persisted credential slot
pub struct CredentialStore {
    store: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Stored key, if any
    pub async fn load(&self) -> Result<Option<Credential>> {
        Ok(self.store.get(CREDENTIAL_KEY).await?.and_then(Credential::new))
    }

    /// Persist a key; blank input is ignored and returns `None`
    pub async fn save(&self, raw: &str) -> Result<Option<Credential>> {
        let Some(credential) = Credential::new(raw) else {
            debug!("Ignoring blank API key");
            return Ok(None);
        };

        if !credential.looks_well_formed() {
            warn!(
                "API key does not start with '{}'; saving anyway",
                CREDENTIAL_PREFIX
            );
        }

        self.store.set(CREDENTIAL_KEY, credential.expose()).await?;
        info!(key_len = credential.expose().len(), "API key saved");
        Ok(Some(credential))
    }

    pub async fn clear(&self) -> Result<()> {
        self.store.remove(CREDENTIAL_KEY).await
    }

    /// Resolve the key for this session
    ///
    /// **Priority:** stored settings → `ANTHROPIC_API_KEY` environment variable
    pub async fn resolve(&self) -> Option<Credential> {
        let stored = match self.load().await {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Stored API key unavailable: {}", e);
                None
            }
        };
        let env = std::env::var(CREDENTIAL_ENV_VAR).ok().and_then(Credential::new);

        if stored.is_some() && env.is_some() {
            warn!(
                "API key found in settings and {}. Using settings (highest priority).",
                CREDENTIAL_ENV_VAR
            );
        }

        match (stored, env) {
            (Some(key), _) => {
                info!("API key loaded from settings");
                Some(key)
            }
            (None, Some(key)) => {
                info!("API key loaded from environment variable");
                Some(key)
            }
            (None, None) => None,
        }
    }
}

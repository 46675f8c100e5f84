// Static server identity

use qsync_core::port::ServerIdentity;

/// Identity fixed at construction
#[derive(Debug, Clone)]
pub struct StaticServerIdentity {
    id: String,
}

impl StaticServerIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Read the id from `var`, falling back to `default` when unset or blank
    pub fn from_env_or(var: &str, default: &str) -> Self {
        let id = std::env::var(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default.to_string());
        Self::new(id)
    }
}

impl ServerIdentity for StaticServerIdentity {
    fn id(&self) -> &str {
        &self.id
    }
}

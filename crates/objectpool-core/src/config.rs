use crate::claim::DEFAULT_CLAIM_TTL_SECONDS;

/// Tunables for one [`crate::pool::ObjectPool`]. Plain constructor
/// parameters with documented defaults rather than an external
/// config-file format - there is nothing here an operator needs to
/// hot-reload, and every field has a sane default.
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    /// Lease duration requested by `claim`/`extend`. Auto-extension
    /// fires at half of this value.
    pub claim_ttl_seconds: u64,
}

impl PoolConfig {
    pub fn new() -> Self {
        Self {
            claim_ttl_seconds: DEFAULT_CLAIM_TTL_SECONDS,
        }
    }

    pub fn with_claim_ttl_seconds(mut self, ttl_seconds: u64) -> Self {
        self.claim_ttl_seconds = ttl_seconds;
        self
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new()
    }
}

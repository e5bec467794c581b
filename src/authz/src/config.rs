//! Resolver configuration
//!
//! Values come from [`ResolverConfig::default`], a serialized document, or the
//! environment:
//!
//! - `SCOPEGATE_MAX_LAST_USED_DELAY_SECS` - how stale a client's last-used
//!   timestamp may get before it is written back (default: 21600)
//! - `SCOPEGATE_MAX_EXPANSION_STEPS` - safety cap for fixed-point expansion
//!   (default: 1000000)

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default staleness tolerated for client last-used timestamps (6 hours)
pub const DEFAULT_MAX_LAST_USED_DELAY: Duration = Duration::from_secs(6 * 60 * 60);

/// Default cap on scopes processed by one expansion
pub const DEFAULT_MAX_EXPANSION_STEPS: usize = 1_000_000;

/// Scope resolver configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResolverConfig {
    /// Client last-used timestamps are only written back when older than this
    #[serde(with = "duration_secs")]
    pub max_last_used_delay: Duration,

    /// Maximum number of scopes a single expansion may process
    pub max_expansion_steps: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_last_used_delay: DEFAULT_MAX_LAST_USED_DELAY,
            max_expansion_steps: DEFAULT_MAX_EXPANSION_STEPS,
        }
    }
}

impl ResolverConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let max_last_used_delay = std::env::var("SCOPEGATE_MAX_LAST_USED_DELAY_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.max_last_used_delay);

        let max_expansion_steps = std::env::var("SCOPEGATE_MAX_EXPANSION_STEPS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|steps: &usize| *steps > 0)
            .unwrap_or(defaults.max_expansion_steps);

        Self {
            max_last_used_delay,
            max_expansion_steps,
        }
    }

    /// Set the last-used write-back threshold
    pub fn with_max_last_used_delay(mut self, delay: Duration) -> Self {
        self.max_last_used_delay = delay;
        self
    }

    /// Set the expansion safety cap
    pub fn with_max_expansion_steps(mut self, steps: usize) -> Self {
        self.max_expansion_steps = steps;
        self
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

//! Pipeline configuration.

use tracing::warn;

/// Tunable pipeline policy, resolved once at the composition root.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum automated repair attempts per build-failure episode
    pub healing_max_attempts: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            healing_max_attempts: 3,
        }
    }
}

impl PipelineConfig {
    /// Resolve configuration from the environment.
    ///
    /// `FORGE_HEALING_MAX_ATTEMPTS` overrides the healing budget.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var("FORGE_HEALING_MAX_ATTEMPTS") {
            match raw.parse::<u32>() {
                Ok(n) if n > 0 => config.healing_max_attempts = n,
                _ => warn!(raw, "ignoring invalid FORGE_HEALING_MAX_ATTEMPTS"),
            }
        }
        config
    }

    pub fn healing_max_attempts(mut self, n: u32) -> Self {
        self.healing_max_attempts = n.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_healing_budget() {
        assert_eq!(PipelineConfig::default().healing_max_attempts, 3);
    }

    #[test]
    fn test_builder_floor_is_one() {
        assert_eq!(PipelineConfig::default().healing_max_attempts(0).healing_max_attempts, 1);
    }
}

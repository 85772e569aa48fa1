//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

/// Subscriber settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Filter used when `RUST_LOG` is unset, e.g. `info` or
    /// `lrsync_infra=debug`.
    pub default_level: String,
    /// Emit one JSON object per event instead of human-readable lines.
    pub json: bool,
    /// Include the event target (module path).
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { default_level: "info".to_string(), json: false, with_target: true }
    }
}

impl LogConfig {
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.default_level = level.into();
        self
    }

    pub fn json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.default_level))
    }
}

/// Install a global fmt subscriber.
///
/// Returns `false` when a global subscriber was already installed; the
/// existing one is kept.
pub fn init_tracing(config: &LogConfig) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(config.filter())
        .with_target(config.with_target);

    let result = if config.json { builder.json().try_init() } else { builder.try_init() };
    match result {
        Ok(()) => {
            tracing::debug!(level = %config.default_level, json = config.json, "Tracing initialised");
            true
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = LogConfig::default();
        assert_eq!(config.default_level, "info");
        assert!(!config.json);
        assert!(config.with_target);
    }

    #[test]
    fn second_initialisation_keeps_first_subscriber() {
        let config = LogConfig::default().with_level("debug").json(true);
        let first = init_tracing(&config);
        let second = init_tracing(&config);
        assert!(!second);
        // Another test in this binary may have installed one first
        let _ = first;
    }
}

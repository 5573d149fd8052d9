//! Common configuration types for Planning Poker components.

use serde::{Deserialize, Serialize};

/// Default log filter used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Observability configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full `EnvFilter` directive
    pub log_level: String,
    /// Enable JSON-formatted logs
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            json_logs: false,
        }
    }
}

impl ObservabilityConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is absent.
    ///
    /// A bare level applies to `crate_target` and `tower_http`; anything
    /// containing `=` or `,` is taken as a full directive.
    #[must_use]
    pub fn filter_directive(&self, crate_target: &str) -> String {
        let level = self.log_level.trim();
        if level.contains('=') || level.contains(',') {
            level.to_string()
        } else {
            format!("{crate_target}={level},tower_http={level}")
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_level_expands_to_crate_and_http() {
        let config = ObservabilityConfig {
            log_level: "debug".to_string(),
            json_logs: false,
        };
        assert_eq!(
            config.filter_directive("poker_service"),
            "poker_service=debug,tower_http=debug"
        );
    }

    #[test]
    fn test_full_directive_passes_through() {
        let config = ObservabilityConfig {
            log_level: "poker.ws=trace,info".to_string(),
            json_logs: true,
        };
        assert_eq!(config.filter_directive("poker_service"), "poker.ws=trace,info");
    }
}

//! Log subscriber setup for hosts that do not install their own.

use tracing_subscriber::EnvFilter;

use crate::config::EnvConfig;

const DEFAULT_FILTER: &str = "warn";

/// Builds the filter from `FLOWFILE_SCRIPT_LOG`, falling back to `warn`.
pub fn env_filter(config: &EnvConfig) -> EnvFilter {
    let directive = config.log_filter.as_deref().unwrap_or(DEFAULT_FILTER);
    EnvFilter::try_new(directive).unwrap_or_else(|err| {
        eprintln!("invalid FLOWFILE_SCRIPT_LOG '{directive}', using {DEFAULT_FILTER}: {err}");
        EnvFilter::new(DEFAULT_FILTER)
    })
}

/// Installs a stderr fmt subscriber.
///
/// Returns `false` when a global subscriber was already set; the existing one
/// stays in place.
pub fn init(config: &EnvConfig) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::{env_filter, init};
    use crate::config::EnvConfig;

    #[test]
    fn filter_defaults_to_warn() {
        let filter = env_filter(&EnvConfig::default());
        assert_eq!(filter.to_string(), "warn");
    }

    #[test]
    fn invalid_directive_falls_back_to_warn() {
        let config = EnvConfig {
            log_filter: Some("flowfile_script=notalevel".to_string()),
            ..EnvConfig::default()
        };
        assert_eq!(env_filter(&config).to_string(), "warn");
    }

    #[test]
    fn second_init_keeps_existing_subscriber() {
        let config = EnvConfig::default();
        let _ = init(&config);
        assert!(!init(&config));
    }
}

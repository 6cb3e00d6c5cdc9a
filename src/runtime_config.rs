//! # Runtime Configuration Module
//!
//! Environment-driven defaults for services that embed the enforcer.
//!
//! ## Environment Variables
//!
//! ### `OAS_ENFORCER_ALLOW_OTHER_QUERY_PARAMETERS`
//!
//! Default for [`EnforceOptions::allow_other_query_parameters`]. `1`, `true`,
//! `yes` and `on` enable it (case-insensitive); anything else disables it.
//!
//! Default: disabled
//!
//! ### `OAS_ENFORCER_LOG_FORMAT`
//!
//! `json` or `pretty`, passed to [`logging::init`](crate::logging::init).
//!
//! Default: `json`
//!
//! ## Usage
//!
//! ```rust
//! use oas_enforcer::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! let options = config.enforce_options();
//! println!("allow other query parameters: {}", options.allow_other_query_parameters);
//! ```
//!
//! ## Example Configuration
//!
//! ```bash
//! export OAS_ENFORCER_ALLOW_OTHER_QUERY_PARAMETERS=true
//! export OAS_ENFORCER_LOG_FORMAT=pretty
//! ```

use crate::enforcer::EnforceOptions;
use crate::logging::LogFormat;
use std::env;

pub const ALLOW_OTHER_QUERY_PARAMETERS_VAR: &str = "OAS_ENFORCER_ALLOW_OTHER_QUERY_PARAMETERS";
pub const LOG_FORMAT_VAR: &str = "OAS_ENFORCER_LOG_FORMAT";

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub allow_other_query_parameters: bool,
    pub log_format: LogFormat,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            allow_other_query_parameters: false,
            log_format: LogFormat::Json,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let allow_other_query_parameters = lookup(ALLOW_OTHER_QUERY_PARAMETERS_VAR)
            .map(|val| parse_flag(&val))
            .unwrap_or(false);
        let log_format = lookup(LOG_FORMAT_VAR)
            .map(|val| LogFormat::parse(&val))
            .unwrap_or(LogFormat::Json);
        RuntimeConfig {
            allow_other_query_parameters,
            log_format,
        }
    }

    /// Enforcement options with this configuration's defaults.
    #[must_use]
    pub fn enforce_options(&self) -> EnforceOptions {
        EnforceOptions {
            allow_other_query_parameters: self.allow_other_query_parameters,
        }
    }
}

fn parse_flag(val: &str) -> bool {
    matches!(
        val.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(RuntimeConfig::from_lookup(lookup(&[])), RuntimeConfig::default());
    }

    #[test]
    fn reads_flags_and_format() {
        let config = RuntimeConfig::from_lookup(lookup(&[
            (ALLOW_OTHER_QUERY_PARAMETERS_VAR, "Yes"),
            (LOG_FORMAT_VAR, "pretty"),
        ]));
        assert!(config.allow_other_query_parameters);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.enforce_options().allow_other_query_parameters);

        let config =
            RuntimeConfig::from_lookup(lookup(&[(ALLOW_OTHER_QUERY_PARAMETERS_VAR, "nope")]));
        assert!(!config.allow_other_query_parameters);
    }
}

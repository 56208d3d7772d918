//! Environment configuration.

use thiserror::Error;

/// Configuration errors. Production deployments fail fast on these.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing catalog credentials for production deployment (set PLANGUARD_CATALOG_TOKEN)")]
    MissingCredentials,
}

/// Runtime configuration read from the environment.
///
/// Endpoints select the remote store clients; when absent, the in-process
/// implementations are used.
#[derive(Clone, Debug)]
pub struct PlanguardConfig {
    /// Remote price catalog service (`PLANGUARD_PRICING_ENDPOINT`)
    pub pricing_endpoint: Option<String>,
    /// Remote carbon intensity service (`PLANGUARD_CARBON_ENDPOINT`)
    pub carbon_endpoint: Option<String>,
    /// Remote policy evaluator (`PLANGUARD_POLICY_ENDPOINT`)
    pub policy_endpoint: Option<String>,
    /// Bearer credential for the catalog store (`PLANGUARD_CATALOG_TOKEN`)
    pub catalog_token: Option<String>,
    /// Default pricing alias (`PLANGUARD_PRICING_ALIAS`, default `default`)
    pub pricing_alias: String,
    /// Default region for fallback lookups (`PLANGUARD_DEFAULT_REGION`)
    pub default_region: String,
    /// Log filter (`PLANGUARD_LOG`, default `info`)
    pub log_level: String,
}

impl PlanguardConfig {
    pub fn from_env() -> Self {
        Self {
            pricing_endpoint: read("PLANGUARD_PRICING_ENDPOINT"),
            carbon_endpoint: read("PLANGUARD_CARBON_ENDPOINT"),
            policy_endpoint: read("PLANGUARD_POLICY_ENDPOINT"),
            catalog_token: read("PLANGUARD_CATALOG_TOKEN"),
            pricing_alias: read("PLANGUARD_PRICING_ALIAS")
                .unwrap_or_else(|| "default".to_string()),
            default_region: read("PLANGUARD_DEFAULT_REGION")
                .unwrap_or_else(|| "us-east-1".to_string()),
            log_level: read("PLANGUARD_LOG").unwrap_or_else(|| "info".to_string()),
        }
    }

    /// Fail fast at startup: a production-class deployment pointed at a
    /// remote catalog must carry credentials.
    pub fn ensure_production_ready(&self, production_class: bool) -> Result<(), ConfigError> {
        if production_class && self.pricing_endpoint.is_some() && self.catalog_token.is_none() {
            return Err(ConfigError::MissingCredentials);
        }
        Ok(())
    }
}

fn read(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(endpoint: Option<&str>, token: Option<&str>) -> PlanguardConfig {
        PlanguardConfig {
            pricing_endpoint: endpoint.map(String::from),
            carbon_endpoint: None,
            policy_endpoint: None,
            catalog_token: token.map(String::from),
            pricing_alias: "default".to_string(),
            default_region: "us-east-1".to_string(),
            log_level: "info".to_string(),
        }
    }

    #[test]
    fn production_with_remote_catalog_requires_credentials() {
        let cfg = config(Some("https://pricing.internal"), None);
        assert!(cfg.ensure_production_ready(true).is_err());
        assert!(cfg.ensure_production_ready(false).is_ok());
    }

    #[test]
    fn credentials_satisfy_the_check() {
        let cfg = config(Some("https://pricing.internal"), Some("token"));
        assert!(cfg.ensure_production_ready(true).is_ok());
    }

    #[test]
    fn local_stores_need_no_credentials() {
        let cfg = config(None, None);
        assert!(cfg.ensure_production_ready(true).is_ok());
    }
}

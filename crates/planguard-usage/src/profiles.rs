use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ForecastError;

/// Expected usage pattern for one deployment environment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnvironmentProfile {
    pub name: String,
    /// Fraction of full capacity actually used, in [0, 1]
    pub utilization: f64,
    /// How much P90 exceeds P50
    pub variance_factor: f64,
    /// Monthly growth applied to provisioned storage P90
    pub growth_factor: f64,
    pub base_confidence: f64,
    /// Monthly egress baseline in GB, before utilization
    pub egress_baseline_gb: f64,
    /// Monthly request baseline, before utilization
    pub request_baseline: f64,
    /// Production-class environments trip the incomplete fail-closed gate
    pub production_class: bool,
}

/// Profile table, built at startup and read-only afterwards.
pub struct ProfileTable {
    profiles: HashMap<String, EnvironmentProfile>,
}

impl ProfileTable {
    /// The recognized defaults: dev, staging, prod.
    pub fn with_defaults() -> Self {
        let mut profiles = HashMap::new();
        profiles.insert(
            "dev".to_string(),
            EnvironmentProfile {
                name: "dev".to_string(),
                utilization: 0.20,
                variance_factor: 1.3,
                growth_factor: 0.0,
                base_confidence: 0.70,
                egress_baseline_gb: 10.0,
                request_baseline: 10_000.0,
                production_class: false,
            },
        );
        profiles.insert(
            "staging".to_string(),
            EnvironmentProfile {
                name: "staging".to_string(),
                utilization: 0.50,
                variance_factor: 1.4,
                growth_factor: 0.05,
                base_confidence: 0.65,
                egress_baseline_gb: 50.0,
                request_baseline: 100_000.0,
                production_class: false,
            },
        );
        profiles.insert(
            "prod".to_string(),
            EnvironmentProfile {
                name: "prod".to_string(),
                utilization: 1.00,
                variance_factor: 1.5,
                growth_factor: 0.10,
                base_confidence: 0.60,
                egress_baseline_gb: 100.0,
                request_baseline: 1_000_000.0,
                production_class: true,
            },
        );
        Self { profiles }
    }

    /// Register a custom profile. Only valid during startup wiring.
    pub fn register(&mut self, profile: EnvironmentProfile) {
        self.profiles.insert(profile.name.clone(), profile);
    }

    /// Look up a profile; unknown names are fatal.
    pub fn get(&self, environment: &str) -> Result<&EnvironmentProfile, ForecastError> {
        self.profiles
            .get(environment)
            .ok_or_else(|| ForecastError::UnknownEnvironment(environment.to_string()))
    }

    pub fn is_production_class(&self, environment: &str) -> bool {
        self.profiles
            .get(environment)
            .map(|p| p.production_class)
            .unwrap_or(false)
    }
}

impl Default for ProfileTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

/// Grid average used when a region is not in the table, in gCO₂e/kWh.
pub const DEFAULT_INTENSITY: f64 = 400.0;

/// Carbon store errors.
#[derive(Debug, Error)]
pub enum CarbonError {
    #[error("carbon backend error: {0}")]
    Backend(String),
}

/// Region carbon intensity source.
#[async_trait]
pub trait CarbonStore: Send + Sync {
    /// Intensity for a (provider, region) in gCO₂e/kWh.
    async fn intensity(&self, provider: &str, region: &str) -> Result<f64, CarbonError>;
}

/// Static intensity table, approximate 2024 grid data.
pub struct StaticCarbonStore {
    aws: HashMap<&'static str, f64>,
}

impl StaticCarbonStore {
    pub fn new() -> Self {
        let aws = HashMap::from([
            ("us-east-1", 383.0),      // Virginia
            ("us-east-2", 425.0),      // Ohio
            ("us-west-1", 233.0),      // N. California
            ("us-west-2", 78.0),       // Oregon, hydro
            ("eu-west-1", 316.0),      // Ireland
            ("eu-west-2", 228.0),      // London
            ("eu-west-3", 51.0),       // Paris, nuclear
            ("eu-central-1", 338.0),   // Frankfurt
            ("eu-north-1", 8.0),       // Stockholm, hydro
            ("ap-northeast-1", 471.0), // Tokyo
            ("ap-southeast-1", 408.0), // Singapore
            ("ap-southeast-2", 656.0), // Sydney
            ("ap-south-1", 708.0),     // Mumbai
            ("sa-east-1", 74.0),       // São Paulo
            ("ca-central-1", 120.0),   // Montreal
        ]);
        Self { aws }
    }
}

impl Default for StaticCarbonStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CarbonStore for StaticCarbonStore {
    async fn intensity(&self, provider: &str, region: &str) -> Result<f64, CarbonError> {
        if provider == "aws" || provider.is_empty() {
            if let Some(&intensity) = self.aws.get(region) {
                return Ok(intensity);
            }
        }
        Ok(DEFAULT_INTENSITY)
    }
}

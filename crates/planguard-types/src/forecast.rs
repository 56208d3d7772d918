use serde::{Deserialize, Serialize};

/// Monthly usage forecast for exactly one billing component.
///
/// Invariants: `p50 <= p90`, `confidence` in [0, 1].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UsageForecast {
    pub component_id: String,
    /// What is being measured, e.g. `hours`, `gb_months`, `requests`
    pub metric: String,
    /// Unit label for rendering, e.g. `hours/month`
    pub unit: String,
    pub p50: f64,
    pub p90: f64,
    pub confidence: f64,
    #[serde(default)]
    pub assumptions: Vec<String>,
}

impl UsageForecast {
    pub fn with_assumption(mut self, assumption: impl Into<String>) -> Self {
        self.assumptions.push(assumption.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assumptions_accumulate() {
        let forecast = UsageForecast {
            component_id: "aws_instance.web:compute".to_string(),
            metric: "hours".to_string(),
            unit: "hours/month".to_string(),
            p50: 146.0,
            p90: 189.8,
            confidence: 0.7,
            assumptions: vec!["base-730-hours".to_string()],
        }
        .with_assumption("utilization-dev");
        assert_eq!(forecast.assumptions.len(), 2);
    }
}

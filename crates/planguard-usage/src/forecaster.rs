use planguard_types::confidence;
use planguard_types::units::HOURS_PER_MONTH;
use planguard_types::{BillingComponent, BillingPeriod, ComponentKind, UsageForecast, UsageMode};
use tracing::trace;

use crate::profiles::{EnvironmentProfile, ProfileTable};
use crate::ForecastError;

/// Produces a [`UsageForecast`] per billing component.
///
/// Dispatch is on billing period first (how the component bills), then on
/// usage mode for hour-billed capacity.
pub struct Forecaster {
    profiles: ProfileTable,
}

impl Forecaster {
    pub fn new(profiles: ProfileTable) -> Self {
        Self { profiles }
    }

    pub fn profiles(&self) -> &ProfileTable {
        &self.profiles
    }

    pub fn forecast(
        &self,
        component: &BillingComponent,
        environment: &str,
    ) -> Result<UsageForecast, ForecastError> {
        let profile = self.profiles.get(environment)?;

        let forecast = match component.billing_period {
            BillingPeriod::Hourly => self.forecast_hours(component, profile),
            BillingPeriod::Monthly => self.forecast_capacity(component, profile),
            BillingPeriod::PerGigabyte => self.forecast_egress(component, profile),
            BillingPeriod::PerRequest => self.forecast_requests(component, profile),
        };
        trace!(
            component = %component.id,
            p50 = forecast.p50,
            p90 = forecast.p90,
            confidence = forecast.confidence,
            "forecast"
        );
        Ok(forecast)
    }

    /// Hour-billed capacity: duty cycle by usage mode.
    fn forecast_hours(
        &self,
        component: &BillingComponent,
        profile: &EnvironmentProfile,
    ) -> UsageForecast {
        let combined = combine(component.variance.confidence, profile.base_confidence);
        let mut forecast = UsageForecast {
            component_id: component.id.clone(),
            metric: "hours".to_string(),
            unit: "hours/month".to_string(),
            p50: 0.0,
            p90: 0.0,
            confidence: combined,
            assumptions: vec!["base-730-hours".to_string()],
        };

        match component.usage_mode {
            UsageMode::Reserved => {
                // Reserved capacity runs the full month, near-deterministically.
                forecast.p50 = HOURS_PER_MONTH;
                forecast.p90 = HOURS_PER_MONTH;
                forecast.confidence = confidence::HIGH;
                forecast = forecast.with_assumption("reserved-full-utilization");
            }
            UsageMode::Spot => {
                forecast.p50 = HOURS_PER_MONTH * 0.85;
                forecast.p90 = HOURS_PER_MONTH * 0.95;
                forecast.confidence = confidence::decay(combined, 1);
                forecast = forecast.with_assumption("spot-interruption-risk");
            }
            UsageMode::OnDemand | UsageMode::Provisioned => {
                forecast.p50 = HOURS_PER_MONTH * profile.utilization;
                forecast.p90 =
                    (forecast.p50 * profile.variance_factor).min(HOURS_PER_MONTH);
                forecast = forecast
                    .with_assumption(format!("utilization-{}", profile.name));
            }
        }
        forecast
    }

    /// Month-billed provisioned capacity: the size is the forecast.
    fn forecast_capacity(
        &self,
        component: &BillingComponent,
        profile: &EnvironmentProfile,
    ) -> UsageForecast {
        let size = component.variance.baseline;
        let (p50, p90, conf, metric, unit) = match component.kind {
            ComponentKind::Storage if component.usage_mode == UsageMode::Provisioned => (
                size,
                size * (1.0 + profile.growth_factor),
                confidence::HIGH,
                "gb_months",
                "GB-months",
            ),
            ComponentKind::Storage => {
                // Usage-billed object storage: wide prior, low confidence.
                let combined = combine(component.variance.confidence, profile.base_confidence);
                (
                    component.variance.p50 * profile.utilization,
                    component.variance.p90,
                    combined.clamp(0.3, 0.5),
                    "gb_months",
                    "GB-months",
                )
            }
            _ => (
                size,
                size,
                confidence::HIGH,
                "units",
                "units/month",
            ),
        };

        UsageForecast {
            component_id: component.id.clone(),
            metric: metric.to_string(),
            unit: unit.to_string(),
            p50,
            p90,
            confidence: conf,
            assumptions: vec!["provisioned-capacity".to_string()],
        }
    }

    /// Per-GB egress: environment-scaled baseline with explicitly high variance.
    fn forecast_egress(
        &self,
        component: &BillingComponent,
        profile: &EnvironmentProfile,
    ) -> UsageForecast {
        let p50 = profile.egress_baseline_gb * profile.utilization;
        let combined = combine(component.variance.confidence, profile.base_confidence);
        UsageForecast {
            component_id: component.id.clone(),
            metric: "gb_transfer".to_string(),
            unit: "GB/month".to_string(),
            p50,
            p90: p50 * 2.0,
            confidence: combined.clamp(confidence::FLOOR, confidence::LOW),
            assumptions: vec![
                "network-heuristic".to_string(),
                "high-variance".to_string(),
            ],
        }
    }

    /// Request-driven usage: environment-scaled baseline, confidence floored.
    fn forecast_requests(
        &self,
        component: &BillingComponent,
        profile: &EnvironmentProfile,
    ) -> UsageForecast {
        let combined = combine(component.variance.confidence, profile.base_confidence);
        UsageForecast {
            component_id: component.id.clone(),
            metric: "requests".to_string(),
            unit: "requests/month".to_string(),
            p50: profile.request_baseline * profile.utilization,
            p90: profile.request_baseline * profile.variance_factor,
            confidence: combined.max(confidence::FLOOR),
            assumptions: vec![
                "request-heuristic".to_string(),
                "requires-historical-data".to_string(),
            ],
        }
    }
}

/// Component-intrinsic and profile confidence combine by geometric mean so
/// the weaker signal dominates. A zero intrinsic score falls back to the
/// profile alone (the mapper seeded no prior).
fn combine(intrinsic: f64, profile_base: f64) -> f64 {
    if intrinsic <= 0.0 {
        return profile_base;
    }
    confidence::geometric_mean(&[intrinsic, profile_base])
}

//! Unit normalization between forecast metrics and price units.

use planguard_types::units::HOURS_PER_MONTH;
use planguard_types::{BillingComponent, UsageForecast};
use thiserror::Error;

/// Normalization failures. Both are critical in aggregation.
#[derive(Debug, Error, PartialEq)]
pub enum NormalizeError {
    #[error("component bills in GB-month but carries no size_gb")]
    MissingSize,

    #[error("cannot normalize forecast metric {metric} against price unit {unit}")]
    UnitMismatch { metric: String, unit: String },
}

/// Map a forecast onto the quantity the price unit bills in.
///
/// The interesting case is a GB-month price against an hours forecast: the
/// billed quantity is `size_gb × (hours / 730)`. Time-against-time and
/// like-against-like pass the forecast through unchanged.
pub fn normalize_quantity(
    component: &BillingComponent,
    forecast: &UsageForecast,
    price_unit: &str,
) -> Result<(f64, f64), NormalizeError> {
    match (price_unit, forecast.metric.as_str()) {
        ("hours", "hours") => Ok((forecast.p50, forecast.p90)),
        ("GB-month", "gb_months") => Ok((forecast.p50, forecast.p90)),
        ("GB-month", "hours") => {
            let size = component.size_gb.ok_or(NormalizeError::MissingSize)?;
            Ok((
                size * (forecast.p50 / HOURS_PER_MONTH),
                size * (forecast.p90 / HOURS_PER_MONTH),
            ))
        }
        ("GB", "gb_transfer") | ("GB", "gb_months") => Ok((forecast.p50, forecast.p90)),
        ("requests", "requests") => Ok((forecast.p50, forecast.p90)),
        (unit, metric) if unit == metric => Ok((forecast.p50, forecast.p90)),
        ("units", _) => Ok((forecast.p50, forecast.p90)),
        (unit, metric) => Err(NormalizeError::UnitMismatch {
            metric: metric.to_string(),
            unit: unit.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use planguard_types::{
        BillingPeriod, ComponentKind, UsageMode, VarianceProfile,
    };
    use std::collections::BTreeMap;

    fn component(size_gb: Option<f64>) -> BillingComponent {
        BillingComponent {
            id: "aws_ebs_volume.data:storage".to_string(),
            resource_address: "aws_ebs_volume.data".to_string(),
            kind: ComponentKind::Storage,
            usage_mode: UsageMode::Provisioned,
            billing_period: BillingPeriod::Monthly,
            service: "AmazonEC2".to_string(),
            product_family: "Storage".to_string(),
            provider: "aws".to_string(),
            region: "us-east-1".to_string(),
            lookup_attributes: BTreeMap::new(),
            size_gb,
            description: String::new(),
            variance: VarianceProfile::provisioned(50.0),
            depends_on: vec![],
            mapping_error: None,
        }
    }

    fn forecast(metric: &str, p50: f64, p90: f64) -> UsageForecast {
        UsageForecast {
            component_id: "aws_ebs_volume.data:storage".to_string(),
            metric: metric.to_string(),
            unit: metric.to_string(),
            p50,
            p90,
            confidence: 0.9,
            assumptions: vec![],
        }
    }

    #[test]
    fn gb_month_against_gb_months_passes_through() {
        let quantity =
            normalize_quantity(&component(Some(50.0)), &forecast("gb_months", 50.0, 55.0), "GB-month")
                .unwrap();
        assert_eq!(quantity, (50.0, 55.0));
    }

    #[test]
    fn gb_month_against_hours_scales_by_duty_cycle() {
        let quantity =
            normalize_quantity(&component(Some(100.0)), &forecast("hours", 365.0, 730.0), "GB-month")
                .unwrap();
        assert!((quantity.0 - 50.0).abs() < 1e-9);
        assert!((quantity.1 - 100.0).abs() < 1e-9);
    }

    #[test]
    fn gb_month_against_hours_without_size_is_an_error() {
        let err =
            normalize_quantity(&component(None), &forecast("hours", 365.0, 730.0), "GB-month")
                .unwrap_err();
        assert_eq!(err, NormalizeError::MissingSize);
    }

    #[test]
    fn unrelated_units_mismatch() {
        let err =
            normalize_quantity(&component(Some(50.0)), &forecast("requests", 1.0, 2.0), "GB-month")
                .unwrap_err();
        assert!(matches!(err, NormalizeError::UnitMismatch { .. }));
    }
}

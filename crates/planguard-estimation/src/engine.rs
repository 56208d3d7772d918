use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use planguard_carbon::{storage_kwh_per_gb_month, PowerModel, DEFAULT_INTENSITY};
use planguard_catalog::{tiered_cost, ResolvedPricing, TierError};
use planguard_types::confidence;
use planguard_types::units::HOURS_PER_MONTH;
use planguard_types::{
    BillingComponent, ComponentKind, CostDriver, EstimationError, EstimationResult, UsageForecast,
};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::debug;

use crate::normalize::{normalize_quantity, NormalizeError};

/// How pricing resolution ended for one component.
#[derive(Clone, Debug)]
pub enum PricingOutcome {
    Resolved(ResolvedPricing),
    /// No matching rate or snapshot; the component becomes symbolic.
    NotFound(String),
    /// Backend failure after retries; critical.
    Failed(String),
    /// Never attempted because the component already carries a mapping error.
    Skipped,
}

/// Aggregation input for one component, assembled by the pipeline.
#[derive(Clone, Debug)]
pub struct ComponentEstimate {
    pub component: BillingComponent,
    pub forecast: Option<UsageForecast>,
    pub pricing: PricingOutcome,
}

/// Run-level context for aggregation.
#[derive(Clone, Debug)]
pub struct EstimationContext {
    pub environment: String,
    pub pricing_alias: String,
    pub effective_time: Option<DateTime<Utc>>,
    pub include_carbon: bool,
    pub include_formulas: bool,
    /// region -> gCO₂e/kWh, pre-fetched by the pipeline
    pub carbon_intensity: BTreeMap<String, f64>,
}

/// The sequential aggregation stage.
pub struct Aggregator;

impl Aggregator {
    /// Combine per-component inputs into the final result.
    ///
    /// Deterministic: inputs arrive in decomposition order and the output
    /// driver order depends only on the data (P50 descending, then address).
    pub fn aggregate(inputs: &[ComponentEstimate], ctx: &EstimationContext) -> EstimationResult {
        let mut result = EstimationResult::empty(&ctx.environment, &ctx.pricing_alias);
        result.audit_trail.effective_time = ctx.effective_time;

        if inputs.is_empty() {
            return result;
        }

        let mut total_p50 = Decimal::ZERO;
        let mut total_p90 = Decimal::ZERO;
        let mut total_carbon = 0.0f64;
        let mut carbon_by_region: BTreeMap<String, f64> = BTreeMap::new();
        let mut confidences: Vec<f64> = Vec::new();

        for input in inputs {
            result.components_processed += 1;
            let driver = Self::estimate_component(input, ctx, &mut result);

            if driver.symbolic {
                result.components_symbolic += 1;
            } else {
                result.components_estimated += 1;
                total_p50 += driver.monthly_cost_p50;
                total_p90 += driver.monthly_cost_p90;
                total_carbon += driver.carbon_kg_co2e;
                if driver.carbon_kg_co2e > 0.0 && !driver.region.is_empty() {
                    *carbon_by_region.entry(driver.region.clone()).or_default() +=
                        driver.carbon_kg_co2e;
                }
                confidences.push(driver.confidence);
            }

            if let Some(snapshot_id) = &driver.snapshot_id {
                result
                    .audit_trail
                    .snapshots_used
                    .entry(driver.region.clone())
                    .or_insert_with(|| snapshot_id.clone());
            }

            result.drivers.push(driver);
        }

        // Fail-closed: symbolic components or critical errors zero the
        // aggregate. The breakdown stays for explainability.
        let incomplete = result.components_symbolic > 0 || result.has_critical_errors();
        if incomplete {
            result.incomplete = true;
            result.confidence = 0.0;
            result.total_cost_p50 = Decimal::ZERO;
            result.total_cost_p90 = Decimal::ZERO;
            result.hourly_cost_p50 = Decimal::ZERO;
            result.carbon_kg_co2e = 0.0;
            result.carbon_by_region = BTreeMap::new();
            if result.components_symbolic > 0 {
                result.warnings.push(format!(
                    "{} component(s) could not be priced; totals are withheld",
                    result.components_symbolic
                ));
            }
        } else {
            result.total_cost_p50 = total_p50;
            result.total_cost_p90 = total_p90;
            result.carbon_kg_co2e = total_carbon;
            result.carbon_by_region = carbon_by_region;
            result.confidence = confidence::geometric_mean(&confidences);
            if !total_p50.is_zero() {
                result.hourly_cost_p50 = (total_p50
                    / Decimal::from_f64(HOURS_PER_MONTH).unwrap_or(Decimal::ONE))
                .round_dp_with_strategy(4, RoundingStrategy::MidpointNearestEven);
            }
        }

        if ctx.include_carbon && result.components_estimated > 0 {
            result
                .warnings
                .push("carbon figures are heuristic estimates".to_string());
        }

        // P50 descending; ties break by resource address.
        result.drivers.sort_by(|a, b| {
            b.monthly_cost_p50
                .cmp(&a.monthly_cost_p50)
                .then_with(|| a.resource_address.cmp(&b.resource_address))
        });

        debug!(
            drivers = result.drivers.len(),
            incomplete = result.incomplete,
            confidence = result.confidence,
            "aggregation complete"
        );
        result
    }

    fn estimate_component(
        input: &ComponentEstimate,
        ctx: &EstimationContext,
        result: &mut EstimationResult,
    ) -> CostDriver {
        let component = &input.component;

        if let Some(error) = &component.mapping_error {
            result.errors.push(EstimationError {
                component_id: component.id.clone(),
                resource_address: component.resource_address.clone(),
                message: error.to_string(),
                critical: error.critical,
            });
            return symbolic(component, format!("{:?}", error.kind));
        }

        let Some(forecast) = &input.forecast else {
            result.errors.push(EstimationError {
                component_id: component.id.clone(),
                resource_address: component.resource_address.clone(),
                message: "no usage forecast for component".to_string(),
                critical: true,
            });
            return symbolic(component, "MISSING_USAGE");
        };

        let resolved = match &input.pricing {
            PricingOutcome::Resolved(resolved) => resolved,
            PricingOutcome::NotFound(reason) => {
                result.errors.push(EstimationError {
                    component_id: component.id.clone(),
                    resource_address: component.resource_address.clone(),
                    message: reason.clone(),
                    critical: false,
                });
                return symbolic(component, "PRICE_NOT_FOUND");
            }
            PricingOutcome::Failed(reason) => {
                result.errors.push(EstimationError {
                    component_id: component.id.clone(),
                    resource_address: component.resource_address.clone(),
                    message: reason.clone(),
                    critical: true,
                });
                return symbolic(component, "PRICING_BACKEND_FAILURE");
            }
            PricingOutcome::Skipped => {
                result.errors.push(EstimationError {
                    component_id: component.id.clone(),
                    resource_address: component.resource_address.clone(),
                    message: "pricing skipped for unmapped component".to_string(),
                    critical: false,
                });
                return symbolic(component, "PRICING_SKIPPED");
            }
        };

        let (quantity_p50, quantity_p90) =
            match normalize_quantity(component, forecast, &resolved.unit) {
                Ok(quantities) => quantities,
                Err(error) => {
                    let critical = matches!(
                        error,
                        NormalizeError::MissingSize | NormalizeError::UnitMismatch { .. }
                    );
                    result.errors.push(EstimationError {
                        component_id: component.id.clone(),
                        resource_address: component.resource_address.clone(),
                        message: error.to_string(),
                        critical,
                    });
                    return symbolic(component, "UNIT_MISMATCH");
                }
            };

        let qty_p50 = match Decimal::from_f64(quantity_p50) {
            Some(d) => d,
            None => {
                result.errors.push(EstimationError {
                    component_id: component.id.clone(),
                    resource_address: component.resource_address.clone(),
                    message: format!("non-finite quantity {quantity_p50}"),
                    critical: true,
                });
                return symbolic(component, "INVALID_QUANTITY");
            }
        };
        let qty_p90 = Decimal::from_f64(quantity_p90).unwrap_or(qty_p50);

        // Tiered SKUs consume usage tier by tier; flat SKUs are a single
        // unbounded tier, so the same computation covers both.
        let (cost_p50, pricing_confidence) = match tiered_cost(qty_p50, &resolved.tiers) {
            Ok(outcome) => outcome,
            Err(error) => {
                let critical = matches!(error, TierError::ExceedsFinalTier { .. });
                result.errors.push(EstimationError {
                    component_id: component.id.clone(),
                    resource_address: component.resource_address.clone(),
                    message: error.to_string(),
                    critical,
                });
                return symbolic(component, "TIER_OVERFLOW");
            }
        };
        let (cost_p90, _) = match tiered_cost(qty_p90, &resolved.tiers) {
            Ok(outcome) => outcome,
            Err(error) => {
                result.errors.push(EstimationError {
                    component_id: component.id.clone(),
                    resource_address: component.resource_address.clone(),
                    message: error.to_string(),
                    critical: true,
                });
                return symbolic(component, "TIER_OVERFLOW");
            }
        };

        let driver_confidence = forecast.confidence.min(pricing_confidence);

        let carbon_kg = if ctx.include_carbon {
            Self::estimate_carbon(component, &resolved.unit, quantity_p50, ctx)
        } else {
            0.0
        };

        let monthly_cost_p50 =
            cost_p50.round_dp_with_strategy(4, RoundingStrategy::MidpointNearestEven);
        let monthly_cost_p90 =
            cost_p90.round_dp_with_strategy(4, RoundingStrategy::MidpointNearestEven);

        let formula = ctx.include_formulas.then(|| {
            format!(
                "{:.2} {} × ${}/{} = ${}",
                quantity_p50,
                resolved.unit,
                resolved
                    .base_price()
                    .round_dp_with_strategy(4, RoundingStrategy::MidpointNearestEven),
                resolved.unit,
                monthly_cost_p50
                    .round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven),
            )
        });

        CostDriver {
            component_id: component.id.clone(),
            resource_address: component.resource_address.clone(),
            service: component.service.clone(),
            product_family: component.product_family.clone(),
            region: resolved.region.clone(),
            description: component.description.clone(),
            monthly_cost_p50,
            monthly_cost_p90,
            unit_price: resolved.base_price(),
            quantity_p50,
            quantity_p90,
            unit: resolved.unit.clone(),
            confidence: driver_confidence,
            carbon_kg_co2e: carbon_kg,
            formula,
            symbolic: false,
            reason: None,
            snapshot_id: Some(resolved.snapshot_id.to_string()),
            source: Some(resolved.source.clone()),
        }
    }

    /// Heuristic carbon model: kWh by kind × region intensity / 1000.
    fn estimate_carbon(
        component: &BillingComponent,
        price_unit: &str,
        quantity_p50: f64,
        ctx: &EstimationContext,
    ) -> f64 {
        let intensity = ctx
            .carbon_intensity
            .get(&component.region)
            .copied()
            .unwrap_or(DEFAULT_INTENSITY);

        let kwh = match (component.kind, price_unit) {
            (ComponentKind::Compute, "hours") => {
                let kw = component
                    .lookup_attributes
                    .get("instanceType")
                    .map(|t| PowerModel::instance_kw(t))
                    .unwrap_or_else(|| PowerModel::fixed_kw(&component.service));
                kw * quantity_p50
            }
            (_, "hours") => PowerModel::fixed_kw(&component.service) * quantity_p50,
            (ComponentKind::Storage, _) => quantity_p50 * storage_kwh_per_gb_month(),
            _ => {
                // Request- and transfer-bound components: small fixed draw
                // over the month.
                PowerModel::fixed_kw(&component.service) * HOURS_PER_MONTH
            }
        };

        kwh * intensity / 1000.0
    }
}

fn symbolic(component: &BillingComponent, reason: impl Into<String>) -> CostDriver {
    CostDriver::symbolic(
        &component.id,
        &component.resource_address,
        &component.service,
        &component.product_family,
        &component.region,
        &component.description,
        reason.into(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use planguard_catalog::RateTier;
    use planguard_types::{BillingPeriod, MappingError, UsageMode, VarianceProfile};
    use uuid::Uuid;

    fn context() -> EstimationContext {
        EstimationContext {
            environment: "dev".to_string(),
            pricing_alias: "default".to_string(),
            effective_time: None,
            include_carbon: false,
            include_formulas: false,
            carbon_intensity: BTreeMap::new(),
        }
    }

    fn compute_component(address: &str) -> BillingComponent {
        BillingComponent {
            id: format!("{address}:compute"),
            resource_address: address.to_string(),
            kind: ComponentKind::Compute,
            usage_mode: UsageMode::OnDemand,
            billing_period: BillingPeriod::Hourly,
            service: "AmazonEC2".to_string(),
            product_family: "Compute Instance".to_string(),
            provider: "aws".to_string(),
            region: "us-east-1".to_string(),
            lookup_attributes: BTreeMap::from([(
                "instanceType".to_string(),
                "t3.medium".to_string(),
            )]),
            size_gb: None,
            description: "EC2 t3.medium compute hours".to_string(),
            variance: VarianceProfile::full_month(),
            depends_on: vec![],
            mapping_error: None,
        }
    }

    fn hours_forecast(id: &str, p50: f64, p90: f64, confidence: f64) -> UsageForecast {
        UsageForecast {
            component_id: id.to_string(),
            metric: "hours".to_string(),
            unit: "hours/month".to_string(),
            p50,
            p90,
            confidence,
            assumptions: vec![],
        }
    }

    fn flat_pricing(price: &str, confidence: f64) -> ResolvedPricing {
        ResolvedPricing {
            sku: "test-sku".to_string(),
            snapshot_id: Uuid::new_v4(),
            source: "test".to_string(),
            currency: "USD".to_string(),
            unit: "hours".to_string(),
            region: "us-east-1".to_string(),
            tiers: vec![RateTier {
                min: Decimal::ZERO,
                max: None,
                price: price.parse().unwrap(),
                confidence,
            }],
        }
    }

    #[test]
    fn empty_input_is_complete_with_full_confidence() {
        let result = Aggregator::aggregate(&[], &context());
        assert!(!result.incomplete);
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.total_cost_p50, Decimal::ZERO);
    }

    #[test]
    fn single_component_totals_price_times_usage() {
        let component = compute_component("aws_instance.web");
        let inputs = vec![ComponentEstimate {
            forecast: Some(hours_forecast(&component.id, 146.0, 189.8, 0.77)),
            pricing: PricingOutcome::Resolved(flat_pricing("0.0416", 1.0)),
            component,
        }];
        let result = Aggregator::aggregate(&inputs, &context());
        assert!(!result.incomplete);
        // 0.0416 × 146 = 6.0736
        assert_eq!(
            result.total_cost_p50,
            "6.0736".parse::<Decimal>().unwrap()
        );
        assert!(result.total_cost_p50 <= result.total_cost_p90);
        assert_eq!(result.components_estimated, 1);
        assert!((result.confidence - 0.77).abs() < 1e-9);
    }

    #[test]
    fn totals_equal_sum_of_non_symbolic_drivers() {
        let a = compute_component("aws_instance.a");
        let b = compute_component("aws_instance.b");
        let inputs = vec![
            ComponentEstimate {
                forecast: Some(hours_forecast(&a.id, 100.0, 120.0, 0.8)),
                pricing: PricingOutcome::Resolved(flat_pricing("0.10", 1.0)),
                component: a,
            },
            ComponentEstimate {
                forecast: Some(hours_forecast(&b.id, 200.0, 220.0, 0.9)),
                pricing: PricingOutcome::Resolved(flat_pricing("0.20", 1.0)),
                component: b,
            },
        ];
        let result = Aggregator::aggregate(&inputs, &context());
        let sum: Decimal = result
            .drivers
            .iter()
            .filter(|d| !d.symbolic)
            .map(|d| d.monthly_cost_p50)
            .sum();
        assert_eq!(sum, result.total_cost_p50);
    }

    #[test]
    fn price_not_found_zeroes_the_aggregate_but_keeps_drivers() {
        let priced = compute_component("aws_instance.a");
        let unpriced = compute_component("aws_instance.b");
        let inputs = vec![
            ComponentEstimate {
                forecast: Some(hours_forecast(&priced.id, 100.0, 120.0, 0.8)),
                pricing: PricingOutcome::Resolved(flat_pricing("0.10", 1.0)),
                component: priced,
            },
            ComponentEstimate {
                forecast: Some(hours_forecast(&unpriced.id, 100.0, 120.0, 0.8)),
                pricing: PricingOutcome::NotFound("no rate".to_string()),
                component: unpriced,
            },
        ];
        let result = Aggregator::aggregate(&inputs, &context());
        assert!(result.incomplete);
        assert_eq!(result.total_cost_p50, Decimal::ZERO);
        assert_eq!(result.total_cost_p90, Decimal::ZERO);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.drivers.len(), 2);
        let symbolic: Vec<_> = result.drivers.iter().filter(|d| d.symbolic).collect();
        assert_eq!(symbolic.len(), 1);
        assert_eq!(symbolic[0].reason.as_deref(), Some("PRICE_NOT_FOUND"));
    }

    #[test]
    fn mapping_error_marks_symbolic() {
        let mut component = compute_component("aws_instance.broken");
        component.mapping_error = Some(MappingError::missing_attribute(
            "aws_instance.broken",
            "aws_instance",
            "instance_type",
        ));
        let inputs = vec![ComponentEstimate {
            forecast: None,
            pricing: PricingOutcome::Skipped,
            component,
        }];
        let result = Aggregator::aggregate(&inputs, &context());
        assert!(result.incomplete);
        assert!(result.has_critical_errors());
        assert!(result.drivers[0].symbolic);
    }

    #[test]
    fn drivers_sort_by_p50_descending_then_address() {
        let cheap = compute_component("aws_instance.a");
        let pricey = compute_component("aws_instance.b");
        let tied = compute_component("aws_instance.c");
        let inputs = vec![
            ComponentEstimate {
                forecast: Some(hours_forecast(&tied.id, 100.0, 100.0, 0.8)),
                pricing: PricingOutcome::Resolved(flat_pricing("0.10", 1.0)),
                component: tied,
            },
            ComponentEstimate {
                forecast: Some(hours_forecast(&cheap.id, 10.0, 10.0, 0.8)),
                pricing: PricingOutcome::Resolved(flat_pricing("0.10", 1.0)),
                component: cheap,
            },
            ComponentEstimate {
                forecast: Some(hours_forecast(&pricey.id, 100.0, 100.0, 0.8)),
                pricing: PricingOutcome::Resolved(flat_pricing("0.10", 1.0)),
                component: pricey,
            },
        ];
        let result = Aggregator::aggregate(&inputs, &context());
        let addresses: Vec<&str> = result
            .drivers
            .iter()
            .map(|d| d.resource_address.as_str())
            .collect();
        // b and c tie on cost; the tie breaks lexicographically.
        assert_eq!(
            addresses,
            vec!["aws_instance.b", "aws_instance.c", "aws_instance.a"]
        );
    }

    #[test]
    fn tiered_usage_splits_and_takes_min_confidence() {
        let mut component = compute_component("aws_nat_gateway.main");
        component.kind = ComponentKind::Network;
        component.billing_period = BillingPeriod::PerGigabyte;
        let mut pricing = flat_pricing("0.09", 0.9);
        pricing.unit = "GB".to_string();
        pricing.tiers = vec![
            RateTier {
                min: Decimal::ZERO,
                max: Some(Decimal::from(100)),
                price: "0.09".parse().unwrap(),
                confidence: 0.9,
            },
            RateTier {
                min: Decimal::from(100),
                max: None,
                price: "0.05".parse().unwrap(),
                confidence: 0.7,
            },
        ];
        let mut forecast = hours_forecast(&component.id, 150.0, 150.0, 0.95);
        forecast.metric = "gb_transfer".to_string();
        let inputs = vec![ComponentEstimate {
            forecast: Some(forecast),
            pricing: PricingOutcome::Resolved(pricing),
            component,
        }];
        let result = Aggregator::aggregate(&inputs, &context());
        assert_eq!(
            result.drivers[0].monthly_cost_p50,
            "11.5000".parse::<Decimal>().unwrap()
        );
        assert!((result.drivers[0].confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn tier_overflow_without_unbounded_tier_is_critical() {
        let mut component = compute_component("aws_nat_gateway.main");
        component.billing_period = BillingPeriod::PerGigabyte;
        let mut pricing = flat_pricing("0.09", 1.0);
        pricing.unit = "GB".to_string();
        pricing.tiers = vec![RateTier {
            min: Decimal::ZERO,
            max: Some(Decimal::from(100)),
            price: "0.09".parse().unwrap(),
            confidence: 1.0,
        }];
        let mut forecast = hours_forecast(&component.id, 150.0, 150.0, 0.9);
        forecast.metric = "gb_transfer".to_string();
        let inputs = vec![ComponentEstimate {
            forecast: Some(forecast),
            pricing: PricingOutcome::Resolved(pricing),
            component,
        }];
        let result = Aggregator::aggregate(&inputs, &context());
        assert!(result.incomplete);
        assert!(result.has_critical_errors());
        assert_eq!(result.total_cost_p50, Decimal::ZERO);
    }

    #[test]
    fn carbon_uses_region_intensity() {
        let component = compute_component("aws_instance.web");
        let mut ctx = context();
        ctx.include_carbon = true;
        ctx.carbon_intensity
            .insert("us-east-1".to_string(), 383.0);
        let inputs = vec![ComponentEstimate {
            forecast: Some(hours_forecast(&component.id, 146.0, 189.8, 0.8)),
            pricing: PricingOutcome::Resolved(flat_pricing("0.0416", 1.0)),
            component,
        }];
        let result = Aggregator::aggregate(&inputs, &ctx);
        // t3.medium ≈ 0.010 kW × 146 h × 383 g/kWh / 1000
        let expected = 0.010 * 146.0 * 383.0 / 1000.0;
        assert!((result.carbon_kg_co2e - expected).abs() < 1e-6);
        assert_eq!(
            result.carbon_by_region.get("us-east-1").copied(),
            Some(result.carbon_kg_co2e)
        );
    }

    #[test]
    fn audit_trail_records_snapshot_per_region() {
        let component = compute_component("aws_instance.web");
        let pricing = flat_pricing("0.0416", 1.0);
        let snapshot_id = pricing.snapshot_id;
        let inputs = vec![ComponentEstimate {
            forecast: Some(hours_forecast(&component.id, 146.0, 189.8, 0.8)),
            pricing: PricingOutcome::Resolved(pricing),
            component,
        }];
        let result = Aggregator::aggregate(&inputs, &context());
        assert_eq!(
            result.audit_trail.snapshots_used.get("us-east-1"),
            Some(&snapshot_id.to_string())
        );
    }

    #[test]
    fn formulas_attach_when_requested() {
        let component = compute_component("aws_instance.web");
        let mut ctx = context();
        ctx.include_formulas = true;
        let inputs = vec![ComponentEstimate {
            forecast: Some(hours_forecast(&component.id, 146.0, 189.8, 0.8)),
            pricing: PricingOutcome::Resolved(flat_pricing("0.0416", 1.0)),
            component,
        }];
        let result = Aggregator::aggregate(&inputs, &ctx);
        let formula = result.drivers[0].formula.as_ref().unwrap();
        assert!(formula.contains("146.00 hours"));
        assert!(formula.contains("0.0416"));
    }
}

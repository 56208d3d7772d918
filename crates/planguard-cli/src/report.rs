//! Rendering of estimation outputs.
//!
//! Text for terminals, JSON for machines. Cost fields render as
//! fixed-precision decimal strings: two fractional digits for totals and
//! drivers, four for hourly and unit prices. Symbolic drivers render with
//! an `unknown` marker, never `$0.00`.

use colored::Colorize;
use planguard_pipeline::EstimationOutput;
use planguard_types::{Decision, Severity};
use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::json;

fn money(amount: Decimal, places: u32) -> String {
    let rounded = amount.round_dp_with_strategy(places, RoundingStrategy::MidpointNearestEven);
    format!("{rounded:.places$}", places = places as usize)
}

pub fn print_text(output: &EstimationOutput) {
    let estimation = &output.estimation;

    println!("{}", "Estimate".bold());
    if estimation.incomplete {
        println!(
            "  {} totals withheld: estimation is incomplete",
            "!".yellow().bold()
        );
    } else {
        println!(
            "  monthly P50  ${}   P90  ${}   (hourly ${})",
            money(estimation.total_cost_p50, 2).bold(),
            money(estimation.total_cost_p90, 2),
            money(estimation.hourly_cost_p50, 4),
        );
        if estimation.carbon_kg_co2e > 0.0 {
            println!("  carbon       {:.2} kg CO2e", estimation.carbon_kg_co2e);
        }
    }
    println!(
        "  confidence   {:.0}%   components {} ({} symbolic)",
        estimation.confidence * 100.0,
        estimation.components_processed,
        estimation.components_symbolic,
    );

    if !estimation.drivers.is_empty() {
        println!("\n{}", "Cost drivers".bold());
        for driver in &estimation.drivers {
            if driver.symbolic {
                println!(
                    "  {:<44} {}  ({})",
                    driver.component_id,
                    "unknown".yellow(),
                    driver.reason.as_deref().unwrap_or("unresolved"),
                );
            } else {
                println!(
                    "  {:<44} ${:>12}  {:.1} {} @ ${}",
                    driver.component_id,
                    money(driver.monthly_cost_p50, 2),
                    driver.quantity_p50,
                    driver.unit,
                    money(driver.unit_price, 4),
                );
                if let Some(formula) = &driver.formula {
                    println!("    {}", formula.dimmed());
                }
            }
        }
    }

    if !estimation.errors.is_empty() {
        println!("\n{}", "Errors".bold());
        for error in &estimation.errors {
            let severity = if error.critical {
                "critical".red()
            } else {
                "warning".yellow()
            };
            println!(
                "  {} {} {}: {}",
                severity,
                error.resource_address,
                error.component_id,
                error.message,
            );
        }
    }
    for warning in &estimation.warnings {
        println!("  {} {}", "note".dimmed(), warning);
    }

    println!();
    let decision = match output.verdict.decision {
        Decision::Pass => "PASS".green().bold(),
        Decision::Warn => "WARN".yellow().bold(),
        Decision::Deny => "DENY".red().bold(),
    };
    println!(
        "{} {} ({} policies evaluated)",
        "Verdict".bold(),
        decision,
        output.verdict.policies_evaluated,
    );
    for violation in &output.verdict.violations {
        let marker = match violation.severity {
            Severity::Error => "deny".red(),
            Severity::Warning => "warn".yellow(),
            Severity::Info => "info".normal(),
        };
        println!("  {} [{}] {}", marker, violation.policy_id, violation.message);
    }
    for warning in &output.verdict.warnings {
        println!("  {} [{}] {}", "warn".yellow(), warning.policy_id, warning.message);
    }
}

/// JSON response with fixed-precision decimal strings.
pub fn render_json(output: &EstimationOutput) -> Result<String, serde_json::Error> {
    let estimation = &output.estimation;
    let drivers: Vec<serde_json::Value> = estimation
        .drivers
        .iter()
        .map(|driver| {
            json!({
                "component_id": driver.component_id,
                "resource_address": driver.resource_address,
                "service": driver.service,
                "product_family": driver.product_family,
                "region": driver.region,
                "description": driver.description,
                "monthly_cost_p50": money(driver.monthly_cost_p50, 2),
                "monthly_cost_p90": money(driver.monthly_cost_p90, 2),
                "unit_price": money(driver.unit_price, 4),
                "quantity_p50": driver.quantity_p50,
                "quantity_p90": driver.quantity_p90,
                "unit": driver.unit,
                "confidence": driver.confidence,
                "carbon_kg_co2e": driver.carbon_kg_co2e,
                "formula": driver.formula,
                "symbolic": driver.symbolic,
                "reason": driver.reason,
                "snapshot_id": driver.snapshot_id,
                "source": driver.source,
            })
        })
        .collect();

    let body = json!({
        "estimate": {
            "total_cost_p50": money(estimation.total_cost_p50, 2),
            "total_cost_p90": money(estimation.total_cost_p90, 2),
            "hourly_cost_p50": money(estimation.hourly_cost_p50, 4),
            "carbon_kg_co2e": estimation.carbon_kg_co2e,
            "carbon_by_region": estimation.carbon_by_region,
            "confidence": estimation.confidence,
            "incomplete": estimation.incomplete,
            "drivers": drivers,
            "errors": estimation.errors,
            "warnings": estimation.warnings,
            "audit_trail": estimation.audit_trail,
            "components_processed": estimation.components_processed,
            "components_estimated": estimation.components_estimated,
            "components_symbolic": estimation.components_symbolic,
        },
        "verdict": output.verdict,
    });
    serde_json::to_string_pretty(&body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use planguard_types::{EstimationResult, PolicyVerdict};

    #[test]
    fn money_renders_fixed_precision() {
        assert_eq!(money("10.0736".parse().unwrap(), 2), "10.07");
        assert_eq!(money("10".parse().unwrap(), 2), "10.00");
        assert_eq!(money("0.0416".parse().unwrap(), 4), "0.0416");
        // Half-even at the boundary.
        assert_eq!(money("0.125".parse().unwrap(), 2), "0.12");
    }

    #[test]
    fn json_rendering_includes_fixed_precision_totals() {
        let output = EstimationOutput {
            estimation: EstimationResult::empty("dev", "default"),
            verdict: PolicyVerdict::pass(),
        };
        let rendered = render_json(&output).unwrap();
        assert!(rendered.contains("\"total_cost_p50\": \"0.00\""));
        assert!(rendered.contains("\"incomplete\": false"));
    }
}

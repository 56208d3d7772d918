//! Power draw estimates per component kind.
//!
//! These are heuristics: approximate wall power by instance family scaled
//! by size, a flat per-GB-month figure for storage, and small fixed draws
//! for request- and network-bound components. Results feed low-confidence
//! carbon estimates, tagged as such by the aggregator.

/// kWh consumed per GB-month of storage.
pub fn storage_kwh_per_gb_month() -> f64 {
    0.0001
}

/// Estimates kW draw for billable components.
pub struct PowerModel;

impl PowerModel {
    /// Average draw in kW for an instance type like `t3.medium`.
    pub fn instance_kw(instance_type: &str) -> f64 {
        let family_watts: &[(&str, f64)] = &[
            ("t2", 8.0),
            ("t3", 10.0),
            ("m5", 35.0),
            ("m6i", 40.0),
            ("c5", 45.0),
            ("c6i", 50.0),
            ("r5", 55.0),
            ("r6i", 60.0),
            ("i3", 80.0),
            ("p3", 300.0),
            ("p4", 400.0),
        ];

        let family = instance_type.split('.').next().unwrap_or(instance_type);
        let watts = family_watts
            .iter()
            .find(|(name, _)| *name == family)
            .map(|(_, watts)| *watts)
            .unwrap_or(20.0);

        watts * Self::size_multiplier(instance_type) / 1000.0
    }

    fn size_multiplier(instance_type: &str) -> f64 {
        let size = instance_type.split('.').nth(1).unwrap_or("");
        match size {
            "nano" => 0.25,
            "micro" => 0.5,
            "small" => 0.75,
            "medium" => 1.0,
            "large" => 2.0,
            "xlarge" => 4.0,
            "2xlarge" => 8.0,
            "4xlarge" => 16.0,
            "8xlarge" => 32.0,
            _ => 1.0,
        }
    }

    /// Draw for components without an instance type: a small fixed figure
    /// per kind of work.
    pub fn fixed_kw(service: &str) -> f64 {
        match service {
            "AmazonRDS" => 0.2,
            "AWSLambda" => 0.01,
            "AmazonVPC" | "ElasticLoadBalancing" => 0.02,
            _ => 0.05,
        }
    }
}

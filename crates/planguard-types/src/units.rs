//! Canonical units and time conversions.

/// Standard billing assumption for one month of wall-clock time.
pub const HOURS_PER_MONTH: f64 = 730.0;

pub const UNIT_HOURS: &str = "hours";
pub const UNIT_GB: &str = "GB";
pub const UNIT_GB_MONTH: &str = "GB-month";
pub const UNIT_REQUESTS: &str = "requests";

/// Whether a pricing unit measures elapsed time.
pub fn is_time_based(unit: &str) -> bool {
    unit == UNIT_HOURS
}

/// Whether a pricing unit measures provisioned capacity over a month.
pub fn is_capacity_month(unit: &str) -> bool {
    unit == UNIT_GB_MONTH
}

pub fn hourly_to_monthly(hourly: f64) -> f64 {
    hourly * HOURS_PER_MONTH
}

pub fn monthly_to_hourly(monthly: f64) -> f64 {
    monthly / HOURS_PER_MONTH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_round_trip() {
        let monthly = hourly_to_monthly(0.1);
        assert!((monthly - 73.0).abs() < 1e-9);
        assert!((monthly_to_hourly(monthly) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn unit_classification() {
        assert!(is_time_based(UNIT_HOURS));
        assert!(!is_time_based(UNIT_GB_MONTH));
        assert!(is_capacity_month(UNIT_GB_MONTH));
    }
}

//! Stable hashing for rate keys and snapshot contents.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use crate::model::RateRecord;

/// Stable attribute hash: keys sorted lexicographically, joined as `k=v;`,
/// SHA-256 over the result. Identical attribute sets hash identically
/// regardless of insertion order.
pub fn attribute_hash(attributes: &BTreeMap<String, String>) -> String {
    let mut canonical = String::new();
    for (key, value) in attributes {
        canonical.push_str(key);
        canonical.push('=');
        canonical.push_str(value);
        canonical.push(';');
    }
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

/// Content hash of a snapshot: SHA-256 over the sorted canonical encoding
/// of its rates. Re-ingesting identical content produces the same hash.
pub fn content_hash(rates: &[RateRecord]) -> String {
    let mut lines: Vec<String> = rates.iter().map(canonical_rate_line).collect();
    lines.sort_unstable();

    let mut hasher = Sha256::new();
    for line in &lines {
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

fn canonical_rate_line(rate: &RateRecord) -> String {
    let mut attrs = String::new();
    for (key, value) in &rate.attributes {
        attrs.push_str(key);
        attrs.push('=');
        attrs.push_str(value);
        attrs.push(';');
    }
    format!(
        "{}|{}|{}|{}|{}|{}|{}|{}|{}",
        rate.sku,
        rate.service,
        rate.product_family,
        attrs,
        rate.unit,
        rate.price,
        rate.currency,
        rate.tier_min.map(|t| t.to_string()).unwrap_or_default(),
        rate.tier_max.map(|t| t.to_string()).unwrap_or_default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn rate(sku: &str, price: &str) -> RateRecord {
        RateRecord {
            sku: sku.to_string(),
            service: "AmazonEC2".to_string(),
            product_family: "Compute Instance".to_string(),
            attributes: BTreeMap::from([
                ("instanceType".to_string(), "t3.medium".to_string()),
                ("operatingSystem".to_string(), "Linux".to_string()),
            ]),
            unit: "hours".to_string(),
            price: price.parse::<Decimal>().unwrap(),
            currency: "USD".to_string(),
            confidence: 1.0,
            tier_min: None,
            tier_max: None,
            effective_from: None,
        }
    }

    #[test]
    fn attribute_hash_ignores_insertion_order() {
        // BTreeMap sorts on insert, so two maps built in different orders
        // must encode identically.
        let mut forward = BTreeMap::new();
        forward.insert("a".to_string(), "1".to_string());
        forward.insert("b".to_string(), "2".to_string());

        let mut backward = BTreeMap::new();
        backward.insert("b".to_string(), "2".to_string());
        backward.insert("a".to_string(), "1".to_string());

        assert_eq!(attribute_hash(&forward), attribute_hash(&backward));
    }

    #[test]
    fn different_attributes_hash_differently() {
        let one = BTreeMap::from([("instanceType".to_string(), "t3.medium".to_string())]);
        let other = BTreeMap::from([("instanceType".to_string(), "t3.large".to_string())]);
        assert_ne!(attribute_hash(&one), attribute_hash(&other));
    }

    #[test]
    fn content_hash_is_order_independent() {
        let rates_a = vec![rate("sku-1", "0.0416"), rate("sku-2", "0.08")];
        let rates_b = vec![rate("sku-2", "0.08"), rate("sku-1", "0.0416")];
        assert_eq!(content_hash(&rates_a), content_hash(&rates_b));
    }

    #[test]
    fn content_hash_detects_price_changes() {
        let rates_a = vec![rate("sku-1", "0.0416")];
        let rates_b = vec![rate("sku-1", "0.0400")];
        assert_ne!(content_hash(&rates_a), content_hash(&rates_b));
    }
}

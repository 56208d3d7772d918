//! End-to-end scenarios through the full pipeline against an in-memory
//! catalog: plan document in, estimation and verdict out.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use planguard_catalog::{CatalogStore, InMemoryCatalog, RateRecord, SnapshotIngest};
use planguard_graph::PlanDocument;
use planguard_pipeline::{AuditLog, EstimationRequest, Pipeline};
use planguard_types::{ChangeAction, Decision, ResourceNode};
use rust_decimal::Decimal;
use serde_json::json;

fn resource(
    address: &str,
    resource_type: &str,
    attributes: serde_json::Value,
) -> ResourceNode {
    ResourceNode {
        address: address.to_string(),
        resource_type: resource_type.to_string(),
        provider: "aws".to_string(),
        region: "us-east-1".to_string(),
        change_action: ChangeAction::Create,
        attributes,
        dependencies: vec![],
    }
}

fn rate(
    sku: &str,
    service: &str,
    family: &str,
    attributes: &[(&str, &str)],
    unit: &str,
    price: &str,
) -> RateRecord {
    RateRecord {
        sku: sku.to_string(),
        service: service.to_string(),
        product_family: family.to_string(),
        attributes: attributes
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<BTreeMap<_, _>>(),
        unit: unit.to_string(),
        price: price.parse().unwrap(),
        currency: "USD".to_string(),
        confidence: 1.0,
        tier_min: None,
        tier_max: None,
        effective_from: None,
    }
}

fn ec2_compute_attrs() -> Vec<(&'static str, &'static str)> {
    vec![
        ("capacityStatus", "Used"),
        ("instanceType", "t3.medium"),
        ("operatingSystem", "Linux"),
        ("preInstalledSw", "NA"),
        ("tenancy", "Shared"),
    ]
}

fn standard_rates() -> Vec<RateRecord> {
    vec![
        rate(
            "ec2-t3-medium",
            "AmazonEC2",
            "Compute Instance",
            &ec2_compute_attrs(),
            "hours",
            "0.0416",
        ),
        rate(
            "ebs-gp3",
            "AmazonEC2",
            "Storage",
            &[("volumeType", "gp3")],
            "GB-month",
            "0.08",
        ),
    ]
}

async fn catalog_with(rates: Vec<RateRecord>) -> Arc<InMemoryCatalog> {
    let catalog = Arc::new(InMemoryCatalog::new());
    let outcome = catalog
        .ingest(SnapshotIngest {
            provider: "aws".to_string(),
            region: "us-east-1".to_string(),
            alias: "default".to_string(),
            source: "test-fixture".to_string(),
            fetched_at: None,
            valid_from: None,
            valid_to: None,
            rates,
        })
        .await
        .unwrap();
    catalog.activate(outcome.snapshot_id).await.unwrap();
    catalog
}

/// Happy path, dev: t3.medium at 0.0416/hr plus a 50 GB gp3 volume at
/// 0.08/GB-month. P50 ≈ 0.0416 × 730 × 0.20 + 0.08 × 50 = 10.07.
#[tokio::test]
async fn happy_path_dev() {
    let catalog = catalog_with(standard_rates()).await;
    let pipeline = Pipeline::with_defaults(catalog);

    let plan = PlanDocument {
        format_version: "1.0".to_string(),
        resources: vec![resource(
            "aws_instance.web",
            "aws_instance",
            json!({
                "instance_type": "t3.medium",
                "root_block_device": [{"volume_type": "gp3", "volume_size": 50}],
            }),
        )],
    };

    let output = pipeline
        .run(EstimationRequest::new(plan, "dev"))
        .await
        .unwrap();

    let estimation = &output.estimation;
    assert!(!estimation.incomplete);
    assert_eq!(output.verdict.decision, Decision::Pass);

    // 0.0416 × 146 = 6.0736; 0.08 × 50 = 4.00
    assert_eq!(
        estimation.total_cost_p50,
        "10.0736".parse::<Decimal>().unwrap()
    );
    assert!(estimation.total_cost_p50 <= estimation.total_cost_p90);
    assert_eq!(estimation.drivers.len(), 2);
    assert!(estimation.confidence > 0.0);

    // Drivers sorted by P50 descending: compute first.
    assert_eq!(estimation.drivers[0].component_id, "aws_instance.web:compute");
}

/// Unsupported resource in prod: totals zeroed, both drivers listed, deny
/// via the prod-incomplete gate.
#[tokio::test]
async fn unsupported_resource_in_prod_denies() {
    let catalog = catalog_with(vec![rate(
        "ec2-t3-medium",
        "AmazonEC2",
        "Compute Instance",
        &ec2_compute_attrs(),
        "hours",
        "0.10",
    )])
    .await;
    let pipeline = Pipeline::with_defaults(catalog);

    let plan = PlanDocument {
        format_version: String::new(),
        resources: vec![
            resource(
                "aws_instance.web",
                "aws_instance",
                json!({"instance_type": "t3.medium"}),
            ),
            resource("exotic_widget.x", "exotic_widget", json!({})),
        ],
    };

    let output = pipeline
        .run(EstimationRequest::new(plan, "prod"))
        .await
        .unwrap();

    let estimation = &output.estimation;
    assert!(estimation.incomplete);
    assert_eq!(estimation.total_cost_p50, Decimal::ZERO);
    assert_eq!(estimation.total_cost_p90, Decimal::ZERO);
    assert_eq!(estimation.confidence, 0.0);
    // The whole breakdown is still present, with the offender symbolic.
    assert!(estimation
        .drivers
        .iter()
        .any(|d| d.symbolic && d.resource_address == "exotic_widget.x"));
    assert_eq!(output.verdict.decision, Decision::Deny);
}

/// Known resource type, absent from the active snapshot: symbolic with
/// PRICE_NOT_FOUND, totals zeroed, prod denies.
#[tokio::test]
async fn price_missing_marks_symbolic() {
    // Catalog knows storage but not this instance type's attributes.
    let catalog = catalog_with(vec![rate(
        "ebs-gp3",
        "AmazonEC2",
        "Storage",
        &[("volumeType", "gp3")],
        "GB-month",
        "0.08",
    )])
    .await;
    let pipeline = Pipeline::with_defaults(catalog);

    let plan = PlanDocument {
        format_version: String::new(),
        resources: vec![resource(
            "aws_instance.web",
            "aws_instance",
            json!({"instance_type": "m7i.metal"}),
        )],
    };

    let output = pipeline
        .run(EstimationRequest::new(plan, "prod"))
        .await
        .unwrap();

    let estimation = &output.estimation;
    assert!(estimation.incomplete);
    assert_eq!(estimation.total_cost_p50, Decimal::ZERO);
    let compute = estimation
        .drivers
        .iter()
        .find(|d| d.component_id == "aws_instance.web:compute")
        .unwrap();
    assert!(compute.symbolic);
    assert_eq!(compute.reason.as_deref(), Some("PRICE_NOT_FOUND"));
    assert_eq!(output.verdict.decision, Decision::Deny);
}

/// Cost-limit breach: complete estimation, confident, denied with the
/// amounts cited in the violation.
#[tokio::test]
async fn cost_limit_breach_denies() {
    // $20/hr always-on in prod ≈ $14,600 P50, well past the $10,000 limit.
    let catalog = catalog_with(vec![
        rate(
            "ec2-big",
            "AmazonEC2",
            "Compute Instance",
            &[
                ("capacityStatus", "Used"),
                ("instanceType", "p4d.24xlarge"),
                ("operatingSystem", "Linux"),
                ("preInstalledSw", "NA"),
                ("tenancy", "Shared"),
            ],
            "hours",
            "20.00",
        ),
        rate(
            "ebs-gp3",
            "AmazonEC2",
            "Storage",
            &[("volumeType", "gp3")],
            "GB-month",
            "0.08",
        ),
    ])
    .await;
    let pipeline = Pipeline::with_defaults(catalog);

    let plan = PlanDocument {
        format_version: String::new(),
        resources: vec![resource(
            "aws_instance.train",
            "aws_instance",
            json!({"instance_type": "p4d.24xlarge"}),
        )],
    };

    let mut request = EstimationRequest::new(plan, "prod");
    request.cost_limit = Some("10000".parse().unwrap());
    let output = pipeline.run(request).await.unwrap();

    let estimation = &output.estimation;
    assert!(!estimation.incomplete);
    assert!(estimation.confidence > 0.0);
    assert!(estimation.total_cost_p90 > "10000".parse::<Decimal>().unwrap());
    assert_eq!(output.verdict.decision, Decision::Deny);
    let violation = output
        .verdict
        .violations
        .iter()
        .find(|v| v.policy_id == "request-cost-limit")
        .unwrap();
    assert!(violation.message.contains("10000.00"));
}

/// Historical replay: an effective time in the past selects yesterday's
/// snapshot and its cheaper rate, and the audit trail records it.
#[tokio::test]
async fn historical_replay_uses_older_snapshot() {
    let catalog = Arc::new(InMemoryCatalog::new());
    let yesterday = Utc::now() - Duration::days(1);

    let storage_rate = || {
        rate(
            "ebs-gp3",
            "AmazonEC2",
            "Storage",
            &[("volumeType", "gp3")],
            "GB-month",
            "0.08",
        )
    };

    let old = catalog
        .ingest(SnapshotIngest {
            provider: "aws".to_string(),
            region: "us-east-1".to_string(),
            alias: "default".to_string(),
            source: "test-fixture".to_string(),
            fetched_at: Some(yesterday - Duration::hours(1)),
            valid_from: Some(yesterday - Duration::hours(1)),
            valid_to: Some(Utc::now() - Duration::hours(1)),
            rates: vec![
                rate(
                    "ec2-t3-medium",
                    "AmazonEC2",
                    "Compute Instance",
                    &ec2_compute_attrs(),
                    "hours",
                    "0.0400",
                ),
                storage_rate(),
            ],
        })
        .await
        .unwrap();

    let new = catalog
        .ingest(SnapshotIngest {
            provider: "aws".to_string(),
            region: "us-east-1".to_string(),
            alias: "default".to_string(),
            source: "test-fixture".to_string(),
            fetched_at: None,
            valid_from: Some(Utc::now() - Duration::hours(1)),
            valid_to: None,
            rates: vec![
                rate(
                    "ec2-t3-medium",
                    "AmazonEC2",
                    "Compute Instance",
                    &ec2_compute_attrs(),
                    "hours",
                    "0.0416",
                ),
                storage_rate(),
            ],
        })
        .await
        .unwrap();
    catalog.activate(new.snapshot_id).await.unwrap();

    let plan = PlanDocument {
        format_version: String::new(),
        resources: vec![resource(
            "aws_instance.web",
            "aws_instance",
            json!({"instance_type": "t3.medium"}),
        )],
    };

    let pipeline = Pipeline::with_defaults(Arc::clone(&catalog) as Arc<dyn CatalogStore>);

    // Current run prices at 0.0416.
    let current = pipeline
        .run(EstimationRequest::new(plan.clone(), "dev"))
        .await
        .unwrap();
    let current_compute = current
        .estimation
        .drivers
        .iter()
        .find(|d| d.component_id == "aws_instance.web:compute")
        .unwrap();
    assert_eq!(
        current_compute.unit_price,
        "0.0416".parse::<Decimal>().unwrap()
    );
    assert_eq!(
        current.estimation.audit_trail.snapshots_used.get("us-east-1"),
        Some(&new.snapshot_id.to_string())
    );

    // Replay as of yesterday prices at 0.0400 against the older snapshot.
    let mut request = EstimationRequest::new(plan, "dev");
    request.effective_time = Some(yesterday);
    let historical = pipeline.run(request).await.unwrap();

    assert!(!historical.estimation.incomplete);
    let compute = historical
        .estimation
        .drivers
        .iter()
        .find(|d| d.component_id == "aws_instance.web:compute")
        .unwrap();
    assert_eq!(compute.unit_price, "0.0400".parse::<Decimal>().unwrap());
    assert_eq!(
        historical.estimation.audit_trail.snapshots_used.get("us-east-1"),
        Some(&old.snapshot_id.to_string())
    );
}

/// Empty plan: complete, fully confident, passes.
#[tokio::test]
async fn empty_plan_passes_with_full_confidence() {
    let catalog = catalog_with(standard_rates()).await;
    let pipeline = Pipeline::with_defaults(catalog);

    let output = pipeline
        .run(EstimationRequest::new(PlanDocument::default(), "prod"))
        .await
        .unwrap();

    assert!(!output.estimation.incomplete);
    assert_eq!(output.estimation.confidence, 1.0);
    assert_eq!(output.estimation.total_cost_p50, Decimal::ZERO);
    assert_eq!(output.verdict.decision, Decision::Pass);
}

/// Unknown environment is fatal, never silently defaulted.
#[tokio::test]
async fn unknown_environment_is_fatal() {
    let catalog = catalog_with(standard_rates()).await;
    let pipeline = Pipeline::with_defaults(catalog);

    let result = pipeline
        .run(EstimationRequest::new(PlanDocument::default(), "qa"))
        .await;
    assert!(result.is_err());
}

/// Two identical runs produce identical drivers and totals.
#[tokio::test]
async fn identical_runs_are_reproducible() {
    let catalog = catalog_with(standard_rates()).await;
    let pipeline = Pipeline::with_defaults(catalog);

    let plan = PlanDocument {
        format_version: String::new(),
        resources: vec![resource(
            "aws_instance.web",
            "aws_instance",
            json!({
                "instance_type": "t3.medium",
                "root_block_device": [{"volume_type": "gp3", "volume_size": 50}],
            }),
        )],
    };

    let first = pipeline
        .run(EstimationRequest::new(plan.clone(), "dev"))
        .await
        .unwrap();
    let second = pipeline
        .run(EstimationRequest::new(plan, "dev"))
        .await
        .unwrap();

    assert_eq!(
        first.estimation.total_cost_p50,
        second.estimation.total_cost_p50
    );
    let ids_first: Vec<_> = first
        .estimation
        .drivers
        .iter()
        .map(|d| (d.component_id.clone(), d.monthly_cost_p50))
        .collect();
    let ids_second: Vec<_> = second
        .estimation
        .drivers
        .iter()
        .map(|d| (d.component_id.clone(), d.monthly_cost_p50))
        .collect();
    assert_eq!(ids_first, ids_second);
}

/// Audit records land in the log with the snapshot ids used.
#[tokio::test]
async fn audit_log_captures_the_run() {
    let catalog = catalog_with(standard_rates()).await;
    let audit = Arc::new(AuditLog::in_memory(100));
    let pipeline = Pipeline::with_defaults(catalog).with_audit(Arc::clone(&audit));

    let plan = PlanDocument {
        format_version: String::new(),
        resources: vec![resource(
            "aws_instance.web",
            "aws_instance",
            json!({
                "instance_type": "t3.medium",
                "root_block_device": [{"volume_type": "gp3", "volume_size": 50}],
            }),
        )],
    };

    pipeline
        .run(EstimationRequest::new(plan, "dev"))
        .await
        .unwrap();

    let entries = audit.entries();
    assert_eq!(entries.len(), 1);
    assert!(!entries[0].incomplete);
    assert!(entries[0].snapshot_ids.contains_key("us-east-1"));
    assert_eq!(entries[0].decision, Decision::Pass);
}

/// A catalog that stalls long enough for a cancellation signal to win.
struct SlowCatalog(Arc<InMemoryCatalog>);

#[async_trait::async_trait]
impl CatalogStore for SlowCatalog {
    async fn ingest(
        &self,
        payload: planguard_catalog::SnapshotIngest,
    ) -> Result<planguard_catalog::IngestOutcome, planguard_catalog::CatalogError> {
        self.0.ingest(payload).await
    }

    async fn activate(
        &self,
        snapshot_id: uuid::Uuid,
    ) -> Result<(), planguard_catalog::CatalogError> {
        self.0.activate(snapshot_id).await
    }

    async fn snapshot(
        &self,
        snapshot_id: uuid::Uuid,
    ) -> Result<Option<planguard_catalog::Snapshot>, planguard_catalog::CatalogError> {
        self.0.snapshot(snapshot_id).await
    }

    async fn active_snapshot(
        &self,
        provider: &str,
        region: &str,
        alias: &str,
    ) -> Result<Option<planguard_catalog::Snapshot>, planguard_catalog::CatalogError> {
        self.0.active_snapshot(provider, region, alias).await
    }

    async fn list_snapshots(
        &self,
        provider: &str,
        region: &str,
    ) -> Result<Vec<planguard_catalog::Snapshot>, planguard_catalog::CatalogError> {
        self.0.list_snapshots(provider, region).await
    }

    async fn resolve(
        &self,
        query: &planguard_catalog::RateQuery,
    ) -> Result<planguard_catalog::ResolvedPricing, planguard_catalog::CatalogError> {
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        self.0.resolve(query).await
    }
}

/// Cancellation propagates as a fail-closed deny with reason `cancelled`.
#[tokio::test]
async fn cancellation_denies() {
    let inner = catalog_with(standard_rates()).await;
    let pipeline = Pipeline::with_defaults(Arc::new(SlowCatalog(inner)));

    let plan = PlanDocument {
        format_version: String::new(),
        resources: vec![resource(
            "aws_instance.web",
            "aws_instance",
            json!({"instance_type": "t3.medium"}),
        )],
    };

    let (tx, rx) = tokio::sync::watch::channel(false);
    let run = pipeline.run_with_cancellation(EstimationRequest::new(plan, "prod"), rx);
    tx.send(true).unwrap();
    let output = run.await.unwrap();

    assert!(output.estimation.incomplete);
    assert_eq!(output.estimation.confidence, 0.0);
    assert!(output.estimation.has_critical_errors());
    assert_eq!(output.verdict.decision, Decision::Deny);
    assert!(output
        .verdict
        .violations
        .iter()
        .any(|v| v.message == "cancelled"));
}

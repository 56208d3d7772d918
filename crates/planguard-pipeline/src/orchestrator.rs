use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use planguard_carbon::{CarbonStore, StaticCarbonStore, DEFAULT_INTENSITY};
use planguard_catalog::{CatalogError, CatalogStore, RateQuery};
use planguard_estimation::{Aggregator, ComponentEstimate, EstimationContext, PricingOutcome};
use planguard_graph::GraphBuilder;
use planguard_policy::{Policy, PolicyEngine, PolicyEvaluator, PolicyRequest};
use planguard_semantics::{register_aws_mappers, DecompositionEngine, MapperRegistry};
use planguard_types::{
    BillingComponent, Decision, EstimationError, EstimationResult, PolicyVerdict, Severity,
    Violation,
};
use planguard_usage::{Forecaster, ProfileTable};
use tokio::sync::{watch, Semaphore};
use tracing::{error, info, instrument, warn};

use crate::audit::AuditLog;
use crate::request::{request_hash, EstimationOutput, EstimationRequest};
use crate::PipelineError;

/// Tunables for one pipeline instance.
#[derive(Clone, Copy, Debug)]
pub struct PipelineOptions {
    /// Bound on concurrent price lookups
    pub max_concurrency: usize,
    /// Deadline applied to each blocking I/O call (pricing, carbon, policy)
    pub stage_deadline: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            stage_deadline: Duration::from_secs(30),
        }
    }
}

/// The estimation orchestrator: one instance serves many requests, one
/// cancellation scope per request.
pub struct Pipeline {
    decomposition: DecompositionEngine,
    forecaster: Forecaster,
    catalog: Arc<dyn CatalogStore>,
    carbon: Arc<dyn CarbonStore>,
    policy: Arc<dyn PolicyEvaluator>,
    audit: Option<Arc<AuditLog>>,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(
        decomposition: DecompositionEngine,
        forecaster: Forecaster,
        catalog: Arc<dyn CatalogStore>,
        carbon: Arc<dyn CarbonStore>,
        policy: Arc<dyn PolicyEvaluator>,
    ) -> Self {
        Self {
            decomposition,
            forecaster,
            catalog,
            carbon,
            policy,
            audit: None,
            options: PipelineOptions::default(),
        }
    }

    /// Standard wiring: built-in AWS mappers, default environment profiles,
    /// static carbon table, local policy engine.
    pub fn with_defaults(catalog: Arc<dyn CatalogStore>) -> Self {
        let mut registry = MapperRegistry::new();
        register_aws_mappers(&mut registry);
        Self::new(
            DecompositionEngine::new(registry),
            Forecaster::new(ProfileTable::with_defaults()),
            catalog,
            Arc::new(StaticCarbonStore::new()),
            Arc::new(PolicyEngine::with_defaults()),
        )
    }

    pub fn with_audit(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Run one estimation to completion.
    pub async fn run(&self, request: EstimationRequest) -> Result<EstimationOutput, PipelineError> {
        let (_tx, rx) = watch::channel(false);
        self.run_with_cancellation(request, rx).await
    }

    /// Run one estimation under a cancellation scope. Cancellation aborts
    /// pending work and yields a fail-closed deny with reason `cancelled`.
    #[instrument(skip_all, fields(environment = %request.environment))]
    pub async fn run_with_cancellation(
        &self,
        request: EstimationRequest,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<EstimationOutput, PipelineError> {
        // Unknown environment is fatal before any work starts.
        self.forecaster.profiles().get(&request.environment)?;
        let production_class = self
            .forecaster
            .profiles()
            .is_production_class(&request.environment);

        let hash = request_hash(&request);

        // Stage 1: graph + decomposition (sequential, graph-level reasoning).
        let graph = GraphBuilder::new().build(&request.plan)?;
        let outcome = self.decomposition.decompose(&graph)?;
        info!(
            resources = graph.len(),
            components = outcome.components.len(),
            "decomposed plan"
        );

        // Stages 2+3: forecast and price per component, fanned out under a
        // bounded pool. Results are re-collected in input order so nothing
        // downstream depends on completion order.
        let inputs = tokio::select! {
            inputs = self.resolve_components(&outcome.components, &request) => inputs?,
            _ = cancel.changed() => {
                warn!("estimation cancelled");
                let output = self.cancelled_output(&request);
                self.append_audit(hash, &output).await;
                return Ok(output);
            }
        };

        // Stage 4: aggregation (sequential, deterministic).
        let carbon_intensity = if request.include_carbon {
            self.fetch_intensities(&outcome.components).await
        } else {
            BTreeMap::new()
        };
        let ctx = EstimationContext {
            environment: request.environment.clone(),
            pricing_alias: request.pricing_alias.clone(),
            effective_time: request.effective_time,
            include_carbon: request.include_carbon,
            include_formulas: request.include_formulas,
            carbon_intensity,
        };
        let estimation = Aggregator::aggregate(&inputs, &ctx);

        // Stage 5: policy. Evaluator failure is itself a fail-closed deny.
        let verdict = self
            .evaluate_policy(&request, &estimation, production_class)
            .await;

        let output = EstimationOutput {
            estimation,
            verdict,
        };
        self.append_audit(hash, &output).await;
        Ok(output)
    }

    async fn resolve_components(
        &self,
        components: &[BillingComponent],
        request: &EstimationRequest,
    ) -> Result<Vec<ComponentEstimate>, PipelineError> {
        let semaphore = Arc::new(Semaphore::new(self.options.max_concurrency));

        let futures = components.iter().map(|component| {
            let semaphore = Arc::clone(&semaphore);
            async move {
                if component.mapping_error.is_some() {
                    return Ok(ComponentEstimate {
                        component: component.clone(),
                        forecast: None,
                        pricing: PricingOutcome::Skipped,
                    });
                }

                // Forecasting is CPU-only; the profile was validated upfront.
                let forecast = self
                    .forecaster
                    .forecast(component, &request.environment)?;

                let query = RateQuery {
                    provider: component.provider.clone(),
                    service: component.service.clone(),
                    product_family: component.product_family.clone(),
                    region: component.region.clone(),
                    attributes: component.lookup_attributes.clone(),
                    unit: component.billing_period.unit().to_string(),
                    alias: request.pricing_alias.clone(),
                    effective_time: request.effective_time,
                    region_fallback: request.region_fallback,
                };

                let pricing = {
                    let _permit = semaphore.acquire().await.ok();
                    match tokio::time::timeout(
                        self.options.stage_deadline,
                        self.catalog.resolve(&query),
                    )
                    .await
                    {
                        Ok(Ok(resolved)) => PricingOutcome::Resolved(resolved),
                        Ok(Err(e)) if e.is_not_found() => PricingOutcome::NotFound(e.to_string()),
                        Ok(Err(e @ CatalogError::Backend(_))) => {
                            PricingOutcome::Failed(e.to_string())
                        }
                        Ok(Err(e)) => PricingOutcome::NotFound(e.to_string()),
                        Err(_) => PricingOutcome::Failed(format!(
                            "price resolution deadline ({:?}) exceeded",
                            self.options.stage_deadline
                        )),
                    }
                };

                Ok(ComponentEstimate {
                    component: component.clone(),
                    forecast: Some(forecast),
                    pricing,
                })
            }
        });

        join_all(futures)
            .await
            .into_iter()
            .collect::<Result<Vec<_>, PipelineError>>()
    }

    /// Pre-fetch carbon intensity per distinct region; the aggregation
    /// stage stays synchronous and deterministic.
    async fn fetch_intensities(&self, components: &[BillingComponent]) -> BTreeMap<String, f64> {
        let mut regions: Vec<(String, String)> = components
            .iter()
            .filter(|c| !c.region.is_empty())
            .map(|c| (c.provider.clone(), c.region.clone()))
            .collect();
        regions.sort();
        regions.dedup();

        let mut intensities = BTreeMap::new();
        for (provider, region) in regions {
            let intensity = match tokio::time::timeout(
                self.options.stage_deadline,
                self.carbon.intensity(&provider, &region),
            )
            .await
            {
                Ok(Ok(intensity)) => intensity,
                Ok(Err(e)) => {
                    warn!(%region, error = %e, "carbon intensity lookup failed");
                    DEFAULT_INTENSITY
                }
                Err(_) => {
                    warn!(%region, "carbon intensity lookup timed out");
                    DEFAULT_INTENSITY
                }
            };
            intensities.insert(region, intensity);
        }
        intensities
    }

    async fn evaluate_policy(
        &self,
        request: &EstimationRequest,
        estimation: &EstimationResult,
        production_class: bool,
    ) -> PolicyVerdict {
        let mut custom_policies = request.custom_policies.clone();
        if let Some(limit) = request.cost_limit {
            custom_policies.push(Policy::cost_limit(limit));
        }
        if let Some(budget) = request.carbon_budget {
            custom_policies.push(Policy::carbon_budget(budget));
        }

        let policy_request = PolicyRequest {
            estimation: estimation.clone(),
            environment: request.environment.clone(),
            production_class,
            custom_policies,
        };

        match tokio::time::timeout(
            self.options.stage_deadline,
            self.policy.evaluate(&policy_request),
        )
        .await
        {
            Ok(Ok(verdict)) => verdict,
            Ok(Err(e)) => {
                error!(error = %e, "policy evaluator failed; denying");
                PolicyVerdict::deny(
                    "fail-closed-evaluator",
                    "Policy Evaluator Failure",
                    format!("policy evaluation failed: {e}"),
                )
            }
            Err(_) => PolicyVerdict::deny(
                "fail-closed-evaluator",
                "Policy Evaluator Failure",
                "policy evaluation deadline exceeded",
            ),
        }
    }

    fn cancelled_output(&self, request: &EstimationRequest) -> EstimationOutput {
        let mut estimation =
            EstimationResult::empty(&request.environment, &request.pricing_alias);
        estimation.incomplete = true;
        estimation.confidence = 0.0;
        estimation.errors.push(EstimationError {
            component_id: String::new(),
            resource_address: String::new(),
            message: "estimation cancelled".to_string(),
            critical: true,
        });

        let verdict = PolicyVerdict {
            decision: Decision::Deny,
            violations: vec![Violation {
                policy_id: "fail-closed-cancelled".to_string(),
                policy_name: "Cancellation".to_string(),
                severity: Severity::Error,
                message: "cancelled".to_string(),
            }],
            warnings: Vec::new(),
            policies_evaluated: 0,
            evaluated_at: chrono::Utc::now(),
        };

        EstimationOutput {
            estimation,
            verdict,
        }
    }

    async fn append_audit(&self, hash: String, output: &EstimationOutput) {
        if let Some(audit) = &self.audit {
            if let Err(e) = audit.append(hash, output).await {
                error!(error = %e, "failed to append audit record");
            }
        }
    }
}

//! planguard - shift-left cost, carbon, and policy governance for
//! infrastructure change plans.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use planguard_catalog::{CatalogStore, InMemoryCatalog, SnapshotIngest};
use planguard_graph::{GraphError, PlanDocument};
use planguard_pipeline::{
    AuditLog, EstimationRequest, Pipeline, PipelineError, PlanguardConfig, RemoteCatalogClient,
};
use planguard_types::Decision;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod report;

// Exit codes for batch invocations.
const EXIT_PASS: u8 = 0;
const EXIT_DENY: u8 = 1;
const EXIT_WARN: u8 = 2;
const EXIT_PARSE_ERROR: u8 = 10;
const EXIT_ESTIMATION_ERROR: u8 = 11;
const EXIT_INCOMPLETE: u8 = 20;

#[derive(Parser)]
#[command(name = "planguard", about = "Cost, carbon, and policy governance for IaC plans")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate a change plan and evaluate policy
    Estimate(EstimateArgs),

    /// Manage price catalog snapshots
    Catalog {
        #[command(subcommand)]
        command: CatalogCommands,
    },
}

#[derive(Args)]
struct EstimateArgs {
    /// Path to the plan document (JSON)
    #[arg(short, long)]
    plan: PathBuf,

    /// Environment profile: dev, staging, prod
    #[arg(short, long, env = "PLANGUARD_ENVIRONMENT", default_value = "dev")]
    environment: String,

    /// Local catalog payload (JSON) when no remote catalog is configured
    #[arg(long, env = "PLANGUARD_CATALOG_FILE")]
    catalog: Option<PathBuf>,

    /// Include carbon estimates
    #[arg(long)]
    include_carbon: bool,

    /// Attach human-readable formulas to drivers
    #[arg(long)]
    formulas: bool,

    /// Inject a cost-limit policy (monthly P90, USD)
    #[arg(long)]
    cost_limit: Option<String>,

    /// Inject a carbon-budget policy (kg CO2e)
    #[arg(long)]
    carbon_budget: Option<f64>,

    /// Pricing alias to resolve against
    #[arg(long, default_value = "default")]
    pricing_alias: String,

    /// Evaluate prices as of this RFC 3339 timestamp (historical replay)
    #[arg(long)]
    effective_time: Option<String>,

    /// Widen price lookups to the default region when the exact region
    /// has no match
    #[arg(long)]
    region_fallback: bool,

    /// Append an audit record to this JSONL file
    #[arg(long, env = "PLANGUARD_AUDIT_LOG")]
    audit_log: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    output: OutputFormat,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum CatalogCommands {
    /// Ingest a snapshot payload (and optionally activate it)
    Ingest {
        /// Snapshot payload (JSON)
        #[arg(short, long)]
        file: PathBuf,

        /// Activate the snapshot after ingestion
        #[arg(long)]
        activate: bool,
    },

    /// List snapshots for a provider and region
    List {
        #[arg(long, default_value = "aws")]
        provider: String,

        #[arg(long, env = "PLANGUARD_DEFAULT_REGION", default_value = "us-east-1")]
        region: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = PlanguardConfig::from_env();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Estimate(args) => run_estimate(args, config).await,
        Commands::Catalog { command } => run_catalog(command, config).await,
    }
}

async fn run_estimate(args: EstimateArgs, config: PlanguardConfig) -> ExitCode {
    let effective_time = match args.effective_time.as_deref().map(parse_timestamp) {
        Some(Ok(at)) => Some(at),
        Some(Err(message)) => {
            eprintln!("invalid --effective-time: {message}");
            return ExitCode::from(EXIT_PARSE_ERROR);
        }
        None => None,
    };

    let cost_limit = match args.cost_limit.as_deref().map(str::parse) {
        Some(Ok(limit)) => Some(limit),
        Some(Err(_)) => {
            eprintln!("invalid --cost-limit: expected a decimal amount");
            return ExitCode::from(EXIT_PARSE_ERROR);
        }
        None => None,
    };

    let raw_plan = match std::fs::read_to_string(&args.plan) {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!("failed to read plan {}: {e}", args.plan.display());
            return ExitCode::from(EXIT_PARSE_ERROR);
        }
    };
    let plan = match PlanDocument::from_json(&raw_plan) {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("failed to parse plan: {e}");
            return ExitCode::from(EXIT_PARSE_ERROR);
        }
    };

    // Fail fast before any work when a production deployment lacks
    // catalog credentials.
    let production_class = args.environment == "prod";
    if let Err(e) = config.ensure_production_ready(production_class) {
        eprintln!("{e}");
        return ExitCode::from(EXIT_ESTIMATION_ERROR);
    }

    let catalog = match build_catalog(&args, &config).await {
        Ok(catalog) => catalog,
        Err(code) => return code,
    };

    let mut pipeline = Pipeline::with_defaults(catalog);
    if let Some(path) = &args.audit_log {
        pipeline = pipeline.with_audit(Arc::new(AuditLog::with_file(path.clone(), 10_000)));
    }

    let mut request = EstimationRequest::new(plan, &args.environment);
    request.include_carbon = args.include_carbon;
    request.include_formulas = args.formulas;
    request.cost_limit = cost_limit;
    request.carbon_budget = args.carbon_budget;
    request.pricing_alias = args.pricing_alias.clone();
    request.effective_time = effective_time;
    request.region_fallback = args.region_fallback;

    let output = match pipeline.run(request).await {
        Ok(output) => output,
        Err(PipelineError::Graph(e @ GraphError::Parse(_))) => {
            eprintln!("{e}");
            return ExitCode::from(EXIT_PARSE_ERROR);
        }
        Err(e) => {
            eprintln!("estimation failed: {e}");
            return ExitCode::from(EXIT_ESTIMATION_ERROR);
        }
    };

    match args.output {
        OutputFormat::Text => report::print_text(&output),
        OutputFormat::Json => match report::render_json(&output) {
            Ok(rendered) => println!("{rendered}"),
            Err(e) => {
                eprintln!("failed to render output: {e}");
                return ExitCode::from(EXIT_ESTIMATION_ERROR);
            }
        },
    }

    if output.estimation.incomplete {
        return ExitCode::from(EXIT_INCOMPLETE);
    }
    match output.verdict.decision {
        Decision::Pass => ExitCode::from(EXIT_PASS),
        Decision::Warn => ExitCode::from(EXIT_WARN),
        Decision::Deny => ExitCode::from(EXIT_DENY),
    }
}

/// Remote catalog when configured, otherwise an in-memory catalog seeded
/// from the local payload file.
async fn build_catalog(
    args: &EstimateArgs,
    config: &PlanguardConfig,
) -> Result<Arc<dyn CatalogStore>, ExitCode> {
    if let Some(endpoint) = &config.pricing_endpoint {
        debug!(%endpoint, "using remote catalog");
        return Ok(Arc::new(RemoteCatalogClient::new(
            endpoint.clone(),
            config.catalog_token.clone(),
        )));
    }

    let Some(path) = &args.catalog else {
        eprintln!(
            "no catalog configured: pass --catalog <file> or set PLANGUARD_PRICING_ENDPOINT"
        );
        return Err(ExitCode::from(EXIT_ESTIMATION_ERROR));
    };

    let payloads = match read_catalog_payloads(path) {
        Ok(payloads) => payloads,
        Err(message) => {
            eprintln!("{message}");
            return Err(ExitCode::from(EXIT_PARSE_ERROR));
        }
    };

    let catalog = Arc::new(InMemoryCatalog::new());
    for payload in payloads {
        let outcome = match catalog.ingest(payload).await {
            Ok(outcome) => outcome,
            Err(e) => {
                eprintln!("failed to ingest catalog: {e}");
                return Err(ExitCode::from(EXIT_ESTIMATION_ERROR));
            }
        };
        if let Err(e) = catalog.activate(outcome.snapshot_id).await {
            eprintln!("failed to activate snapshot: {e}");
            return Err(ExitCode::from(EXIT_ESTIMATION_ERROR));
        }
    }
    Ok(catalog)
}

fn read_catalog_payloads(path: &PathBuf) -> Result<Vec<SnapshotIngest>, String> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read catalog {}: {e}", path.display()))?;
    // A payload file holds either one snapshot or a list of them.
    if let Ok(payloads) = serde_json::from_str::<Vec<SnapshotIngest>>(&raw) {
        return Ok(payloads);
    }
    serde_json::from_str::<SnapshotIngest>(&raw)
        .map(|payload| vec![payload])
        .map_err(|e| format!("failed to parse catalog {}: {e}", path.display()))
}

async fn run_catalog(command: CatalogCommands, config: PlanguardConfig) -> ExitCode {
    let Some(endpoint) = &config.pricing_endpoint else {
        eprintln!("catalog commands require PLANGUARD_PRICING_ENDPOINT");
        return ExitCode::from(EXIT_ESTIMATION_ERROR);
    };
    let client = RemoteCatalogClient::new(endpoint.clone(), config.catalog_token.clone());

    match command {
        CatalogCommands::Ingest { file, activate } => {
            let payloads = match read_catalog_payloads(&file) {
                Ok(payloads) => payloads,
                Err(message) => {
                    eprintln!("{message}");
                    return ExitCode::from(EXIT_PARSE_ERROR);
                }
            };
            for payload in payloads {
                let outcome = match client.ingest(payload).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        eprintln!("ingest failed: {e}");
                        return ExitCode::from(EXIT_ESTIMATION_ERROR);
                    }
                };
                let marker = if outcome.deduplicated {
                    "deduplicated"
                } else {
                    "ingested"
                };
                println!(
                    "{marker} snapshot {} ({} rates)",
                    outcome.snapshot_id, outcome.rates_ingested
                );
                if activate {
                    if let Err(e) = client.activate(outcome.snapshot_id).await {
                        eprintln!("activation failed: {e}");
                        return ExitCode::from(EXIT_ESTIMATION_ERROR);
                    }
                    println!("activated snapshot {}", outcome.snapshot_id);
                }
            }
            ExitCode::from(EXIT_PASS)
        }
        CatalogCommands::List { provider, region } => {
            match client.list_snapshots(&provider, &region).await {
                Ok(snapshots) => {
                    for snapshot in snapshots {
                        let active = if snapshot.active { "active" } else { "      " };
                        println!(
                            "{} {} {}/{}/{} valid-from {}",
                            snapshot.id,
                            active,
                            snapshot.provider,
                            snapshot.region,
                            snapshot.alias,
                            snapshot.valid_from.to_rfc3339(),
                        );
                    }
                    ExitCode::from(EXIT_PASS)
                }
                Err(e) => {
                    eprintln!("list failed: {e}");
                    ExitCode::from(EXIT_ESTIMATION_ERROR)
                }
            }
        }
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| e.to_string())
}

//! costctl — CostOps CLI
//!
//! Scans an exported fleet for rightsizing opportunities, sweeps for
//! idle and hot resources, and breaks billing records down by service,
//! location, and resource group.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use costctl::config::CtlConfig;
use costctl::sources::{self, FileInventory, RecordedMetrics};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cost_billing::CostReport;
use cost_catalog::SizingCatalog;
use cost_engine::{EngineConfig, RecommendationEngine};
use cost_pricing::{PriceBook, PricingSource};
use cost_proto::{CloudProvider, ResourceKind, TimeWindow};
use cost_scanner::{FleetScanner, ResourceFilter, ScanReport, UsageReport};

#[derive(Parser)]
#[command(name = "costctl")]
#[command(about = "CostOps rightsizing and cost analysis CLI")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan an exported fleet for rightsizing recommendations
    Scan {
        /// Inventory file (JSON array of resource descriptors)
        #[arg(long)]
        inventory: PathBuf,

        /// Telemetry file (JSON object mapping resource id to samples)
        #[arg(long)]
        metrics: PathBuf,

        /// Custom price book (JSON array of price entries)
        #[arg(long)]
        prices: Option<PathBuf>,

        /// Custom sizing catalog (JSON array of configuration families)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Path to config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Only scan resources of this kind (compute, database, disk)
        #[arg(long)]
        kind: Option<String>,

        /// Only scan resources from this provider (aws, azure, gcp)
        #[arg(long)]
        provider: Option<String>,

        /// Only scan resources in this region
        #[arg(long)]
        region: Option<String>,

        /// Emit the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Sweep for idle and hot resources over the short lookback window
    Usage {
        /// Inventory file (JSON array of resource descriptors)
        #[arg(long)]
        inventory: PathBuf,

        /// Telemetry file (JSON object mapping resource id to samples)
        #[arg(long)]
        metrics: PathBuf,

        /// Path to config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Emit the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Aggregate billing records into a cost breakdown
    Costs {
        /// Billing records file (JSON array of cost records)
        #[arg(long)]
        records: PathBuf,

        /// Reporting window in days, counted back from now
        #[arg(long, default_value_t = 30)]
        window_days: i64,

        /// Emit the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect one configuration id: family, size, next step down, price
    Lookup {
        /// Configuration id (e.g. t3.large)
        configuration: String,

        /// Resource kind for the price lookup (compute, database, disk)
        #[arg(long, default_value = "compute")]
        kind: String,

        /// Custom sizing catalog (JSON array of configuration families)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Custom price book (JSON array of price entries)
        #[arg(long)]
        prices: Option<PathBuf>,

        /// Emit the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the sizing catalog families and their size ladders
    Families {
        /// Custom sizing catalog (JSON array of configuration families)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Emit the catalog as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate a sample config file
    InitConfig {
        /// Path to write config
        #[arg(short, long, default_value = "costops.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Suppress tracing for JSON-emitting invocations to keep stdout clean
    let wants_json = matches!(
        cli.command,
        Commands::Scan { json: true, .. }
            | Commands::Usage { json: true, .. }
            | Commands::Costs { json: true, .. }
            | Commands::Lookup { json: true, .. }
            | Commands::Families { json: true, .. }
    );
    if !wants_json {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(
                EnvFilter::from_default_env()
                    .add_directive("costctl=info".parse()?)
                    .add_directive("cost_scanner=info".parse()?),
            )
            .init();
    }

    match cli.command {
        Commands::Scan {
            inventory,
            metrics,
            prices,
            catalog,
            config,
            kind,
            provider,
            region,
            json,
        } => {
            let filter = build_filter(kind.as_deref(), provider.as_deref(), region)?;
            run_scan(inventory, metrics, prices, catalog, config, filter, json).await?;
        }
        Commands::Usage {
            inventory,
            metrics,
            config,
            json,
        } => {
            run_usage(inventory, metrics, config, json).await?;
        }
        Commands::Costs {
            records,
            window_days,
            json,
        } => {
            run_costs(records, window_days, json)?;
        }
        Commands::Lookup {
            configuration,
            kind,
            catalog,
            prices,
            json,
        } => {
            run_lookup(&configuration, &kind, catalog, prices, json)?;
        }
        Commands::Families { catalog, json } => {
            run_families(catalog, json)?;
        }
        Commands::InitConfig { output } => {
            init_config(output)?;
        }
    }

    Ok(())
}

// ─── Scan ─────────────────────────────────────────────────────────────────────

async fn run_scan(
    inventory_path: PathBuf,
    metrics_path: PathBuf,
    prices_path: Option<PathBuf>,
    catalog_path: Option<PathBuf>,
    config_path: Option<PathBuf>,
    filter: ResourceFilter,
    json: bool,
) -> anyhow::Result<()> {
    let config = CtlConfig::load_or_default(config_path.as_deref())?;
    let scanner = build_scanner(&config, catalog_path.as_deref(), prices_path.as_deref())?;

    let inventory = FileInventory::load(&inventory_path)?;
    let metrics = RecordedMetrics::load(&metrics_path)?;
    info!(resources = inventory.len(), "inventory loaded");

    let report = scanner.scan_catalog(&inventory, &filter, &metrics).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_scan_report(&report);
    }

    Ok(())
}

fn print_scan_report(report: &ScanReport) {
    println!("Fleet Scan Report");
    println!();
    println!("  Scan ID:    {}", report.scan_id);
    println!("  Generated:  {}", report.generated_at.to_rfc3339());
    println!(
        "  Scanned:    {} resources in {} ms",
        report.resources_scanned, report.duration_ms
    );
    println!();

    if report.recommendations.is_empty() {
        println!("  No rightsizing recommendations.");
    } else {
        println!("  Recommendations:");
        for rec in &report.recommendations {
            let savings = match rec.estimated_monthly_savings {
                Some(usd) => format!("${usd:.2}/mo"),
                None => "savings unknown".to_string(),
            };
            let priority = match rec.priority() {
                Some(p) => format!(", {p} priority"),
                None => String::new(),
            };
            println!(
                "    {}  {} -> {}  ({savings}{priority})",
                rec.resource_id, rec.current_configuration, rec.recommended_configuration
            );
            println!("      {}", rec.reason);
        }
    }

    if !report.skipped.is_empty() {
        println!();
        println!("  Skipped:");
        for skip in &report.skipped {
            println!("    {}  {}", skip.resource_id, skip.reason);
        }
    }

    println!();
    println!(
        "  Forecast: ${:.2}/mo across {} recommendations",
        report.forecast.total_potential_monthly_savings, report.forecast.recommendation_count
    );
    for (kind, savings) in &report.forecast.breakdown_by_resource_kind {
        println!("    {kind}: ${savings:.2}/mo");
    }
}

// ─── Usage ────────────────────────────────────────────────────────────────────

async fn run_usage(
    inventory_path: PathBuf,
    metrics_path: PathBuf,
    config_path: Option<PathBuf>,
    json: bool,
) -> anyhow::Result<()> {
    let config = CtlConfig::load_or_default(config_path.as_deref())?;
    let scanner = build_scanner(&config, None, None)?;

    let inventory = FileInventory::load(&inventory_path)?;
    let metrics = RecordedMetrics::load(&metrics_path)?;

    use cost_scanner::ResourceCatalog;
    let resources = inventory.list_resources(&ResourceFilter::default()).await?;
    info!(resources = resources.len(), "inventory loaded");

    let report = scanner.usage_sweep(&resources, &metrics).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_usage_report(&report);
    }

    Ok(())
}

fn print_usage_report(report: &UsageReport) {
    println!("Usage Sweep");
    println!();
    println!("  Generated:  {}", report.generated_at.to_rfc3339());
    println!("  Checked:    {} resources", report.resources_checked);
    println!();

    if report.idle.is_empty() {
        println!("  No idle resources.");
    } else {
        println!("  Idle:");
        for idle in &report.idle {
            let cost = match idle.estimated_monthly_cost {
                Some(usd) => format!("${usd:.2}/mo"),
                None => "cost unknown".to_string(),
            };
            println!(
                "    {}  avg {:.2}% / peak {:.2}% CPU  ({cost})",
                idle.resource_id, idle.average_cpu_pct, idle.peak_cpu_pct
            );
            println!("      {}", idle.note);
        }
    }

    if !report.hot.is_empty() {
        println!();
        println!("  Hot:");
        for alert in &report.hot {
            println!("    {}  {}", alert.resource_id, alert.description);
        }
    }

    if !report.skipped.is_empty() {
        println!();
        println!("  Skipped:");
        for skip in &report.skipped {
            println!("    {}  {}", skip.resource_id, skip.reason);
        }
    }
}

// ─── Costs ────────────────────────────────────────────────────────────────────

fn run_costs(records_path: PathBuf, window_days: i64, json: bool) -> anyhow::Result<()> {
    let records = sources::load_records(&records_path)?;
    let report = CostReport::for_window(&records, TimeWindow::last_days(window_days));

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_cost_report(&report);
    }

    Ok(())
}

fn print_cost_report(report: &CostReport) {
    println!("Cost Breakdown");
    println!();
    println!(
        "  Window:   {} .. {}",
        report.window.start.to_rfc3339(),
        report.window.end.to_rfc3339()
    );
    println!("  Records:  {}", report.record_count);
    println!(
        "  Total:    {:.2} {}",
        report.breakdown.total_cost, report.currency
    );

    print_grouping("By service", &report.breakdown.by_service);
    print_grouping("By location", &report.breakdown.by_location);
    print_grouping("By resource group", &report.breakdown.by_resource_group);
}

fn print_grouping(label: &str, grouping: &BTreeMap<String, f64>) {
    if grouping.is_empty() {
        return;
    }
    println!();
    println!("  {label}:");
    for (key, cost) in grouping {
        println!("    {key}: {cost:.2}");
    }
}

// ─── Lookup ───────────────────────────────────────────────────────────────────

fn run_lookup(
    configuration: &str,
    kind: &str,
    catalog_path: Option<PathBuf>,
    prices_path: Option<PathBuf>,
    json: bool,
) -> anyhow::Result<()> {
    let kind = parse_kind(kind)?;
    let catalog = load_catalog_or_builtin(catalog_path.as_deref())?;
    let prices = load_prices_or_builtin(prices_path.as_deref())?;

    let Some((family, size)) = catalog.family_of(configuration) else {
        anyhow::bail!("configuration '{configuration}' does not match any catalog family");
    };
    let next_smaller = catalog.next_smaller_configuration(configuration);
    let hourly = prices.unit_price(kind, configuration);
    let hours = EngineConfig::default().hours_per_month;

    if json {
        let value = serde_json::json!({
            "configuration": configuration,
            "resource_kind": kind,
            "family": family,
            "size": size,
            "next_smaller": next_smaller,
            "hourly_unit_cost": hourly,
            "monthly_cost": hourly.map(|h| h * hours),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("Configuration: {configuration}");
        println!();
        println!("  Family:        {family}");
        println!("  Size:          {size}");
        println!(
            "  Next smaller:  {}",
            next_smaller.as_deref().unwrap_or("none (already smallest)")
        );
        match hourly {
            Some(hourly) => {
                println!("  Hourly cost:   ${hourly:.4} ({kind})");
                println!("  Monthly cost:  ${:.2} at {hours} h/mo", hourly * hours);
            }
            None => println!("  Hourly cost:   not in the price book ({kind})"),
        }
    }

    Ok(())
}

// ─── Families ─────────────────────────────────────────────────────────────────

fn run_families(catalog_path: Option<PathBuf>, json: bool) -> anyhow::Result<()> {
    let catalog = load_catalog_or_builtin(catalog_path.as_deref())?;
    let family_ids = catalog.family_ids();

    if json {
        let families: Vec<serde_json::Value> = family_ids
            .iter()
            .map(|family| {
                serde_json::json!({
                    "family_id": family,
                    "sizes": catalog.sizes(family),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&families)?);
    } else {
        println!("Sizing Catalog ({} families)", family_ids.len());
        println!();
        for family in family_ids {
            let sizes = catalog.sizes(family).unwrap_or(&[]).join(" < ");
            println!("  {family}: {sizes}");
        }
    }

    Ok(())
}

// ─── InitConfig ───────────────────────────────────────────────────────────────

fn init_config(output: PathBuf) -> anyhow::Result<()> {
    let config = CtlConfig::default();
    config.save(&output)?;

    println!("Config written to {}", output.display());
    println!();
    println!("Edit the thresholds as needed, then run:");
    println!(
        "  costctl scan --inventory inventory.json --metrics metrics.json --config {}",
        output.display()
    );

    Ok(())
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

fn build_scanner(
    config: &CtlConfig,
    catalog_path: Option<&Path>,
    prices_path: Option<&Path>,
) -> anyhow::Result<FleetScanner> {
    let catalog = load_catalog_or_builtin(catalog_path)?;
    let prices = load_prices_or_builtin(prices_path)?;

    let engine = RecommendationEngine::new(config.engine.clone(), catalog, Box::new(prices))?;
    let mut scanner =
        FleetScanner::new(engine).with_max_concurrent(config.max_concurrent_fetches);
    if let Some(timeout) = config.fetch_timeout() {
        scanner = scanner.with_fetch_timeout(timeout);
    }
    Ok(scanner)
}

fn load_catalog_or_builtin(path: Option<&Path>) -> anyhow::Result<SizingCatalog> {
    Ok(match path {
        Some(path) => sources::load_catalog(path)?,
        None => SizingCatalog::builtin(),
    })
}

fn load_prices_or_builtin(path: Option<&Path>) -> anyhow::Result<PriceBook> {
    Ok(match path {
        Some(path) => sources::load_prices(path)?,
        None => PriceBook::builtin(),
    })
}

fn build_filter(
    kind: Option<&str>,
    provider: Option<&str>,
    region: Option<String>,
) -> anyhow::Result<ResourceFilter> {
    Ok(ResourceFilter {
        kind: kind.map(parse_kind).transpose()?,
        provider: provider.map(parse_provider).transpose()?,
        region,
    })
}

fn parse_kind(value: &str) -> anyhow::Result<ResourceKind> {
    match value {
        "compute" => Ok(ResourceKind::Compute),
        "database" => Ok(ResourceKind::Database),
        "disk" => Ok(ResourceKind::Disk),
        other => anyhow::bail!("unknown resource kind '{other}' (expected compute, database, or disk)"),
    }
}

fn parse_provider(value: &str) -> anyhow::Result<CloudProvider> {
    match value {
        "aws" => Ok(CloudProvider::Aws),
        "azure" => Ok(CloudProvider::Azure),
        "gcp" => Ok(CloudProvider::Gcp),
        other => anyhow::bail!("unknown provider '{other}' (expected aws, azure, or gcp)"),
    }
}

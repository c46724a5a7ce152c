//! REACH CLI
//!
//! Command-line interface for the REACH campaign delivery service.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use reach_api::{ApiConfig, ApiServer};
use reach_cache::ResponseCache;
use reach_core::traits::RuleStore;
use reach_core::types::{Campaign, CampaignStatus, CampaignSummary, TargetingRule};
use reach_delivery::{parse_params, parse_query_string, DeliveryService, DeliveryStats, TracingObserver};
use reach_engine::TargetingEngine;
use reach_store::MemoryRuleStore;

/// REACH - Campaign targeting and delivery
#[derive(Parser)]
#[command(name = "reach")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the API server
    Serve {
        /// Port to listen on (overrides APP_PORT)
        #[arg(short, long)]
        port: Option<u16>,
        /// Bind address (overrides BIND_ADDR)
        #[arg(short, long)]
        bind: Option<String>,
        /// Rules fixture to serve from (overrides RULES_FILE)
        #[arg(short, long)]
        rules: Option<PathBuf>,
    },

    /// Resolve one targeting request against a rules fixture
    Resolve {
        /// Rules fixture (JSON)
        #[arg(short, long, env = "RULES_FILE")]
        rules: PathBuf,
        /// Raw query string, e.g. "app_id=com.game&country=US&os=android"
        #[arg(conflicts_with = "dimension")]
        query: Option<String>,
        /// Dimension as name=value, repeatable
        #[arg(short, long = "dimension", value_name = "NAME=VALUE")]
        dimension: Vec<String>,
        /// Print the raw JSON payload only
        #[arg(long)]
        json: bool,
    },

    /// List dimensions, or the values of one dimension
    Dimensions {
        /// Rules fixture (JSON)
        #[arg(short, long, env = "RULES_FILE")]
        rules: PathBuf,
        /// Dimension whose values to list
        name: Option<String>,
    },

    /// Run a synthetic delivery benchmark
    Bench {
        /// Number of synthetic campaigns
        #[arg(short, long, default_value = "5000")]
        campaigns: usize,
        /// Number of delivery requests to issue
        #[arg(short = 'n', long, default_value = "2000")]
        requests: usize,
        /// Random seed
        #[arg(long, default_value = "7")]
        seed: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // Only `serve` needs a valid server configuration; the other commands
    // log at the default level when it is broken.
    let config = ApiConfig::from_env();
    let filter = match &config {
        Ok(config) => config.log_directive(cli.verbose),
        Err(_) => ApiConfig::default().log_directive(cli.verbose),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Serve { port, bind, rules } => cmd_serve(config, port, bind, rules).await,
        Commands::Resolve {
            rules,
            query,
            dimension,
            json,
        } => cmd_resolve(&rules, query.as_deref(), &dimension, json).await,
        Commands::Dimensions { rules, name } => cmd_dimensions(&rules, name.as_deref()).await,
        Commands::Bench {
            campaigns,
            requests,
            seed,
        } => cmd_bench(campaigns, requests, seed).await,
    }
}

async fn load_store(path: &Path) -> Result<MemoryRuleStore> {
    let store = MemoryRuleStore::from_file(path)
        .await
        .with_context(|| format!("Failed to load rules from {}", path.display()))?;
    println!(
        "   {} {} campaigns, {} rules",
        "Loaded:".dimmed(),
        store.campaign_count(),
        store.rule_count()
    );
    Ok(store)
}

/// Run API server
async fn cmd_serve(
    config: reach_core::Result<ApiConfig>,
    port: Option<u16>,
    bind: Option<String>,
    rules: Option<PathBuf>,
) -> Result<()> {
    let mut config = config.context("Invalid server configuration")?;
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(bind) = bind {
        config.bind_addr = bind;
    }
    if rules.is_some() {
        config.rules_file = rules;
    }
    config.validate().context("Invalid server configuration")?;
    let addr = config.socket_addr()?;

    println!("{}", "🚀 Starting REACH API server...".cyan().bold());
    println!("   {} http://{}", "Listening on:".green(), addr);
    println!("   {} http://{}/health", "Health check:".dimmed(), addr);
    println!("\n   Press Ctrl+C to stop.\n");

    let server = ApiServer::from_config(config)
        .await
        .context("Failed to open rule store")?;
    server.run(addr).await?;

    Ok(())
}

/// Resolve a single request
async fn cmd_resolve(rules: &Path, query: Option<&str>, dimensions: &[String], json: bool) -> Result<()> {
    if !json {
        println!("{}", "🎯 Resolving targeting request...".cyan().bold());
    }

    let request = match query {
        Some(query) => parse_query_string(query)?,
        None => {
            let mut pairs = Vec::with_capacity(dimensions.len());
            for item in dimensions {
                let Some((name, value)) = item.split_once('=') else {
                    bail!("dimension '{}' is not in NAME=VALUE form", item);
                };
                pairs.push((name, value));
            }
            parse_params(pairs)?
        }
    };

    let store = if json {
        MemoryRuleStore::from_file(rules)
            .await
            .with_context(|| format!("Failed to load rules from {}", rules.display()))?
    } else {
        load_store(rules).await?
    };

    let service = DeliveryService::new(
        TargetingEngine::new(Arc::new(store)),
        Arc::new(ResponseCache::new()),
    )
    .with_observer(Arc::new(TracingObserver));

    let delivery = service.deliver(&request).await.context("Resolution failed")?;

    if json {
        println!("{}", String::from_utf8_lossy(&delivery.payload));
        return Ok(());
    }

    let campaigns: Vec<CampaignSummary> = serde_json::from_slice(&delivery.payload)?;
    println!("   {} {}", "Cache key:".dimmed(), delivery.key);

    if campaigns.is_empty() {
        println!("\n{}", "No eligible campaigns.".yellow());
    } else {
        println!("\n{} {} campaign(s):", "✅".green(), campaigns.len());
        for campaign in &campaigns {
            println!(
                "   {} {} ({})",
                campaign.campaign_id.green(),
                campaign.call_to_action,
                campaign.image_url.dimmed()
            );
        }
    }

    Ok(())
}

/// List dimensions or dimension values
async fn cmd_dimensions(rules: &Path, name: Option<&str>) -> Result<()> {
    let store = load_store(rules).await?;

    match name {
        Some(name) => {
            let values = store.dimension_values(name).await?;
            println!("\n{} {}", "Values of".cyan().bold(), name.bold());
            if values.is_empty() {
                println!("   {}", "(none)".dimmed());
            }
            for value in values {
                println!("   {}", value);
            }
        }
        None => {
            let dimensions = store.dimensions().await?;
            println!("\n{}", "Dimensions:".cyan().bold());
            if dimensions.is_empty() {
                println!("   {}", "(none)".dimmed());
            }
            for dimension in dimensions {
                println!("   {}", dimension);
            }
        }
    }

    Ok(())
}

const COUNTRIES: [&str; 8] = ["US", "CA", "GB", "DE", "FR", "IN", "BR", "JP"];
const PLATFORMS: [&str; 3] = ["android", "ios", "web"];
const APPS: [&str; 4] = ["com.game", "com.music", "com.news", "com.chat"];

fn synthetic_store(campaigns: usize, rng: &mut StdRng) -> Result<MemoryRuleStore> {
    let store = MemoryRuleStore::new();
    for i in 0..campaigns {
        let id = format!("camp_{:06}", i);
        let status = if rng.gen_bool(0.9) {
            CampaignStatus::Active
        } else {
            CampaignStatus::Inactive
        };
        store.upsert_campaign(
            Campaign::new(&id, format!("Campaign {}", i), format!("https://cdn/{}.png", id), "Install")
                .with_status(status),
        )?;

        let picks = rng.gen_range(0..3);
        for country in COUNTRIES.choose_multiple(rng, picks) {
            let rule = if rng.gen_bool(0.7) {
                TargetingRule::include(&id, "country", *country)
            } else {
                TargetingRule::exclude(&id, "country", *country)
            };
            store.upsert_rule(rule)?;
        }
        if rng.gen_bool(0.5) {
            if let Some(os) = PLATFORMS.choose(rng) {
                store.upsert_rule(TargetingRule::include(&id, "os", *os))?;
            }
        }
        if rng.gen_bool(0.2) {
            if let Some(app) = APPS.choose(rng) {
                store.upsert_rule(TargetingRule::exclude(&id, "app_id", *app))?;
            }
        }
    }
    Ok(store)
}

/// Run benchmarks
async fn cmd_bench(campaigns: usize, requests: usize, seed: u64) -> Result<()> {
    println!(
        "{} {} campaigns, {} requests",
        "📊 Benchmarking with".cyan().bold(),
        campaigns,
        requests
    );
    let mut rng = StdRng::seed_from_u64(seed);

    println!("\n{}", "1. Building synthetic rule store...".dimmed());
    let start = Instant::now();
    let store = synthetic_store(campaigns, &mut rng)?;
    println!(
        "   ✓ {} campaigns, {} rules: {:?}",
        store.campaign_count(),
        store.rule_count(),
        start.elapsed()
    );

    let stats = Arc::new(DeliveryStats::new());
    let cache = ResponseCache::new().with_observer(stats.clone());
    let service = DeliveryService::new(TargetingEngine::new(Arc::new(store)), Arc::new(cache))
        .with_observer(stats.clone());

    println!("\n{}", "2. Delivering...".dimmed());
    let pb = ProgressBar::new(requests as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("   [{bar:40.cyan/blue}] {pos}/{len}")?
            .progress_chars("#>-"),
    );

    let start = Instant::now();
    for _ in 0..requests {
        let page = rng.gen_range(1..=3u32).to_string();
        let params = [
            ("app_id", APPS[rng.gen_range(0..APPS.len())]),
            ("country", COUNTRIES[rng.gen_range(0..COUNTRIES.len())]),
            ("os", PLATFORMS[rng.gen_range(0..PLATFORMS.len())]),
            ("page", page.as_str()),
        ];
        service.deliver_params(params).await?;
        pb.inc(1);
    }
    pb.finish();
    let elapsed = start.elapsed();

    let snapshot = stats.snapshot();
    println!("\n{}", "📈 Results:".green().bold());
    println!("   Throughput: {:.0} requests/sec", requests as f64 / elapsed.as_secs_f64());
    println!(
        "   Cache: {} hits, {} misses ({:.1}% hit ratio)",
        snapshot.cache_hits,
        snapshot.cache_misses,
        snapshot.hit_ratio * 100.0
    );
    println!("   Mean resolution: {:.3}ms", snapshot.avg_resolve_ms);
    println!(
        "   Campaigns served per resolution: {:.1}",
        if snapshot.resolutions == 0 {
            0.0
        } else {
            snapshot.campaigns_served as f64 / snapshot.resolutions as f64
        }
    );

    Ok(())
}

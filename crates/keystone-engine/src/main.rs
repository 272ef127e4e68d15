//! Keystone CLI
//!
//! Offline quotes, tier lookups and configuration checks for the creator
//! curve engine, plus an in-memory simulation of a full curve lifecycle.

use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use keystone_core::{LaunchRecord, UserId};
use keystone_engine::core::LaunchParams;
use keystone_engine::{create_example_config, Engine, EngineConfig};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "keystone")]
#[command(about = "Keystone creator-curve engine tools")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "keystone.toml")]
    config: String,

    /// Override log level
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON logs
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Price a buy of `shares` at `supply`
    Quote {
        #[arg(long)]
        supply: u64,
        #[arg(long)]
        shares: u64,
    },

    /// Price a sell of `shares` at `supply`
    SellQuote {
        #[arg(long)]
        supply: u64,
        #[arg(long)]
        shares: u64,
    },

    /// Supply needed for the reserve to reach a target (defaults to the
    /// graduation threshold)
    Estimate {
        #[arg(long)]
        target: Option<u64>,
    },

    /// Tier and capabilities for a share balance
    Tier {
        #[arg(long)]
        balance: u64,
    },

    /// Per-wallet cap at a unique holder count
    Cap {
        #[arg(long)]
        holders: u64,
    },

    /// Validate the configuration and exit
    CheckConfig,

    /// Write an example configuration file
    InitConfig {
        #[arg(long, default_value = "keystone.example.toml")]
        output: String,
    },

    /// Run a curve from creation to launch against in-memory collaborators
    Simulate {
        /// External asset quantity acquired at launch
        #[arg(long, default_value = "1000000000")]
        acquired: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_missing = !Path::new(&cli.config).exists();
    let mut config = if config_missing {
        EngineConfig::default()
    } else {
        EngineConfig::load(&cli.config).with_context(|| format!("loading {}", cli.config))?
    };

    // Override logging if provided
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if cli.json_logs {
        config.logging.json = true;
    }

    init_logging(&config);
    if config_missing {
        warn!("Config file not found, using defaults: {}", cli.config);
    }

    match cli.command {
        Command::Quote { supply, shares } => {
            let quote = config.pricing_engine()?.quote_buy(supply, shares)?;
            print_json(&quote)?;
        }
        Command::SellQuote { supply, shares } => {
            let quote = config.pricing_engine()?.quote_sell(supply, shares)?;
            print_json(&quote)?;
        }
        Command::Estimate { target } => {
            let target = target.unwrap_or(config.graduation.threshold) as u128;
            let supply = config.pricing_engine()?.supply_for_target_reserve(target)?;
            print_json(&serde_json::json!({ "target_reserve": target, "supply": supply }))?;
        }
        Command::Tier { balance } => {
            let tiers = config.tier_resolver()?;
            let tier = tiers.resolve_tier(balance);
            print_json(&serde_json::json!({
                "balance": balance,
                "tier": tier,
                "capabilities": tiers.capabilities(tier),
            }))?;
        }
        Command::Cap { holders } => {
            let cap = config.tier_resolver()?.dynamic_cap(holders)?;
            print_json(&serde_json::json!({ "unique_holders": holders, "wallet_cap": cap }))?;
        }
        Command::CheckConfig => {
            config.validate()?;
            info!("Configuration is valid");
        }
        Command::InitConfig { output } => {
            create_example_config(&output)?;
            info!("Example configuration written to {}", output);
        }
        Command::Simulate { acquired } => {
            let record = simulate(config, acquired as u128).await?;
            print_json(&record)?;
        }
    }

    Ok(())
}

/// Buy from new wallets at the cap until the reserve clears the graduation
/// threshold, then freeze and launch
async fn simulate(config: EngineConfig, acquired: u128) -> Result<LaunchRecord> {
    let engine = Engine::in_memory(config)?;
    let owner = UserId::from("creator");
    let curve = engine.market.create_curve(owner.clone(), None).await?;
    let threshold = engine.config.graduation.threshold as u128;

    let mut buyer = 0u64;
    loop {
        let state = engine.market.curve(&curve.id).await?;
        if state.reserve >= threshold {
            break;
        }
        let user = UserId::new(format!("holder-{buyer:05}"));
        let cap = engine.tiers().dynamic_cap(state.holders)?;
        let shares = cap.min(engine.config.market.max_shares_per_trade);
        engine.market.buy(&curve.id, &user, shares, Some(owner.clone())).await?;
        buyer += 1;
    }

    let checkpoint = engine.graduation.freeze(&curve.id, &owner).await?;
    let spend = checkpoint
        .frozen_reserve
        .min(engine.config.graduation.max_launch_spend as u128);
    engine
        .graduation
        .launch(
            &curve.id,
            LaunchParams {
                reserve_to_spend: spend,
                acquired_quantity: acquired,
                project_wallet: "project-treasury".to_string(),
            },
        )
        .await?;

    let (_, record) = engine.graduation.graduation_records(&curve.id).await?;
    record.context("launch record missing after launch")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_logging(config: &EngineConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("keystone_engine={0},keystone={0}", config.logging.level).into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

use anyhow::{Context, Result};
use chainpulse::{
    config::{load_config_from_path, CONFIG_FILE_PATH},
    display,
    logger::{self, LogTag},
    UpstreamService,
};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::time::Duration;

/// Resilient multi-endpoint RPC access with health checks and response caching
#[derive(Parser, Debug)]
#[command(name = "chainpulse", version, about)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, default_value = CONFIG_FILE_PATH)]
    config: String,

    /// Enable debug output for every log tag
    #[arg(long, global = true)]
    debug: bool,

    #[arg(long = "debug-rpc", global = true)]
    debug_rpc: bool,

    #[arg(long = "debug-health", global = true)]
    debug_health: bool,

    #[arg(long = "debug-cache", global = true)]
    debug_cache: bool,

    /// Only print warnings and errors
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Probe every configured endpoint once and print its health
    Status {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Perform one JSON-RPC call with failover
    Call {
        /// JSON-RPC method, e.g. getSlot
        method: String,

        /// Params as a JSON array
        #[arg(long)]
        params: Option<String>,

        /// Skip the rpc-calls cache
        #[arg(long)]
        no_cache: bool,
    },

    /// Run background health checks and print status until Ctrl-C
    Watch {
        /// Seconds between status prints
        #[arg(long, default_value_t = 30)]
        every: u64,
    },
}

#[tokio::main]
async fn main() {
    logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        logger::error(LogTag::System, &format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    print_debug_info(&cli);

    let config = load_config_from_path(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config))?;
    let service = UpstreamService::new(config).context("Failed to build upstream service")?;

    match cli.command {
        Command::Status { json } => status(&service, json).await,
        Command::Call {
            method,
            params,
            no_cache,
        } => call(&service, &method, params.as_deref(), no_cache).await,
        Command::Watch { every } => watch(&service, every).await,
    }
}

fn print_debug_info(cli: &Cli) {
    let mut enabled = Vec::new();
    if cli.debug {
        enabled.push("all");
    }
    if cli.debug_rpc {
        enabled.push("rpc");
    }
    if cli.debug_health {
        enabled.push("health");
    }
    if cli.debug_cache {
        enabled.push("cache");
    }

    if !enabled.is_empty() && !cli.quiet {
        logger::info(
            LogTag::System,
            &format!("🐛 Debug output enabled: {}", enabled.join(", ")),
        );
    }
}

async fn status(service: &UpstreamService, json: bool) -> Result<()> {
    let outcomes = service.check_now().await;
    let failed = outcomes.iter().filter(|o| !o.is_success()).count();

    if json {
        let report = serde_json::to_string_pretty(&service.status_report())
            .context("Failed to serialize status")?;
        println!("{}", report);
    } else {
        println!("{}", display::endpoint_table(&service.get_status()));
        for outcome in outcomes.iter().filter(|o| !o.is_success()) {
            if let Some(e) = &outcome.error {
                println!("  ⚠️  {}", e);
            }
        }
    }

    if failed == outcomes.len() {
        anyhow::bail!("No endpoint answered the health probe");
    }
    Ok(())
}

async fn call(
    service: &UpstreamService,
    method: &str,
    params: Option<&str>,
    no_cache: bool,
) -> Result<()> {
    let params: Value = match params {
        Some(raw) => serde_json::from_str(raw).context("--params must be valid JSON")?,
        None => Value::Null,
    };

    let result = if no_cache {
        service.rpc_call(method, params).await
    } else {
        service.cached_rpc_call(method, params).await
    }
    .with_context(|| format!("{} failed", method))?;

    println!(
        "{}",
        serde_json::to_string_pretty(&result).context("Failed to format result")?
    );
    Ok(())
}

async fn watch(service: &UpstreamService, every: u64) -> Result<()> {
    service.start();
    logger::info(LogTag::System, "👀 Watching endpoints, press Ctrl-C to stop");

    let mut timer = tokio::time::interval(Duration::from_secs(every.max(1)));
    // Let the immediate first health cycle land before the first print
    tokio::time::sleep(Duration::from_millis(500)).await;

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                logger::info(LogTag::System, "Shutdown requested");
                break;
            }
            _ = timer.tick() => {
                println!("{}", display::endpoint_table(&service.get_status()));
                println!("{}", display::cache_table(&service.status_report().cache));
            }
        }
    }

    service.shutdown().await;
    Ok(())
}

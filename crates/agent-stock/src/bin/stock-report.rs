//! Stock report command-line entry point
//!
//! Runs one analysis for the configured symbol list and exits.
//!
//! # Usage
//!
//! ```bash
//! # Configure through .env or the environment
//! export STOCK_LIST="NVDA.US,AAPL.US"
//! export OLLAMA_MODEL="deepseek-r1:8b"
//!
//! cargo run --bin stock-report -p agent-stock
//! cargo run --bin stock-report -p agent-stock -- --symbols TSLA.US --json
//! ```

use agent_stock::config::parse_symbol_list;
use agent_stock::{AppConfig, ControllerSession, ExecutionRecord, StockAnalysisController};
use anyhow::Context;
use clap::Parser;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "stock-report")]
#[command(about = "Fetch market data, analyse it and write a Markdown report", long_about = None)]
struct Args {
    /// Comma-separated symbols, overriding STOCK_LIST
    #[arg(short, long)]
    symbols: Option<String>,

    /// Print the execution record as JSON
    #[arg(long)]
    json: bool,

    /// Read configuration from this file instead of ./.env
    #[arg(long, value_name = "PATH")]
    env_file: Option<PathBuf>,
}

fn load_config(args: &Args) -> anyhow::Result<AppConfig> {
    match &args.env_file {
        Some(path) => {
            let vars: HashMap<String, String> = agent_utils::env::read_dotenv_file(path)
                .with_context(|| format!("Failed to read {}", path.display()))?
                .into_iter()
                .collect();
            // Entries from an explicit file take precedence over the process environment
            Ok(AppConfig::from_lookup(|key| {
                vars.get(key).cloned().or_else(|| std::env::var(key).ok())
            })?)
        }
        None => Ok(AppConfig::from_env()?),
    }
}

fn print_record(record: &ExecutionRecord, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(record)?);
        return Ok(());
    }

    println!();
    println!("Execution {} ({})", record.execution_id, record.status());
    println!("  Symbols:  {}", record.symbols.join(", "));
    println!(
        "  Duration: {:.1}s",
        record.duration().num_milliseconds() as f64 / 1000.0
    );
    match (record.report_path(), record.error()) {
        (Some(path), _) => println!("  Report:   {}", path.display()),
        (None, Some(error)) => println!("  Error:    {error}"),
        (None, None) => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let dotenv = if args.env_file.is_none() {
        agent_utils::load_dotenv()
    } else {
        None
    };
    agent_utils::init_tracing();

    match &dotenv {
        Some(path) => info!("Loaded configuration from {}", path.display()),
        None if args.env_file.is_none() => {
            warn!("No .env file found; using environment variables and defaults");
        }
        None => {}
    }

    let config = Arc::new(load_config(&args)?);
    info!(
        "Provider: {}, backend: {} ({})",
        config.provider.label(),
        config.llm_backend.label(),
        config.llm_model
    );

    let symbols = match &args.symbols {
        Some(list) => parse_symbol_list(list),
        None => config.symbols.clone(),
    };

    let mut controller = StockAnalysisController::new(config);
    let mut session = match ControllerSession::acquire(&mut controller).await {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Startup failed: {e}");
            return Ok(ExitCode::FAILURE);
        }
    };

    let record = tokio::select! {
        result = session.execute_analysis(&symbols) => result,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("Interrupted");
            return Ok(ExitCode::FAILURE);
        }
    };

    match record {
        Ok(record) => {
            print_record(&record, args.json)?;
            if record.is_success() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
        Err(e) => {
            eprintln!("{e}");
            Ok(ExitCode::FAILURE)
        }
    }
}

//! PriceKeeper CLI: load price files into the store and inspect it.
//!
//! Commands:
//! - `update`: apply a Yahoo-style CSV to a symbol's stored history
//! - `price`: print stored rows for a symbol, optionally within a date range
//! - `info`: print a symbol's catalog row
//! - `catalog`: list every catalogued symbol

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use pricekeeper_core::import::read_series_csv;
use pricekeeper_core::store::ParquetStore;
use pricekeeper_core::{DateKey, KeeperConfig, MasterRecord, PriceKeeper, SkipPolicy, UpdateOutcome};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "pricekeeper",
    about = "PriceKeeper CLI: incremental daily price store"
)]
struct Cli {
    #[command(flatten)]
    store: StoreArgs,

    /// Log level used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct StoreArgs {
    /// Path to a TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Store directory. Overrides the config file.
    #[arg(long, global = true)]
    store_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a daily price CSV to a symbol.
    Update {
        /// Symbol to update (e.g., SPY).
        symbol: String,

        /// CSV file with Date,Open,High,Low,Close,Adj Close,Volume columns.
        csv: PathBuf,

        /// Run even if the symbol was already updated today.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Print stored rows for a symbol.
    Price {
        symbol: String,

        /// Start date (YYYY-MM-DD), inclusive.
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD), inclusive.
        #[arg(long)]
        end: Option<String>,

        /// Print JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print a symbol's catalog row.
    Info { symbol: String },
    /// List every catalogued symbol.
    Catalog,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_json);

    let config = load_config(&cli.store)?;
    let mut keeper = PriceKeeper::open(&config)
        .with_context(|| format!("failed to open store at {}", config.store_dir.display()))?;

    match cli.command {
        Commands::Update { symbol, csv, force } => run_update(&mut keeper, &symbol, csv, force),
        Commands::Price {
            symbol,
            start,
            end,
            json,
        } => run_price(&mut keeper, &symbol, start, end, json),
        Commands::Info { symbol } => run_info(&mut keeper, &symbol),
        Commands::Catalog => run_catalog(&mut keeper),
    }
}

fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

fn load_config(args: &StoreArgs) -> Result<KeeperConfig> {
    let mut config = match &args.config {
        Some(path) => KeeperConfig::load(path)?,
        None => KeeperConfig::default(),
    };
    if let Some(dir) = &args.store_dir {
        config = config.with_store_dir(dir);
    }
    Ok(config)
}

fn parse_date(s: Option<&str>) -> Result<Option<DateKey>> {
    s.map(|s| {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(DateKey::from_date)
            .with_context(|| format!("invalid date '{s}', expected YYYY-MM-DD"))
    })
    .transpose()
}

fn run_update(
    keeper: &mut PriceKeeper<ParquetStore>,
    symbol: &str,
    csv: PathBuf,
    force: bool,
) -> Result<()> {
    let report = read_series_csv(&csv)?;
    if report.skipped > 0 {
        info!(symbol, skipped = report.skipped, "dropped CSV lines with missing values");
    }

    let policy = if force {
        SkipPolicy::Force
    } else {
        SkipPolicy::SkipIfUpdatedToday
    };
    let outcome = keeper.update(symbol, &report.series, policy)?;

    match &outcome {
        UpdateOutcome::Skipped { .. } => {
            println!("{symbol}: already updated today (use --force to rerun)");
        }
        UpdateOutcome::Applied(applied) => {
            if applied.created {
                println!("{symbol}: registered new symbol");
            }
            if let Some(resync) = &applied.resync {
                println!(
                    "{symbol}: history recalculated by provider, resynced \
                     ({} trimmed, {} removed, {} overwritten)",
                    resync.trimmed.len(),
                    resync.removed.len(),
                    resync.overwritten
                );
            }
            println!("{symbol}: appended {} row(s)", applied.appended);
        }
    }
    print_record(symbol, outcome.record());
    Ok(())
}

fn run_price(
    keeper: &mut PriceKeeper<ParquetStore>,
    symbol: &str,
    start: Option<String>,
    end: Option<String>,
    json: bool,
) -> Result<()> {
    let start = parse_date(start.as_deref())?;
    let end = parse_date(end.as_deref())?;
    if let (Some(s), Some(e)) = (start, end) {
        if s > e {
            bail!("--start {s} is after --end {e}");
        }
    }

    let rows = keeper.query_price(symbol, start, end)?;

    if json {
        let out: Vec<serde_json::Value> = rows
            .iter()
            .map(|(date, row)| {
                serde_json::json!({
                    "date": date.to_string(),
                    "open": row.open,
                    "high": row.high,
                    "low": row.low,
                    "close": row.close,
                    "adj_close": row.adj_close,
                    "volume": row.volume,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("{symbol}: no rows in range");
        return Ok(());
    }
    println!(
        "{:<12} {:>10} {:>10} {:>10} {:>10} {:>10} {:>12}",
        "Date", "Open", "High", "Low", "Close", "Adj Close", "Volume"
    );
    println!("{}", "-".repeat(80));
    for (date, row) in &rows {
        println!(
            "{:<12} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>10.4} {:>12}",
            date.to_string(),
            row.open,
            row.high,
            row.low,
            row.close,
            row.adj_close,
            row.volume
        );
    }
    Ok(())
}

fn run_info(keeper: &mut PriceKeeper<ParquetStore>, symbol: &str) -> Result<()> {
    let record = keeper.query_master_info(symbol)?;
    print_record(symbol, &record);
    Ok(())
}

fn run_catalog(keeper: &mut PriceKeeper<ParquetStore>) -> Result<()> {
    let catalog = keeper.query_full_catalog()?;
    if catalog.is_empty() {
        println!("Catalog is empty");
        return Ok(());
    }

    println!(
        "{:<10} {:<12} {:<25} {:>8}",
        "Symbol", "Updated", "Date Range", "Rows"
    );
    println!("{}", "-".repeat(58));
    for (symbol, record) in &catalog {
        println!(
            "{:<10} {:<12} {:<25} {:>8}",
            symbol,
            record.last_update.to_string(),
            format_coverage(record),
            record.data_points
        );
    }
    Ok(())
}

fn print_record(symbol: &str, record: &MasterRecord) {
    println!();
    println!("=== {symbol} ===");
    println!("Last update:  {}", record.last_update);
    println!("Coverage:     {}", format_coverage(record));
    println!("Data points:  {}", record.data_points);
}

fn format_coverage(record: &MasterRecord) -> String {
    match record.coverage() {
        Some((first, last)) => format!("{first} to {last}"),
        None => "(empty)".into(),
    }
}

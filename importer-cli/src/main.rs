use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use colored::*;
use log::info;

use importer_cli::config::AppConfig;
use importer_cli::excel::write_import_workbook;
use importer_cli::generator::{DataGenerator, GeneratorConfig};
use importer_cli::import::{ImportSummary, Importer};
use importer_cli::store;

/// Bulk import of customers, accounts and their links
#[derive(Parser, Debug)]
#[command(name = "importer", version, about)]
struct Cli {
    /// Workbook to import, or to write with --generate
    #[arg(short, long, default_value = "test_data.xlsx")]
    file: PathBuf,

    /// Generate a test workbook instead of importing
    #[arg(long)]
    generate: bool,

    /// Number of customers (and accounts) to generate
    #[arg(long, default_value_t = 100_000)]
    rows: usize,

    /// RNG seed for --generate (defaults to the current time)
    #[arg(long)]
    seed: Option<u64>,

    /// Probability of a second account per generated customer
    #[arg(long, default_value_t = 0.3)]
    multi_account_chance: f32,

    /// Probability of a third account when a second was added
    #[arg(long, default_value_t = 0.1)]
    third_account_chance: f32,

    /// Import through the HTTP API regardless of USE_API
    #[arg(long)]
    use_api: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if cli.generate {
        generate(&cli)
    } else {
        import(&cli).await
    }
}

fn generate(cli: &Cli) -> Result<()> {
    let seed = cli
        .seed
        .unwrap_or_else(|| Utc::now().timestamp_micros() as u64);
    info!("Generating {} customers (seed {})", cli.rows, seed);

    let mut generator = DataGenerator::new(
        GeneratorConfig {
            num_customers: cli.rows,
            multi_account_chance: cli.multi_account_chance,
            third_account_chance: cli.third_account_chance,
            ..GeneratorConfig::default()
        },
        seed,
    );
    let data = generator.generate();

    info!("Writing workbook {}", cli.file.display());
    write_import_workbook(&data, &cli.file)?;

    let summary = generator.summary();
    println!("{}", "Test data generated".bright_green().bold());
    println!("  File:      {}", cli.file.display().to_string().cyan());
    println!("  Customers: {}", summary.customer_count);
    println!("  Accounts:  {}", summary.account_count);
    println!("  Links:     {}", summary.link_count);

    Ok(())
}

async fn import(cli: &Cli) -> Result<()> {
    let mut config = AppConfig::load().context("Invalid configuration")?;
    if cli.use_api {
        config.api.use_api = true;
        config.validate().context("Invalid configuration")?;
    }

    if !cli.file.exists() {
        anyhow::bail!("Import file does not exist: {}", cli.file.display());
    }

    let mut backend = store::open(&config).await?;
    info!("Importing {} via {}", cli.file.display(), backend.name());

    let result = Importer::new(backend.as_ref())
        .import_file(&cli.file)
        .await;
    backend.close().await?;

    print_summary(&result?);
    Ok(())
}

fn print_summary(summary: &ImportSummary) {
    println!("{}", "Import completed".bright_green().bold());
    println!(
        "  Started:   {}",
        summary.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("  Duration:  {:.2?}", summary.duration);
    println!(
        "  Customers: {} read, {} upserted",
        summary.customers_read, summary.customers_upserted
    );
    println!(
        "  Accounts:  {} read, {} upserted",
        summary.accounts_read, summary.accounts_upserted
    );
    let skipped = if summary.links_skipped > 0 {
        summary.links_skipped.to_string().yellow()
    } else {
        summary.links_skipped.to_string().normal()
    };
    println!(
        "  Links:     {} read, {} inserted, {} skipped",
        summary.links_read, summary.links_inserted, skipped
    );
}

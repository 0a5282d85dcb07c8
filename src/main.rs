use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use estate_etl::config::AppConfig;
use estate_etl::logging;
use estate_etl::observability::metrics;
use estate_etl::pipeline::categorize::Categorizer;
use estate_etl::pipeline::source::CsvRecordSource;
use estate_etl::pipeline::{PipelineRunner, RunParams, RunReport};
use estate_etl::sink::{InMemorySink, PostgresSink, SinkWriter};
use estate_etl::types::WriteMode;

#[derive(Parser)]
#[command(name = "estate_etl")]
#[command(about = "Real estate sales batch ETL: CSV in, PostgreSQL out")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline: read, clean, transform, load
    Run {
        /// Path to the TOML config file
        #[arg(long, default_value = "etl.toml")]
        config: String,
        /// Input CSV path, overriding the config file
        #[arg(long)]
        input: Option<String>,
        /// Write mode (overwrite or append), overriding the config file
        #[arg(long)]
        mode: Option<WriteMode>,
        /// Run every stage but skip the sink
        #[arg(long)]
        dry_run: bool,
        /// Print the run report as JSON instead of the summary
        #[arg(long)]
        json: bool,
    },
    /// Check that the source file exists and its header matches the schema
    Validate {
        /// Path to the TOML config file
        #[arg(long, default_value = "etl.toml")]
        config: String,
        /// Input CSV path, overriding the config file
        #[arg(long)]
        input: Option<String>,
    },
}

fn load_config(path: &str, input: Option<String>) -> anyhow::Result<AppConfig> {
    let mut config = AppConfig::load(path)?;
    if let Some(input) = input {
        config.source.path = input;
    }
    Ok(config)
}

fn print_summary(report: &RunReport) {
    println!("\n📊 Pipeline run {}:", report.run_id);
    println!("   Rows read: {}", report.rows_read);
    println!(
        "   Dropped: {} ({} missing required fields, {} out of range)",
        report.rows_dropped_missing + report.rows_dropped_out_of_range,
        report.rows_dropped_missing,
        report.rows_dropped_out_of_range
    );
    println!("   Clean rows: {}", report.rows_clean);
    if report.dates_unparseable > 0 {
        println!("   ⚠️  Unparseable dates (kept as null): {}", report.dates_unparseable);
    }
    println!("   Aggregate groups: {}", report.aggregate_groups);
    if report.dry_run {
        println!("   Dry run: nothing written");
    } else {
        println!(
            "   Rows written: {} → {} and {} ({})",
            report.rows_written, report.sale_table, report.aggregate_table, report.write_mode
        );
    }
    println!("   Duration: {}ms", report.duration_ms);
}

async fn run(
    config: String,
    input: Option<String>,
    mode: Option<WriteMode>,
    dry_run: bool,
    json: bool,
) -> anyhow::Result<()> {
    let config = load_config(&config, input)?;

    let mut params = RunParams::from_config(&config);
    if let Some(mode) = mode {
        params.write_mode = mode;
    }
    params.dry_run = dry_run;

    // A dry run never needs a database; validate the load path in memory.
    let sink: Arc<dyn SinkWriter> = if dry_run {
        Arc::new(InMemorySink::new())
    } else {
        Arc::new(PostgresSink::new(config.sink.clone()))
    };

    let categorizer = Categorizer::new(config.pipeline.category_rules.clone());
    let runner = PipelineRunner::new(categorizer, sink);

    println!("🔄 Running ETL pipeline on {}...", params.input_path);
    let report = runner.run(&params).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
        println!("✅ Data has been pushed successfully");
    }

    if let Some(snapshot) = metrics::snapshot() {
        info!(run_id = %report.run_id, "Metrics snapshot:\n{}", snapshot);
    }
    Ok(())
}

fn validate(config: String, input: Option<String>) -> anyhow::Result<()> {
    let config = load_config(&config, input)?;

    println!("🔍 Validating source {}...", config.source.path);
    CsvRecordSource::new().probe(&config.source.path)?;
    println!("✅ Source file is readable and its header matches the declared schema");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();
    if let Err(e) = metrics::init() {
        warn!("Metrics init failed, continuing without metrics: {}", e);
    }

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run { config, input, mode, dry_run, json } => {
            run(config, input, mode, dry_run, json).await
        }
        Commands::Validate { config, input } => validate(config, input),
    };

    if let Err(e) = &result {
        println!("❌ {}", e);
    }
    result
}

//! ScoreLab CLI: scoring, sector ranking and layered loading commands.
//!
//! Commands:
//! - `run`: score, aggregate, promote and load the warehouse in one go
//! - `score`: score the raw indicator table
//! - `aggregate`: build the sector ranking from raw scores
//! - `promote`: promote raw tables into the trusted layer
//! - `warehouse`: load every trusted table into the SQLite warehouse
//! - `status`: list tables per layer with row counts
//! - `export`: write trusted tables as CSV

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use scorelab_core::table::sectors_from_frame;
use scorelab_runner::{
    export_tables, LayerStore, Pipeline, PipelineConfig, PipelineReport, TableStatus, Warehouse,
};

const DEFAULT_CONFIG: &str = "scorelab.toml";

#[derive(Parser)]
#[command(
    name = "scorelab",
    about = "ScoreLab CLI: asset quality scoring and layered data loading"
)]
struct Cli {
    /// Path to a TOML config file. Defaults to ./scorelab.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the current partition (year) for incremental tables.
    #[arg(long, global = true)]
    partition: Option<i32>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every step: score, aggregate, promote, warehouse.
    Run,
    /// Score the raw indicator table and write `scores` and `valuation` to raw.
    Score,
    /// Aggregate raw scores into the sector ranking.
    Aggregate {
        /// Number of ranking rows to print.
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Promote raw tables into the trusted layer.
    Promote,
    /// Load every trusted table into the warehouse.
    Warehouse,
    /// List tables per layer with row counts and the last run result.
    Status,
    /// Export trusted tables as CSV.
    Export {
        /// Output directory.
        #[arg(long, default_value = "exports")]
        out_dir: PathBuf,

        /// Tables to export. Defaults to the sector ranking and the score table.
        #[arg(long)]
        tables: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    let mut config = load_config(cli.config.as_deref())?;
    if cli.partition.is_some() {
        config.current_partition = cli.partition;
    }
    let pipeline = Pipeline::new(config);

    match cli.command {
        Commands::Run => run_all(&pipeline),
        Commands::Score => {
            let assets = pipeline.score_assets()?;
            println!("Scored {assets} assets");
            Ok(())
        }
        Commands::Aggregate { top } => run_aggregate(&pipeline, top),
        Commands::Promote => run_report_step(&pipeline, |p, r| p.promote_tables(r)),
        Commands::Warehouse => run_report_step(&pipeline, |p, r| p.load_warehouse(r)),
        Commands::Status => run_status(&pipeline),
        Commands::Export { out_dir, tables } => run_export(&pipeline, &out_dir, tables),
    }
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("scorelab=info"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None if Path::new(DEFAULT_CONFIG).is_file() => {
            PipelineConfig::from_file(Path::new(DEFAULT_CONFIG))
                .with_context(|| format!("failed to load config {DEFAULT_CONFIG}"))
        }
        None => Ok(PipelineConfig::default()),
    }
}

fn run_all(pipeline: &Pipeline) -> Result<()> {
    let report = pipeline.run();
    finish(pipeline, &report)
}

fn run_report_step(
    pipeline: &Pipeline,
    step: impl FnOnce(&Pipeline, &mut PipelineReport) -> Result<usize, scorelab_runner::PipelineError>,
) -> Result<()> {
    let mut report = pipeline.new_report();
    let rows = step(pipeline, &mut report)?;
    for line in report.summary_lines() {
        println!("{line}");
    }
    println!("Total rows: {rows}");
    if !report.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn finish(pipeline: &Pipeline, report: &PipelineReport) -> Result<()> {
    for line in report.summary_lines() {
        println!("{line}");
    }
    let path = pipeline.save_report(report)?;
    println!("Report saved to: {}", path.display());
    if !report.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn run_aggregate(pipeline: &Pipeline, top: usize) -> Result<()> {
    let subsectors = pipeline.aggregate_sectors()?;
    let table = &pipeline.config().tables.sector_scores;
    let ranking = sectors_from_frame(&pipeline.raw().read(table)?)?;

    println!("Aggregated {subsectors} sub-sectors");
    println!();
    println!(
        "{:<28} {:<32} {:>8} {:>8} {:>7}",
        "Sector", "Sub-sector", "Final", "Sector", "Members"
    );
    println!("{}", "-".repeat(87));
    for r in ranking.iter().take(top) {
        println!(
            "{:<28} {:<32} {:>8.1} {:>8.1} {:>7}",
            r.sector, r.subsector, r.pontuacao_final, r.pontuacao_setor, r.members
        );
    }
    Ok(())
}

fn run_status(pipeline: &Pipeline) -> Result<()> {
    print_layer("Raw", pipeline.raw().root(), &pipeline.raw().status()?);
    print_layer("Trusted", pipeline.trusted().root(), &pipeline.trusted().status()?);

    let warehouse_path = &pipeline.config().layers.warehouse;
    println!();
    if warehouse_path.is_file() {
        let warehouse = Warehouse::open(warehouse_path)?;
        println!("Warehouse: {}", warehouse_path.display());
        for table in warehouse.table_names()? {
            println!("  {:<28} {:>8} rows", table, warehouse.row_count(&table)?);
        }
    } else {
        println!("Warehouse does not exist: {}", warehouse_path.display());
    }

    let report_path = pipeline.report_path();
    if let Ok(report) = PipelineReport::load(&report_path) {
        println!();
        println!("Last run ({}):", report_path.display());
        for line in report.summary_lines() {
            println!("{line}");
        }
    }
    Ok(())
}

fn print_layer(name: &str, root: &Path, tables: &[TableStatus]) {
    println!();
    if tables.is_empty() {
        println!("{name} layer is empty: {}", root.display());
        return;
    }
    println!("{name} layer: {}", root.display());
    println!(
        "  {:<28} {:>8} {:<24} {:<20}",
        "Table", "Rows", "Strategy", "Promoted"
    );
    for t in tables {
        let rows = t.rows.map_or("?".to_string(), |r| r.to_string());
        let (strategy, promoted) = t.meta.as_ref().map_or(("-".to_string(), "-".to_string()), |m| {
            (m.strategy.to_string(), m.promoted_at.to_string())
        });
        println!("  {:<28} {:>8} {:<24} {:<20}", t.table, rows, strategy, promoted);
    }
}

fn run_export(pipeline: &Pipeline, out_dir: &Path, tables: Vec<String>) -> Result<()> {
    let names = &pipeline.config().tables;
    let tables = if tables.is_empty() {
        vec![names.sector_scores.clone(), names.scores.clone()]
    } else {
        tables
    };
    let refs: Vec<&str> = tables.iter().map(String::as_str).collect();

    let store: &LayerStore = pipeline.trusted();
    let (written, missing) = export_tables(store, &refs, out_dir)?;
    for path in &written {
        println!("Exported {}", path.display());
    }
    for table in &missing {
        eprintln!("Table not found in trusted layer: {table}");
    }
    if written.is_empty() {
        anyhow::bail!("nothing exported");
    }
    Ok(())
}

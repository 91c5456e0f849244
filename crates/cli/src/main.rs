use clap::{Parser, Subcommand};
use lab_core::config::page_limit_from_env_value;
use lab_core::constants::DEFAULT_DATABASE_PATH;
use lab_core::{
    Actor, CoreConfig, ImportRecord, ListQuery, MasterSeed, ReportEngine, SearchType, SqliteStore,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "lab")]
#[command(about = "Lab report engine CLI")]
struct Cli {
    /// SQLite database file (defaults to LAB_DATABASE_PATH, then lab_data/reports.db)
    #[arg(long, global = true)]
    database: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load master data from a YAML file
    Seed {
        /// Path to the YAML seed file
        file: PathBuf,
    },
    /// Import reports from another system (JSON array)
    Import {
        /// Path to the JSON file
        file: PathBuf,
        /// Actor recorded for records without a `createdBy`
        #[arg(long, default_value = "import")]
        actor: String,
    },
    /// Re-run reference resolution over reports with unresolved fields
    RepairLinks {
        /// Maximum reports to process (default 100, max 1000)
        #[arg(long)]
        limit: Option<u32>,
    },
    /// List reports, grouped by receipt
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        limit: Option<u32>,
        /// Exact receipt number
        #[arg(long)]
        receipt: Option<String>,
        /// Patient name search
        #[arg(long)]
        q: Option<String>,
    },
    /// Count stored report rows
    Count,
}

fn open_engine(database: Option<PathBuf>) -> anyhow::Result<ReportEngine<SqliteStore>> {
    let database_path = database
        .or_else(|| std::env::var("LAB_DATABASE_PATH").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH));
    let page_limit = page_limit_from_env_value(std::env::var("LAB_DEFAULT_PAGE_LIMIT").ok())?;

    let cfg = Arc::new(CoreConfig::new(database_path, page_limit)?);
    let store = Arc::new(SqliteStore::open(cfg.database_path())?);
    Ok(ReportEngine::new(store, cfg))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("lab_core=warn".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Seed { file }) => {
            let engine = open_engine(cli.database)?;
            let text = std::fs::read_to_string(&file)?;
            let seed = MasterSeed::from_yaml(&text)?;
            let summary = engine.store().seed(&seed)?;
            println!(
                "Seeded {} test definitions, {} service entries, {} rooms, {} invoices, {} registrations",
                summary.test_definitions,
                summary.service_entries,
                summary.rooms,
                summary.invoices,
                summary.registrations
            );
        }
        Some(Commands::Import { file, actor }) => {
            let engine = open_engine(cli.database)?;
            let text = std::fs::read_to_string(&file)?;
            let records: Vec<ImportRecord> = serde_json::from_str(&text)?;
            let actor = Actor::new(actor);

            let mut imported = 0usize;
            for (index, record) in records.into_iter().enumerate() {
                match engine.import(record, &actor) {
                    Ok(report) => {
                        imported += 1;
                        println!("Imported {} (receipt {:?})", report.report_id, report.receipt_no);
                    }
                    Err(e) => eprintln!("Error importing record {}: {}", index, e),
                }
            }
            println!("Imported {} report(s)", imported);
        }
        Some(Commands::RepairLinks { limit }) => {
            let engine = open_engine(cli.database)?;
            let summary = engine.repair_links(limit)?;
            println!(
                "Processed: {}, updated: {}, errors: {}",
                summary.processed, summary.updated, summary.errors_count
            );
        }
        Some(Commands::List {
            page,
            limit,
            receipt,
            q,
        }) => {
            let engine = open_engine(cli.database)?;
            let listing = engine.list(&ListQuery {
                page,
                limit,
                receipt_no: receipt,
                q,
                search_type: SearchType::Name,
                ..Default::default()
            })?;

            if listing.data.is_empty() {
                println!("No reports found.");
            } else {
                for item in &listing.data {
                    let report = &item.report;
                    println!(
                        "{}  receipt: {}  patient: {}  type: {}  tests: {}  collected: {}",
                        report.report_id,
                        report.receipt_no.as_deref().unwrap_or("-"),
                        report.patient.name,
                        report.patient_type,
                        report.test_results.len(),
                        item.collected_at.format("%Y-%m-%d %H:%M")
                    );
                }
            }
            println!(
                "Page {} of {} ({} reports)",
                listing.pagination.current_page,
                listing.pagination.total_pages,
                listing.pagination.total_reports
            );
        }
        Some(Commands::Count) => {
            let engine = open_engine(cli.database)?;
            println!("{}", engine.count_total()?);
        }
        None => {
            println!("No command given. Use --help for usage.");
        }
    }

    Ok(())
}

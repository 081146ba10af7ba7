use crate::infra::{open_collections, system_clock, Collections};
use blue_admin::config::AppConfig;
use blue_admin::email::derive_email;
use blue_admin::error::AppError;
use blue_admin::records::{
    export_csv, EntityConfig, Reconciler, Reconciliation, RequestStatistics,
};
use blue_admin::storage::{seed_demo_data, REQUESTS};
use clap::Args;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::Value;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Args, Debug)]
pub(crate) struct EmailArgs {
    /// Full names to derive addresses for
    #[arg(required = true)]
    pub(crate) names: Vec<String>,
}

#[derive(Args, Debug)]
pub(crate) struct ReconcileArgs {
    /// JSON file holding an array of request records
    #[arg(long)]
    pub(crate) input: PathBuf,
    /// Where to write the reconciled records (defaults to stdout)
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
    /// Seed for generated identifiers and subjects
    #[arg(long)]
    pub(crate) seed: Option<u64>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct SeedArgs {
    /// Overwrite collections that already hold data
    #[arg(long)]
    pub(crate) force: bool,
    /// Seed for the generated demo data
    #[arg(long)]
    pub(crate) seed: Option<u64>,
}

#[derive(Args, Debug)]
pub(crate) struct ExportArgs {
    /// Destination CSV file
    #[arg(long)]
    pub(crate) output: PathBuf,
}

pub(crate) fn run_email(args: EmailArgs) -> Result<(), AppError> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for name in &args.names {
        writeln!(out, "{name}\t{}", derive_email(name))?;
    }
    Ok(())
}

pub(crate) fn run_reconcile(args: ReconcileArgs) -> Result<(), AppError> {
    let raw = fs::read_to_string(&args.input)?;
    let records: Vec<Value> = serde_json::from_str(&raw)?;

    let reconciler = match args.seed {
        Some(seed) => Reconciler::seeded(seed, system_clock()),
        None => Reconciler::from_entropy(),
    };
    let Reconciliation { records, report } = reconciler.reconcile(&records);

    let body = serde_json::to_string_pretty(&records)?;
    match &args.output {
        Some(path) => fs::write(path, body)?,
        None => println!("{body}"),
    }
    eprintln!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

pub(crate) fn run_seed(config: &AppConfig, args: SeedArgs) -> Result<(), AppError> {
    let collections = open_collections(&config.storage)?;
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let report = seed_demo_data(&collections, &mut rng, system_clock().as_ref(), args.force)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

pub(crate) fn run_stats(config: &AppConfig) -> Result<(), AppError> {
    let collections = open_collections(&config.storage)?;
    let stats = RequestStatistics::from_records(&collections.read_all(REQUESTS)?);
    println!("Total requests:        {}", stats.total);
    println!("Open / in progress:    {}", stats.open);
    println!("Closed:                {}", stats.closed);
    println!("Average response time: {}", stats.average_response_label());
    Ok(())
}

pub(crate) fn run_export(config: &AppConfig, args: ExportArgs) -> Result<(), AppError> {
    let collections = open_collections(&config.storage)?;
    let rows = export_requests(&collections, &args.output)?;
    info!(rows, path = %args.output.display(), "requests exported");
    println!("Exported {rows} requests to {}", args.output.display());
    Ok(())
}

fn export_requests(collections: &Collections, path: &Path) -> Result<usize, AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let requests = collections.read_all(REQUESTS)?;
    let writer = BufWriter::new(fs::File::create(path)?);
    Ok(export_csv(&requests, &EntityConfig::requests(), writer)?)
}

/// Seeds empty collections at startup when the configuration asks for it.
pub(crate) fn seed_on_startup(config: &AppConfig, collections: &Collections) -> Result<(), AppError> {
    if !config.storage.seed_demo_data {
        return Ok(());
    }
    let clock = system_clock();
    let report = seed_demo_data(collections, &mut StdRng::from_entropy(), clock.as_ref(), false)?;
    if report.requests_seeded + report.users_seeded > 0 {
        info!(?report, "seeded demo data on startup");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use blue_admin::records::FixedClock;
    use blue_admin::storage::{CollectionStore, KeyValueStore, MemoryStore};
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    #[test]
    fn reconcile_command_writes_fixed_records() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("requests.json");
        let output = dir.path().join("fixed.json");
        fs::write(&input, r#"[{"name":"רן בר"}]"#).expect("write input");

        run_reconcile(ReconcileArgs {
            input,
            output: Some(output.clone()),
            seed: Some(3),
        })
        .expect("reconcile");

        let fixed: Vec<Value> =
            serde_json::from_str(&fs::read_to_string(output).expect("read output")).expect("json");
        assert_eq!(fixed[0]["email"], "rn.br@gmail.com");
        assert_eq!(fixed[0]["attachments"], serde_json::json!([]));
    }

    #[test]
    fn export_writes_header_and_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out").join("requests.csv");
        let clock = FixedClock(Utc.with_ymd_and_hms(2025, 10, 1, 8, 0, 0).unwrap());
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let collections: Collections =
            CollectionStore::new(store, Arc::new(Reconciler::seeded(4, Arc::new(clock))));
        seed_demo_data(&collections, &mut StdRng::seed_from_u64(4), &clock, false)
            .expect("seed");

        let rows = export_requests(&collections, &path).expect("export");

        assert_eq!(rows, 15);
        let text = fs::read_to_string(path).expect("read csv");
        assert_eq!(text.lines().count(), 16);
    }
}

use crate::commands::{
    run_email, run_export, run_reconcile, run_seed, run_stats, EmailArgs, ExportArgs,
    ReconcileArgs, SeedArgs,
};
use crate::server;
use blue_admin::config::AppConfig;
use blue_admin::error::AppError;
use blue_admin::telemetry;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "Blue Admin",
    about = "Serve and maintain the student request desk from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Print the derived email address for each name
    Email(EmailArgs),
    /// Reconcile a JSON export of request records
    Reconcile(ReconcileArgs),
    /// Write demo requests and users into the configured storage
    Seed(SeedArgs),
    /// Summarise the stored requests
    Stats,
    /// Export the stored requests as CSV
    Export(ExportArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    match command {
        Command::Serve(args) => server::run(config, args).await,
        Command::Email(args) => run_email(args),
        Command::Reconcile(args) => run_reconcile(args),
        Command::Seed(args) => run_seed(&config, args),
        Command::Stats => run_stats(&config),
        Command::Export(args) => run_export(&config, args),
    }
}

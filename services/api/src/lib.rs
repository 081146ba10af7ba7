mod cli;
mod commands;
mod infra;
mod routes;
mod server;

use blue_admin::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}

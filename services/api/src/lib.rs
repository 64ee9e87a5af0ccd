mod cli;
mod infra;
mod report;
mod routes;
mod server;

use medicare_pa::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}

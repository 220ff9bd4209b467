use std::path::PathBuf;

use foodgram::{config::ImportConfig, import::import_data};
use sqlx::postgres::PgPoolOptions;

/// Loads seed data from `<dir>/<model>.csv` files. The directory comes from the first
/// argument or `IMPORT_DATA_DIR`.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ImportConfig::load()?;
    let data_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or(config.data_dir);

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&config.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    log::info!("Importing data from {}", data_dir.display());
    let summary = import_data(&data_dir, &pool).await?;
    let created: u64 = summary.iter().map(|count| count.created).sum();
    log::info!("Import finished, {created} rows created");

    Ok(())
}

use std::net::SocketAddr;

use foodgram::{
    config::Config,
    routes::{api, AppState},
};
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::load()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    log::info!("Database migrations applied");

    if let Err(e) = tokio::fs::create_dir_all(&config.media_root).await {
        log::warn!(
            "Could not create media root {}: {e}",
            config.media_root.display()
        );
    }

    let address = SocketAddr::from(([0, 0, 0, 0], config.port));
    let routes = api(AppState::new(pool, &config));

    log::info!("Listening on http://{address}");
    warp::serve(routes).run(address).await;

    Ok(())
}

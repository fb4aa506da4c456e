use std::net::SocketAddr;

use house_marketplace_backend::{config, platform::Platform, routes, seed};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let config = config::AppConfig::load()?;
    log::info!("Loaded config: {:?}", config);

    let platform = Platform::from_config(&config).await?;
    if let Some(path) = &config.seed_file {
        seed::load_listings(path, platform.listings.as_ref()).await?;
    }

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    log::info!("Starting server on {}", addr);

    let app = routes::router(routes::AppState { config, platform });
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app.into_make_service()).await?;

    Ok(())
}

use actix_web::{App, HttpServer};
use anyhow::Context;
use buyeragent_server::{build_cors, configure_routes, spawn_rate_limit_cleanup, AppState, Settings};
use dotenv::dotenv;
use std::net::TcpListener;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    // Load configuration
    let config = Settings::new().context("failed to load configuration")?;
    info!("Configuration loaded for {:?} environment", config.environment);

    info!("Starting server at {}:{}", config.server.host, config.server.port);

    let state = AppState::new(config.clone())
        .await
        .context("failed to initialize application state")?;

    let window = Duration::from_secs((config.rate_limit.window_minutes.max(1) * 60) as u64);
    spawn_rate_limit_cleanup(&state, window);

    let listener = TcpListener::bind(format!("{}:{}", config.server.host, config.server.port))
        .context("failed to bind listener")?;

    let workers = config.server.workers as usize;
    HttpServer::new(move || {
        App::new()
            .wrap(build_cors(&config))
            .configure(configure_routes(&state))
    })
    .listen(listener)?
    .workers(workers)
    .run()
    .await?;

    info!("Server stopped");
    Ok(())
}

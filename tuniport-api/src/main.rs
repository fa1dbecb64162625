use std::sync::Arc;
use std::net::SocketAddr;
use anyhow::Context;
use tuniport_api::{app, AppState};
use tuniport_core::ReservationRepository;
use tuniport_store::{app_config::Config, DbClient, InMemoryRepository, StoreReservationRepository};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tuniport_api=debug,tuniport_order=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Tuniport API on port {}", config.server.port);

    let (repo, pricing, rules) = match &config.database.url {
        Some(url) => {
            let db = DbClient::new(url, config.database.max_connections)
                .await
                .context("Failed to connect to Postgres")?;
            if config.database.run_migrations {
                db.migrate().await.context("Failed to run migrations")?;
            }
            let (pricing, rules) = db
                .fetch_business_rules(config.pricing.clone(), config.rules.clone())
                .await
                .context("Failed to load business rules")?;
            let repo: Arc<dyn ReservationRepository> =
                Arc::new(StoreReservationRepository::new(db.pool.clone()));
            (repo, pricing, rules)
        }
        None => {
            if config.seed.is_empty() {
                tracing::warn!(
                    "No database.url and no [seed] data configured: the in-memory repository starts empty (RUN_MODE=demo loads config/demo.toml)"
                );
            } else {
                tracing::info!(
                    "No database.url configured, serving {} flight(s) and {} account(s) from memory",
                    config.seed.flights.len(),
                    config.seed.accounts.len()
                );
            }
            let repo: Arc<dyn ReservationRepository> =
                Arc::new(InMemoryRepository::from_seed(config.seed.clone()));
            (repo, config.pricing.clone(), config.rules.clone())
        }
    };

    let app = app(AppState::new(repo, pricing, rules));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

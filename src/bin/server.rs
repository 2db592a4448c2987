//! Server: loads the entity config, prepares the database, serves the generated API.

use entity_rest::{
    apply_migrations, build_app, ensure_database_exists, load_from_path, resolve, AppState, PgStore, Settings,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("entity_rest=info".parse()?))
        .init();

    let settings = Settings::from_env()?;
    let config = load_from_path(&settings.entity_config).await?;
    let registry = resolve(&config)?;
    tracing::info!(
        entities = registry.entities.len(),
        path = %settings.entity_config.display(),
        "entity config resolved"
    );

    ensure_database_exists(&settings.database_url).await?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(settings.db_max_connections)
        .connect(&settings.database_url)
        .await?;
    if settings.run_migrations {
        apply_migrations(&pool, &registry).await?;
    }

    let state = AppState::new(PgStore::new(pool), registry);
    let app = build_app(state, &settings.api_prefix);

    let listener = TcpListener::bind(settings.bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

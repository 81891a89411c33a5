use std::net::SocketAddr;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use yatube::blog::{BlogRepository, RepositoryError, SqliteBlogRepository};
use yatube::config::{Cli, Command, Config};
use yatube::db;
use yatube::routes;
use yatube::state::{AppState, DbPool};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli)?;
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Ensure media directory exists
    std::fs::create_dir_all(config.media_path())?;

    // Initialize database
    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;

    match cli.command {
        Some(Command::AddGroup {
            slug,
            title,
            description,
        }) => add_group(pool, &slug, &title, &description).await,
        Some(Command::Serve) | None => serve(pool, config).await,
    }
}

async fn serve(pool: DbPool, config: Config) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let state = AppState::new(pool, config);
    let app = routes::router(state);

    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn add_group(
    pool: DbPool,
    slug: &str,
    title: &str,
    description: &str,
) -> anyhow::Result<()> {
    let repo = SqliteBlogRepository::new(pool);
    match repo.create_group(slug, title, description).await {
        Ok(group) => {
            tracing::info!("Created group {} ({})", group.title, group.slug);
            Ok(())
        }
        Err(RepositoryError::Conflict(msg)) => anyhow::bail!("Could not create group: {}", msg),
        Err(e) => Err(e.into()),
    }
}

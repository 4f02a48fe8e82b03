use anyhow::Context;
use clap::Parser;
use foodgram::config::{Command, Config};
use foodgram::images::MediaStore;
use foodgram::models::{NewIngredient, NewTag};
use foodgram::storage::Storage;
use foodgram::{router, AppState};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("foodgram=info,tower_http=info")),
        )
        .init();

    let mut config = Config::parse();
    let storage = Arc::new(Storage::open(config.data_file.clone()).with_context(|| {
        format!("Failed to initialize storage at {}", config.data_file.display())
    })?);

    match config.command.take() {
        Some(Command::ImportIngredients { file }) => {
            let items: Vec<NewIngredient> = read_json(&file).await?;
            let created = storage
                .import_ingredients(items)
                .await
                .map_err(|e| anyhow::anyhow!("Import failed: {e}"))?;
            tracing::info!(created, file = %file.display(), "ingredients imported");
            Ok(())
        }
        Some(Command::ImportTags { file }) => {
            let items: Vec<NewTag> = read_json(&file).await?;
            let created = storage
                .import_tags(items)
                .await
                .map_err(|e| anyhow::anyhow!("Import failed: {e}"))?;
            tracing::info!(created, file = %file.display(), "tags imported");
            Ok(())
        }
        Some(Command::Serve) | None => serve(config, storage).await,
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

async fn serve(config: Config, storage: Arc<Storage>) -> anyhow::Result<()> {
    let app_state = Arc::new(AppState {
        storage,
        media: MediaStore::new(config.media_root.clone(), "media"),
        settings: config.settings(),
    });
    let app = router(app_state);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.addr))?;

    tracing::info!(addr = %config.addr, data_file = %config.data_file.display(), "foodgram running");
    tracing::info!("endpoints: /api/recipes/, /api/users/, /api/tags/, /api/ingredients/, /api/auth/token/login/");

    axum::serve(listener, app)
        .await
        .context("Server error")?;
    Ok(())
}

use anyhow::Context;

use kinship_api::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    kinship_observability::init();

    let config = AppConfig::from_env().context("reading configuration")?;
    let app = kinship_api::app::build_app(&config).await?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

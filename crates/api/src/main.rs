use anyhow::Context;

use pricetrack_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pricetrack_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let app = pricetrack_api::app::build_app_from_config(&config)
        .await
        .context("failed to initialize storage")?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}

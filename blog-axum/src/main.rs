use anyhow::Result;
use blog_core::config::{HTTP_HOST, HTTP_PORT};
use blog_core::BlogConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = BlogConfig::with_defaults();
    config.load_env("BLOG__");

    let app = blog_axum::build(config)?;

    let host = app
        .get(HTTP_HOST)
        .unwrap_or_else(|| "127.0.0.1".to_string());

    let port = app
        .get(HTTP_PORT)
        .unwrap_or_else(|| "8000".to_string());

    let addr = format!("{host}:{port}");

    app.listen(addr).await?;

    Ok(())
}

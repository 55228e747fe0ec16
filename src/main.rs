use chat_relay::ChatServer;
use chat_relay::config::Settings;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> chat_relay::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let settings = Settings::new()?;
    info!(
        "configuration loaded: {}:{}",
        settings.server.host, settings.server.port
    );

    let addr = settings.resolve_bind_addr()?;
    let server = ChatServer::bind(addr).await?;
    server.run().await
}

use chainwatch_daemon::config::Config;
use chainwatch_daemon::{build_daemon, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();
    init_tracing(config.log_format)?;

    let daemon = build_daemon(&config).await?;
    daemon.start().await?;
    tracing::info!("Chainwatch running; press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    daemon.shutdown().await;
    Ok(())
}

use clap::Parser;
use git_repo_mcp::config::{Cli, Config};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env().with_cli(cli);

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    config.validate()?;

    tracing::info!("Starting Git repository MCP server");
    tracing::debug!(
        "transport={:?} cache_dir={} base_dir={:?}",
        config.transport_type,
        config.cache_dir.display(),
        config.git_base_dir
    );

    git_repo_mcp::server::run_server(config).await?;

    Ok(())
}

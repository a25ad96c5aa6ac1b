use cleanup::Cleanup;
use clap::Parser;
use cli::Cli;
use common::{aws::sdk_config::load_sdk_config, tracing::init_tracing};

mod cleanup;
mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("iot_cleanup=info,warn");
    let cli = Cli::parse();

    tracing::info!("Starting with config: {:?}", cli);

    let sdk_config = load_sdk_config(&cli.aws_config).await;
    let cleanup = Cleanup::new(&sdk_config, cli.fleet_config.fleet_tag, cli.dry_run);

    let report = cleanup.run().await?;
    tracing::info!("{}", report);

    Ok(())
}

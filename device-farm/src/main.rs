use std::io::Write;

use clap::Parser;
use cli::{Cli, Commands};
use common::{aws::ssm::client::SsmClient, tracing::init_tracing};
use device_farm::{
    bootstrap::InstallRegion,
    images::{image_parameter_path, DeployTimeImages, ImageLookup, ResolvedImages},
    variant::FLEET_MATRIX,
    DeviceFarmStack, StackConfig,
};

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("device_farm=info,common=info,warn");
    let cli = Cli::parse();

    tracing::debug!("Starting with config: {:?}", cli);

    let fleet_tag = cli.fleet_config.fleet_tag;

    match cli.command {
        Commands::Synth {
            resolve_images,
            install_region,
            output,
        } => {
            let config = StackConfig {
                fleet_tag,
                install_region: install_region
                    .map_or(InstallRegion::Stack, InstallRegion::Named),
            };

            let images: Box<dyn ImageLookup> = if resolve_images {
                let ssm_client = SsmClient::new(&cli.aws_config).await;
                Box::new(ResolvedImages::fetch(&ssm_client, &FLEET_MATRIX).await?)
            } else {
                Box::new(DeployTimeImages)
            };

            let stack = DeviceFarmStack::synthesize(&config, &*images)?;
            stack.log_summary();

            match output {
                Some(path) => {
                    stack.write_template(&path)?;
                    tracing::info!("Template written to {}", path.display());
                }
                None => {
                    let mut stdout = std::io::stdout().lock();
                    writeln!(stdout, "{}", stack.template.to_json_pretty()?)?;
                }
            }
        }
        Commands::Variants => {
            for variant in FLEET_MATRIX.iter() {
                println!(
                    "{:<24} {:<10} {:<8} {:<10} {}",
                    fleet_tag.instance_name(variant.name),
                    variant.role,
                    variant.architecture,
                    variant.instance_type(),
                    image_parameter_path(variant)?
                );
            }
        }
    }

    Ok(())
}

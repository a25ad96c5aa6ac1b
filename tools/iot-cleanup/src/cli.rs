use clap::Parser;
use common::clap::{AwsConfig, FleetConfig};

/// Removes the IoT things, certificates, policies, role aliases and Greengrass deployments
/// that the Greengrass installer created for a device farm.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub aws_config: AwsConfig,
    #[command(flatten)]
    pub fleet_config: FleetConfig,
    /// Only log what would be removed
    #[clap(long)]
    pub dry_run: bool,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::Cli;

    #[test]
    fn dry_run_is_off_by_default() {
        let cli = Cli::try_parse_from(["iot-cleanup", "--fleet-tag", "MyTestStack"]).unwrap();

        assert!(!cli.dry_run);
        assert_eq!(cli.fleet_config.fleet_tag.to_string(), "MyTestStack");
    }

    #[test]
    fn when_dry_run_flag_then_dry_run() {
        let cli = Cli::try_parse_from(["iot-cleanup", "--dry-run"]).unwrap();

        assert!(cli.dry_run);
    }
}

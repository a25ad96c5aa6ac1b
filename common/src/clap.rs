use clap::Args;

use crate::fleet_tag::FleetTag;

/// Common AWS configuration parameters such as the region.
#[derive(Args, Clone, Debug)]
pub struct AwsConfig {
    /// AWS region
    #[clap(
        name = "aws-region",
        long,
        env = "AWS_REGION",
        global = true,
        default_value = "eu-west-1"
    )]
    pub region: String,
    /// AWS profile
    #[clap(name = "aws-profile", long, env = "AWS_PROFILE", global = true)]
    pub profile: Option<String>,
}

/// Identifies which device farm a command operates on.
#[derive(Args, Clone, Debug)]
pub struct FleetConfig {
    /// Prefix for every resource name, also used as the IoT thing group and policy name
    #[clap(
        name = "fleet-tag",
        long,
        env = "FLEET_TAG",
        global = true,
        default_value = crate::fleet_tag::DEFAULT_FLEET_TAG
    )]
    pub fleet_tag: FleetTag,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{AwsConfig, FleetConfig};

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(flatten)]
        aws_config: AwsConfig,
        #[command(flatten)]
        fleet_config: FleetConfig,
    }

    #[test]
    fn fleet_tag_is_parsed_and_validated() {
        let cli = TestCli::try_parse_from(["test", "--fleet-tag", "MyTestStack"]).unwrap();
        assert_eq!(&*cli.fleet_config.fleet_tag, "MyTestStack");

        let invalid = TestCli::try_parse_from(["test", "--fleet-tag", "not valid"]);
        assert!(invalid.is_err());
    }

    #[test]
    fn aws_region_flag_overrides_default() {
        let cli = TestCli::try_parse_from(["test", "--aws-region", "us-west-2"]).unwrap();
        assert_eq!(cli.aws_config.region, "us-west-2");
    }
}

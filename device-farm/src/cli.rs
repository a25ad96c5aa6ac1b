use std::path::PathBuf;

use clap::{Parser, Subcommand};
use common::clap::{AwsConfig, FleetConfig};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub aws_config: AwsConfig,
    #[command(flatten)]
    pub fleet_config: FleetConfig,
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render the device farm as a CloudFormation template
    Synth {
        /// Look up AMI IDs in SSM now and pin them in the template, rather than letting
        /// CloudFormation resolve the latest images at deploy time
        #[clap(long)]
        resolve_images: bool,
        /// Region the Greengrass installer provisions core devices in. Defaults to the
        /// region the stack is deployed to.
        #[clap(long)]
        install_region: Option<String>,
        /// Where to write the template. Printed to stdout if not set.
        #[clap(long)]
        output: Option<PathBuf>,
    },
    /// List the machines in the fleet and the image each one is built from
    Variants,
}

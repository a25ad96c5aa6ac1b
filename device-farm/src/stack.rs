use std::path::Path;

use common::fleet_tag::FleetTag;
use serde_json::json;

use crate::{
    bootstrap::{BootstrapParams, InstallRegion},
    error::Result,
    fleet::{self, DeclaredInstance},
    identity::{self, Identity},
    images::ImageLookup,
    key_pair::KeyPair,
    network,
    template::{resource_types, LogicalId, Output, Template},
};

const TEMPLATE_DESCRIPTION: &str =
    "EC2 instances across operating systems and architectures that enroll as AWS IoT Greengrass core devices";

#[derive(Debug, Clone)]
pub struct StackConfig {
    pub fleet_tag: FleetTag,
    /// Region the Greengrass installer provisions into
    pub install_region: InstallRegion,
}

#[derive(Debug, Clone)]
pub struct SynthesizedStack {
    pub template: Template,
    pub key_pair: KeyPair,
    pub identity: Identity,
    pub instances: Vec<DeclaredInstance>,
}

pub struct DeviceFarmStack;

impl DeviceFarmStack {
    /// Build the complete template. Every step only needs what the steps before it
    /// returned, so the declaration order is fixed by the arguments.
    pub fn synthesize(config: &StackConfig, images: &dyn ImageLookup) -> Result<SynthesizedStack> {
        let fleet_tag = &config.fleet_tag;
        let mut template = Template::new(format!("{TEMPLATE_DESCRIPTION} ({fleet_tag})"));

        let network = network::build(&mut template, fleet_tag)?;
        let key_pair = KeyPair::declare(&mut template, fleet_tag)?;
        let identity = identity::build(&mut template, fleet_tag)?;

        let params = BootstrapParams::new(
            config.install_region.clone(),
            fleet_tag.clone(),
            identity.token_exchange_role.name.clone(),
        );
        let instances = fleet::declare(
            &mut template,
            &network,
            &identity,
            &key_pair,
            images,
            &params,
        )?;

        add_outputs(&mut template, &key_pair, &identity, &instances)?;

        Ok(SynthesizedStack {
            template,
            key_pair,
            identity,
            instances,
        })
    }
}

fn add_outputs(
    template: &mut Template,
    key_pair: &KeyPair,
    identity: &Identity,
    instances: &[DeclaredInstance],
) -> Result<()> {
    template.add_output(
        LogicalId::from_name("Key Pair Name"),
        Output::new(key_pair.key_name()),
    )?;
    template.add_output(
        LogicalId::from_name("Download Key Command"),
        Output::new(key_pair.download_command())
            .with_description("Writes the private key of the fleet key pair to a local file"),
    )?;
    template.add_output(
        LogicalId::from_name("Greengrass Core Device Role"),
        Output::new(json!(identity.token_exchange_role.name))
            .with_description("Role Greengrass core devices assume through the role alias"),
    )?;

    for instance in instances {
        template.add_output(
            LogicalId::from_name(&format!("{} IP Address", instance.variant.name)),
            Output::new(instance.public_ip()),
        )?;
    }

    Ok(())
}

impl SynthesizedStack {
    pub fn write_template(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = self.template.to_json_pretty()?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn log_summary(&self) {
        for resource_type in [
            resource_types::VPC,
            resource_types::SECURITY_GROUP,
            resource_types::KEY_PAIR,
            resource_types::ROLE,
            resource_types::POLICY,
            resource_types::MANAGED_POLICY,
            resource_types::INSTANCE,
        ] {
            tracing::info!(
                "{:>3} x {}",
                self.template.resource_count(resource_type),
                resource_type
            );
        }

        tracing::info!(
            "Template has {} resources, {} parameters and {} outputs",
            self.template.resources().count(),
            self.template.parameters().count(),
            self.template.outputs().count()
        );
    }
}

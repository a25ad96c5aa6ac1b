//! Machine image lookup.
//!
//! Every image in the fleet is published by its vendor as a public SSM parameter. Those
//! parameters can either be left for CloudFormation to resolve at deploy time, or resolved
//! up front so the template pins concrete AMI IDs.

use std::collections::HashMap;

use common::aws::ssm::client::SsmClient;

use crate::{
    error::{Error, Result},
    variant::{Architecture, OsFamily, VariantDescriptor},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MachineImageRef {
    /// Public SSM parameter holding the latest AMI ID
    SsmParameter(String),
    /// A concrete AMI ID
    ImageId(String),
}

pub trait ImageLookup {
    fn image_for(&self, variant: &VariantDescriptor) -> Result<MachineImageRef>;
}

/// The public SSM parameter that tracks the latest image for a variant
pub fn image_parameter_path(variant: &VariantDescriptor) -> Result<String> {
    match (variant.os_family, variant.architecture) {
        (OsFamily::Windows, Architecture::X86_64) => Ok(format!(
            "/aws/service/ami-windows-latest/Windows_Server-{}-English-Core-Base",
            variant.release
        )),
        (OsFamily::AmazonLinux, architecture) if variant.release == "2" => Ok(format!(
            "/aws/service/ami-amazon-linux-latest/amzn2-ami-hvm-{architecture}-gp2"
        )),
        (OsFamily::Ubuntu, architecture) => {
            // Canonical uses Debian architecture names
            let architecture = match architecture {
                Architecture::X86_64 => "amd64",
                Architecture::Arm64 => "arm64",
            };
            Ok(format!(
                "/aws/service/canonical/ubuntu/server/{}/stable/current/{architecture}/hvm/ebs-gp2/ami-id",
                variant.release
            ))
        }
        (os_family, architecture) => Err(Error::Configuration(format!(
            "no image published for {os_family} {} on {architecture}",
            variant.release
        ))),
    }
}

/// Leaves image resolution to CloudFormation
#[derive(Debug, Clone, Copy, Default)]
pub struct DeployTimeImages;

impl ImageLookup for DeployTimeImages {
    fn image_for(&self, variant: &VariantDescriptor) -> Result<MachineImageRef> {
        image_parameter_path(variant).map(MachineImageRef::SsmParameter)
    }
}

/// AMI IDs resolved from parameter store before synthesis
#[derive(Debug, Clone, Default)]
pub struct ResolvedImages {
    image_ids: HashMap<&'static str, String>,
}

impl ResolvedImages {
    pub async fn fetch(ssm_client: &SsmClient, variants: &[VariantDescriptor]) -> Result<Self> {
        let paths = variants
            .iter()
            .map(image_parameter_path)
            .collect::<Result<Vec<_>>>()?;

        let values = ssm_client
            .get_parameters(&paths)
            .await
            .map_err(Error::ExternalService)?;

        let image_ids = variants
            .iter()
            .zip(values)
            .map(|(variant, (_, image_id))| {
                tracing::info!("Using {} for {}", image_id, variant.name);
                (variant.name, image_id)
            })
            .collect();

        Ok(Self { image_ids })
    }

    pub fn from_image_ids(
        image_ids: impl IntoIterator<Item = (&'static str, String)>,
    ) -> ResolvedImages {
        Self {
            image_ids: image_ids.into_iter().collect(),
        }
    }
}

impl ImageLookup for ResolvedImages {
    fn image_for(&self, variant: &VariantDescriptor) -> Result<MachineImageRef> {
        self.image_ids
            .get(variant.name)
            .map(|image_id| MachineImageRef::ImageId(image_id.clone()))
            .ok_or_else(|| {
                Error::Configuration(format!("no image was resolved for {}", variant.name))
            })
    }
}

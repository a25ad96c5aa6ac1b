//! One EC2 instance per variant of the fleet matrix.

use serde_json::{json, Value};

use crate::{
    bootstrap::{self, BootstrapParams, ScriptBlob},
    error::Result,
    identity::Identity,
    images::{ImageLookup, MachineImageRef},
    key_pair::KeyPair,
    network::Network,
    template::{resource_types, LogicalId, Parameter, Resource, Template},
    variant::{InstanceType, VariantDescriptor, FLEET_MATRIX},
};

#[derive(Debug, Clone)]
pub struct DeclaredInstance {
    pub logical_id: LogicalId,
    /// Also the name of the Greengrass core device the instance registers as
    pub name: String,
    pub variant: VariantDescriptor,
    pub image: MachineImageRef,
    pub instance_type: InstanceType,
    pub access_group: LogicalId,
    pub bootstrap_script: ScriptBlob,
}

impl DeclaredInstance {
    pub fn public_ip(&self) -> Value {
        self.logical_id.get_att("PublicIp")
    }
}

/// Images looked up in SSM at deploy time become template parameters so that the
/// instance can `Ref` them
fn image_id(
    template: &mut Template,
    variant: &VariantDescriptor,
    image: &MachineImageRef,
) -> Result<Value> {
    match image {
        MachineImageRef::ImageId(image_id) => Ok(json!(image_id)),
        MachineImageRef::SsmParameter(path) => {
            let parameter = template.add_parameter(
                LogicalId::from_name(&format!("{}-image-id", variant.name)),
                Parameter::ssm_image_id(path)
                    .with_description(format!("Latest image for {}", variant.name)),
            )?;
            Ok(parameter.reference())
        }
    }
}

fn declare_instance(
    template: &mut Template,
    variant: &VariantDescriptor,
    network: &Network,
    identity: &Identity,
    key_pair: &KeyPair,
    images: &dyn ImageLookup,
    params: &BootstrapParams,
) -> Result<DeclaredInstance> {
    let name = params.fleet_tag.instance_name(variant.name);
    let image = images.image_for(variant)?;
    let instance_type = variant.instance_type();
    let access_group = network.access_groups.for_role(variant.role).logical_id.clone();
    let bootstrap_script = bootstrap::compose(variant, params)?;

    let image_id = image_id(template, variant, &image)?;

    // The installer provisions through the instance role on first boot so the role's
    // permissions and a route out must exist before the instance starts
    let resource = Resource::new(
        resource_types::INSTANCE,
        json!({
            "AvailabilityZone": network.availability_zone(),
            "IamInstanceProfile": identity.instance_profile.reference(),
            "ImageId": image_id,
            "InstanceType": instance_type.to_string(),
            "KeyName": key_pair.key_name(),
            "SecurityGroupIds": [access_group.get_att("GroupId")],
            "SubnetId": network.public_subnet.reference(),
            "Tags": [{ "Key": "Name", "Value": name }],
            "UserData": bootstrap_script.to_user_data(),
        }),
    )
    .depends_on(&identity.instance_role.logical_id)
    .depends_on(&identity.installer_policy.logical_id)
    .depends_on(&network.default_route);

    let logical_id = template.add_resource(LogicalId::from_name(&name), resource)?;

    tracing::info!(
        "Declared {} as {} ({})",
        name,
        instance_type,
        variant.architecture
    );

    Ok(DeclaredInstance {
        logical_id,
        name,
        variant: *variant,
        image,
        instance_type,
        access_group,
        bootstrap_script,
    })
}

/// Declare every machine of the fleet matrix, in matrix order
pub fn declare(
    template: &mut Template,
    network: &Network,
    identity: &Identity,
    key_pair: &KeyPair,
    images: &dyn ImageLookup,
    params: &BootstrapParams,
) -> Result<Vec<DeclaredInstance>> {
    FLEET_MATRIX
        .iter()
        .map(|variant| {
            declare_instance(
                template, variant, network, identity, key_pair, images, params,
            )
        })
        .collect()
}

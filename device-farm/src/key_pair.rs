use common::fleet_tag::FleetTag;
use serde_json::{json, Value};

use crate::{
    error::Result,
    template::{join, resource_types, LogicalId, Resource, Template},
};

/// EC2 stores the private key of a generated key pair under this parameter store prefix
const KEY_PAIR_PARAMETER_PREFIX: &str = "/ec2/keypair/";

/// The SSH key pair shared by every instance in the fleet. The private key never appears in
/// the template, only the command to fetch it.
#[derive(Debug, Clone)]
pub struct KeyPair {
    pub logical_id: LogicalId,
    pub name: String,
}

impl KeyPair {
    pub fn declare(template: &mut Template, fleet_tag: &FleetTag) -> Result<KeyPair> {
        let name = fleet_tag.to_string();
        let logical_id = template.add_resource(
            LogicalId::from_name(&fleet_tag.resource_name("KeyPair")),
            Resource::new(resource_types::KEY_PAIR, json!({ "KeyName": name })),
        )?;

        Ok(KeyPair { logical_id, name })
    }

    /// `{"Ref": ...}` on a key pair resolves to its name
    pub fn key_name(&self) -> Value {
        self.logical_id.reference()
    }

    /// A shell command that writes the private key to `<name>.pem`
    pub fn download_command(&self) -> Value {
        join(vec![
            json!(format!("aws ssm get-parameter --name {KEY_PAIR_PARAMETER_PREFIX}")),
            self.logical_id.get_att("KeyPairId"),
            json!(format!(
                " --with-decryption --query Parameter.Value --output text > {name}.pem && chmod 400 {name}.pem",
                name = self.name
            )),
        ])
    }
}

#[cfg(test)]
mod tests {
    use common::fleet_tag::FleetTag;
    use serde_json::json;

    use super::KeyPair;
    use crate::template::{resource_types, Template};

    #[test]
    fn key_pair_is_named_after_the_fleet() {
        let mut template = Template::new("key pair");
        let key_pair = KeyPair::declare(&mut template, &FleetTag::new("MyTestStack").unwrap())
            .unwrap();

        assert_eq!(key_pair.name, "MyTestStack");
        assert_eq!(template.resource_count(resource_types::KEY_PAIR), 1);
        assert_eq!(
            template.resource(&key_pair.logical_id).unwrap().properties()["KeyName"],
            json!("MyTestStack")
        );
    }

    #[test]
    fn download_command_reads_the_key_from_parameter_store() {
        let mut template = Template::new("key pair");
        let key_pair = KeyPair::declare(&mut template, &FleetTag::new("MyTestStack").unwrap())
            .unwrap();

        assert_eq!(
            key_pair.download_command(),
            json!({ "Fn::Join": ["", [
                "aws ssm get-parameter --name /ec2/keypair/",
                { "Fn::GetAtt": ["MyTestStackKeyPair", "KeyPairId"] },
                " --with-decryption --query Parameter.Value --output text > MyTestStack.pem && chmod 400 MyTestStack.pem",
            ]] })
        );
    }
}

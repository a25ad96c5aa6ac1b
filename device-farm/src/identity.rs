//! IAM roles and policies for the fleet.
//!
//! Every instance runs as the same EC2 role, which grants the permissions the Greengrass
//! installer needs for automatic provisioning. Once installed, Greengrass uses the token
//! exchange role through an IoT role alias.

use common::fleet_tag::FleetTag;
use serde_json::json;

use crate::{
    error::Result,
    policy::{service_trust_policy, PolicyDocument, PolicyResource, PolicyStatement},
    template::{join, pseudo_parameter, resource_types, LogicalId, Resource, Template},
};

pub const EC2_PRINCIPAL: &str = "ec2.amazonaws.com";

/// The IoT credentials provider that exchanges device certificates for role credentials
pub const CREDENTIALS_PROVIDER_PRINCIPAL: &str = "credentials.iot.amazonaws.com";

pub const SSM_MANAGED_INSTANCE_POLICY: &str = "AmazonSSMManagedInstanceCore";

/// Component artifacts are read from here. Replace it with a real bucket before deploying
/// components that have S3 artifacts.
pub const ARTIFACT_BUCKET_PLACEHOLDER_ARN: &str = "arn:aws:s3:::DOC-EXAMPLE-BUCKET/*";

// https://docs.aws.amazon.com/greengrass/v2/developerguide/provision-minimal-iam-policy.html
const INSTALLER_IAM_ACTIONS: [&str; 6] = [
    "iam:AttachRolePolicy",
    "iam:CreatePolicy",
    "iam:CreateRole",
    "iam:GetPolicy",
    "iam:GetRole",
    "iam:PassRole",
];

const INSTALLER_IOT_ACTIONS: [&str; 12] = [
    "iot:AddThingToThingGroup",
    "iot:AttachPolicy",
    "iot:AttachThingPrincipal",
    "iot:CreateKeysAndCertificate",
    "iot:CreatePolicy",
    "iot:CreateRoleAlias",
    "iot:CreateThing",
    "iot:CreateThingGroup",
    "iot:DescribeEndpoint",
    "iot:DescribeRoleAlias",
    "iot:DescribeThingGroup",
    "iot:GetPolicy",
];

const DEVICE_MANAGEMENT_ACTIONS: [&str; 10] = [
    "greengrass:CreateDeployment",
    "iot:CancelJob",
    "iot:CreateJob",
    "iot:DeleteThingShadow",
    "iot:DescribeJob",
    "iot:DescribeThing",
    "iot:DescribeThingGroup",
    "iot:GetThingShadow",
    "iot:UpdateJob",
    "iot:UpdateThingShadow",
];

// https://docs.aws.amazon.com/greengrass/v2/developerguide/device-service-role.html
const TOKEN_EXCHANGE_ACTIONS: [&str; 5] = [
    "logs:CreateLogGroup",
    "logs:CreateLogStream",
    "logs:PutLogEvents",
    "logs:DescribeLogStreams",
    "s3:GetBucketLocation",
];

const ARTIFACT_ACTIONS: [&str; 1] = ["s3:GetObject"];

#[derive(Debug, Clone)]
pub struct IamRole {
    pub logical_id: LogicalId,
    pub name: String,
    pub trust_principal: &'static str,
    /// Names of the policies attached to the role, AWS managed ones included
    pub attached_policies: Vec<String>,
}

impl IamRole {
    fn declare(
        template: &mut Template,
        name: String,
        trust_principal: &'static str,
        aws_managed_policies: &[&str],
    ) -> Result<IamRole> {
        let mut properties = json!({
            "RoleName": name,
            "AssumeRolePolicyDocument": service_trust_policy(trust_principal),
        });
        if !aws_managed_policies.is_empty() {
            properties["ManagedPolicyArns"] = aws_managed_policies
                .iter()
                .map(|policy| aws_managed_policy_arn(policy))
                .collect();
        }

        let logical_id = template.add_resource(
            LogicalId::from_name(&name),
            Resource::new(resource_types::ROLE, properties),
        )?;

        Ok(IamRole {
            logical_id,
            name,
            trust_principal,
            attached_policies: aws_managed_policies.iter().map(|p| p.to_string()).collect(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct IamPolicy {
    pub logical_id: LogicalId,
    pub name: String,
    pub document: PolicyDocument,
}

#[derive(Debug, Clone)]
pub struct Identity {
    pub instance_role: IamRole,
    /// Wraps the instance role so EC2 can hand it to instances
    pub instance_profile: LogicalId,
    pub token_exchange_role: IamRole,
    /// Managed policy attached to the token exchange role
    pub token_exchange_policy: IamPolicy,
    /// Inline policy attached to the instance role
    pub installer_policy: IamPolicy,
}

fn aws_managed_policy_arn(policy_name: &str) -> serde_json::Value {
    join(vec![
        json!("arn:"),
        pseudo_parameter("Partition"),
        json!(format!(":iam::aws:policy/{policy_name}")),
    ])
}

fn token_exchange_policy_document() -> PolicyDocument {
    PolicyDocument::new(vec![
        PolicyStatement::allow(&TOKEN_EXCHANGE_ACTIONS, vec![PolicyResource::Any]),
        PolicyStatement::allow(
            &ARTIFACT_ACTIONS,
            vec![PolicyResource::Arn(ARTIFACT_BUCKET_PLACEHOLDER_ARN.to_owned())],
        ),
    ])
}

/// The first statement is the only one scoped to resources: the installer may only create
/// or pass the token exchange role and policy declared by this stack. The IoT calls create
/// things that don't exist yet, so there is nothing to scope them to.
fn installer_policy_document(
    token_exchange_role: &IamRole,
    token_exchange_policy: &IamPolicy,
) -> PolicyDocument {
    PolicyDocument::new(vec![
        PolicyStatement::allow(
            &INSTALLER_IAM_ACTIONS,
            vec![
                PolicyResource::Reference(token_exchange_role.logical_id.get_att("Arn")),
                // Ref on a managed policy is its ARN
                PolicyResource::Reference(token_exchange_policy.logical_id.reference()),
            ],
        ),
        PolicyStatement::allow(&INSTALLER_IOT_ACTIONS, vec![PolicyResource::Any]),
        PolicyStatement::allow(&DEVICE_MANAGEMENT_ACTIONS, vec![PolicyResource::Any]),
    ])
}

fn declare_token_exchange_policy(
    template: &mut Template,
    fleet_tag: &FleetTag,
    token_exchange_role: &mut IamRole,
) -> Result<IamPolicy> {
    let name = fleet_tag.resource_name("TokenExchangeRoleAccess");
    let document = token_exchange_policy_document();
    let policy_document = document.to_value()?;

    let logical_id = template.add_resource(
        LogicalId::from_name(&name),
        Resource::new(
            resource_types::MANAGED_POLICY,
            json!({
                "ManagedPolicyName": name,
                "PolicyDocument": policy_document,
                "Roles": [token_exchange_role.logical_id.reference()],
            }),
        ),
    )?;
    token_exchange_role.attached_policies.push(name.clone());

    Ok(IamPolicy {
        logical_id,
        name,
        document,
    })
}

fn declare_installer_policy(
    template: &mut Template,
    fleet_tag: &FleetTag,
    instance_role: &mut IamRole,
    token_exchange_role: &IamRole,
    token_exchange_policy: &IamPolicy,
) -> Result<IamPolicy> {
    let name = fleet_tag.resource_name("InstallerPolicy");
    let document = installer_policy_document(token_exchange_role, token_exchange_policy);
    let policy_document = document.to_value()?;

    let logical_id = template.add_resource(
        LogicalId::from_name(&name),
        Resource::new(
            resource_types::POLICY,
            json!({
                "PolicyName": name,
                "PolicyDocument": policy_document,
                "Roles": [instance_role.logical_id.reference()],
            }),
        ),
    )?;
    instance_role.attached_policies.push(name.clone());

    Ok(IamPolicy {
        logical_id,
        name,
        document,
    })
}

/// Declare both roles and their policies. The token exchange role and its policy come
/// first because the installer policy refers to their ARNs.
pub fn build(template: &mut Template, fleet_tag: &FleetTag) -> Result<Identity> {
    let mut token_exchange_role = IamRole::declare(
        template,
        fleet_tag.token_exchange_role_name(),
        CREDENTIALS_PROVIDER_PRINCIPAL,
        &[],
    )?;
    let token_exchange_policy =
        declare_token_exchange_policy(template, fleet_tag, &mut token_exchange_role)?;

    let mut instance_role = IamRole::declare(
        template,
        fleet_tag.resource_name("EC2Role"),
        EC2_PRINCIPAL,
        &[SSM_MANAGED_INSTANCE_POLICY],
    )?;
    let installer_policy = declare_installer_policy(
        template,
        fleet_tag,
        &mut instance_role,
        &token_exchange_role,
        &token_exchange_policy,
    )?;

    let instance_profile = template.add_resource(
        LogicalId::from_name(&fleet_tag.resource_name("InstanceProfile")),
        Resource::new(
            resource_types::INSTANCE_PROFILE,
            json!({ "Roles": [instance_role.logical_id.reference()] }),
        ),
    )?;

    tracing::info!(
        "Declared roles {} and {}",
        instance_role.name,
        token_exchange_role.name
    );

    Ok(Identity {
        instance_role,
        instance_profile,
        token_exchange_role,
        token_exchange_policy,
        installer_policy,
    })
}

#[cfg(test)]
mod tests {
    use common::fleet_tag::FleetTag;
    use serde_json::json;

    use super::{build, ARTIFACT_BUCKET_PLACEHOLDER_ARN, SSM_MANAGED_INSTANCE_POLICY};
    use crate::{
        policy::PolicyResource,
        template::{resource_types, Template},
    };

    fn identity_template(tag: &str) -> (Template, super::Identity) {
        let mut template = Template::new("identity");
        let identity = build(&mut template, &FleetTag::new(tag).unwrap()).unwrap();
        (template, identity)
    }

    #[test]
    fn declares_two_roles_and_two_policies() {
        let (template, _) = identity_template("MyTestStack");

        assert_eq!(template.resource_count(resource_types::ROLE), 2);
        assert_eq!(template.resource_count(resource_types::POLICY), 1);
        assert_eq!(template.resource_count(resource_types::MANAGED_POLICY), 1);
        assert_eq!(template.resource_count(resource_types::INSTANCE_PROFILE), 1);
    }

    #[test]
    fn roles_trust_only_their_service() {
        let (template, identity) = identity_template("MyTestStack");

        let trusted_service = |id| {
            template.resource(id).unwrap().properties()["AssumeRolePolicyDocument"]["Statement"]
                [0]["Principal"]["Service"]
                .clone()
        };

        assert_eq!(
            trusted_service(&identity.instance_role.logical_id),
            json!("ec2.amazonaws.com")
        );
        assert_eq!(
            trusted_service(&identity.token_exchange_role.logical_id),
            json!("credentials.iot.amazonaws.com")
        );
    }

    #[test]
    fn policies_are_attached_to_their_roles() {
        let (template, identity) = identity_template("MyTestStack");

        assert_eq!(
            identity.instance_role.attached_policies,
            vec![SSM_MANAGED_INSTANCE_POLICY, "MyTestStackInstallerPolicy"]
        );
        assert_eq!(
            identity.token_exchange_role.attached_policies,
            vec!["MyTestStackTokenExchangeRoleAccess"]
        );

        let installer = template
            .resource(&identity.installer_policy.logical_id)
            .unwrap();
        assert_eq!(
            installer.properties()["Roles"],
            json!([identity.instance_role.logical_id.reference()])
        );

        let managed = template
            .resource(&identity.token_exchange_policy.logical_id)
            .unwrap();
        assert_eq!(
            managed.properties()["Roles"],
            json!([identity.token_exchange_role.logical_id.reference()])
        );
    }

    #[test]
    fn installer_iam_clause_is_scoped_to_token_exchange_resources() {
        let (_, identity) = identity_template("MyTestStack");
        let statements = identity.installer_policy.document.statements();

        assert_eq!(statements.len(), 3);
        assert_eq!(
            statements[0].resources(),
            &[
                PolicyResource::Reference(identity.token_exchange_role.logical_id.get_att("Arn")),
                PolicyResource::Reference(identity.token_exchange_policy.logical_id.reference()),
            ]
        );
        assert!(statements[0].actions().contains(&"iam:PassRole"));

        for statement in &statements[1..] {
            assert_eq!(statement.resources(), &[PolicyResource::Any]);
        }
        assert!(statements[1].actions().contains(&"iot:CreateThing"));
        assert!(statements[2].actions().contains(&"iot:UpdateThingShadow"));
    }

    #[test]
    fn token_exchange_policy_reads_only_the_artifact_placeholder() {
        let (_, identity) = identity_template("MyTestStack");
        let statements = identity.token_exchange_policy.document.statements();

        assert_eq!(statements.len(), 2);
        assert!(statements[0].resources()[0].is_wildcard());
        assert!(statements[0].actions().contains(&"logs:PutLogEvents"));
        assert_eq!(statements[1].actions(), &["s3:GetObject"]);
        assert_eq!(
            statements[1].resources(),
            &[PolicyResource::Arn(ARTIFACT_BUCKET_PLACEHOLDER_ARN.to_owned())]
        );
    }

    #[test]
    fn fleet_tag_changes_names_not_shape() {
        let (first, first_identity) = identity_template("FleetOne");
        let (second, second_identity) = identity_template("FleetTwo");

        assert_eq!(second_identity.instance_role.name, "FleetTwoEC2Role");
        assert_eq!(
            second_identity.token_exchange_role.name,
            "FleetTwoTokenExchangeRole"
        );

        let first_types: Vec<_> = first.resources().map(|(_, r)| r.resource_type()).collect();
        let second_types: Vec<_> = second.resources().map(|(_, r)| r.resource_type()).collect();
        assert_eq!(first_types, second_types);

        let shape = |identity: &super::Identity| {
            identity
                .installer_policy
                .document
                .statements()
                .iter()
                .map(|s| (s.actions().to_vec(), s.resources().len()))
                .collect::<Vec<_>>()
        };
        assert_eq!(shape(&first_identity), shape(&second_identity));
    }
}

//! A single-AZ VPC with one public subnet. This is a disposable test fleet so there is no
//! redundancy and no NAT.

use common::fleet_tag::FleetTag;
use serde_json::{json, Value};

use crate::{
    error::Result,
    template::{first_availability_zone, resource_types, LogicalId, Resource, Template},
    variant::Role,
};

const VPC_CIDR: &str = "10.0.0.0/16";
const PUBLIC_SUBNET_CIDR: &str = "10.0.0.0/24";
const ANYWHERE_IPV4: &str = "0.0.0.0/0";

/// A security group for one kind of instance
#[derive(Debug, Clone)]
pub struct AccessGroup {
    pub logical_id: LogicalId,
    pub name: String,
    /// The VPC the group belongs to
    pub network: LogicalId,
    pub allow_all_egress: bool,
}

#[derive(Debug, Clone)]
pub struct AccessGroups {
    pub linux: AccessGroup,
    pub windows: AccessGroup,
}

impl AccessGroups {
    pub fn for_role(&self, role: Role) -> &AccessGroup {
        match role {
            Role::Windows => &self.windows,
            Role::Linux => &self.linux,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Network {
    pub vpc: LogicalId,
    pub public_subnet: LogicalId,
    /// Instances must not launch before the subnet can reach the internet gateway
    pub default_route: LogicalId,
    pub access_groups: AccessGroups,
}

impl Network {
    /// Instances are placed in the subnet's availability zone
    pub fn availability_zone(&self) -> Value {
        self.public_subnet.get_att("AvailabilityZone")
    }
}

fn name_tag(name: &str) -> Value {
    json!([{ "Key": "Name", "Value": name }])
}

/// Declares a security group with no ingress rules. Instances are reached through SSM
/// Session Manager rather than inbound connections.
fn declare_access_group(
    template: &mut Template,
    fleet_tag: &FleetTag,
    vpc: &LogicalId,
    role: Role,
) -> Result<AccessGroup> {
    let name = fleet_tag.resource_name(&format!("{role}SG"));

    let logical_id = template.add_resource(
        LogicalId::from_name(&name),
        Resource::new(
            resource_types::SECURITY_GROUP,
            json!({
                "GroupName": name,
                "GroupDescription": format!("Security group for {fleet_tag} {role} instances"),
                "SecurityGroupEgress": [{
                    "CidrIp": ANYWHERE_IPV4,
                    "Description": "Allow all outbound traffic by default",
                    "IpProtocol": "-1",
                }],
                "VpcId": vpc.reference(),
            }),
        ),
    )?;

    Ok(AccessGroup {
        logical_id,
        name,
        network: vpc.clone(),
        allow_all_egress: true,
    })
}

pub fn build(template: &mut Template, fleet_tag: &FleetTag) -> Result<Network> {
    let vpc_name = fleet_tag.resource_name("Vpc");
    let vpc = template.add_resource(
        LogicalId::from_name(&vpc_name),
        Resource::new(
            resource_types::VPC,
            json!({
                "CidrBlock": VPC_CIDR,
                "EnableDnsHostnames": true,
                "EnableDnsSupport": true,
                "InstanceTenancy": "default",
                "Tags": name_tag(&vpc_name),
            }),
        ),
    )?;

    let subnet_name = fleet_tag.resource_name("Subnet");
    let public_subnet = template.add_resource(
        LogicalId::from_name(&subnet_name),
        Resource::new(
            resource_types::SUBNET,
            json!({
                "AvailabilityZone": first_availability_zone(),
                "CidrBlock": PUBLIC_SUBNET_CIDR,
                "MapPublicIpOnLaunch": true,
                "Tags": name_tag(&subnet_name),
                "VpcId": vpc.reference(),
            }),
        ),
    )?;

    let route_table = template.add_resource(
        LogicalId::from_name(&fleet_tag.resource_name("SubnetRouteTable")),
        Resource::new(
            resource_types::ROUTE_TABLE,
            json!({
                "Tags": name_tag(&subnet_name),
                "VpcId": vpc.reference(),
            }),
        ),
    )?;

    template.add_resource(
        LogicalId::from_name(&fleet_tag.resource_name("SubnetRouteTableAssociation")),
        Resource::new(
            resource_types::SUBNET_ROUTE_TABLE_ASSOCIATION,
            json!({
                "RouteTableId": route_table.reference(),
                "SubnetId": public_subnet.reference(),
            }),
        ),
    )?;

    let internet_gateway = template.add_resource(
        LogicalId::from_name(&fleet_tag.resource_name("InternetGateway")),
        Resource::new(
            resource_types::INTERNET_GATEWAY,
            json!({ "Tags": name_tag(&vpc_name) }),
        ),
    )?;

    let gateway_attachment = template.add_resource(
        LogicalId::from_name(&fleet_tag.resource_name("VpcGatewayAttachment")),
        Resource::new(
            resource_types::VPC_GATEWAY_ATTACHMENT,
            json!({
                "InternetGatewayId": internet_gateway.reference(),
                "VpcId": vpc.reference(),
            }),
        ),
    )?;

    // The route only works once the gateway is attached, which the references don't express
    let default_route = template.add_resource(
        LogicalId::from_name(&fleet_tag.resource_name("SubnetDefaultRoute")),
        Resource::new(
            resource_types::ROUTE,
            json!({
                "DestinationCidrBlock": ANYWHERE_IPV4,
                "GatewayId": internet_gateway.reference(),
                "RouteTableId": route_table.reference(),
            }),
        )
        .depends_on(&gateway_attachment),
    )?;

    let access_groups = AccessGroups {
        linux: declare_access_group(template, fleet_tag, &vpc, Role::Linux)?,
        windows: declare_access_group(template, fleet_tag, &vpc, Role::Windows)?,
    };

    tracing::info!("Declared network {} with subnet {}", vpc, public_subnet);

    Ok(Network {
        vpc,
        public_subnet,
        default_route,
        access_groups,
    })
}

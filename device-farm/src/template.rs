//! An in-memory CloudFormation template.
//!
//! Resources, parameters and outputs keep the order they were declared in. A resource or
//! output may only reference logical IDs that already exist in the template, so a template
//! built without error is always complete.

use std::fmt::Display;

use serde::{ser::SerializeMap, Serialize, Serializer};
use serde_json::{json, Value};

use crate::error::{Error, Result};

pub mod resource_types {
    pub const VPC: &str = "AWS::EC2::VPC";
    pub const SUBNET: &str = "AWS::EC2::Subnet";
    pub const ROUTE_TABLE: &str = "AWS::EC2::RouteTable";
    pub const SUBNET_ROUTE_TABLE_ASSOCIATION: &str = "AWS::EC2::SubnetRouteTableAssociation";
    pub const ROUTE: &str = "AWS::EC2::Route";
    pub const INTERNET_GATEWAY: &str = "AWS::EC2::InternetGateway";
    pub const VPC_GATEWAY_ATTACHMENT: &str = "AWS::EC2::VPCGatewayAttachment";
    pub const SECURITY_GROUP: &str = "AWS::EC2::SecurityGroup";
    pub const KEY_PAIR: &str = "AWS::EC2::KeyPair";
    pub const INSTANCE: &str = "AWS::EC2::Instance";
    pub const ROLE: &str = "AWS::IAM::Role";
    pub const POLICY: &str = "AWS::IAM::Policy";
    pub const MANAGED_POLICY: &str = "AWS::IAM::ManagedPolicy";
    pub const INSTANCE_PROFILE: &str = "AWS::IAM::InstanceProfile";
}

const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// Pseudo parameters such as `AWS::Region` are always available to `Ref`
const PSEUDO_PARAMETER_PREFIX: &str = "AWS::";

/// The name of a resource, parameter or output within a template.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LogicalId(String);

impl LogicalId {
    /// Logical IDs may only contain alphanumerics, so `MyFleet-al2-arm-64` becomes `MyFleetAl2Arm64`.
    pub fn from_name(name: &str) -> LogicalId {
        let id = name
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|segment| !segment.is_empty())
            .map(|segment| {
                let mut chars = segment.chars();
                match chars.next() {
                    Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                    None => String::new(),
                }
            })
            .collect();

        LogicalId(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `{"Ref": id}`
    pub fn reference(&self) -> Value {
        json!({ "Ref": self.0 })
    }

    /// `{"Fn::GetAtt": [id, attribute]}`
    pub fn get_att(&self, attribute: &str) -> Value {
        json!({ "Fn::GetAtt": [self.0, attribute] })
    }
}

impl Display for LogicalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// `{"Ref": "AWS::..."}`
pub fn pseudo_parameter(name: &str) -> Value {
    json!({ "Ref": format!("{PSEUDO_PARAMETER_PREFIX}{name}") })
}

/// `{"Fn::Join": ["", parts]}`
pub fn join(parts: Vec<Value>) -> Value {
    json!({ "Fn::Join": ["", parts] })
}

/// `{"Fn::Base64": value}`
pub fn base64(value: impl Into<Value>) -> Value {
    json!({ "Fn::Base64": value.into() })
}

/// The first availability zone of the region the stack is deployed to
pub fn first_availability_zone() -> Value {
    json!({ "Fn::Select": [0, { "Fn::GetAZs": "" }] })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Resource {
    #[serde(rename = "Type")]
    resource_type: &'static str,
    properties: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    depends_on: Vec<LogicalId>,
}

impl Resource {
    pub fn new(resource_type: &'static str, properties: Value) -> Self {
        Self {
            resource_type,
            properties,
            depends_on: vec![],
        }
    }

    /// Add an explicit `DependsOn` edge for ordering that isn't visible through references
    pub fn depends_on(mut self, id: &LogicalId) -> Self {
        if !self.depends_on.contains(id) {
            self.depends_on.push(id.clone());
        }
        self
    }

    pub fn resource_type(&self) -> &'static str {
        self.resource_type
    }

    pub fn properties(&self) -> &Value {
        &self.properties
    }

    pub fn dependencies(&self) -> &[LogicalId] {
        &self.depends_on
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Parameter {
    #[serde(rename = "Type")]
    parameter_type: &'static str,
    default: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

impl Parameter {
    /// A parameter that CloudFormation resolves to an AMI ID from SSM parameter store at deploy time
    pub fn ssm_image_id(parameter_path: &str) -> Self {
        Self {
            parameter_type: "AWS::SSM::Parameter::Value<AWS::EC2::Image::Id>",
            default: parameter_path.to_owned(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn default_value(&self) -> &str {
        &self.default
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Output {
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    value: Value,
}

impl Output {
    pub fn new(value: Value) -> Self {
        Self {
            description: None,
            value,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

#[derive(Debug, Clone)]
pub struct Template {
    description: String,
    parameters: Vec<(LogicalId, Parameter)>,
    resources: Vec<(LogicalId, Resource)>,
    outputs: Vec<(LogicalId, Output)>,
}

impl Template {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            parameters: vec![],
            resources: vec![],
            outputs: vec![],
        }
    }

    fn is_declared(&self, id: &str) -> bool {
        id.starts_with(PSEUDO_PARAMETER_PREFIX)
            || self.resources.iter().any(|(r, _)| r.as_str() == id)
            || self.parameters.iter().any(|(p, _)| p.as_str() == id)
    }

    fn ensure_unique(&self, id: &LogicalId) -> Result<()> {
        let taken = self.resources.iter().any(|(r, _)| r == id)
            || self.parameters.iter().any(|(p, _)| p == id)
            || self.outputs.iter().any(|(o, _)| o == id);

        if taken {
            return Err(Error::Configuration(format!(
                "logical ID {id} is declared more than once"
            )));
        }

        Ok(())
    }

    fn ensure_references_declared<'a>(
        &self,
        id: &LogicalId,
        references: impl IntoIterator<Item = &'a str>,
    ) -> Result<()> {
        for reference in references {
            if !self.is_declared(reference) {
                return Err(Error::DependencyOrder {
                    resource: id.to_string(),
                    missing: reference.to_owned(),
                });
            }
        }

        Ok(())
    }

    pub fn add_parameter(&mut self, id: LogicalId, parameter: Parameter) -> Result<LogicalId> {
        self.ensure_unique(&id)?;
        self.parameters.push((id.clone(), parameter));
        Ok(id)
    }

    pub fn add_resource(&mut self, id: LogicalId, resource: Resource) -> Result<LogicalId> {
        self.ensure_unique(&id)?;

        let mut references = vec![];
        collect_references(&resource.properties, &mut references);
        self.ensure_references_declared(&id, references)?;
        self.ensure_references_declared(&id, resource.depends_on.iter().map(LogicalId::as_str))?;

        tracing::debug!("Declared {} ({})", id, resource.resource_type);
        self.resources.push((id.clone(), resource));
        Ok(id)
    }

    pub fn add_output(&mut self, id: LogicalId, output: Output) -> Result<()> {
        self.ensure_unique(&id)?;

        let mut references = vec![];
        collect_references(&output.value, &mut references);
        self.ensure_references_declared(&id, references)?;

        self.outputs.push((id, output));
        Ok(())
    }

    pub fn resource(&self, id: &LogicalId) -> Option<&Resource> {
        self.resources
            .iter()
            .find_map(|(r, resource)| (r == id).then_some(resource))
    }

    pub fn resources(&self) -> impl Iterator<Item = (&LogicalId, &Resource)> {
        self.resources.iter().map(|(id, resource)| (id, resource))
    }

    pub fn resources_of_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = (&'a LogicalId, &'a Resource)> {
        self.resources()
            .filter(move |(_, resource)| resource.resource_type == resource_type)
    }

    pub fn resource_count(&self, resource_type: &str) -> usize {
        self.resources_of_type(resource_type).count()
    }

    pub fn parameters(&self) -> impl Iterator<Item = (&LogicalId, &Parameter)> {
        self.parameters.iter().map(|(id, parameter)| (id, parameter))
    }

    pub fn output(&self, id: &str) -> Option<&Output> {
        self.outputs
            .iter()
            .find_map(|(o, output)| (o.as_str() == id).then_some(output))
    }

    pub fn outputs(&self) -> impl Iterator<Item = (&LogicalId, &Output)> {
        self.outputs.iter().map(|(id, output)| (id, output))
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Serializes `(id, value)` pairs as a JSON object without reordering them
struct OrderedMap<'a, T>(&'a [(LogicalId, T)]);

impl<T: Serialize> Serialize for OrderedMap<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (id, value) in self.0 {
            map.serialize_entry(id, value)?;
        }
        map.end()
    }
}

impl Serialize for Template {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("AWSTemplateFormatVersion", TEMPLATE_FORMAT_VERSION)?;
        map.serialize_entry("Description", &self.description)?;
        if !self.parameters.is_empty() {
            map.serialize_entry("Parameters", &OrderedMap(&self.parameters))?;
        }
        map.serialize_entry("Resources", &OrderedMap(&self.resources))?;
        if !self.outputs.is_empty() {
            map.serialize_entry("Outputs", &OrderedMap(&self.outputs))?;
        }
        map.end()
    }
}

/// Collect every logical ID targeted by a `Ref` or `Fn::GetAtt` inside `value`
fn collect_references<'a>(value: &'a Value, found: &mut Vec<&'a str>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(target)) = map.get("Ref") {
                found.push(target);
            }
            if let Some(Value::Array(attribute)) = map.get("Fn::GetAtt") {
                if let Some(Value::String(target)) = attribute.first() {
                    found.push(target);
                }
            }
            for nested in map.values() {
                collect_references(nested, found);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_references(item, found);
            }
        }
        _ => {}
    }
}

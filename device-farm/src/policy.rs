use serde::{Serialize, Serializer};
use serde_json::{json, Value};

const POLICY_LANGUAGE_VERSION: &str = "2012-10-17";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Effect {
    Allow,
}

/// What a statement applies to
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyResource {
    /// `*`
    Any,
    Arn(String),
    /// An intrinsic function that resolves to an ARN, e.g. `{"Fn::GetAtt": [role, "Arn"]}`
    Reference(Value),
}

impl PolicyResource {
    pub fn is_wildcard(&self) -> bool {
        matches!(self, PolicyResource::Any)
    }
}

impl Serialize for PolicyResource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PolicyResource::Any => serializer.serialize_str("*"),
            PolicyResource::Arn(arn) => serializer.serialize_str(arn),
            PolicyResource::Reference(value) => value.serialize(serializer),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    effect: Effect,
    action: Vec<&'static str>,
    resource: Vec<PolicyResource>,
}

impl PolicyStatement {
    pub fn allow(actions: &[&'static str], resources: Vec<PolicyResource>) -> Self {
        Self {
            effect: Effect::Allow,
            action: actions.to_vec(),
            resource: resources,
        }
    }

    pub fn effect(&self) -> Effect {
        self.effect
    }

    pub fn actions(&self) -> &[&'static str] {
        &self.action
    }

    pub fn resources(&self) -> &[PolicyResource] {
        &self.resource
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    version: &'static str,
    statement: Vec<PolicyStatement>,
}

impl PolicyDocument {
    pub fn new(statements: Vec<PolicyStatement>) -> Self {
        Self {
            version: POLICY_LANGUAGE_VERSION,
            statement: statements,
        }
    }

    pub fn statements(&self) -> &[PolicyStatement] {
        &self.statement
    }

    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

/// A trust policy that lets a single AWS service assume a role
pub fn service_trust_policy(service_principal: &str) -> Value {
    json!({
        "Version": POLICY_LANGUAGE_VERSION,
        "Statement": [{
            "Effect": "Allow",
            "Principal": { "Service": service_principal },
            "Action": "sts:AssumeRole",
        }],
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{service_trust_policy, PolicyDocument, PolicyResource, PolicyStatement};

    #[test]
    fn document_serializes_to_iam_json() {
        let document = PolicyDocument::new(vec![
            PolicyStatement::allow(&["s3:GetObject"], vec![PolicyResource::Any]),
            PolicyStatement::allow(
                &["iam:GetRole", "iam:PassRole"],
                vec![
                    PolicyResource::Arn("arn:aws:s3:::bucket/*".into()),
                    PolicyResource::Reference(json!({ "Fn::GetAtt": ["Role", "Arn"] })),
                ],
            ),
        ]);

        assert_eq!(
            document.to_value().unwrap(),
            json!({
                "Version": "2012-10-17",
                "Statement": [
                    { "Effect": "Allow", "Action": ["s3:GetObject"], "Resource": ["*"] },
                    {
                        "Effect": "Allow",
                        "Action": ["iam:GetRole", "iam:PassRole"],
                        "Resource": [
                            "arn:aws:s3:::bucket/*",
                            { "Fn::GetAtt": ["Role", "Arn"] }
                        ]
                    }
                ]
            })
        );
    }

    #[test]
    fn trust_policy_names_only_the_service() {
        let policy = service_trust_policy("ec2.amazonaws.com");

        assert_eq!(
            policy["Statement"][0]["Principal"],
            json!({ "Service": "ec2.amazonaws.com" })
        );
        assert_eq!(policy["Statement"].as_array().unwrap().len(), 1);
    }
}

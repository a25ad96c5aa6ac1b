use common::fleet_tag::FleetTag;
use device_farm::{
    bootstrap::InstallRegion,
    images::DeployTimeImages,
    template::{resource_types, Template},
    variant::Role,
    DeviceFarmStack, StackConfig, SynthesizedStack,
};
use serde_json::{json, Value};

fn synthesize(fleet_tag: &str) -> SynthesizedStack {
    let config = StackConfig {
        fleet_tag: FleetTag::new(fleet_tag).unwrap(),
        install_region: InstallRegion::Stack,
    };

    DeviceFarmStack::synthesize(&config, &DeployTimeImages).unwrap()
}

fn type_counts(template: &Template) -> Vec<(&'static str, usize)> {
    [
        resource_types::VPC,
        resource_types::KEY_PAIR,
        resource_types::SECURITY_GROUP,
        resource_types::ROLE,
        resource_types::POLICY,
        resource_types::MANAGED_POLICY,
        resource_types::INSTANCE,
    ]
    .into_iter()
    .map(|resource_type| (resource_type, template.resource_count(resource_type)))
    .collect()
}

#[test]
fn good_stack() {
    let stack = synthesize("MyTestStack");

    assert_eq!(
        type_counts(&stack.template),
        vec![
            ("AWS::EC2::VPC", 1),
            ("AWS::EC2::KeyPair", 1),
            ("AWS::EC2::SecurityGroup", 2),
            ("AWS::IAM::Role", 2),
            ("AWS::IAM::Policy", 1),
            ("AWS::IAM::ManagedPolicy", 1),
            ("AWS::EC2::Instance", 8),
        ]
    );
}

#[test]
fn cardinality_does_not_depend_on_fleet_tag() {
    let default = synthesize(common::fleet_tag::DEFAULT_FLEET_TAG);
    let other = synthesize("another_fleet-2");

    assert_eq!(type_counts(&default.template), type_counts(&other.template));
    assert_eq!(
        default.template.resources().count(),
        other.template.resources().count()
    );
}

#[test]
fn six_linux_and_two_windows_instances_share_two_groups() {
    let stack = synthesize("MyTestStack");
    let rendered: Value =
        serde_json::from_str(&stack.template.to_json_pretty().unwrap()).unwrap();

    let mut groups: Vec<Value> = stack
        .template
        .resources_of_type(resource_types::INSTANCE)
        .map(|(id, _)| rendered["Resources"][id.as_str()]["Properties"]["SecurityGroupIds"].clone())
        .collect();

    for group in &groups {
        assert_eq!(group.as_array().unwrap().len(), 1);
    }

    groups.sort_by_key(|group| group.to_string());
    groups.dedup();
    assert_eq!(groups.len(), 2);

    let linux = stack
        .instances
        .iter()
        .filter(|i| i.variant.role == Role::Linux)
        .count();
    let windows = stack
        .instances
        .iter()
        .filter(|i| i.variant.role == Role::Windows)
        .count();
    assert_eq!((linux, windows), (6, 2));
}

#[test]
fn every_script_registers_with_its_own_thing_name() {
    let stack = synthesize("MyTestStack");

    for instance in &stack.instances {
        let script = instance.bootstrap_script.as_str();

        assert!(script.contains(&format!("--thing-name {} ", instance.name)));
        assert!(script.contains("--thing-group-name MyTestStack "));
        assert!(script.contains("--tes-role-name MyTestStackTokenExchangeRole "));
        assert!(script.contains("--tes-role-alias-name MyTestStackTokenExchangeRoleAlias "));
        assert!(script.contains("--aws-region ${AWS::Region} "));

        match instance.variant.role {
            Role::Windows => assert!(!script.contains("docker")),
            Role::Linux => assert!(script.contains("docker")),
        }
    }
}

#[test]
fn outputs_cover_key_role_and_every_instance() {
    let stack = synthesize("MyTestStack");
    let template = &stack.template;

    for output in ["KeyPairName", "DownloadKeyCommand", "GreengrassCoreDeviceRole"] {
        assert!(template.output(output).is_some(), "missing output {output}");
    }

    for instance in &stack.instances {
        let output = template
            .outputs()
            .find(|(_, output)| *output.value() == instance.public_ip());
        assert!(output.is_some(), "no IP output for {}", instance.name);
    }
}

#[test]
fn installer_iam_clause_is_the_only_scoped_clause() {
    let stack = synthesize("MyTestStack");
    let rendered: Value =
        serde_json::from_str(&stack.template.to_json_pretty().unwrap()).unwrap();

    let installer_policy = &rendered["Resources"]
        [stack.identity.installer_policy.logical_id.as_str()]["Properties"]["PolicyDocument"];
    let statements = installer_policy["Statement"].as_array().unwrap();

    let iam_resources = statements[0]["Resource"].as_array().unwrap();
    assert_eq!(iam_resources.len(), 2);
    assert!(iam_resources.iter().all(|resource| resource.is_object()));

    for statement in &statements[1..] {
        assert_eq!(statement["Resource"], json!(["*"]));
    }
}

#[test]
fn user_data_provisions_into_the_deployment_region() {
    let stack = synthesize("MyTestStack");
    let rendered: Value =
        serde_json::from_str(&stack.template.to_json_pretty().unwrap()).unwrap();

    for instance in &stack.instances {
        let user_data =
            &rendered["Resources"][instance.logical_id.as_str()]["Properties"]["UserData"];
        let parts = user_data["Fn::Base64"]["Fn::Join"][1].as_array().unwrap();

        let regions: Vec<_> = parts.iter().filter(|part| part.is_object()).collect();
        assert_eq!(regions, vec![&json!({ "Ref": "AWS::Region" })]);
        for text in parts.iter().filter_map(Value::as_str) {
            assert!(!text.contains("eu-west-1"));
            assert!(!text.contains("${AWS::Region}"));
        }
    }
}

#[test]
fn pinned_install_region_is_written_into_every_script() {
    let config = StackConfig {
        fleet_tag: FleetTag::new("MyTestStack").unwrap(),
        install_region: InstallRegion::Named("eu-central-1".to_string()),
    };
    let stack = DeviceFarmStack::synthesize(&config, &DeployTimeImages).unwrap();

    for instance in &stack.instances {
        assert!(instance
            .bootstrap_script
            .as_str()
            .contains("--aws-region eu-central-1 "));
        let properties = stack.template.resource(&instance.logical_id).unwrap().properties();
        assert!(!properties["UserData"].to_string().contains("AWS::Region"));
    }
}

/// Actions and the number of resources of each statement, which ignores the ARNs the
/// statements are scoped to
fn statement_shapes(document: &Value) -> Vec<(Value, usize)> {
    document["Statement"]
        .as_array()
        .unwrap()
        .iter()
        .map(|statement| {
            (
                statement["Action"].clone(),
                statement["Resource"].as_array().unwrap().len(),
            )
        })
        .collect()
}

#[test]
fn fleet_tag_changes_every_name_but_no_policy_shape() {
    let first = synthesize("FleetOne");
    let second = synthesize("FleetTwo");

    let first_resources: Vec<_> = first.template.resources().collect();
    let second_resources: Vec<_> = second.template.resources().collect();
    assert_eq!(first_resources.len(), second_resources.len());

    for ((first_id, first_resource), (second_id, second_resource)) in
        first_resources.iter().zip(&second_resources)
    {
        assert_ne!(first_id, second_id);
        assert!(second_id.as_str().starts_with("FleetTwo"), "{second_id}");
        assert_eq!(first_resource.resource_type(), second_resource.resource_type());

        let first_properties = first_resource.properties();
        let second_properties = second_resource.properties();
        for name_property in [
            "RoleName",
            "GroupName",
            "KeyName",
            "ManagedPolicyName",
            "PolicyName",
            "Tags",
        ] {
            let first_name = &first_properties[name_property];
            let second_name = &second_properties[name_property];
            if first_name.is_null() {
                assert!(second_name.is_null());
                continue;
            }

            assert_ne!(first_name, second_name, "{name_property} of {second_id}");
            assert!(first_name.to_string().contains("FleetOne"));
            assert!(second_name.to_string().contains("FleetTwo"));
            assert!(!second_name.to_string().contains("FleetOne"));
        }

        assert_eq!(
            statement_shapes_or_null(&first_properties["PolicyDocument"]),
            statement_shapes_or_null(&second_properties["PolicyDocument"]),
            "PolicyDocument of {second_id}"
        );
        assert_eq!(
            first_properties["AssumeRolePolicyDocument"],
            second_properties["AssumeRolePolicyDocument"]
        );
    }

    let token_exchange_policy = |stack: &SynthesizedStack| {
        stack
            .template
            .resource(&stack.identity.token_exchange_policy.logical_id)
            .unwrap()
            .properties()["PolicyDocument"]
            .clone()
    };
    assert_eq!(token_exchange_policy(&first), token_exchange_policy(&second));
}

fn statement_shapes_or_null(document: &Value) -> Option<Vec<(Value, usize)>> {
    (!document.is_null()).then(|| statement_shapes(document))
}

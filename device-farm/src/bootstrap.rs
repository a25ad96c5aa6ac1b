//! Composes the user data each machine runs on first boot.
//!
//! A script is built by running a fixed pipeline of steps. Each step renders a fragment for
//! the machine's [`Platform`], or nothing if it doesn't apply to that platform.

use std::{borrow::Cow, fmt::Display};

use common::fleet_tag::{FleetTag, ROLE_ALIAS_SUFFIX};
use serde_json::{json, Value};

use crate::{
    error::{Error, Result},
    scripts,
    template::{base64, join, pseudo_parameter},
    variant::{Architecture, OsFamily, Role, VariantDescriptor},
};

/// Stands in for the deployment region in script text until the script becomes user data
const STACK_REGION: &str = "${AWS::Region}";

/// The region the Greengrass installer provisions the core device in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallRegion {
    /// Whichever region the stack is deployed to, resolved by CloudFormation
    Stack,
    Named(String),
}

impl InstallRegion {
    fn as_script_text(&self) -> &str {
        match self {
            InstallRegion::Stack => STACK_REGION,
            InstallRegion::Named(region) => region,
        }
    }
}

/// Runtime values substituted into every bootstrap script
#[derive(Debug, Clone)]
pub struct BootstrapParams {
    pub region: InstallRegion,
    pub fleet_tag: FleetTag,
    pub token_exchange_role_name: String,
    pub role_alias_name: String,
}

impl BootstrapParams {
    pub fn new(
        region: InstallRegion,
        fleet_tag: FleetTag,
        token_exchange_role_name: impl Into<String>,
    ) -> Self {
        let token_exchange_role_name = token_exchange_role_name.into();
        let role_alias_name = format!("{token_exchange_role_name}{ROLE_ALIAS_SUFFIX}");

        Self {
            region,
            fleet_tag,
            token_exchange_role_name,
            role_alias_name,
        }
    }

    fn validate(&self) -> Result<()> {
        if let InstallRegion::Named(region) = &self.region {
            if region.trim().is_empty() {
                return Err(Error::MissingParameter("region"));
            }
        }
        if self.token_exchange_role_name.trim().is_empty() {
            return Err(Error::MissingParameter("token_exchange_role_name"));
        }
        if self.role_alias_name.trim().is_empty() {
            return Err(Error::MissingParameter("role_alias_name"));
        }

        Ok(())
    }
}

/// A complete user data script. Its contents are never parsed again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptBlob(String);

impl ScriptBlob {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// The script as an `Fn::Base64` value, with the deployment region joined in as
    /// `AWS::Region` wherever the script refers to it
    pub fn to_user_data(&self) -> Value {
        let mut parts = vec![];
        for (i, text) in self.0.split(STACK_REGION).enumerate() {
            if i > 0 {
                parts.push(pseudo_parameter("Region"));
            }
            if !text.is_empty() {
                parts.push(json!(text));
            }
        }

        base64(join(parts))
    }
}

impl Display for ScriptBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinuxDistribution {
    AmazonLinux,
    Ubuntu,
}

impl LinuxDistribution {
    /// The user created by the AMI that an operator logs in as
    fn login_user(self) -> &'static str {
        match self {
            LinuxDistribution::AmazonLinux => "ec2-user",
            LinuxDistribution::Ubuntu => "ubuntu",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Platform {
    Linux(LinuxDistribution),
    Windows,
}

impl Platform {
    fn for_variant(variant: &VariantDescriptor) -> Result<Platform> {
        match (variant.os_family, variant.role, variant.architecture) {
            (OsFamily::AmazonLinux, Role::Linux, _) => {
                Ok(Platform::Linux(LinuxDistribution::AmazonLinux))
            }
            (OsFamily::Ubuntu, Role::Linux, _) => Ok(Platform::Linux(LinuxDistribution::Ubuntu)),
            (OsFamily::Windows, Role::Windows, Architecture::X86_64) => Ok(Platform::Windows),
            (os_family, role, architecture) => Err(Error::Configuration(format!(
                "no bootstrap script for {}: {os_family} with the {role} role on {architecture}",
                variant.name
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Step {
    BaseInstall,
    GreengrassInstall,
    InstallerOptions,
    DefaultUser,
    DockerInstall,
    Epilogue,
}

const PIPELINE: [Step; 6] = [
    Step::BaseInstall,
    Step::GreengrassInstall,
    Step::InstallerOptions,
    Step::DefaultUser,
    Step::DockerInstall,
    Step::Epilogue,
];

impl Step {
    /// Installer options and the default user continue the `java` command line
    fn separator(self) -> &'static str {
        match self {
            Step::InstallerOptions | Step::DefaultUser => " ",
            _ => "\n",
        }
    }

    fn render(
        self,
        platform: Platform,
        thing_name: &str,
        params: &BootstrapParams,
    ) -> Option<Cow<'static, str>> {
        let fragment: Cow<'static, str> = match (self, platform) {
            (Step::BaseInstall, Platform::Linux(LinuxDistribution::AmazonLinux)) => {
                scripts::BASE_INSTALL_AMAZON_LINUX.into()
            }
            (Step::BaseInstall, Platform::Linux(LinuxDistribution::Ubuntu)) => {
                scripts::BASE_INSTALL_UBUNTU.into()
            }
            (Step::BaseInstall, Platform::Windows) => scripts::BASE_INSTALL_WINDOWS.into(),
            (Step::GreengrassInstall, Platform::Linux(_)) => {
                scripts::GREENGRASS_INSTALL_LINUX.into()
            }
            (Step::GreengrassInstall, Platform::Windows) => {
                scripts::GREENGRASS_INSTALL_WINDOWS.into()
            }
            (Step::InstallerOptions, _) => scripts::installer_options(
                params.region.as_script_text(),
                thing_name,
                &params.fleet_tag,
                &params.fleet_tag,
                &params.token_exchange_role_name,
                &params.role_alias_name,
            )
            .into(),
            (Step::DefaultUser, Platform::Linux(_)) => scripts::linux_default_user().into(),
            (Step::DefaultUser, Platform::Windows) => scripts::windows_default_user().into(),
            (Step::DockerInstall, Platform::Linux(distribution)) => {
                let install = match distribution {
                    LinuxDistribution::AmazonLinux => scripts::DOCKER_INSTALL_AMAZON_LINUX,
                    LinuxDistribution::Ubuntu => scripts::DOCKER_INSTALL_UBUNTU,
                };
                let membership = scripts::docker_group_membership(distribution.login_user());
                format!("{install}\n{membership}").into()
            }
            (Step::DockerInstall, Platform::Windows) => return None,
            (Step::Epilogue, Platform::Windows) => scripts::WINDOWS_EPILOGUE.into(),
            (Step::Epilogue, Platform::Linux(_)) => return None,
        };

        Some(fragment)
    }
}

/// Build the first boot script for one machine of the fleet.
pub fn compose(variant: &VariantDescriptor, params: &BootstrapParams) -> Result<ScriptBlob> {
    params.validate()?;
    let platform = Platform::for_variant(variant)?;
    let thing_name = params.fleet_tag.instance_name(variant.name);

    let mut script = String::new();
    for step in PIPELINE {
        let Some(fragment) = step.render(platform, &thing_name, params) else {
            continue;
        };

        if !script.is_empty() {
            script.push_str(step.separator());
        }
        script.push_str(&fragment);
    }

    tracing::debug!(
        "Composed {} byte bootstrap script for {}",
        script.len(),
        thing_name
    );

    Ok(ScriptBlob(script))
}

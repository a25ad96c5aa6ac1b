use std::{fmt::Display, ops::Deref, str::FromStr};

use thiserror::Error;

/// The name of the test fleet when none is given on the command line
pub const DEFAULT_FLEET_TAG: &str = "GreengrassEC2DeviceFarm";

/// IAM role names are capped at 64 characters and the longest suffix we append
/// is `TokenExchangeRoleAccess`, so leave plenty of headroom.
const MAX_FLEET_TAG_LEN: usize = 32;

/// Appended to the fleet tag to name the role Greengrass core devices assume
pub const TOKEN_EXCHANGE_ROLE_SUFFIX: &str = "TokenExchangeRole";

/// Appended to the token exchange role name to name its IoT role alias
pub const ROLE_ALIAS_SUFFIX: &str = "Alias";

/// The prefix used to name every resource in a device farm, and the name of the
/// thing group and IoT policy the Greengrass installer creates on first boot.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct FleetTag(String);

impl FleetTag {
    pub fn new(tag: &str) -> Result<FleetTag, FleetTagError> {
        if tag.is_empty() {
            return Err(FleetTagError::Empty);
        }

        if tag.len() > MAX_FLEET_TAG_LEN {
            return Err(FleetTagError::TooLong(tag.into(), MAX_FLEET_TAG_LEN));
        }

        // Thing group names only allow a-zA-Z0-9_- plus ':', but ':' isn't valid in IAM names
        if tag
            .chars()
            .any(|c| !c.is_ascii_alphanumeric() && c != '_' && c != '-')
        {
            return Err(FleetTagError::IllegalCharacter(tag.into()));
        }

        Ok(FleetTag(tag.to_owned()))
    }

    /// Name a resource belonging to this fleet, e.g. `MyFleet` + `LinuxSG` => `MyFleetLinuxSG`
    pub fn resource_name(&self, suffix: &str) -> String {
        format!("{}{}", self.0, suffix)
    }

    pub fn token_exchange_role_name(&self) -> String {
        self.resource_name(TOKEN_EXCHANGE_ROLE_SUFFIX)
    }

    /// The role alias the Greengrass installer creates for the token exchange role
    pub fn role_alias_name(&self) -> String {
        format!("{}{ROLE_ALIAS_SUFFIX}", self.token_exchange_role_name())
    }

    /// Name an instance belonging to this fleet, e.g. `MyFleet` + `al2-arm-64` => `MyFleet-al2-arm-64`
    pub fn instance_name(&self, variant_name: &str) -> String {
        format!("{}-{}", self.0, variant_name)
    }
}

impl Default for FleetTag {
    fn default() -> Self {
        FleetTag(DEFAULT_FLEET_TAG.to_owned())
    }
}

impl Display for FleetTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl Deref for FleetTag {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.0.deref()
    }
}

impl AsRef<str> for FleetTag {
    fn as_ref(&self) -> &str {
        self.deref()
    }
}

impl FromStr for FleetTag {
    type Err = FleetTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FleetTag::new(s)
    }
}

#[derive(Error, Debug)]
pub enum FleetTagError {
    #[error("fleet tag must not be empty")]
    Empty,
    #[error("{0} is longer than {1} characters")]
    TooLong(String, usize),
    #[error("{0} contains illegal characters. Only a-zA-Z0-9_ and - are allowed")]
    IllegalCharacter(String),
}

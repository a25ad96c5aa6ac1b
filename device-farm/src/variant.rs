use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum OsFamily {
    AmazonLinux,
    Ubuntu,
    Windows,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Architecture {
    #[strum(serialize = "x86_64")]
    X86_64,
    #[strum(serialize = "arm64")]
    Arm64,
}

/// Whether a machine is managed as a Linux or a Windows host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Role {
    Linux,
    Windows,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum InstanceClass {
    T3,
    T4g,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum InstanceSize {
    Micro,
    Small,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceType {
    pub class: InstanceClass,
    pub size: InstanceSize,
}

impl std::fmt::Display for InstanceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.class, self.size)
    }
}

/// One member of the fleet: an operating system release on a CPU architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantDescriptor {
    pub name: &'static str,
    pub os_family: OsFamily,
    /// Release as used in image lookups, e.g. `2022` or `22.04`
    pub release: &'static str,
    pub architecture: Architecture,
    pub role: Role,
}

impl VariantDescriptor {
    const fn new(
        name: &'static str,
        os_family: OsFamily,
        release: &'static str,
        architecture: Architecture,
        role: Role,
    ) -> Self {
        Self {
            name,
            os_family,
            release,
            architecture,
            role,
        }
    }

    /// The smallest burstable instance for the architecture. Windows needs more memory
    /// than a micro instance offers so it moves up a size.
    pub fn instance_type(&self) -> InstanceType {
        let class = match self.architecture {
            Architecture::Arm64 => InstanceClass::T4g,
            Architecture::X86_64 => InstanceClass::T3,
        };
        let size = match self.role {
            Role::Windows => InstanceSize::Small,
            Role::Linux => InstanceSize::Micro,
        };

        InstanceType { class, size }
    }
}

/// Every machine in the device farm. Windows comes first because it's slowest to come up.
pub const FLEET_MATRIX: [VariantDescriptor; 8] = [
    VariantDescriptor::new(
        "windows-server-2022",
        OsFamily::Windows,
        "2022",
        Architecture::X86_64,
        Role::Windows,
    ),
    VariantDescriptor::new(
        "windows-server-2019",
        OsFamily::Windows,
        "2019",
        Architecture::X86_64,
        Role::Windows,
    ),
    VariantDescriptor::new(
        "al2-x86-64",
        OsFamily::AmazonLinux,
        "2",
        Architecture::X86_64,
        Role::Linux,
    ),
    VariantDescriptor::new(
        "al2-arm-64",
        OsFamily::AmazonLinux,
        "2",
        Architecture::Arm64,
        Role::Linux,
    ),
    VariantDescriptor::new(
        "ubuntu-22-04-x86-64",
        OsFamily::Ubuntu,
        "22.04",
        Architecture::X86_64,
        Role::Linux,
    ),
    VariantDescriptor::new(
        "ubuntu-22-04-arm-64",
        OsFamily::Ubuntu,
        "22.04",
        Architecture::Arm64,
        Role::Linux,
    ),
    VariantDescriptor::new(
        "ubuntu-20-04-x86-64",
        OsFamily::Ubuntu,
        "20.04",
        Architecture::X86_64,
        Role::Linux,
    ),
    VariantDescriptor::new(
        "ubuntu-20-04-arm-64",
        OsFamily::Ubuntu,
        "20.04",
        Architecture::Arm64,
        Role::Linux,
    ),
];

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::{Architecture, OsFamily, Role, FLEET_MATRIX};

    #[test]
    fn matrix_has_unique_names() {
        let names: HashSet<_> = FLEET_MATRIX.iter().map(|v| v.name).collect();
        assert_eq!(names.len(), 8);
    }

    #[test]
    fn windows_variants_come_first() {
        assert!(FLEET_MATRIX[..2]
            .iter()
            .all(|v| v.os_family == OsFamily::Windows && v.role == Role::Windows));
        assert!(FLEET_MATRIX[2..]
            .iter()
            .all(|v| v.os_family != OsFamily::Windows && v.role == Role::Linux));
    }

    #[test]
    fn instance_sizing() {
        let sizes: Vec<(&str, String)> = FLEET_MATRIX
            .iter()
            .map(|v| (v.name, v.instance_type().to_string()))
            .collect();

        assert_eq!(
            sizes,
            vec![
                ("windows-server-2022", "t3.small".to_string()),
                ("windows-server-2019", "t3.small".to_string()),
                ("al2-x86-64", "t3.micro".to_string()),
                ("al2-arm-64", "t4g.micro".to_string()),
                ("ubuntu-22-04-x86-64", "t3.micro".to_string()),
                ("ubuntu-22-04-arm-64", "t4g.micro".to_string()),
                ("ubuntu-20-04-x86-64", "t3.micro".to_string()),
                ("ubuntu-20-04-arm-64", "t4g.micro".to_string()),
            ]
        );
    }

    #[test]
    fn architectures_display_as_image_names() {
        assert_eq!(Architecture::X86_64.to_string(), "x86_64");
        assert_eq!(Architecture::Arm64.to_string(), "arm64");
    }
}

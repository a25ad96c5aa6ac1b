//! Snippets that make up EC2 user data for the device farm.

/// Greengrass nucleus release downloaded by every machine. A macro so that the install
/// snippets can be assembled with `concat!`.
macro_rules! nucleus_download_url {
    () => {
        "https://d2s8p88vqu9w66.cloudfront.net/releases/greengrass-nucleus-latest.zip"
    };
}

pub const NUCLEUS_DOWNLOAD_URL: &str = nucleus_download_url!();

/// The user Greengrass components run as unless a deployment says otherwise
pub const COMPONENT_USER: &str = "ggc_user";

pub const COMPONENT_GROUP: &str = "ggc_group";

pub const BASE_INSTALL_AMAZON_LINUX: &str = "#!/bin/bash
yum update -y
yum install -y java
# Install tools needed to build wheels for some components (like Device Defender)
yum install -y gcc python3-devel
echo \"root ALL=(ALL:ALL) ALL\" > /etc/sudoers.d/gg-root-runas-all";

pub const BASE_INSTALL_UBUNTU: &str = "#!/bin/bash
apt update
apt install -y default-jre unzip python3-pip python3-venv";

// The component user's password only lives in this PowerShell session. Greengrass reads the
// credentials back from the LocalSystem credential manager, which is why psexec is needed.
pub const BASE_INSTALL_WINDOWS: &str = r#"<powershell>
cd ~
iex ((New-Object System.Net.WebClient).DownloadString('https://chocolatey.org/install.ps1'))
choco install -y python3 --version=3.9.0
choco install -y awscli
choco install -y openjdk --version=19.0
$ENV:PATH="$ENV:PATH;C:\Python39;C:\Program Files\Amazon\AWSCLIV2;C:\Program Files\OpenJDK\jdk-19\bin"
$env:PASSWORD = -join ((48..57) + (65..90) + (97..122) | Get-Random -Count 12 | % {[char]$_})
net user /add ggc_user $env:PASSWORD
wmic UserAccount where "Name='ggc_user'" set PasswordExpires=False
choco install -y psexec
psexec /accepteula -s cmd /c cmdkey /generic:ggc_user /user:ggc_user /pass:$env:PASSWORD
choco uninstall -y psexec"#;

pub const GREENGRASS_INSTALL_LINUX: &str = concat!(
    "curl -s ",
    nucleus_download_url!(),
    " > greengrass-nucleus-latest.zip
unzip greengrass-nucleus-latest.zip -d GreengrassInstaller
java -Droot=\"/greengrass/v2\" -Dlog.store=FILE"
);

pub const GREENGRASS_INSTALL_WINDOWS: &str = concat!(
    r#"Invoke-WebRequest -UseBasicParsing ""#,
    nucleus_download_url!(),
    r#"" -o greengrass-nucleus-latest.zip
mkdir GreengrassInstaller
tar -xf greengrass-nucleus-latest.zip -C GreengrassInstaller
java -Droot="C:\greengrass\v2" "-Dlog.store=FILE""#
);

pub const WINDOWS_EPILOGUE: &str = "</powershell>";

pub const DOCKER_INSTALL_AMAZON_LINUX: &str = "\
amazon-linux-extras install docker
service docker start
systemctl enable docker
curl -L https://github.com/docker/compose/releases/latest/download/docker-compose-$(uname -s)-$(uname -m) -o /usr/local/bin/docker-compose
chmod +x /usr/local/bin/docker-compose";

pub const DOCKER_INSTALL_UBUNTU: &str = "\
apt install -y ca-certificates curl gnupg lsb-release
mkdir -p /etc/apt/keyrings
curl -fsSL https://download.docker.com/linux/ubuntu/gpg | sudo gpg --dearmor -o /etc/apt/keyrings/docker.gpg
echo \"deb [arch=$(dpkg --print-architecture) signed-by=/etc/apt/keyrings/docker.gpg] https://download.docker.com/linux/ubuntu \
$(lsb_release -cs) stable\" | sudo tee /etc/apt/sources.list.d/docker.list > /dev/null
apt update
apt install -y docker-ce docker-ce-cli containerd.io docker-compose-plugin
curl -fL https://raw.githubusercontent.com/docker/compose-switch/master/install_on_linux.sh | sh";

/// Arguments passed to the Greengrass installer jar
pub fn installer_options(
    region: &str,
    thing_name: &str,
    thing_group_name: &str,
    thing_policy_name: &str,
    tes_role_name: &str,
    tes_role_alias_name: &str,
) -> String {
    format!(
        "-jar ./GreengrassInstaller/lib/Greengrass.jar \
        --aws-region {region} --thing-name {thing_name} --thing-group-name {thing_group_name} \
        --thing-policy-name {thing_policy_name} --tes-role-name {tes_role_name} \
        --tes-role-alias-name {tes_role_alias_name} \
        --provision true --setup-system-service true --deploy-dev-tools true"
    )
}

pub fn linux_default_user() -> String {
    format!("--component-default-user {COMPONENT_USER}:{COMPONENT_GROUP}")
}

pub fn windows_default_user() -> String {
    format!("--component-default-user {COMPONENT_USER}")
}

/// Let both the distribution's login user and the component user talk to the Docker daemon
pub fn docker_group_membership(login_user: &str) -> String {
    format!(
        "usermod -aG docker {login_user}\n\
        usermod -aG docker {COMPONENT_USER}\n\
        newgrp docker"
    )
}

use std::fmt::Display;

use aws_config::SdkConfig;
use aws_sdk_greengrassv2::{types::DeploymentHistoryFilter, Client as GreengrassClient};
use aws_sdk_iot::{types::CertificateStatus, Client as IotClient};
use common::fleet_tag::FleetTag;

/// Certificate principals are ARNs of the form `arn:aws:iot:<region>:<account>:cert/<id>`
const CERTIFICATE_PRINCIPAL_MARKER: &str = "cert/";

pub fn certificate_id_from_principal(principal: &str) -> Option<&str> {
    principal
        .rsplit_once(CERTIFICATE_PRINCIPAL_MARKER)
        .map(|(_, certificate_id)| certificate_id)
        .filter(|certificate_id| !certificate_id.is_empty())
}

/// The installer is given the fleet tag as the thing policy name. Only that exact name is
/// removed: other fleets in the account may use names that contain this tag.
pub fn is_fleet_policy(policy_name: &str, fleet_tag: &FleetTag) -> bool {
    policy_name == fleet_tag.as_ref()
}

/// The installer is given the fleet's role alias name, nothing else is removed
pub fn is_fleet_role_alias(role_alias: &str, fleet_tag: &FleetTag) -> bool {
    role_alias == fleet_tag.role_alias_name()
}

fn next_page(token: Option<&str>) -> Option<String> {
    token.filter(|token| !token.is_empty()).map(str::to_owned)
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    pub policies: usize,
    pub certificates: usize,
    pub core_devices: usize,
    pub role_aliases: usize,
    pub deployments: usize,
}

impl Display for CleanupReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Removed {} policies, {} certificates, {} core devices, {} role aliases and {} deployments",
            self.policies, self.certificates, self.core_devices, self.role_aliases, self.deployments
        )
    }
}

pub struct Cleanup {
    iot: IotClient,
    greengrass: GreengrassClient,
    fleet_tag: FleetTag,
    dry_run: bool,
}

impl Cleanup {
    pub fn new(sdk_config: &SdkConfig, fleet_tag: FleetTag, dry_run: bool) -> Self {
        Self {
            iot: IotClient::new(sdk_config),
            greengrass: GreengrassClient::new(sdk_config),
            fleet_tag,
            dry_run,
        }
    }

    /// Remove everything in dependency order. The first failing call stops the run, so it
    /// is safe to run again once the cause is fixed.
    pub async fn run(&self) -> anyhow::Result<CleanupReport> {
        if self.dry_run {
            tracing::info!("Dry run, nothing will be removed");
        }

        let mut report = CleanupReport {
            policies: self.remove_policies().await?,
            ..Default::default()
        };

        let thing_group_arn = self.thing_group_arn().await?;

        let (core_devices, certificates) = self.remove_core_devices(&thing_group_arn).await?;
        report.core_devices = core_devices;
        report.certificates = certificates;

        tracing::info!("Deleting thing group {}", self.fleet_tag);
        if !self.dry_run {
            self.iot
                .delete_thing_group()
                .thing_group_name(self.fleet_tag.as_ref())
                .send()
                .await?;
        }

        report.role_aliases = self.remove_role_aliases().await?;
        report.deployments = self.remove_deployments(&thing_group_arn).await?;

        Ok(report)
    }

    async fn list_policies(&self) -> anyhow::Result<Vec<String>> {
        let mut policies = vec![];
        let mut marker = None;

        loop {
            let output = self.iot.list_policies().set_marker(marker).send().await?;
            policies.extend(
                output
                    .policies()
                    .iter()
                    .filter_map(|policy| policy.policy_name())
                    .map(str::to_owned),
            );

            marker = next_page(output.next_marker());
            if marker.is_none() {
                return Ok(policies);
            }
        }
    }

    async fn list_policy_targets(&self, policy_name: &str) -> anyhow::Result<Vec<String>> {
        let mut targets = vec![];
        let mut marker = None;

        loop {
            let output = self
                .iot
                .list_targets_for_policy()
                .policy_name(policy_name)
                .set_marker(marker)
                .send()
                .await?;
            targets.extend(output.targets().iter().cloned());

            marker = next_page(output.next_marker());
            if marker.is_none() {
                return Ok(targets);
            }
        }
    }

    async fn remove_policies(&self) -> anyhow::Result<usize> {
        tracing::info!("Getting IoT policies in the account");
        let policies = self.list_policies().await?;

        let mut removed = 0;
        for policy_name in policies
            .iter()
            .filter(|policy_name| is_fleet_policy(policy_name, &self.fleet_tag))
        {
            for target in self.list_policy_targets(policy_name).await? {
                tracing::info!("Detaching policy {} from {}", policy_name, target);
                if !self.dry_run {
                    self.iot
                        .detach_policy()
                        .policy_name(policy_name)
                        .target(target)
                        .send()
                        .await?;
                }
            }

            tracing::info!("Deleting IoT policy {}", policy_name);
            if !self.dry_run {
                self.iot
                    .delete_policy()
                    .policy_name(policy_name)
                    .send()
                    .await?;
            }
            removed += 1;
        }

        Ok(removed)
    }

    async fn thing_group_arn(&self) -> anyhow::Result<String> {
        tracing::info!("Getting thing group {}", self.fleet_tag);
        let output = self
            .iot
            .describe_thing_group()
            .thing_group_name(self.fleet_tag.as_ref())
            .send()
            .await?;

        output
            .thing_group_arn
            .ok_or_else(|| anyhow::anyhow!("Thing group {} has no ARN", self.fleet_tag))
    }

    async fn list_core_devices(&self, thing_group_arn: &str) -> anyhow::Result<Vec<String>> {
        let mut core_devices = vec![];
        let mut next_token = None;

        loop {
            let output = self
                .greengrass
                .list_core_devices()
                .thing_group_arn(thing_group_arn)
                .set_next_token(next_token)
                .send()
                .await?;
            core_devices.extend(
                output
                    .core_devices()
                    .iter()
                    .filter_map(|core_device| core_device.core_device_thing_name())
                    .map(str::to_owned),
            );

            next_token = next_page(output.next_token());
            if next_token.is_none() {
                return Ok(core_devices);
            }
        }
    }

    async fn list_thing_principals(&self, thing_name: &str) -> anyhow::Result<Vec<String>> {
        let mut principals = vec![];
        let mut next_token = None;

        loop {
            let output = self
                .iot
                .list_thing_principals()
                .thing_name(thing_name)
                .set_next_token(next_token)
                .send()
                .await?;
            principals.extend(output.principals().iter().cloned());

            next_token = next_page(output.next_token());
            if next_token.is_none() {
                return Ok(principals);
            }
        }
    }

    async fn remove_certificate(&self, certificate_id: &str) -> anyhow::Result<()> {
        tracing::info!("Deactivating certificate {}", certificate_id);
        if !self.dry_run {
            self.iot
                .update_certificate()
                .certificate_id(certificate_id)
                .new_status(CertificateStatus::Inactive)
                .send()
                .await?;
        }

        tracing::info!("Deleting certificate {}", certificate_id);
        if !self.dry_run {
            self.iot
                .delete_certificate()
                .certificate_id(certificate_id)
                .send()
                .await?;
        }

        Ok(())
    }

    /// Returns the number of core devices and certificates removed
    async fn remove_core_devices(&self, thing_group_arn: &str) -> anyhow::Result<(usize, usize)> {
        tracing::info!("Getting core devices in the thing group");
        let core_devices = self.list_core_devices(thing_group_arn).await?;

        let mut certificates = 0;
        for thing_name in &core_devices {
            for principal in self.list_thing_principals(thing_name).await? {
                tracing::info!("Detaching principal {} from thing {}", principal, thing_name);
                if !self.dry_run {
                    self.iot
                        .detach_thing_principal()
                        .thing_name(thing_name)
                        .principal(&principal)
                        .send()
                        .await?;
                }

                if let Some(certificate_id) = certificate_id_from_principal(&principal) {
                    self.remove_certificate(certificate_id).await?;
                    certificates += 1;
                }
            }

            tracing::info!("Deleting core device and thing {}", thing_name);
            if !self.dry_run {
                self.greengrass
                    .delete_core_device()
                    .core_device_thing_name(thing_name)
                    .send()
                    .await?;
                self.iot.delete_thing().thing_name(thing_name).send().await?;
            }
        }

        Ok((core_devices.len(), certificates))
    }

    async fn list_role_aliases(&self) -> anyhow::Result<Vec<String>> {
        let mut role_aliases = vec![];
        let mut marker = None;

        loop {
            let output = self
                .iot
                .list_role_aliases()
                .set_marker(marker)
                .send()
                .await?;
            role_aliases.extend(output.role_aliases().iter().cloned());

            marker = next_page(output.next_marker());
            if marker.is_none() {
                return Ok(role_aliases);
            }
        }
    }

    async fn remove_role_aliases(&self) -> anyhow::Result<usize> {
        tracing::info!("Getting role aliases in the account");
        let role_aliases = self.list_role_aliases().await?;

        let mut removed = 0;
        for role_alias in role_aliases
            .iter()
            .filter(|role_alias| is_fleet_role_alias(role_alias, &self.fleet_tag))
        {
            tracing::info!("Deleting role alias {}", role_alias);
            if !self.dry_run {
                self.iot
                    .delete_role_alias()
                    .role_alias(role_alias)
                    .send()
                    .await?;
            }
            removed += 1;
        }

        Ok(removed)
    }

    /// Returns `(deployment_id, deployment_name)` for every deployment that ever targeted
    /// the thing group
    async fn list_deployments(
        &self,
        thing_group_arn: &str,
    ) -> anyhow::Result<Vec<(String, String)>> {
        let mut deployments = vec![];
        let mut next_token = None;

        loop {
            let output = self
                .greengrass
                .list_deployments()
                .target_arn(thing_group_arn)
                .history_filter(DeploymentHistoryFilter::All)
                .set_next_token(next_token)
                .send()
                .await?;
            deployments.extend(output.deployments().iter().filter_map(|deployment| {
                let deployment_id = deployment.deployment_id()?.to_owned();
                let deployment_name = deployment.deployment_name().unwrap_or_default().to_owned();
                Some((deployment_id, deployment_name))
            }));

            next_token = next_page(output.next_token());
            if next_token.is_none() {
                return Ok(deployments);
            }
        }
    }

    async fn remove_deployments(&self, thing_group_arn: &str) -> anyhow::Result<usize> {
        tracing::info!("Getting Greengrass deployments for thing group {}", self.fleet_tag);
        let deployments = self.list_deployments(thing_group_arn).await?;

        for (deployment_id, deployment_name) in &deployments {
            tracing::info!(
                "Cancelling and deleting {} for \"{}\"",
                deployment_id,
                deployment_name
            );
            if !self.dry_run {
                self.greengrass
                    .cancel_deployment()
                    .deployment_id(deployment_id)
                    .send()
                    .await?;
                self.greengrass
                    .delete_deployment()
                    .deployment_id(deployment_id)
                    .send()
                    .await?;
            }
        }

        Ok(deployments.len())
    }
}

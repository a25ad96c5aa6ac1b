use aws_config::{default_provider::credentials::DefaultCredentialsChain, Region, SdkConfig};

use crate::clap::AwsConfig;

/// Load the SDK configuration every AWS client in the workspace is built from.
///
/// Credentials come from the default chain (environment, profile files, then instance
/// metadata), starting from the named profile when one is given.
pub async fn load_sdk_config(aws_config: &AwsConfig) -> SdkConfig {
    let region = Region::new(aws_config.region.clone());

    let mut credentials = DefaultCredentialsChain::builder().region(region.clone());
    if let Some(profile) = &aws_config.profile {
        credentials = credentials.profile_name(profile);
    }

    aws_config::from_env()
        .region(region)
        .credentials_provider(credentials.build().await)
        .load()
        .await
}

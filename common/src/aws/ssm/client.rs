use aws_sdk_ssm::Client;
use thiserror::Error;

use crate::{aws::sdk_config::load_sdk_config, clap::AwsConfig};

/// `GetParameters` accepts at most this many names per call
const MAX_PARAMETERS_PER_REQUEST: usize = 10;

#[derive(Error, Debug)]
pub enum SsmError {
    #[error("Parameter not found: {0}")]
    ParameterNotFound(String),
    #[error("Parameter is empty: {0}")]
    ParameterEmptyValue(String),
}

#[derive(Clone)]
pub struct SsmClient {
    inner: Client,
}

impl SsmClient {
    pub async fn new(aws_config: &AwsConfig) -> SsmClient {
        let sdk_config = load_sdk_config(aws_config).await;

        SsmClient {
            inner: Client::new(&sdk_config),
        }
    }

    /// Fetch several parameters, returning `(name, value)` pairs in the order they were requested.
    ///
    /// Fails if any of the parameters does not exist.
    pub async fn get_parameters(
        &self,
        parameters: &[String],
    ) -> anyhow::Result<Vec<(String, String)>> {
        let mut values = Vec::with_capacity(parameters.len());

        for chunk in parameters.chunks(MAX_PARAMETERS_PER_REQUEST) {
            let output = self
                .inner
                .get_parameters()
                .set_names(Some(chunk.to_vec()))
                .send()
                .await?;

            if let Some(invalid) = output.invalid_parameters.and_then(|p| p.into_iter().next()) {
                return Err(SsmError::ParameterNotFound(invalid).into());
            }

            let fetched = output.parameters.unwrap_or_default();

            for name in chunk {
                let Some(parameter) = fetched.iter().find(|p| p.name() == Some(name.as_str()))
                else {
                    return Err(SsmError::ParameterNotFound(name.clone()).into());
                };
                let Some(value) = parameter.value() else {
                    return Err(SsmError::ParameterEmptyValue(name.clone()).into());
                };

                tracing::debug!("Resolved {} to {}", name, value);
                values.push((name.clone(), value.to_owned()));
            }
        }

        Ok(values)
    }
}

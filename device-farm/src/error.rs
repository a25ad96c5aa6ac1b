use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("{resource} references {missing} which has not been declared yet")]
    DependencyOrder { resource: String, missing: String },
    #[error("external service failure: {0:#}")]
    ExternalService(anyhow::Error),
    #[error("failed to render template")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

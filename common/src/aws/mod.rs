pub mod sdk_config;
pub mod ssm;

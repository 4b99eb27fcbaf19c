use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    /// Every bound `Settings::validate` found violated, not just the first
    /// (§4.11/§4.14).
    #[error("{count} invalid setting(s): {joined}", count = .0.len(), joined = join_violations(.0))]
    InvalidConfig(Vec<ConfigError>),
}

fn join_violations(violations: &[ConfigError]) -> String {
    violations.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

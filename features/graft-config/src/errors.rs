/// Errors when trying to assemble a resolver config
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A JSON layer could not be parsed
    #[error("Config layer '{layer}' could not be parsed: {message}")]
    Malformed { layer: String, message: String },
    /// An environment variable holds a value of the wrong shape
    #[error("Environment variable '{key}' has an invalid value '{value}'")]
    InvalidValue { key: String, value: String },
}

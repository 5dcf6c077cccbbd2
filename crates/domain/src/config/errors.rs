#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read config file {0}: {1}")]
    FileRead(String, String),

    #[error("Invalid TOML: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

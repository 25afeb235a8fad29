use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocktaskError {
    #[error("Unrecognized platform for '{name}': {}", describe_declared(.declared))]
    UnrecognizedPlatform {
        name: String,
        declared: Option<String>,
    },
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Task '{0}' not found")]
    TaskNotFound(String),
    #[error("Debug configuration '{0}' not found")]
    DebugConfigurationNotFound(String),
    #[error("Task '{0}' already exists, pass --overwrite to replace it")]
    DuplicateLabel(String),
    #[error("Resolution of '{0}' was cancelled")]
    Cancelled(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
}

fn describe_declared(declared: &Option<String>) -> String {
    match declared {
        Some(tag) => format!("platform '{}' is not supported", tag),
        None => "no platform declared and it could not be inferred from the runtime options"
            .to_string(),
    }
}

impl From<toml::de::Error> for DocktaskError {
    fn from(err: toml::de::Error) -> Self {
        DocktaskError::Parse(err.to_string())
    }
}

impl From<toml::ser::Error> for DocktaskError {
    fn from(err: toml::ser::Error) -> Self {
        DocktaskError::Parse(err.to_string())
    }
}

impl From<serde_json::Error> for DocktaskError {
    fn from(err: serde_json::Error) -> Self {
        DocktaskError::Parse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DocktaskError>;

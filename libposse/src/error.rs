//! Error types for posse

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PosseError>;

#[derive(Error, Debug)]
pub enum PosseError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Platform error: {0}")]
    Publish(#[from] PublishError),

    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    #[error("Front matter error: {0}")]
    Format(#[from] FormatError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl PosseError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            PosseError::InvalidInput(_) => 3,
            PosseError::Publish(PublishError::Authentication(_)) => 2,
            PosseError::Publish(PublishError::NotConfigured(_)) => 2,
            PosseError::Config(ConfigError::NoCredentials) => 2,
            PosseError::Publish(_) => 1,
            PosseError::Config(_) => 1,
            PosseError::Scan(_) => 1,
            PosseError::Format(_) => 1,
            PosseError::Io(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("No credentials found for Bluesky or Mastodon")]
    NoCredentials,

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Failure to split or decode a post's front matter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormatError {
    #[error("no front matter delimiter (expected '+++' or '---' on the first line)")]
    MissingDelimiter,

    #[error("front matter delimiter found on line {0}, content before it is not supported")]
    DelimiterNotFirst(usize),

    #[error("front matter block opened with '{0}' is never closed")]
    Unclosed(&'static str),

    #[error("invalid TOML front matter: {0}")]
    Toml(String),

    #[error("invalid YAML front matter: {0}")]
    Yaml(String),

    #[error("front matter is not a key/value mapping")]
    NotAMapping,
}

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("content directory not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: {source}", path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: FormatError,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PublishError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Content validation failed: {0}")]
    Validation(String),

    #[error("Posting failed: {0}")]
    Posting(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("No client configured for {0}")]
    NotConfigured(String),
}

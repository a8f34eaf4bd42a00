use std::fmt;
use std::io;

#[derive(Debug)]
pub enum BackupError {
    Config(String),
    Auth(String),
    Database(String),
    Dump(String),
    Storage(String),
    InvalidArgument(String),
    Io(io::Error),
    Serialization(String),
}

impl fmt::Display for BackupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackupError::Config(msg) => write!(f, "Configuration error: {}", msg),
            BackupError::Auth(msg) => write!(f, "Authorization error: {}", msg),
            BackupError::Database(msg) => write!(f, "Database error: {}", msg),
            BackupError::Dump(msg) => write!(f, "Dump error: {}", msg),
            BackupError::Storage(msg) => write!(f, "Remote storage error: {}", msg),
            BackupError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            BackupError::Io(err) => write!(f, "IO error: {}", err),
            BackupError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for BackupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BackupError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for BackupError {
    fn from(err: io::Error) -> Self {
        BackupError::Io(err)
    }
}

impl From<toml::de::Error> for BackupError {
    fn from(err: toml::de::Error) -> Self {
        BackupError::Serialization(err.to_string())
    }
}

impl From<toml::ser::Error> for BackupError {
    fn from(err: toml::ser::Error) -> Self {
        BackupError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for BackupError {
    fn from(err: serde_json::Error) -> Self {
        BackupError::Serialization(err.to_string())
    }
}

impl From<mysql_async::Error> for BackupError {
    fn from(err: mysql_async::Error) -> Self {
        BackupError::Database(err.to_string())
    }
}

impl From<reqwest::Error> for BackupError {
    fn from(err: reqwest::Error) -> Self {
        BackupError::Storage(err.to_string())
    }
}

impl From<tokio::task::JoinError> for BackupError {
    fn from(err: tokio::task::JoinError) -> Self {
        BackupError::Io(io::Error::new(io::ErrorKind::Other, err))
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;

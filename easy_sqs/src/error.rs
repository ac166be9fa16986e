use std::path::PathBuf;

/// Every way a publish run can fail. None of them is recoverable locally;
/// the binary logs the error and exits with status 1.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("file not found: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("error reading {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error decoding JSON file {}", .path.display())]
    MalformedAttributes {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("error reading properties file: {0}")]
    Settings(String),

    #[error("'{0}' is not set. Add it to the properties file or pass --{0}")]
    MissingSetting(&'static str),

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("storing large payload in s3://{bucket}/{key}: {message}")]
    PayloadStore {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("sending message to {queue_url}: {message}")]
    Send { queue_url: String, message: String },
}

impl PublishError {
    pub(crate) fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            PublishError::MissingFile(path)
        } else {
            PublishError::Io { path, source }
        }
    }
}

pub type Result<T, E = PublishError> = std::result::Result<T, E>;

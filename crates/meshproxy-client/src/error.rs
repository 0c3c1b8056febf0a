//! Client error types.

use meshproxy_directory::DirectoryError;

/// Errors that can occur in the meshproxy client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("failed to bind listener {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("directory unavailable: {0}")]
    Directory(#[from] DirectoryError),

    #[error("session error: {0}")]
    Session(String),

    #[error("stream open failed: {0}")]
    StreamOpen(String),
}

impl ClientError {
    /// Metrics label for this error.
    pub fn error_type(&self) -> &'static str {
        use meshproxy_core::errors::*;
        match self {
            Self::Bind { .. } => ERROR_ACCEPT,
            Self::Directory(_) => ERROR_DIRECTORY,
            Self::Session(_) => ERROR_SESSION,
            Self::StreamOpen(_) => ERROR_STREAM_OPEN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshproxy_core::errors::*;
    use std::time::Duration;

    #[test]
    fn test_error_type_labels() {
        let bind = ClientError::Bind {
            addr: "127.0.0.1:1".into(),
            source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
        };
        assert_eq!(bind.error_type(), ERROR_ACCEPT);

        let directory: ClientError = DirectoryError::Timeout(Duration::from_secs(1)).into();
        assert_eq!(directory.error_type(), ERROR_DIRECTORY);

        assert_eq!(ClientError::Session("x".into()).error_type(), ERROR_SESSION);
        assert_eq!(
            ClientError::StreamOpen("x".into()).error_type(),
            ERROR_STREAM_OPEN
        );
    }
}

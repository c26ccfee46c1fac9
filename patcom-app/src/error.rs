use std::fmt;

use patcom_api::transport::TransportError;

#[derive(Debug)]
pub enum Error {
    /// Socket or link failure
    Network {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
    /// No answer within the channel timeout
    Timeout {
        operation: String,
        endpoint: Option<String>,
    },
    /// Data serialization/deserialization errors
    Serialization { message: String },
    /// Document exceeds what the device accepts
    TooLarge { size: usize },
    /// Resource not found
    NotFound { resource: String },
    /// USB serial link errors
    Serial { message: String },
    /// Settings could not be loaded
    Config { message: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network {
            message: message.into(),
            source: None,
        }
    }

    pub fn network_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Network {
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn timeout<S: Into<String>>(operation: S) -> Self {
        Self::Timeout {
            operation: operation.into(),
            endpoint: None,
        }
    }

    pub fn timeout_from<S: Into<String>, E: Into<String>>(operation: S, endpoint: E) -> Self {
        Self::Timeout {
            operation: operation.into(),
            endpoint: Some(endpoint.into()),
        }
    }

    pub fn serialization<S: Into<String>>(message: S) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn serial<S: Into<String>>(message: S) -> Self {
        Self::Serial {
            message: message.into(),
        }
    }

    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Soft failure: the device may answer next time
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Network { message, .. } => write!(f, "Network error: {}", message),
            Error::Timeout { operation, endpoint } => {
                if let Some(ep) = endpoint {
                    write!(f, "Timed out waiting for {} from {}", operation, ep)
                } else {
                    write!(f, "Timed out waiting for {}", operation)
                }
            }
            Error::Serialization { message } => write!(f, "Serialization error: {}", message),
            Error::TooLarge { size } => write!(f, "Document of {} bytes is too large", size),
            Error::NotFound { resource } => write!(f, "Resource not found: {}", resource),
            Error::Serial { message } => write!(f, "Serial error: {}", message),
            Error::Config { message } => write!(f, "Configuration error: {}", message),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Network {
                source: Some(source),
                ..
            } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::serialization(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut => Error::timeout(err.to_string()),
            _ => Error::network_with_source("I/O failure", Box::new(err)),
        }
    }
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::MessageTooLarge(size) => Error::TooLarge { size },
            TransportError::Io(message) => Error::network(message),
            other => Error::serialization(other.to_string()),
        }
    }
}

impl From<serialport::Error> for Error {
    fn from(err: serialport::Error) -> Self {
        Error::serial(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::config(err.to_string())
    }
}

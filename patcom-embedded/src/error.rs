use core::fmt;

use patcom_api::ValidationError;
use patcom_api::transport::TransportError;

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    InvalidCommand,
    InvalidConfig(ValidationError),
    NetworkError,
    SerialError,
    SerializationError,
    StorageError,
    TimeoutError,
    NotConnected,
    BufferFull,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidCommand => write!(f, "Invalid command"),
            Error::InvalidConfig(e) => write!(f, "Invalid configuration: {}", e),
            Error::NetworkError => write!(f, "Network error"),
            Error::SerialError => write!(f, "Serial error"),
            Error::SerializationError => write!(f, "Serialization error"),
            Error::StorageError => write!(f, "Storage error"),
            Error::TimeoutError => write!(f, "Timeout error"),
            Error::NotConnected => write!(f, "Not connected"),
            Error::BufferFull => write!(f, "Buffer full"),
        }
    }
}

impl embedded_hal_nb::serial::Error for Error {
    fn kind(&self) -> embedded_hal_nb::serial::ErrorKind {
        embedded_hal_nb::serial::ErrorKind::Other
    }
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Io(_) => Error::NetworkError,
            TransportError::MessageTooLarge(_) => Error::BufferFull,
            _ => Error::SerializationError,
        }
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Error::InvalidConfig(err)
    }
}

pub type Result<T> = core::result::Result<T, Error>;

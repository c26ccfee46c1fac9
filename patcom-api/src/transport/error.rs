use core::fmt;

use alloc::string::String;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// I/O operation failed
    Io(String),
    /// Message serialization failed
    Serialization(String),
    /// Message deserialization failed
    Deserialization(String),
    /// Message exceeds size limit
    MessageTooLarge(usize),
    /// Well-formed message that the receiver does not expect here
    Protocol(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {}", e),
            Self::Serialization(e) => write!(f, "Serialization error: {}", e),
            Self::Deserialization(e) => write!(f, "Deserialization error: {}", e),
            Self::MessageTooLarge(size) => write!(f, "Message too large: {} bytes", size),
            Self::Protocol(e) => write!(f, "Protocol error: {}", e),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for TransportError {}

pub type Result<T> = core::result::Result<T, TransportError>;

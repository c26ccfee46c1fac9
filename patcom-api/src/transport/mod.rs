pub mod error;
pub mod serializers;

pub use error::TransportError;
pub use serializers::{JsonSerializer, Serializer, decode, encode, encode_within};

/// Largest JSON document a device accepts or emits
pub const MAX_DOCUMENT_SIZE: usize = 2048;

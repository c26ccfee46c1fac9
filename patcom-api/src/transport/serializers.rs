use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use super::MAX_DOCUMENT_SIZE;
use super::error::TransportError;

pub trait Serializer {
    fn serialize<T: Serialize>(data: &T) -> Result<Vec<u8>, TransportError>;
    fn deserialize<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, TransportError>;
}

pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serialize<T: Serialize>(data: &T) -> Result<Vec<u8>, TransportError> {
        serde_json::to_vec(data).map_err(|e| TransportError::Serialization(alloc::format!("{}", e)))
    }

    fn deserialize<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, TransportError> {
        serde_json::from_slice(data)
            .map_err(|e| TransportError::Deserialization(alloc::format!("{}", e)))
    }
}

/// Serialize and enforce `limit` bytes
pub fn encode_within<T: Serialize>(data: &T, limit: usize) -> Result<Vec<u8>, TransportError> {
    let bytes = JsonSerializer::serialize(data)?;
    if bytes.len() > limit {
        return Err(TransportError::MessageTooLarge(bytes.len()));
    }
    Ok(bytes)
}

/// Serialize a message that has to fit a device buffer
pub fn encode<T: Serialize>(data: &T) -> Result<Vec<u8>, TransportError> {
    encode_within(data, MAX_DOCUMENT_SIZE)
}

/// Deserialize a message, refusing oversized input before parsing
pub fn decode<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, TransportError> {
    if data.len() > MAX_DOCUMENT_SIZE {
        return Err(TransportError::MessageTooLarge(data.len()));
    }
    JsonSerializer::deserialize(data)
}

#[cfg(test)]
mod tests {
    use alloc::string::String;
    use alloc::vec;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TestData {
        id: u32,
        name: String,
        values: Vec<i32>,
    }

    #[test]
    fn test_json_roundtrip() {
        let data = TestData {
            id: 42,
            name: "test".into(),
            values: vec![1, 2, 3],
        };

        let serialized = encode(&data).unwrap();
        let deserialized: TestData = decode(&serialized).unwrap();

        assert_eq!(data, deserialized);
    }

    #[test]
    fn test_size_limits() {
        let data = TestData {
            id: 1,
            name: "x".repeat(MAX_DOCUMENT_SIZE),
            values: vec![],
        };

        assert!(matches!(
            encode(&data),
            Err(TransportError::MessageTooLarge(_))
        ));
        assert!(encode_within(&data, MAX_DOCUMENT_SIZE * 2).is_ok());

        let oversized = vec![b' '; MAX_DOCUMENT_SIZE + 1];
        assert_eq!(
            decode::<TestData>(&oversized),
            Err(TransportError::MessageTooLarge(MAX_DOCUMENT_SIZE + 1))
        );
    }

    #[test]
    fn test_malformed_input() {
        assert!(matches!(
            decode::<TestData>(b"{not json"),
            Err(TransportError::Deserialization(_))
        ));
    }
}

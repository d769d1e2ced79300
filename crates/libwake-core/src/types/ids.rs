use rand::Rng;
use thiserror::Error;

/// 256-bit source identifier (random)
pub type SourceId = [u8; 32];

#[derive(Debug, Error)]
pub enum IdParseError {
    #[error("invalid hex string: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Generate a random 256-bit source ID
pub fn generate_source_id() -> SourceId {
    rand::thread_rng().gen()
}

/// Convert a fixed-size byte array to lowercase hex string
pub fn id_to_hex<const N: usize>(id: &[u8; N]) -> String {
    hex::encode(id)
}

/// Parse a hex string into a fixed-size byte array
pub fn hex_to_id<const N: usize>(hex_str: &str) -> Result<[u8; N], IdParseError> {
    let bytes = hex::decode(hex_str)?;
    if bytes.len() != N {
        return Err(IdParseError::InvalidLength {
            expected: N,
            actual: bytes.len(),
        });
    }
    let mut arr = [0u8; N];
    arr.copy_from_slice(&bytes);
    Ok(arr)
}

/// Parse a source ID from hex string
pub fn parse_source_id(hex_str: &str) -> Result<SourceId, IdParseError> {
    hex_to_id::<32>(hex_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_source_id_is_random() {
        let id1 = generate_source_id();
        let id2 = generate_source_id();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_hex_to_id_invalid_length() {
        let hex = "0001020304";
        let result: Result<[u8; 32], _> = hex_to_id(hex);
        assert!(matches!(result, Err(IdParseError::InvalidLength { .. })));
    }

    #[test]
    fn test_hex_to_id_invalid_hex() {
        let hex = "not_valid_hex!";
        let result: Result<[u8; 32], _> = hex_to_id(hex);
        assert!(matches!(result, Err(IdParseError::InvalidHex(_))));
    }

    #[test]
    fn test_roundtrip() {
        let original = generate_source_id();
        let hex = id_to_hex(&original);
        let parsed: SourceId = hex_to_id(&hex).unwrap();
        assert_eq!(original, parsed);
    }
}

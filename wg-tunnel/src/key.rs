//! Key material handling
//!
//! Keys are 32 bytes exchanged in the canonical base64 encoding. The same
//! type covers private, public, and preshared keys; which is which is
//! decided by the field that carries it.

use std::fmt;

use base64::prelude::*;

use crate::error::{Error, Result};

/// Length in bytes of tunnel key material
pub const KEY_LEN: usize = 32;

/// 32 bytes of key material.
#[derive(Clone, PartialEq, Eq)]
pub struct Key([u8; KEY_LEN]);

impl Key {
    /// Create a key from raw bytes
    pub const fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Decode a key from its canonical base64 encoding
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let decoded = BASE64_STANDARD
            .decode(encoded)
            .map_err(|_| Error::MalformedKey("key"))?;
        let bytes: [u8; KEY_LEN] = decoded
            .try_into()
            .map_err(|_| Error::MalformedKey("key"))?;
        Ok(Self(bytes))
    }

    /// Encode the key as base64
    pub fn to_base64(&self) -> String {
        BASE64_STANDARD.encode(self.0)
    }

    /// Get the raw key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

// Keys end up in logs through config dumps; show only a short prefix.
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = self.to_base64();
        write!(f, "Key({}...)", &encoded[..4])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_roundtrip() {
        let key = Key::from_bytes([7u8; KEY_LEN]);
        let encoded = key.to_base64();
        assert_eq!(encoded.len(), 44);

        let restored = Key::from_base64(&encoded).unwrap();
        assert_eq!(key, restored);
        assert_eq!(restored.as_bytes(), &[7u8; KEY_LEN]);
    }

    #[test]
    fn test_invalid_base64() {
        assert_eq!(
            Key::from_base64("not-valid-base64!!!"),
            Err(Error::MalformedKey("key"))
        );
    }

    #[test]
    fn test_wrong_length() {
        // 16 bytes decodes fine but is not key material
        let short = BASE64_STANDARD.encode([0u8; 16]);
        assert_eq!(Key::from_base64(&short), Err(Error::MalformedKey("key")));
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = Key::from_bytes([0xAB; KEY_LEN]);
        let rendered = format!("{:?}", key);
        assert!(rendered.len() < key.to_base64().len());
        assert!(rendered.starts_with("Key("));
    }
}

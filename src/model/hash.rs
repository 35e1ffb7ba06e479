use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length of a SHA-1 object id in bytes
pub const HASH_LEN: usize = 20;

/// Content identifier of a stored object (SHA-1, 40 hex characters)
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash([u8; HASH_LEN]);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HashParseError {
    #[error("expected {expected} hex characters, got {0}", expected = HASH_LEN * 2)]
    InvalidLength(usize),
    #[error("invalid hex digit in object id")]
    InvalidHex,
}

impl Hash {
    /// The all-zero sentinel marking "missing / never written"
    pub const ZERO: Hash = Hash([0; HASH_LEN]);

    pub const fn from_bytes(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }

    /// Build from a raw slice; `None` unless it is exactly 20 bytes
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; HASH_LEN] = bytes.try_into().ok()?;
        Some(Self(bytes))
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, HashParseError> {
        if hex_str.len() != HASH_LEN * 2 {
            return Err(HashParseError::InvalidLength(hex_str.len()));
        }
        let mut bytes = [0u8; HASH_LEN];
        hex::decode_to_slice(hex_str, &mut bytes).map_err(|_| HashParseError::InvalidHex)?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0 == [0; HASH_LEN]
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Abbreviated form used in log lines and reports
    pub fn short(&self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(8);
        hex
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.short())
    }
}

impl FromStr for Hash {
    type Err = HashParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s.trim())
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hash::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

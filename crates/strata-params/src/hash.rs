//! Snapshot fingerprints
//!
//! [`SnapshotHash`] is a Blake3 digest of a snapshot's canonical JSON form.
//! Snapshots use ordered maps throughout, so equal snapshots always encode
//! to the same bytes and therefore to the same fingerprint.

use crate::error::ParamsError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// A 32-byte snapshot fingerprint (Blake3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SnapshotHash([u8; 32]);

impl SnapshotHash {
    /// Wrap raw digest bytes
    #[inline]
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get reference to the underlying bytes
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hash arbitrary bytes
    #[inline]
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Hash the canonical JSON encoding of a value
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn of<T: Serialize>(value: &T) -> Result<Self, ParamsError> {
        let json = serde_json::to_vec(value)?;
        Ok(Self::compute(&json))
    }

    /// First 16 hex chars, for log lines
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl Display for SnapshotHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for SnapshotHash {
    type Err = ParamsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| ParamsError::InvalidHash(e.to_string()))?;
        let arr: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
            ParamsError::InvalidHash(format!("expected 32 bytes, got {}", v.len()))
        })?;
        Ok(Self(arr))
    }
}

impl Serialize for SnapshotHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SnapshotHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip() {
        let h = SnapshotHash::compute(b"strata");
        let parsed: SnapshotHash = h.to_string().parse().unwrap();
        assert_eq!(h, parsed);
        assert_eq!(h.short().len(), 16);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(matches!(
            "abcd".parse::<SnapshotHash>(),
            Err(ParamsError::InvalidHash(_))
        ));
    }

    #[test]
    fn equal_values_hash_equal() {
        let a = SnapshotHash::of(&vec![1, 2, 3]).unwrap();
        let b = SnapshotHash::of(&vec![1, 2, 3]).unwrap();
        assert_eq!(a, b);
    }
}

//! Identifier types for ledger entities
//!
//! Script, key and policy hashes are 28-byte digests; transaction ids are
//! 32-byte digests. All of them travel as lowercase hex on the wire and
//! order byte-wise, which is the ordering the ledger itself uses.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while parsing identifiers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    #[error("Invalid length for {kind}: expected {expected} bytes, got {actual}")]
    InvalidLength {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Asset name too long: {0} bytes (max 32)")]
    AssetNameTooLong(usize),

    #[error("Invalid output reference: {0}")]
    InvalidOutputRef(String),
}

macro_rules! fixed_hash {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name([u8; $len]);

        impl $name {
            /// Length of the digest in bytes
            pub const LEN: usize = $len;

            pub const fn new(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            pub fn from_slice(bytes: &[u8]) -> Result<Self, IdError> {
                let arr: [u8; $len] = bytes.try_into().map_err(|_| IdError::InvalidLength {
                    kind: stringify!($name),
                    expected: $len,
                    actual: bytes.len(),
                })?;
                Ok(Self(arr))
            }

            pub fn from_hex(s: &str) -> Result<Self, IdError> {
                let bytes = hex::decode(s).map_err(|e| IdError::InvalidHex(e.to_string()))?;
                Self::from_slice(&bytes)
            }

            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_hex(s)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_hex(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

fixed_hash!(
    /// Minting policy identifier (the hash of the minting script)
    PolicyId,
    28
);

fixed_hash!(
    /// Hash of a validator script
    ScriptHash,
    28
);

fixed_hash!(
    /// Hash of a verification key
    KeyHash,
    28
);

fixed_hash!(
    /// Transaction identifier
    TxId,
    32
);

impl From<ScriptHash> for PolicyId {
    fn from(hash: ScriptHash) -> Self {
        Self(hash.0)
    }
}

impl From<PolicyId> for ScriptHash {
    fn from(policy: PolicyId) -> Self {
        Self(policy.0)
    }
}

/// Asset name within a policy (0..=32 raw bytes)
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct AssetName(Vec<u8>);

impl AssetName {
    pub const MAX_LEN: usize = 32;

    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, IdError> {
        let bytes = bytes.into();
        if bytes.len() > Self::MAX_LEN {
            return Err(IdError::AssetNameTooLong(bytes.len()));
        }
        Ok(Self(bytes))
    }

    /// Asset name from a UTF-8 label, e.g. `"TKN1"`
    pub fn from_label(label: &str) -> Result<Self, IdError> {
        Self::new(label.as_bytes().to_vec())
    }

    pub fn from_hex(s: &str) -> Result<Self, IdError> {
        let bytes = hex::decode(s).map_err(|e| IdError::InvalidHex(e.to_string()))?;
        Self::new(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for AssetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for AssetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) if !s.is_empty() => write!(f, "AssetName({:?})", s),
            _ => write!(f, "AssetName(0x{})", self.to_hex()),
        }
    }
}

impl Serialize for AssetName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for AssetName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Reference to a transaction output (`tx_id#index`)
///
/// Ordering is by transaction id, then output index. Input selection and
/// reference-input indexing both rely on this order being stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputRef {
    pub tx_id: TxId,
    pub index: u32,
}

impl OutputRef {
    pub fn new(tx_id: TxId, index: u32) -> Self {
        Self { tx_id, index }
    }
}

impl fmt::Display for OutputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.tx_id, self.index)
    }
}

impl FromStr for OutputRef {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (tx, idx) = s
            .split_once('#')
            .ok_or_else(|| IdError::InvalidOutputRef(s.to_string()))?;
        let index = idx
            .parse::<u32>()
            .map_err(|_| IdError::InvalidOutputRef(s.to_string()))?;
        Ok(Self {
            tx_id: TxId::from_hex(tx)?,
            index,
        })
    }
}

impl Serialize for OutputRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for OutputRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

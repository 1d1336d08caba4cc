//! Credentials and addresses
//!
//! An address pairs a payment credential (who may spend) with an optional
//! stake credential (who owns the delegation rights). Programmable addresses
//! put the protocol's script in the payment slot and the holder's own
//! credential in the stake slot, so custody is shared while ownership stays
//! provable per holder.
//!
//! Addresses are carried as the hex of their raw Shelley encoding:
//! `[header][payment hash: 28][stake hash: 28]?`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::ids::{KeyHash, ScriptHash};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    #[error("Unsupported address header: {0:#04x}")]
    UnsupportedHeader(u8),

    #[error("Invalid address length: {0} bytes")]
    InvalidLength(usize),
}

/// Payment or stake credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "hash", rename_all = "lowercase")]
pub enum Credential {
    Key(KeyHash),
    Script(ScriptHash),
}

impl Credential {
    /// Raw 28-byte hash regardless of credential kind
    pub fn hash_bytes(&self) -> &[u8] {
        match self {
            Credential::Key(h) => h.as_bytes(),
            Credential::Script(h) => h.as_bytes(),
        }
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash_bytes())
    }

    pub fn is_script(&self) -> bool {
        matches!(self, Credential::Script(_))
    }

    pub fn as_script(&self) -> Option<&ScriptHash> {
        match self {
            Credential::Script(h) => Some(h),
            Credential::Key(_) => None,
        }
    }
}

/// Shelley-style address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    pub network_id: u8,
    pub payment: Credential,
    pub stake: Option<Credential>,
}

impl Address {
    pub fn new(network_id: u8, payment: Credential, stake: Option<Credential>) -> Self {
        Self {
            network_id,
            payment,
            stake,
        }
    }

    fn header(&self) -> u8 {
        let kind = match (&self.payment, &self.stake) {
            (Credential::Key(_), Some(Credential::Key(_))) => 0,
            (Credential::Script(_), Some(Credential::Key(_))) => 1,
            (Credential::Key(_), Some(Credential::Script(_))) => 2,
            (Credential::Script(_), Some(Credential::Script(_))) => 3,
            (Credential::Key(_), None) => 6,
            (Credential::Script(_), None) => 7,
        };
        (kind << 4) | (self.network_id & 0x0f)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(57);
        out.push(self.header());
        out.extend_from_slice(self.payment.hash_bytes());
        if let Some(stake) = &self.stake {
            out.extend_from_slice(stake.hash_bytes());
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AddressError> {
        let header = *bytes.first().ok_or(AddressError::InvalidLength(0))?;
        let kind = header >> 4;
        let network_id = header & 0x0f;
        let expected = match kind {
            0..=3 => 57,
            6 | 7 => 29,
            _ => return Err(AddressError::UnsupportedHeader(header)),
        };
        if bytes.len() != expected {
            return Err(AddressError::InvalidLength(bytes.len()));
        }
        let hash = |range: std::ops::Range<usize>| -> [u8; 28] {
            let mut arr = [0u8; 28];
            arr.copy_from_slice(&bytes[range]);
            arr
        };
        let first = hash(1..29);
        let payment = match kind {
            1 | 3 | 7 => Credential::Script(ScriptHash::new(first)),
            _ => Credential::Key(KeyHash::new(first)),
        };
        let stake = match kind {
            0 | 1 => Some(Credential::Key(KeyHash::new(hash(29..57)))),
            2 | 3 => Some(Credential::Script(ScriptHash::new(hash(29..57)))),
            _ => None,
        };
        Ok(Self {
            network_id,
            payment,
            stake,
        })
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Hex of the payment credential hash
    pub fn payment_hash(&self) -> String {
        self.payment.hash_hex()
    }

    /// Hex of the stake credential hash, if any
    pub fn stake_hash(&self) -> Option<String> {
        self.stake.as_ref().map(Credential::hash_hex)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| AddressError::InvalidHex(e.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

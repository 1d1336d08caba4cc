//! Network selector
//!
//! Three environments are supported: two public test networks and mainnet.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown network: {0} (expected preview, preprod or mainnet)")]
pub struct UnknownNetwork(pub String);

/// Target ledger network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Small, fast-moving test network
    Preview,
    /// Larger test network mirroring mainnet parameters
    Preprod,
    /// Production network
    Mainnet,
}

impl Network {
    /// Network id carried in the address header
    pub fn network_id(&self) -> u8 {
        match self {
            Network::Preview | Network::Preprod => 0,
            Network::Mainnet => 1,
        }
    }

    pub fn is_mainnet(&self) -> bool {
        matches!(self, Network::Mainnet)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Preview => "preview",
            Network::Preprod => "preprod",
            Network::Mainnet => "mainnet",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = UnknownNetwork;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "preview" => Ok(Network::Preview),
            "preprod" => Ok(Network::Preprod),
            "mainnet" => Ok(Network::Mainnet),
            other => Err(UnknownNetwork(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!("Preview".parse::<Network>().unwrap(), Network::Preview);
        assert_eq!("MAINNET".parse::<Network>().unwrap(), Network::Mainnet);
        assert!("sanchonet".parse::<Network>().is_err());
    }

    #[test]
    fn test_network_ids() {
        assert_eq!(Network::Preview.network_id(), 0);
        assert_eq!(Network::Preprod.network_id(), 0);
        assert_eq!(Network::Mainnet.network_id(), 1);
    }

    #[test]
    fn test_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Network::Preprod).unwrap(), "\"preprod\"");
    }
}

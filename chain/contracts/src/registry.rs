//! Token registry (programmable token directory)
//!
//! A [`SortedList`] keyed by policy id whose payload names the scripts a
//! token delegates its rules to. Each node lives in its own output at the
//! directory address, carries a token of the directory node policy as an
//! authenticity marker, and holds its fields as an inline datum:
//!
//! ```text
//! Constr 0 [ key: bytes, next: bytes,
//!            transferLogic: Constr 1 [bytes], thirdPartyLogic: Constr 1 [bytes],
//!            globalState: bytes? ]
//! ```
//!
//! Decoding is lenient: a plain list is accepted in place of the outer
//! constructor, a credential may be a bare byte string, and the global state
//! may be absent, empty, or wrapped in an option constructor.

use serde::{Deserialize, Serialize};
use types::ids::{AssetName, PolicyId, ScriptHash};
use types::plutus::PlutusData;
use types::tx::TxOutput;
use types::value::Unit;

use crate::errors::RegistryError;
use crate::linked_list::{Node, SortedList};

/// Registry node payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub transfer_logic: ScriptHash,
    pub third_party_logic: ScriptHash,
    #[serde(default)]
    pub global_state: Option<PolicyId>,
}

impl DirectoryEntry {
    pub fn new(transfer_logic: ScriptHash, third_party_logic: ScriptHash) -> Self {
        Self {
            transfer_logic,
            third_party_logic,
            global_state: None,
        }
    }

    /// Payload carried by the head sentinel
    pub fn sentinel() -> Self {
        Self::new(ScriptHash::new([0; 28]), ScriptHash::new([0; 28]))
    }
}

pub type RegistryNode = Node<DirectoryEntry>;

/// The registry: policy ids in byte order
pub type Registry = SortedList<DirectoryEntry>;

pub fn empty_registry() -> Registry {
    SortedList::new(DirectoryEntry::sentinel())
}

/// Policy id held by a non-head registry node
pub fn node_policy(node: &RegistryNode) -> Result<PolicyId, RegistryError> {
    PolicyId::from_slice(&node.key).map_err(|e| RegistryError::Decode(e.to_string()))
}

/// Asset name of the authenticity marker minted for a node
pub fn marker_name(key: &[u8]) -> Result<AssetName, RegistryError> {
    AssetName::new(key.to_vec()).map_err(|e| RegistryError::Decode(e.to_string()))
}

/// Whether `output` carries the marker minted for the node keyed `key`
///
/// A token of the directory node policy under any other name does not count.
pub fn is_authentic(output: &TxOutput, directory_node_policy: &PolicyId, key: &[u8]) -> bool {
    marker_name(key).is_ok_and(|name| {
        !output
            .value
            .get(&Unit::asset(*directory_node_policy, name))
            .is_zero()
    })
}

// ───────────────────────── Datum codec ─────────────────────────

fn field<'a>(fields: &'a [PlutusData], index: usize, name: &str) -> Result<&'a PlutusData, RegistryError> {
    fields
        .get(index)
        .ok_or_else(|| RegistryError::Decode(format!("missing field {}", name)))
}

pub(crate) fn decode_bytes<'a>(data: &'a PlutusData, name: &str) -> Result<&'a [u8], RegistryError> {
    data.as_bytes()
        .ok_or_else(|| RegistryError::Decode(format!("{} is not a byte string", name)))
}

/// Decode `key` and `next`, the fields every list node starts with
pub(crate) fn decode_link(data: &PlutusData) -> Result<(Vec<u8>, Vec<u8>, &[PlutusData]), RegistryError> {
    let fields = data
        .positional_fields()
        .ok_or_else(|| RegistryError::Decode("node datum is neither a constructor nor a list".to_string()))?;
    let key = decode_bytes(field(fields, 0, "key")?, "key")?.to_vec();
    let next = decode_bytes(field(fields, 1, "next")?, "next")?.to_vec();
    Ok((key, next, fields))
}

fn decode_script(data: &PlutusData, name: &str) -> Result<Option<ScriptHash>, RegistryError> {
    let bytes = match data {
        PlutusData::Bytes(b) => b.as_slice(),
        PlutusData::Constr { fields, .. } => decode_bytes(field(fields, 0, name)?, name)?,
        _ => return Err(RegistryError::Decode(format!("{} is not a credential", name))),
    };
    if bytes.is_empty() {
        return Ok(None);
    }
    ScriptHash::from_slice(bytes)
        .map(Some)
        .map_err(|e| RegistryError::Decode(format!("{}: {}", name, e)))
}

fn decode_global_state(data: Option<&PlutusData>) -> Result<Option<PolicyId>, RegistryError> {
    let bytes = match data {
        None => return Ok(None),
        Some(PlutusData::Bytes(b)) => b.as_slice(),
        // Option encoding: Constr 0 [bytes] is Some, Constr 1 [] is None
        Some(PlutusData::Constr { tag: 0, fields }) => decode_bytes(field(fields, 0, "globalState")?, "globalState")?,
        Some(PlutusData::Constr { tag: 1, .. }) => return Ok(None),
        Some(_) => return Err(RegistryError::Decode("globalState has an unexpected shape".to_string())),
    };
    if bytes.is_empty() {
        return Ok(None);
    }
    PolicyId::from_slice(bytes)
        .map(Some)
        .map_err(|e| RegistryError::Decode(format!("globalState: {}", e)))
}

pub fn decode_node(data: &PlutusData) -> Result<RegistryNode, RegistryError> {
    let (key, next, fields) = decode_link(data)?;
    let transfer = decode_script(field(fields, 2, "transferLogic")?, "transferLogic")?;
    let third_party = decode_script(field(fields, 3, "thirdPartyLogic")?, "thirdPartyLogic")?;
    let global_state = decode_global_state(fields.get(4))?;

    let payload = if key.is_empty() {
        DirectoryEntry::sentinel()
    } else {
        DirectoryEntry {
            transfer_logic: transfer
                .ok_or_else(|| RegistryError::Decode("transferLogic is empty".to_string()))?,
            third_party_logic: third_party
                .ok_or_else(|| RegistryError::Decode("thirdPartyLogic is empty".to_string()))?,
            global_state,
        }
    };
    Ok(Node::new(key, next, payload))
}

fn encode_script(hash: Option<&ScriptHash>) -> PlutusData {
    let bytes = hash.map(|h| h.as_bytes().to_vec()).unwrap_or_default();
    PlutusData::constr(1, vec![PlutusData::Bytes(bytes)])
}

pub fn encode_node(node: &RegistryNode) -> PlutusData {
    let (transfer, third_party) = if node.is_head() {
        (None, None)
    } else {
        (
            Some(&node.payload.transfer_logic),
            Some(&node.payload.third_party_logic),
        )
    };
    let mut fields = vec![
        PlutusData::bytes(&node.key),
        PlutusData::bytes(&node.next),
        encode_script(transfer),
        encode_script(third_party),
    ];
    if let Some(global) = &node.payload.global_state {
        fields.push(PlutusData::bytes(global.as_bytes()));
    }
    PlutusData::constr(0, fields)
}

/// Decode the node held by `output`, requiring the authenticity marker
pub fn node_from_output(output: &TxOutput, directory_node_policy: &PolicyId) -> Result<RegistryNode, RegistryError> {
    let datum = output
        .datum
        .as_ref()
        .ok_or_else(|| RegistryError::Decode("output has no inline datum".to_string()))?;
    let node = decode_node(datum)?;
    if !is_authentic(output, directory_node_policy, &node.key) {
        return Err(RegistryError::Decode("output lacks the directory node marker".to_string()));
    }
    Ok(node)
}

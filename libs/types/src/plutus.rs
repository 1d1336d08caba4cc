//! On-chain structured data
//!
//! Datums and redeemers are trees of constructors, maps, lists, integers and
//! byte strings. In human-readable formats they use the detailed JSON schema
//! returned by chain indexers:
//!
//! ```text
//! {"constructor": 0, "fields": [...]}
//! {"map": [{"k": ..., "v": ...}]}
//! {"list": [...]}
//! {"int": 42}
//! {"bytes": "cafe"}
//! ```
//!
//! Binary formats (journal payloads, snapshots) use a compact tagged form.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PlutusData {
    Constr { tag: u64, fields: Vec<PlutusData> },
    Map(Vec<(PlutusData, PlutusData)>),
    List(Vec<PlutusData>),
    Int(i64),
    Bytes(Vec<u8>),
}

impl PlutusData {
    pub fn constr(tag: u64, fields: Vec<PlutusData>) -> Self {
        PlutusData::Constr { tag, fields }
    }

    pub fn bytes(bytes: impl AsRef<[u8]>) -> Self {
        PlutusData::Bytes(bytes.as_ref().to_vec())
    }

    pub fn int(value: i64) -> Self {
        PlutusData::Int(value)
    }

    /// The unit constructor `Constr 0 []`
    pub fn unit() -> Self {
        PlutusData::constr(0, Vec::new())
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            PlutusData::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PlutusData::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Positional fields of a record, whether it is encoded as a tagged
    /// constructor or as a plain list.
    pub fn positional_fields(&self) -> Option<&[PlutusData]> {
        match self {
            PlutusData::Constr { fields, .. } => Some(fields),
            PlutusData::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn constr_tag(&self) -> Option<u64> {
        match self {
            PlutusData::Constr { tag, .. } => Some(*tag),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct MapEntry {
    k: PlutusData,
    v: PlutusData,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum Detailed {
    Constr { constructor: u64, fields: Vec<PlutusData> },
    Map { map: Vec<MapEntry> },
    List { list: Vec<PlutusData> },
    Int { int: i64 },
    Bytes { bytes: String },
}

#[derive(Serialize, Deserialize)]
enum Compact {
    Constr(u64, Vec<PlutusData>),
    Map(Vec<(PlutusData, PlutusData)>),
    List(Vec<PlutusData>),
    Int(i64),
    Bytes(Vec<u8>),
}

impl Serialize for PlutusData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            let detailed = match self.clone() {
                PlutusData::Constr { tag, fields } => Detailed::Constr {
                    constructor: tag,
                    fields,
                },
                PlutusData::Map(entries) => Detailed::Map {
                    map: entries.into_iter().map(|(k, v)| MapEntry { k, v }).collect(),
                },
                PlutusData::List(list) => Detailed::List { list },
                PlutusData::Int(int) => Detailed::Int { int },
                PlutusData::Bytes(b) => Detailed::Bytes {
                    bytes: hex::encode(b),
                },
            };
            detailed.serialize(serializer)
        } else {
            let compact = match self.clone() {
                PlutusData::Constr { tag, fields } => Compact::Constr(tag, fields),
                PlutusData::Map(entries) => Compact::Map(entries),
                PlutusData::List(list) => Compact::List(list),
                PlutusData::Int(i) => Compact::Int(i),
                PlutusData::Bytes(b) => Compact::Bytes(b),
            };
            compact.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for PlutusData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            Ok(match Detailed::deserialize(deserializer)? {
                Detailed::Constr {
                    constructor,
                    fields,
                } => PlutusData::Constr {
                    tag: constructor,
                    fields,
                },
                Detailed::Map { map } => {
                    PlutusData::Map(map.into_iter().map(|e| (e.k, e.v)).collect())
                }
                Detailed::List { list } => PlutusData::List(list),
                Detailed::Int { int } => PlutusData::Int(int),
                Detailed::Bytes { bytes } => {
                    PlutusData::Bytes(hex::decode(&bytes).map_err(serde::de::Error::custom)?)
                }
            })
        } else {
            Ok(match Compact::deserialize(deserializer)? {
                Compact::Constr(tag, fields) => PlutusData::Constr { tag, fields },
                Compact::Map(entries) => PlutusData::Map(entries),
                Compact::List(list) => PlutusData::List(list),
                Compact::Int(i) => PlutusData::Int(i),
                Compact::Bytes(b) => PlutusData::Bytes(b),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_detailed_schema_constructor() {
        let data = PlutusData::constr(0, vec![PlutusData::bytes([0xca, 0xfe]), PlutusData::int(7)]);
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(
            json,
            json!({"constructor": 0, "fields": [{"bytes": "cafe"}, {"int": 7}]})
        );
    }

    #[test]
    fn test_detailed_schema_parse_nested() {
        let raw = json!({
            "list": [
                {"map": [{"k": {"int": 1}, "v": {"bytes": ""}}]},
                {"constructor": 1, "fields": []}
            ]
        });
        let data: PlutusData = serde_json::from_value(raw).unwrap();
        assert_eq!(
            data,
            PlutusData::List(vec![
                PlutusData::Map(vec![(PlutusData::int(1), PlutusData::bytes([]))]),
                PlutusData::constr(1, vec![]),
            ])
        );
    }

    #[test]
    fn test_positional_fields_accepts_list_and_constr() {
        let fields = vec![PlutusData::int(1), PlutusData::int(2)];
        let constr = PlutusData::constr(0, fields.clone());
        let list = PlutusData::List(fields.clone());
        assert_eq!(constr.positional_fields(), Some(fields.as_slice()));
        assert_eq!(list.positional_fields(), Some(fields.as_slice()));
        assert_eq!(PlutusData::int(3).positional_fields(), None);
    }

    #[test]
    fn test_rejects_bad_hex() {
        let raw = json!({"bytes": "zz"});
        assert!(serde_json::from_value::<PlutusData>(raw).is_err());
    }
}

//! Sorted linked list with covering-node proofs
//!
//! The on-chain registry and the substandard deny/allow lists share one
//! structure: a chain of nodes `{ key, next, payload }` ordered byte-wise,
//! starting at a head sentinel with an empty key and ending at the tail
//! sentinel `next = [0xff; 28]`. Every node satisfies `key < next`, so any key
//! not in the list is covered by exactly one node with `key < k < next`.
//!
//! Nodes are never mutated in place. Insertion spends the covering node and
//! recreates it with `next = k` alongside the new node; removal spends a node
//! and its predecessor and recreates the predecessor pointing past it. Each
//! recreation bumps the node's version, so an insertion planned against a
//! stale covering node fails at commit, mirroring ledger single-spend.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::RegistryError;

/// Maximum key length (a policy id or credential hash)
pub const MAX_KEY_LEN: usize = 28;

/// `next` of the last node in the chain
pub const TAIL_KEY: [u8; MAX_KEY_LEN] = [0xff; MAX_KEY_LEN];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node<P> {
    #[serde(with = "hex::serde")]
    pub key: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub next: Vec<u8>,
    pub payload: P,
}

impl<P> Node<P> {
    pub fn new(key: impl Into<Vec<u8>>, next: impl Into<Vec<u8>>, payload: P) -> Self {
        Self {
            key: key.into(),
            next: next.into(),
            payload,
        }
    }

    pub fn is_head(&self) -> bool {
        self.key.is_empty()
    }

    pub fn is_last(&self) -> bool {
        self.next == TAIL_KEY
    }

    /// Whether `key` falls strictly between this node and its successor
    pub fn covers(&self, key: &[u8]) -> bool {
        self.key.as_slice() < key && key < self.next.as_slice()
    }

    pub fn key_hex(&self) -> String {
        hex::encode(&self.key)
    }
}

/// Result of a lookup: the node holding the key, or the node covering it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Proof<'a, P> {
    Membership(&'a Node<P>),
    NonMembership(&'a Node<P>),
}

impl<'a, P> Proof<'a, P> {
    pub fn node(&self) -> &'a Node<P> {
        match self {
            Proof::Membership(n) | Proof::NonMembership(n) => n,
        }
    }

    pub fn is_member(&self) -> bool {
        matches!(self, Proof::Membership(_))
    }
}

/// An insertion computed against a snapshot of the covering node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertPlan<P> {
    pub covering: Node<P>,
    covering_version: u64,
    pub key: Vec<u8>,
    pub payload: P,
}

impl<P: Clone> InsertPlan<P> {
    /// The covering node as it will be recreated
    pub fn predecessor(&self) -> Node<P> {
        Node::new(self.covering.key.clone(), self.key.clone(), self.covering.payload.clone())
    }

    /// The node that will be created
    pub fn new_node(&self) -> Node<P> {
        Node::new(self.key.clone(), self.covering.next.clone(), self.payload.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Slot<P> {
    node: Node<P>,
    version: u64,
}

/// Validate a key for insertion or lookup
pub fn check_key(key: &[u8]) -> Result<(), RegistryError> {
    let reason = if key.is_empty() {
        "empty key is reserved for the head sentinel"
    } else if key.len() > MAX_KEY_LEN {
        "key longer than 28 bytes"
    } else if key == TAIL_KEY {
        "key equals the tail sentinel"
    } else {
        return Ok(());
    };
    Err(RegistryError::InvalidKey {
        key: hex::encode(key),
        reason: reason.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortedList<P> {
    slots: BTreeMap<Vec<u8>, Slot<P>>,
    next_version: u64,
}

impl<P: Clone> SortedList<P> {
    /// A list holding only the head sentinel
    pub fn new(head_payload: P) -> Self {
        let mut slots = BTreeMap::new();
        slots.insert(
            Vec::new(),
            Slot {
                node: Node::new(Vec::new(), TAIL_KEY.to_vec(), head_payload),
                version: 0,
            },
        );
        Self {
            slots,
            next_version: 1,
        }
    }

    /// Rebuild from observed nodes, verifying the chain
    pub fn from_nodes(nodes: impl IntoIterator<Item = Node<P>>) -> Result<Self, RegistryError> {
        let mut slots = BTreeMap::new();
        let mut next_version = 0;
        for node in nodes {
            let key = node.key.clone();
            let slot = Slot {
                node,
                version: next_version,
            };
            next_version += 1;
            if slots.insert(key.clone(), slot).is_some() {
                return Err(RegistryError::ChainBroken {
                    reason: format!("duplicate node {}", hex::encode(&key)),
                });
            }
        }
        let list = Self {
            slots,
            next_version,
        };
        list.verify_chain()?;
        Ok(list)
    }

    pub fn head(&self) -> Option<&Node<P>> {
        self.slots.get(&[] as &[u8]).map(|s| &s.node)
    }

    /// Number of nodes excluding the head
    pub fn len(&self) -> usize {
        self.slots.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &[u8]) -> Option<&Node<P>> {
        self.slots.get(key).map(|s| &s.node)
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        !key.is_empty() && self.slots.contains_key(key)
    }

    /// Nodes in key order, head first
    pub fn iter(&self) -> impl Iterator<Item = &Node<P>> {
        self.slots.values().map(|s| &s.node)
    }

    /// Membership or non-membership proof for `key`
    pub fn lookup(&self, key: &[u8]) -> Result<Proof<'_, P>, RegistryError> {
        check_key(key)?;
        let (_, slot) = self
            .slots
            .range::<[u8], _>((std::ops::Bound::Unbounded, std::ops::Bound::Included(key)))
            .next_back()
            .ok_or_else(|| RegistryError::ChainBroken {
                reason: "missing head sentinel".to_string(),
            })?;
        if slot.node.key == key {
            return Ok(Proof::Membership(&slot.node));
        }
        if !slot.node.covers(key) {
            return Err(RegistryError::ChainBroken {
                reason: format!(
                    "node {} does not cover {}",
                    slot.node.key_hex(),
                    hex::encode(key)
                ),
            });
        }
        Ok(Proof::NonMembership(&slot.node))
    }

    /// The unique node with `node.key < key < node.next`
    pub fn find_covering(&self, key: &[u8]) -> Result<&Node<P>, RegistryError> {
        match self.lookup(key)? {
            Proof::NonMembership(node) => Ok(node),
            Proof::Membership(_) => Err(RegistryError::AlreadyRegistered {
                key: hex::encode(key),
            }),
        }
    }

    /// Compute an insertion without applying it
    pub fn plan_insert(&self, key: &[u8], payload: P) -> Result<InsertPlan<P>, RegistryError> {
        let covering = self.find_covering(key)?;
        let version = self.slots[covering.key.as_slice()].version;
        Ok(InsertPlan {
            covering: covering.clone(),
            covering_version: version,
            key: key.to_vec(),
            payload,
        })
    }

    /// Apply a planned insertion. Fails with `CoveringNodeSpent` if the
    /// covering node was replaced after the plan was made.
    pub fn commit(&mut self, plan: InsertPlan<P>) -> Result<(Node<P>, Node<P>), RegistryError> {
        let current = self
            .slots
            .get(plan.covering.key.as_slice())
            .ok_or_else(|| RegistryError::CoveringNodeSpent {
                key: plan.covering.key_hex(),
            })?;
        if current.version != plan.covering_version {
            return Err(RegistryError::CoveringNodeSpent {
                key: plan.covering.key_hex(),
            });
        }
        if self.slots.contains_key(plan.key.as_slice()) {
            return Err(RegistryError::AlreadyRegistered {
                key: hex::encode(&plan.key),
            });
        }

        let predecessor = plan.predecessor();
        let created = plan.new_node();
        let v1 = self.bump();
        let v2 = self.bump();
        self.slots.insert(
            predecessor.key.clone(),
            Slot {
                node: predecessor.clone(),
                version: v1,
            },
        );
        self.slots.insert(
            created.key.clone(),
            Slot {
                node: created.clone(),
                version: v2,
            },
        );
        Ok((predecessor, created))
    }

    /// Covering-node split: returns `(predecessor, new_node)`
    pub fn insert(&mut self, key: &[u8], payload: P) -> Result<(Node<P>, Node<P>), RegistryError> {
        let plan = self.plan_insert(key, payload)?;
        self.commit(plan)
    }

    /// Merge `key` back into its predecessor. Returns the recreated
    /// predecessor and the removed node.
    pub fn remove(&mut self, key: &[u8]) -> Result<(Node<P>, Node<P>), RegistryError> {
        check_key(key)?;
        let removed = self
            .slots
            .get(key)
            .map(|s| s.node.clone())
            .ok_or_else(|| RegistryError::NodeNotFound {
                key: hex::encode(key),
            })?;
        let pred_key = self
            .slots
            .range::<[u8], _>((std::ops::Bound::Unbounded, std::ops::Bound::Excluded(key)))
            .next_back()
            .map(|(k, _)| k.clone())
            .ok_or_else(|| RegistryError::ChainBroken {
                reason: "missing head sentinel".to_string(),
            })?;
        let version = self.bump();
        let slot = self
            .slots
            .get_mut(pred_key.as_slice())
            .ok_or_else(|| RegistryError::ChainBroken {
                reason: "predecessor vanished".to_string(),
            })?;
        if slot.node.next != key {
            return Err(RegistryError::ChainBroken {
                reason: format!("predecessor {} does not link to {}", slot.node.key_hex(), hex::encode(key)),
            });
        }
        slot.node.next = removed.next.clone();
        slot.version = version;
        let predecessor = slot.node.clone();
        self.slots.remove(key);
        Ok((predecessor, removed))
    }

    /// Check the list is a single strictly increasing chain from head to tail
    pub fn verify_chain(&self) -> Result<(), RegistryError> {
        let head = self.head().ok_or_else(|| RegistryError::ChainBroken {
            reason: "missing head sentinel".to_string(),
        })?;
        let mut current = head;
        let mut visited = 1;
        loop {
            if current.key >= current.next {
                return Err(RegistryError::ChainBroken {
                    reason: format!("node {} is not below its next", current.key_hex()),
                });
            }
            if current.is_last() {
                break;
            }
            current = self
                .get(&current.next)
                .ok_or_else(|| RegistryError::ChainBroken {
                    reason: format!("dangling next {}", hex::encode(&current.next)),
                })?;
            visited += 1;
        }
        if visited != self.slots.len() {
            return Err(RegistryError::ChainBroken {
                reason: format!("{} nodes unreachable from head", self.slots.len() - visited),
            });
        }
        Ok(())
    }

    fn bump(&mut self) -> u64 {
        let v = self.next_version;
        self.next_version += 1;
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn list() -> SortedList<()> {
        SortedList::new(())
    }

    #[test]
    fn test_empty_list_covers_everything() {
        let l = list();
        let cover = l.find_covering(&[0x42; 28]).unwrap();
        assert!(cover.is_head());
        assert!(cover.is_last());
        assert!(l.is_empty());
    }

    #[test]
    fn test_insert_splits_covering_node() {
        let mut l = list();
        let (pred, new) = l.insert(b"m", ()).unwrap();
        assert_eq!(pred.key, b"".to_vec());
        assert_eq!(pred.next, b"m".to_vec());
        assert_eq!(new.key, b"m".to_vec());
        assert_eq!(new.next, TAIL_KEY.to_vec());

        let (pred, new) = l.insert(b"c", ()).unwrap();
        assert!(pred.is_head());
        assert_eq!(new.next, b"m".to_vec());
        l.verify_chain().unwrap();
        assert_eq!(l.len(), 2);
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let mut l = list();
        l.insert(b"k", ()).unwrap();
        assert!(matches!(
            l.insert(b"k", ()),
            Err(RegistryError::AlreadyRegistered { .. })
        ));
    }

    #[test]
    fn test_invalid_keys() {
        let l = list();
        assert!(matches!(l.lookup(b""), Err(RegistryError::InvalidKey { .. })));
        assert!(matches!(l.lookup(&TAIL_KEY), Err(RegistryError::InvalidKey { .. })));
        assert!(matches!(l.lookup(&[1u8; 29]), Err(RegistryError::InvalidKey { .. })));
    }

    #[test]
    fn test_concurrent_plans_on_same_covering_node() {
        let mut l = list();
        let first = l.plan_insert(b"a", ()).unwrap();
        let second = l.plan_insert(b"b", ()).unwrap();
        assert_eq!(first.covering, second.covering);

        l.commit(first).unwrap();
        assert!(matches!(
            l.commit(second),
            Err(RegistryError::CoveringNodeSpent { .. })
        ));

        // Replanning against the fresh covering node succeeds
        l.insert(b"b", ()).unwrap();
        l.verify_chain().unwrap();
    }

    #[test]
    fn test_plan_on_unrelated_node_survives() {
        let mut l = list();
        l.insert(b"m", ()).unwrap();
        let plan = l.plan_insert(b"x", ()).unwrap();
        l.insert(b"c", ()).unwrap();
        l.commit(plan).unwrap();
        l.verify_chain().unwrap();
    }

    #[test]
    fn test_remove_merges_into_predecessor() {
        let mut l = list();
        l.insert(b"a", ()).unwrap();
        l.insert(b"b", ()).unwrap();
        let (pred, removed) = l.remove(b"a").unwrap();
        assert!(pred.is_head());
        assert_eq!(pred.next, b"b".to_vec());
        assert_eq!(removed.key, b"a".to_vec());
        l.verify_chain().unwrap();
        assert!(matches!(l.remove(b"a"), Err(RegistryError::NodeNotFound { .. })));
    }

    #[test]
    fn test_from_nodes_detects_gap() {
        let nodes = vec![
            Node::new(Vec::new(), b"b".to_vec(), ()),
            Node::new(b"c".to_vec(), TAIL_KEY.to_vec(), ()),
        ];
        assert!(matches!(
            SortedList::from_nodes(nodes),
            Err(RegistryError::ChainBroken { .. })
        ));
    }

    #[test]
    fn test_lookup_proofs() {
        let mut l = list();
        l.insert(&[5; 28], ()).unwrap();
        assert!(l.lookup(&[5; 28]).unwrap().is_member());
        let proof = l.lookup(&[6; 28]).unwrap();
        assert!(!proof.is_member());
        assert_eq!(proof.node().key, vec![5; 28]);
    }

    proptest! {
        #[test]
        fn prop_sorted_and_covering_after_inserts(
            keys in prop::collection::vec(prop::collection::vec(any::<u8>(), 1..=28), 1..40),
            probe in prop::collection::vec(any::<u8>(), 1..=28),
        ) {
            let mut l = list();
            for key in &keys {
                if check_key(key).is_ok() {
                    let _ = l.insert(key, ());
                }
            }
            prop_assert!(l.verify_chain().is_ok());

            let nodes: Vec<_> = l.iter().collect();
            for pair in nodes.windows(2) {
                prop_assert!(pair[0].key < pair[1].key);
                prop_assert_eq!(&pair[0].next, &pair[1].key);
            }

            if check_key(&probe).is_ok() && !l.contains(&probe) {
                let covering: Vec<_> = l.iter().filter(|n| n.covers(&probe)).collect();
                prop_assert_eq!(covering.len(), 1);
                prop_assert_eq!(l.find_covering(&probe).unwrap(), covering[0]);
            }
        }

        #[test]
        fn prop_covering_unaffected_by_unrelated_insert(
            keys in prop::collection::vec(prop::collection::vec(any::<u8>(), 1..=28), 0..20),
            probe in prop::collection::vec(any::<u8>(), 1..=28),
            other in prop::collection::vec(any::<u8>(), 1..=28),
        ) {
            let mut l = list();
            for key in &keys {
                if check_key(key).is_ok() {
                    let _ = l.insert(key, ());
                }
            }
            prop_assume!(check_key(&probe).is_ok() && !l.contains(&probe));
            prop_assume!(check_key(&other).is_ok() && !l.contains(&other));
            let before = l.find_covering(&probe).unwrap().clone();
            prop_assume!(!before.covers(&other));

            l.insert(&other, ()).unwrap();
            prop_assert_eq!(l.find_covering(&probe).unwrap(), &before);
        }
    }
}

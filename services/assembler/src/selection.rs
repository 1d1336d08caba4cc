//! Input selection and change
//!
//! Candidates are considered in ascending output-reference order. Selection
//! is greedy: the first candidate holding any unit still owed is taken, and
//! the outstanding amount is recomputed, until the transaction balances with
//! every change output carrying its minimum deposit.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use types::ids::PolicyId;
use types::tx::Utxo;
use types::value::{Unit, Value, ValueDiff, ValueError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SelectionConfig {
    /// Lovelace placed in every output the assembler creates
    pub min_output_lovelace: Decimal,
    /// Flat fee charged to every assembled transaction
    pub fee_reserve: Decimal,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            min_output_lovelace: Decimal::from(1_500_000u64),
            fee_reserve: Decimal::from(500_000u64),
        }
    }
}

/// Candidates in selection order
pub fn sort_candidates<'a>(candidates: impl IntoIterator<Item = &'a Utxo>) -> Vec<&'a Utxo> {
    let mut sorted: Vec<&Utxo> = candidates.into_iter().collect();
    sorted.sort_by(|a, b| a.out_ref.cmp(&b.out_ref));
    sorted.dedup_by(|a, b| a.out_ref == b.out_ref);
    sorted
}

/// Whether `utxo` holds any unit of `need`
pub fn contributes(utxo: &Utxo, need: &Value) -> bool {
    need.iter().any(|(unit, _)| !utxo.value().get(unit).is_zero())
}

/// Change outputs of a balanced transaction
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Change {
    /// Programmable tokens returned to the owner's programmable address
    pub programmable: Option<Value>,
    /// Everything else returned to the caller's change address
    pub wallet: Option<Value>,
    /// Lovelace too small for an output, added to the fee
    pub dust: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    Balanced(Change),
    /// More inputs needed
    Short(Value),
}

fn restrict(value: &Value, keep: impl Fn(&Unit) -> bool) -> Result<Value, ValueError> {
    let mut out = Value::new();
    for (unit, amount) in value.iter().filter(|(u, _)| keep(u)) {
        out.insert(unit.clone(), *amount)?;
    }
    Ok(out)
}

/// Turn the current surplus into change, or report what is still owed.
///
/// `programmable` lists the policies that must stay at a programmable
/// address; any surplus under them becomes the programmable change.
pub fn settle(
    surplus: &ValueDiff,
    programmable: &BTreeSet<PolicyId>,
    config: &SelectionConfig,
) -> Result<Settlement, ValueError> {
    let mut need = surplus.negated().positive();
    let available = surplus.positive();

    let held = |u: &Unit| u.policy().is_some_and(|p| programmable.contains(p));
    let programmable_assets = restrict(&available, held)?;
    let wallet_assets = restrict(&available, |u| *u != Unit::Lovelace && !held(u))?;

    let mut deposits = Decimal::ZERO;
    if !programmable_assets.is_empty() {
        deposits += config.min_output_lovelace;
    }
    if !wallet_assets.is_empty() {
        deposits += config.min_output_lovelace;
    }
    let lovelace = available.coin();
    if lovelace < deposits {
        let owed = need.get(&Unit::Lovelace) + deposits - lovelace;
        need.insert(Unit::Lovelace, owed)?;
    }
    if !need.is_empty() {
        return Ok(Settlement::Short(need));
    }

    let mut change = Change::default();
    let mut remaining = lovelace;
    if !programmable_assets.is_empty() {
        let mut value = programmable_assets;
        value.insert(Unit::Lovelace, config.min_output_lovelace)?;
        remaining -= config.min_output_lovelace;
        change.programmable = Some(value);
    }
    if !wallet_assets.is_empty() || remaining >= config.min_output_lovelace {
        let mut value = wallet_assets;
        value.insert(Unit::Lovelace, remaining)?;
        change.wallet = Some(value);
    } else {
        change.dust = remaining;
    }
    Ok(Settlement::Balanced(change))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use types::address::{Address, Credential};
    use types::ids::{AssetName, KeyHash, OutputRef, TxId};
    use types::tx::TxOutput;

    const TOKEN: PolicyId = PolicyId::new([0x42; 28]);
    const OTHER: PolicyId = PolicyId::new([0x43; 28]);

    fn tkn() -> Unit {
        Unit::asset(TOKEN, AssetName::from_label("TKN").unwrap())
    }

    fn config() -> SelectionConfig {
        SelectionConfig::default()
    }

    fn diff(pairs: &[(Unit, i64)]) -> ValueDiff {
        let mut d = ValueDiff::new();
        for (unit, amount) in pairs {
            d.add_amount(unit.clone(), Decimal::from(*amount)).unwrap();
        }
        d
    }

    #[test]
    fn test_sort_is_by_output_reference() {
        let address = Address::new(0, Credential::Key(KeyHash::new([1; 28])), None);
        let u = |tx: u8, i: u32| {
            Utxo::new(
                OutputRef::new(TxId::new([tx; 32]), i),
                TxOutput::new(address, Value::lovelace(1)),
            )
        };
        let candidates = vec![u(3, 0), u(1, 1), u(1, 0), u(1, 0)];
        let sorted: Vec<_> = sort_candidates(&candidates).iter().map(|u| u.out_ref).collect();
        assert_eq!(sorted, vec![u(1, 0).out_ref, u(1, 1).out_ref, u(3, 0).out_ref]);
    }

    #[test]
    fn test_deficit_reported() {
        let surplus = diff(&[(Unit::Lovelace, -2_000_000), (tkn(), -5)]);
        let Settlement::Short(need) = settle(&surplus, &BTreeSet::new(), &config()).unwrap() else {
            panic!("expected shortfall");
        };
        assert_eq!(need.coin(), Decimal::from(2_000_000));
        assert_eq!(need.get(&tkn()), Decimal::from(5));
    }

    #[test]
    fn test_programmable_change_needs_deposit() {
        // 100 tokens left over but only 1 ADA to carry them
        let surplus = diff(&[(Unit::Lovelace, 1_000_000), (tkn(), 100)]);
        let programmable: BTreeSet<_> = [TOKEN].into_iter().collect();
        let Settlement::Short(need) = settle(&surplus, &programmable, &config()).unwrap() else {
            panic!("expected shortfall");
        };
        assert_eq!(need, Value::lovelace(500_000));
    }

    #[test]
    fn test_split_change() {
        let surplus = diff(&[(Unit::Lovelace, 4_000_000), (tkn(), 100)]);
        let programmable: BTreeSet<_> = [TOKEN].into_iter().collect();
        let Settlement::Balanced(change) = settle(&surplus, &programmable, &config()).unwrap() else {
            panic!("expected balance");
        };
        assert_eq!(
            change.programmable,
            Some(Value::lovelace(1_500_000).with(tkn(), 100))
        );
        assert_eq!(change.wallet, Some(Value::lovelace(2_500_000)));
        assert!(change.dust.is_zero());
    }

    #[test]
    fn test_small_remainder_becomes_dust() {
        let surplus = diff(&[(Unit::Lovelace, 700_000)]);
        let Settlement::Balanced(change) = settle(&surplus, &BTreeSet::new(), &config()).unwrap() else {
            panic!("expected balance");
        };
        assert_eq!(change.wallet, None);
        assert_eq!(change.dust, Decimal::from(700_000));
    }

    #[test]
    fn test_non_programmable_assets_go_to_wallet() {
        let surplus = diff(&[(Unit::Lovelace, 1_500_000), (tkn(), 3)]);
        let Settlement::Balanced(change) = settle(&surplus, &BTreeSet::new(), &config()).unwrap() else {
            panic!("expected balance");
        };
        assert_eq!(change.programmable, None);
        assert_eq!(change.wallet, Some(Value::lovelace(1_500_000).with(tkn(), 3)));
    }

    fn other() -> Unit {
        Unit::asset(OTHER, AssetName::from_label("OTH").unwrap())
    }

    fn candidate(tx: u8, index: u32) -> Utxo {
        let address = Address::new(0, Credential::Key(KeyHash::new([1; 28])), None);
        Utxo::new(
            OutputRef::new(TxId::new([tx; 32]), index),
            TxOutput::new(address, Value::lovelace(1)),
        )
    }

    proptest! {
        /// The order does not depend on how candidates arrive
        #[test]
        fn prop_sort_is_deterministic(refs in prop::collection::vec((0u8..8, 0u32..4), 0..24)) {
            let candidates: Vec<Utxo> = refs.iter().map(|(tx, i)| candidate(*tx, *i)).collect();
            let forward: Vec<OutputRef> = sort_candidates(&candidates).iter().map(|u| u.out_ref).collect();
            let backward: Vec<OutputRef> = sort_candidates(candidates.iter().rev()).iter().map(|u| u.out_ref).collect();
            prop_assert_eq!(&forward, &backward);
            prop_assert!(forward.windows(2).all(|w| w[0] < w[1]));

            let distinct: BTreeSet<OutputRef> = candidates.iter().map(|u| u.out_ref).collect();
            prop_assert_eq!(forward.len(), distinct.len());
        }

        /// A balanced settlement returns exactly the surplus with every output
        /// funded; a shortfall, once covered, balances.
        #[test]
        fn prop_settle_is_sufficient(
            lovelace in -5_000_000i64..10_000_000,
            token in -100i64..100,
            other_amount in -100i64..100,
            token_programmable in any::<bool>(),
        ) {
            let surplus = diff(&[(Unit::Lovelace, lovelace), (tkn(), token), (other(), other_amount)]);
            let programmable: BTreeSet<PolicyId> = if token_programmable {
                [TOKEN].into_iter().collect()
            } else {
                BTreeSet::new()
            };
            let min = config().min_output_lovelace;

            let (settled, change) = match settle(&surplus, &programmable, &config()).unwrap() {
                Settlement::Balanced(change) => (surplus, change),
                Settlement::Short(need) => {
                    prop_assert!(!need.is_empty());
                    let covered = surplus.checked_add_value(&need).unwrap();
                    match settle(&covered, &programmable, &config()).unwrap() {
                        Settlement::Balanced(change) => (covered, change),
                        Settlement::Short(again) => {
                            return Err(TestCaseError::fail(format!("still short by {:?}", again)));
                        }
                    }
                }
            };

            let outputs: Vec<&Value> = change.programmable.iter().chain(change.wallet.iter()).collect();
            for output in &outputs {
                prop_assert!(output.coin() >= min);
            }
            prop_assert!(change.dust < min);
            if let Some(value) = &change.programmable {
                prop_assert!(value.assets().iter().all(|(u, _)| u.policy() == Some(&TOKEN)));
            }

            let returned = outputs.iter().try_fold(Value::new(), |acc, v| acc.checked_add(v)).unwrap();
            prop_assert_eq!(returned.assets(), settled.positive().assets());
            prop_assert_eq!(returned.coin() + change.dust, settled.positive().coin());
        }
    }
}

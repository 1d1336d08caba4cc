//! Multi-asset values and signed value diffs
//!
//! Amounts are integer quantities held in `rust_decimal::Decimal` so every
//! computation is exact and serializes as a decimal string. A [`Value`] is
//! never negative; a [`ValueDiff`] carries signed deltas and serializes with
//! an explicit `+`/`-` sign.
//!
//! Units render as `"lovelace"` or `"{policyIdHex}{assetNameHex}"`.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::ids::{AssetName, PolicyId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    #[error("Invalid unit: {0}")]
    InvalidUnit(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Amount for {unit} must be a whole number: {amount}")]
    NonIntegral { unit: String, amount: String },

    #[error("Negative amount for {unit}: {amount}")]
    Negative { unit: String, amount: String },

    #[error("Arithmetic overflow for {unit}")]
    Overflow { unit: String },
}

/// Unit of account: the native coin or a (policy, asset name) pair
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Unit {
    Lovelace,
    Asset { policy: PolicyId, name: AssetName },
}

impl Unit {
    pub fn asset(policy: PolicyId, name: AssetName) -> Self {
        Unit::Asset { policy, name }
    }

    pub fn policy(&self) -> Option<&PolicyId> {
        match self {
            Unit::Lovelace => None,
            Unit::Asset { policy, .. } => Some(policy),
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unit::Lovelace => f.write_str("lovelace"),
            Unit::Asset { policy, name } => write!(f, "{}{}", policy, name),
        }
    }
}

impl fmt::Debug for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unit({})", self)
    }
}

impl FromStr for Unit {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "lovelace" {
            return Ok(Unit::Lovelace);
        }
        let policy_len = PolicyId::LEN * 2;
        if s.len() < policy_len || !s.is_char_boundary(policy_len) {
            return Err(ValueError::InvalidUnit(s.to_string()));
        }
        let (policy, name) = s.split_at(policy_len);
        let policy = PolicyId::from_hex(policy).map_err(|e| ValueError::InvalidUnit(e.to_string()))?;
        let name = AssetName::from_hex(name).map_err(|e| ValueError::InvalidUnit(e.to_string()))?;
        Ok(Unit::Asset { policy, name })
    }
}

impl Serialize for Unit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Unit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

fn policy_total(amounts: &BTreeMap<Unit, Decimal>, policy: &PolicyId) -> Result<Decimal, ValueError> {
    amounts
        .iter()
        .filter(|(u, _)| u.policy() == Some(policy))
        .try_fold(Decimal::ZERO, |acc, (_, a)| {
            acc.checked_add(*a).ok_or_else(|| ValueError::Overflow {
                unit: policy.to_hex(),
            })
        })
}

fn check_whole(unit: &Unit, amount: Decimal) -> Result<(), ValueError> {
    if !amount.fract().is_zero() {
        return Err(ValueError::NonIntegral {
            unit: unit.to_string(),
            amount: amount.to_string(),
        });
    }
    Ok(())
}

/// Non-negative multi-asset value
///
/// Zero quantities are never stored, so two values are equal iff they hold
/// the same non-zero amounts.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<Unit, Decimal>", into = "BTreeMap<Unit, Decimal>")]
pub struct Value(BTreeMap<Unit, Decimal>);

impl TryFrom<BTreeMap<Unit, Decimal>> for Value {
    type Error = ValueError;

    fn try_from(map: BTreeMap<Unit, Decimal>) -> Result<Self, Self::Error> {
        let mut value = Value::new();
        for (unit, amount) in map {
            value.insert(unit, amount)?;
        }
        Ok(value)
    }
}

impl From<Value> for BTreeMap<Unit, Decimal> {
    fn from(value: Value) -> Self {
        value.0
    }
}

impl Value {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// # Panics
    /// Panics if `amount` is negative or fractional
    pub fn lovelace(amount: impl Into<Decimal>) -> Self {
        Self::new().with(Unit::Lovelace, amount)
    }

    /// Builder-style insertion for literal amounts
    ///
    /// # Panics
    /// Panics if `amount` is negative or fractional
    pub fn with(mut self, unit: Unit, amount: impl Into<Decimal>) -> Self {
        self.insert(unit, amount.into())
            .expect("literal value amount must be a non-negative whole number");
        self
    }

    /// Set the amount of `unit`, replacing any previous amount.
    pub fn insert(&mut self, unit: Unit, amount: Decimal) -> Result<(), ValueError> {
        check_whole(&unit, amount)?;
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(ValueError::Negative {
                unit: unit.to_string(),
                amount: amount.to_string(),
            });
        }
        if amount.is_zero() {
            self.0.remove(&unit);
        } else {
            self.0.insert(unit, amount);
        }
        Ok(())
    }

    pub fn get(&self, unit: &Unit) -> Decimal {
        self.0.get(unit).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn coin(&self) -> Decimal {
        self.get(&Unit::Lovelace)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Unit, &Decimal)> {
        self.0.iter()
    }

    /// Distinct policies present, in ascending order
    pub fn policies(&self) -> BTreeSet<PolicyId> {
        self.0.keys().filter_map(|u| u.policy().copied()).collect()
    }

    /// Total quantity held under `policy` across all asset names
    pub fn policy_total(&self, policy: &PolicyId) -> Result<Decimal, ValueError> {
        policy_total(&self.0, policy)
    }

    /// The non-lovelace part of this value
    pub fn assets(&self) -> Value {
        Value(
            self.0
                .iter()
                .filter(|(u, _)| **u != Unit::Lovelace)
                .map(|(u, a)| (u.clone(), *a))
                .collect(),
        )
    }

    /// Restrict to the units of a single policy
    pub fn only_policy(&self, policy: &PolicyId) -> Value {
        Value(
            self.0
                .iter()
                .filter(|(u, _)| u.policy() == Some(policy))
                .map(|(u, a)| (u.clone(), *a))
                .collect(),
        )
    }

    pub fn checked_add(&self, other: &Value) -> Result<Value, ValueError> {
        let mut out = self.clone();
        for (unit, amount) in &other.0 {
            let current = out.get(unit);
            let sum = current.checked_add(*amount).ok_or_else(|| ValueError::Overflow {
                unit: unit.to_string(),
            })?;
            out.insert(unit.clone(), sum)?;
        }
        Ok(out)
    }

    pub fn checked_sub(&self, other: &Value) -> Result<Value, ValueError> {
        let mut diff = ValueDiff::from(self.clone());
        diff = diff.checked_sub_value(other)?;
        diff.into_value()
    }

    /// True when every amount in `required` is available here
    pub fn covers(&self, required: &Value) -> bool {
        required.0.iter().all(|(u, a)| self.get(u) >= *a)
    }

    /// Amounts of `required` not covered by `self`
    pub fn shortfall(&self, required: &Value) -> Value {
        Value(
            required
                .0
                .iter()
                .filter_map(|(u, a)| {
                    let have = self.get(u);
                    (have < *a).then(|| (u.clone(), *a - have))
                })
                .collect(),
        )
    }

    /// Apply a signed diff, failing if any unit would go negative
    pub fn apply(&self, diff: &ValueDiff) -> Result<Value, ValueError> {
        ValueDiff::from(self.clone()).checked_add(diff)?.into_value()
    }
}

/// Signed multi-asset delta
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValueDiff(BTreeMap<Unit, Decimal>);

impl From<Value> for ValueDiff {
    fn from(value: Value) -> Self {
        ValueDiff(value.0)
    }
}

impl ValueDiff {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// `current - previous`, zero deltas omitted
    pub fn between(previous: &Value, current: &Value) -> ValueDiff {
        let units: BTreeSet<&Unit> = previous.0.keys().chain(current.0.keys()).collect();
        ValueDiff(
            units
                .into_iter()
                .filter_map(|u| {
                    let delta = current.get(u) - previous.get(u);
                    (!delta.is_zero()).then(|| (u.clone(), delta))
                })
                .collect(),
        )
    }

    /// Add a signed amount for `unit`
    pub fn add_amount(&mut self, unit: Unit, amount: Decimal) -> Result<(), ValueError> {
        check_whole(&unit, amount)?;
        let current = self.get(&unit);
        let sum = current.checked_add(amount).ok_or_else(|| ValueError::Overflow {
            unit: unit.to_string(),
        })?;
        if sum.is_zero() {
            self.0.remove(&unit);
        } else {
            self.0.insert(unit, sum);
        }
        Ok(())
    }

    pub fn get(&self, unit: &Unit) -> Decimal {
        self.0.get(unit).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Unit, &Decimal)> {
        self.0.iter()
    }

    pub fn policies(&self) -> BTreeSet<PolicyId> {
        self.0.keys().filter_map(|u| u.policy().copied()).collect()
    }

    pub fn policy_total(&self, policy: &PolicyId) -> Result<Decimal, ValueError> {
        policy_total(&self.0, policy)
    }

    pub fn checked_add(mut self, other: &ValueDiff) -> Result<ValueDiff, ValueError> {
        for (unit, amount) in &other.0 {
            self.add_amount(unit.clone(), *amount)?;
        }
        Ok(self)
    }

    pub fn checked_add_value(self, other: &Value) -> Result<ValueDiff, ValueError> {
        self.checked_add(&ValueDiff(other.0.clone()))
    }

    pub fn checked_sub_value(mut self, other: &Value) -> Result<ValueDiff, ValueError> {
        for (unit, amount) in &other.0 {
            self.add_amount(unit.clone(), -*amount)?;
        }
        Ok(self)
    }

    pub fn negated(&self) -> ValueDiff {
        ValueDiff(self.0.iter().map(|(u, a)| (u.clone(), -*a)).collect())
    }

    /// Positive part only
    pub fn positive(&self) -> Value {
        Value(
            self.0
                .iter()
                .filter(|(_, a)| a.is_sign_positive() && !a.is_zero())
                .map(|(u, a)| (u.clone(), *a))
                .collect(),
        )
    }

    /// Convert to a [`Value`], failing on any negative entry
    pub fn into_value(self) -> Result<Value, ValueError> {
        if let Some((unit, amount)) = self.0.iter().find(|(_, a)| a.is_sign_negative()) {
            return Err(ValueError::Negative {
                unit: unit.to_string(),
                amount: amount.to_string(),
            });
        }
        Ok(Value(self.0))
    }
}

fn format_signed(amount: &Decimal) -> String {
    if amount.is_sign_negative() {
        amount.to_string()
    } else {
        format!("+{}", amount)
    }
}

fn parse_signed(s: &str) -> Result<Decimal, ValueError> {
    let unsigned = s.strip_prefix('+').unwrap_or(s);
    Decimal::from_str(unsigned).map_err(|_| ValueError::InvalidAmount(s.to_string()))
}

impl Serialize for ValueDiff {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let map: BTreeMap<String, String> = self
            .0
            .iter()
            .map(|(u, a)| (u.to_string(), format_signed(a)))
            .collect();
        map.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ValueDiff {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, String>::deserialize(deserializer)?;
        let mut diff = ValueDiff::new();
        for (unit, amount) in raw {
            let unit: Unit = unit.parse().map_err(serde::de::Error::custom)?;
            let amount = parse_signed(&amount).map_err(serde::de::Error::custom)?;
            diff.add_amount(unit, amount).map_err(serde::de::Error::custom)?;
        }
        Ok(diff)
    }
}

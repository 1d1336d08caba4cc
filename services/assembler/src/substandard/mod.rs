//! Substandard capability framework
//!
//! A substandard is the set of rules a token opts into at registration. Each
//! one is a [`Substandard`] trait object held in a [`SubstandardRegistry`]
//! built once at startup; handlers are resolved by id and contribute
//! [`TxFragment`]s that the assembler composes.
//!
//! `register`, `mint` and `transfer` are required. `burn` defaults to `mint`
//! with the quantity negated. Credential list management and seizure are
//! optional and fail with `CapabilityNotSupported` unless overridden.

mod allowlist;
mod dummy;
mod freeze_and_seize;
mod list;

pub use allowlist::AllowlistSubstandard;
pub use dummy::DummySubstandard;
pub use freeze_and_seize::FreezeAndSeizeSubstandard;

use contracts::bootstrap::ProtocolBootstrapParams;
use contracts::registry::DirectoryEntry;
use indexer::IndexerState;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{info, warn};
use types::address::Credential;
use types::ids::{KeyHash, PolicyId, ScriptHash};
use types::plutus::PlutusData;
use types::value::Unit;

use crate::errors::SubstandardError;
use crate::fragment::{RedeemerData, TxFragment};
use crate::selection::SelectionConfig;

pub const DUMMY: &str = "dummy";
pub const FREEZE_AND_SEIZE: &str = "freeze-and-seize";
pub const ALLOWLIST: &str = "allowlist";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    Register,
    Mint,
    Burn,
    Transfer,
    Blacklist,
    Whitelist,
    Seize,
}

impl Capability {
    pub const REQUIRED: [Capability; 4] = [
        Capability::Register,
        Capability::Mint,
        Capability::Burn,
        Capability::Transfer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Register => "register",
            Capability::Mint => "mint",
            Capability::Burn => "burn",
            Capability::Transfer => "transfer",
            Capability::Blacklist => "blacklist",
            Capability::Whitelist => "whitelist",
            Capability::Seize => "seize",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Operation inputs ────────────────────────────────────────────────

/// What a registered token's handler sees
pub struct TokenContext<'a> {
    pub params: &'a ProtocolBootstrapParams,
    pub state: &'a IndexerState,
    pub policy: PolicyId,
    pub entry: &'a DirectoryEntry,
    pub selection: &'a SelectionConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationTerms {
    pub policy: PolicyId,
    pub issuer: KeyHash,
    /// Node policy of the token's credential list, for substandards that keep one
    pub list_policy: Option<PolicyId>,
}

/// Handler output for a registration: the directory entry to insert plus
/// whatever else the handler needs in the transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub entry: DirectoryEntry,
    pub fragment: TxFragment,
}

/// Signed quantity of one unit to mint (positive) or burn (negative)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issuance {
    pub unit: Unit,
    pub quantity: Decimal,
    pub issuer: KeyHash,
}

impl Issuance {
    pub fn negated(&self) -> Self {
        Self {
            unit: self.unit.clone(),
            quantity: -self.quantity,
            issuer: self.issuer,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferTerms {
    /// Owners of the spent programmable inputs
    pub senders: Vec<Credential>,
    /// Owners of the programmable outputs, change included
    pub recipients: Vec<Credential>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ListAction {
    /// Create the list's head node
    Init,
    Add,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListChange {
    pub action: ListAction,
    pub target: Option<Credential>,
    pub issuer: KeyHash,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeizeTerms {
    pub issuer: KeyHash,
}

fn unsupported(id: &str, capability: Capability) -> SubstandardError {
    SubstandardError::CapabilityNotSupported {
        id: id.to_string(),
        capability,
    }
}

/// Issuer-signed mint or burn, authorized by the token's third-party logic
pub(crate) fn issue(ctx: &TokenContext<'_>, issuance: &Issuance) -> Result<TxFragment, SubstandardError> {
    if issuance.unit.policy() != Some(&ctx.policy) {
        return Err(SubstandardError::InvalidRequest(format!(
            "unit {} is not under policy {}",
            issuance.unit, ctx.policy
        )));
    }
    let tag = if issuance.quantity.is_sign_negative() { 1 } else { 0 };
    let mut fragment = TxFragment::new();
    fragment.mint(issuance.unit.clone(), issuance.quantity, PlutusData::constr(tag, Vec::new()))?;
    fragment.invoke(ctx.entry.third_party_logic, RedeemerData::Fixed(PlutusData::unit()));
    fragment.sign(issuance.issuer);
    Ok(fragment)
}

// ── Trait ───────────────────────────────────────────────────────────

pub trait Substandard: Send + Sync {
    fn id(&self) -> &str;

    /// Stake script every holder transfer must invoke
    fn transfer_logic(&self) -> ScriptHash;

    /// Stake script the issuer invokes to act on holders' tokens
    fn third_party_logic(&self) -> ScriptHash;

    fn capabilities(&self) -> BTreeSet<Capability> {
        Capability::REQUIRED.into_iter().collect()
    }

    fn register(
        &self,
        params: &ProtocolBootstrapParams,
        terms: &RegistrationTerms,
    ) -> Result<Registration, SubstandardError>;

    fn mint(&self, ctx: &TokenContext<'_>, issuance: &Issuance) -> Result<TxFragment, SubstandardError>;

    fn burn(&self, ctx: &TokenContext<'_>, issuance: &Issuance) -> Result<TxFragment, SubstandardError> {
        self.mint(ctx, &issuance.negated())
    }

    fn transfer(&self, ctx: &TokenContext<'_>, terms: &TransferTerms) -> Result<TxFragment, SubstandardError>;

    fn blacklist(&self, _ctx: &TokenContext<'_>, _change: &ListChange) -> Result<TxFragment, SubstandardError> {
        Err(unsupported(self.id(), Capability::Blacklist))
    }

    fn whitelist(&self, _ctx: &TokenContext<'_>, _change: &ListChange) -> Result<TxFragment, SubstandardError> {
        Err(unsupported(self.id(), Capability::Whitelist))
    }

    fn seize(&self, _ctx: &TokenContext<'_>, _terms: &SeizeTerms) -> Result<TxFragment, SubstandardError> {
        Err(unsupported(self.id(), Capability::Seize))
    }
}

// ── Startup table ───────────────────────────────────────────────────

/// Deployed scripts of one substandard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubstandardScripts {
    pub transfer_logic: ScriptHash,
    pub third_party_logic: ScriptHash,
    /// Spending script guarding credential list nodes
    #[serde(default)]
    pub list_spend: Option<ScriptHash>,
}

impl SubstandardScripts {
    /// Parse a deployment table keyed by substandard id
    pub fn table_from_json(raw: &str) -> Result<BTreeMap<String, SubstandardScripts>, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubstandardInfo {
    pub id: String,
    pub transfer_logic: ScriptHash,
    pub third_party_logic: ScriptHash,
    pub capabilities: Vec<Capability>,
    pub enabled: bool,
}

#[derive(Default)]
pub struct SubstandardRegistry {
    handlers: BTreeMap<String, Box<dyn Substandard>>,
    disabled: BTreeSet<String>,
}

impl SubstandardRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the table from deployed scripts keyed by substandard id
    pub fn from_deployments(
        deployments: &BTreeMap<String, SubstandardScripts>,
        disabled: &BTreeSet<String>,
    ) -> Result<Self, SubstandardError> {
        let mut registry = Self::new();
        for (id, scripts) in deployments {
            let list_spend = || {
                scripts.list_spend.ok_or_else(|| {
                    SubstandardError::InvalidRequest(format!("substandard {} needs a listSpend script", id))
                })
            };
            let handler: Box<dyn Substandard> = match id.as_str() {
                DUMMY => Box::new(DummySubstandard::new(scripts.transfer_logic, scripts.third_party_logic)),
                FREEZE_AND_SEIZE => Box::new(FreezeAndSeizeSubstandard::new(
                    scripts.transfer_logic,
                    scripts.third_party_logic,
                    list_spend()?,
                )),
                ALLOWLIST => Box::new(AllowlistSubstandard::new(
                    scripts.transfer_logic,
                    scripts.third_party_logic,
                    list_spend()?,
                )),
                other => {
                    warn!(substandard = other, "Unknown substandard in deployment ignored");
                    continue;
                }
            };
            registry.register(handler);
        }
        for id in disabled {
            registry.disable(id);
        }
        Ok(registry)
    }

    pub fn with(mut self, handler: Box<dyn Substandard>) -> Self {
        self.register(handler);
        self
    }

    pub fn register(&mut self, handler: Box<dyn Substandard>) {
        info!(substandard = handler.id(), transfer_logic = %handler.transfer_logic(), "Substandard registered");
        self.handlers.insert(handler.id().to_string(), handler);
    }

    /// Turn a substandard off; resolving it then fails as if it were absent
    pub fn disable(&mut self, id: &str) {
        self.disabled.insert(id.to_string());
    }

    pub fn resolve(&self, id: &str) -> Result<&dyn Substandard, SubstandardError> {
        if self.disabled.contains(id) {
            return Err(SubstandardError::Disabled { id: id.to_string() });
        }
        self.handlers
            .get(id)
            .map(|h| h.as_ref())
            .ok_or_else(|| SubstandardError::NotFound { id: id.to_string() })
    }

    pub fn list(&self) -> Vec<SubstandardInfo> {
        self.handlers
            .values()
            .map(|h| SubstandardInfo {
                id: h.id().to_string(),
                transfer_logic: h.transfer_logic(),
                third_party_logic: h.third_party_logic(),
                capabilities: h.capabilities().into_iter().collect(),
                enabled: !self.disabled.contains(h.id()),
            })
            .collect()
    }

    /// Transfer logic hash → substandard id, how the indexer routes registrations
    pub fn transfer_logic_ids(&self) -> BTreeMap<ScriptHash, String> {
        self.handlers
            .values()
            .map(|h| (h.transfer_logic(), h.id().to_string()))
            .collect()
    }
}

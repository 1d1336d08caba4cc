//! Freeze-and-seize substandard
//!
//! The issuer keeps a deny list of credential hashes. Every transfer proves
//! each sender absent from it with a covering node, and the issuer can move
//! holders' tokens through the third-party logic.

use contracts::bootstrap::ProtocolBootstrapParams;
use contracts::registry::DirectoryEntry;
use std::collections::BTreeSet;
use types::ids::ScriptHash;
use types::plutus::PlutusData;

use super::list;
use super::{
    issue, Capability, Issuance, ListChange, Registration, RegistrationTerms, SeizeTerms, Substandard,
    TokenContext, TransferTerms, FREEZE_AND_SEIZE,
};
use crate::errors::SubstandardError;
use crate::fragment::{RedeemerData, TxFragment};

#[derive(Debug, Clone)]
pub struct FreezeAndSeizeSubstandard {
    transfer_logic: ScriptHash,
    third_party_logic: ScriptHash,
    list_spend: ScriptHash,
}

impl FreezeAndSeizeSubstandard {
    pub fn new(transfer_logic: ScriptHash, third_party_logic: ScriptHash, list_spend: ScriptHash) -> Self {
        Self {
            transfer_logic,
            third_party_logic,
            list_spend,
        }
    }
}

impl Substandard for FreezeAndSeizeSubstandard {
    fn id(&self) -> &str {
        FREEZE_AND_SEIZE
    }

    fn transfer_logic(&self) -> ScriptHash {
        self.transfer_logic
    }

    fn third_party_logic(&self) -> ScriptHash {
        self.third_party_logic
    }

    fn capabilities(&self) -> BTreeSet<Capability> {
        let mut caps: BTreeSet<Capability> = Capability::REQUIRED.into_iter().collect();
        caps.insert(Capability::Blacklist);
        caps.insert(Capability::Seize);
        caps
    }

    fn register(
        &self,
        _params: &ProtocolBootstrapParams,
        terms: &RegistrationTerms,
    ) -> Result<Registration, SubstandardError> {
        let list_policy = terms.list_policy.ok_or_else(|| {
            SubstandardError::InvalidRequest("freeze-and-seize registration needs a deny list policy".to_string())
        })?;
        let mut entry = DirectoryEntry::new(self.transfer_logic, self.third_party_logic);
        entry.global_state = Some(list_policy);
        let mut fragment = TxFragment::new();
        fragment.sign(terms.issuer);
        Ok(Registration { entry, fragment })
    }

    fn mint(&self, ctx: &TokenContext<'_>, issuance: &Issuance) -> Result<TxFragment, SubstandardError> {
        issue(ctx, issuance)
    }

    fn transfer(&self, ctx: &TokenContext<'_>, terms: &TransferTerms) -> Result<TxFragment, SubstandardError> {
        let policy = list::list_policy(ctx)?;
        let refs = list::non_membership(ctx, policy, &terms.senders)?;
        let mut fragment = TxFragment::new();
        list::reference_nodes(ctx, &mut fragment, &refs);
        fragment.invoke(self.transfer_logic, RedeemerData::NodeIndices(refs));
        Ok(fragment)
    }

    fn blacklist(&self, ctx: &TokenContext<'_>, change: &ListChange) -> Result<TxFragment, SubstandardError> {
        list::change_list(ctx, self.list_spend, change)
    }

    fn seize(&self, ctx: &TokenContext<'_>, terms: &SeizeTerms) -> Result<TxFragment, SubstandardError> {
        let mut fragment = TxFragment::new();
        fragment.invoke(ctx.entry.third_party_logic, RedeemerData::Fixed(PlutusData::unit()));
        fragment.sign(terms.issuer);
        Ok(fragment)
    }
}

//! Allow-list substandard: every holder receiving tokens must be listed

use contracts::bootstrap::ProtocolBootstrapParams;
use contracts::registry::DirectoryEntry;
use std::collections::BTreeSet;
use types::ids::ScriptHash;

use super::list;
use super::{
    issue, Capability, Issuance, ListChange, Registration, RegistrationTerms, Substandard, TokenContext,
    TransferTerms, ALLOWLIST,
};
use crate::errors::SubstandardError;
use crate::fragment::{RedeemerData, TxFragment};

#[derive(Debug, Clone)]
pub struct AllowlistSubstandard {
    transfer_logic: ScriptHash,
    third_party_logic: ScriptHash,
    list_spend: ScriptHash,
}

impl AllowlistSubstandard {
    pub fn new(transfer_logic: ScriptHash, third_party_logic: ScriptHash, list_spend: ScriptHash) -> Self {
        Self {
            transfer_logic,
            third_party_logic,
            list_spend,
        }
    }
}

impl Substandard for AllowlistSubstandard {
    fn id(&self) -> &str {
        ALLOWLIST
    }

    fn transfer_logic(&self) -> ScriptHash {
        self.transfer_logic
    }

    fn third_party_logic(&self) -> ScriptHash {
        self.third_party_logic
    }

    fn capabilities(&self) -> BTreeSet<Capability> {
        let mut caps: BTreeSet<Capability> = Capability::REQUIRED.into_iter().collect();
        caps.insert(Capability::Whitelist);
        caps
    }

    fn register(
        &self,
        _params: &ProtocolBootstrapParams,
        terms: &RegistrationTerms,
    ) -> Result<Registration, SubstandardError> {
        let list_policy = terms.list_policy.ok_or_else(|| {
            SubstandardError::InvalidRequest("allowlist registration needs an allow list policy".to_string())
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
        let refs = list::membership(ctx, policy, &terms.recipients)?;
        let mut fragment = TxFragment::new();
        list::reference_nodes(ctx, &mut fragment, &refs);
        fragment.invoke(self.transfer_logic, RedeemerData::NodeIndices(refs));
        Ok(fragment)
    }

    fn whitelist(&self, ctx: &TokenContext<'_>, change: &ListChange) -> Result<TxFragment, SubstandardError> {
        list::change_list(ctx, self.list_spend, change)
    }
}

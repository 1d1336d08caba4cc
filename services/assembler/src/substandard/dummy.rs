//! Reference substandard: transfers only need its logic to run

use contracts::bootstrap::ProtocolBootstrapParams;
use contracts::registry::DirectoryEntry;
use types::ids::ScriptHash;
use types::plutus::PlutusData;

use super::{issue, Issuance, Registration, RegistrationTerms, Substandard, TokenContext, TransferTerms, DUMMY};
use crate::errors::SubstandardError;
use crate::fragment::{RedeemerData, TxFragment};

#[derive(Debug, Clone)]
pub struct DummySubstandard {
    transfer_logic: ScriptHash,
    third_party_logic: ScriptHash,
}

impl DummySubstandard {
    pub fn new(transfer_logic: ScriptHash, third_party_logic: ScriptHash) -> Self {
        Self {
            transfer_logic,
            third_party_logic,
        }
    }
}

impl Substandard for DummySubstandard {
    fn id(&self) -> &str {
        DUMMY
    }

    fn transfer_logic(&self) -> ScriptHash {
        self.transfer_logic
    }

    fn third_party_logic(&self) -> ScriptHash {
        self.third_party_logic
    }

    fn register(
        &self,
        _params: &ProtocolBootstrapParams,
        terms: &RegistrationTerms,
    ) -> Result<Registration, SubstandardError> {
        let mut fragment = TxFragment::new();
        fragment.sign(terms.issuer);
        Ok(Registration {
            entry: DirectoryEntry::new(self.transfer_logic, self.third_party_logic),
            fragment,
        })
    }

    fn mint(&self, ctx: &TokenContext<'_>, issuance: &Issuance) -> Result<TxFragment, SubstandardError> {
        issue(ctx, issuance)
    }

    fn transfer(&self, _ctx: &TokenContext<'_>, _terms: &TransferTerms) -> Result<TxFragment, SubstandardError> {
        let mut fragment = TxFragment::new();
        fragment.invoke(self.transfer_logic, RedeemerData::Fixed(PlutusData::unit()));
        Ok(fragment)
    }
}

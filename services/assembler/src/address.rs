//! Programmable address derivation

use contracts::bootstrap::ProtocolBootstrapParams;
use types::address::{Address, Credential};

use crate::errors::AssemblyError;

/// The credential that owns tokens sent to `address`
///
/// A programmable address is owned by its stake credential. Any other
/// address is owned by its stake credential, or its payment credential when
/// it has none.
pub fn owner_credential(params: &ProtocolBootstrapParams, address: &Address) -> Result<Credential, AssemblyError> {
    match (params.is_programmable(address), address.stake) {
        (_, Some(stake)) => Ok(stake),
        (false, None) => Ok(address.payment),
        (true, None) => Err(AssemblyError::InvalidRequest(format!(
            "programmable address {} has no owner credential",
            address
        ))),
    }
}

/// Where tokens for the party behind `address` are held
pub fn programmable_address_of(params: &ProtocolBootstrapParams, address: &Address) -> Result<Address, AssemblyError> {
    Ok(params.programmable_address(owner_credential(params, address)?))
}

//! Transaction assembler
//!
//! Turns a request and the indexer's mirror into an unsigned transaction:
//! the substandard handler contributes its fragment, the assembler adds the
//! token outputs, selects funding inputs, places change and finally attaches
//! the coordinator with one registry proof per touched policy. Every result
//! is checked against the coordinator rules before it is returned.

use contracts::bootstrap::ProtocolBootstrapParams;
use contracts::coordinator::{validate_transaction, CoordinatorAct, TransactionContext};
use contracts::errors::RegistryError;
use contracts::registry::{encode_node, marker_name};
use indexer::IndexerState;
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};
use types::address::{Address, Credential};
use types::ids::PolicyId;
use types::plutus::PlutusData;
use types::tx::{Transaction, TxOutput, Utxo};
use types::value::{Unit, Value, ValueDiff, ValueError};

use crate::address::{owner_credential, programmable_address_of};
use crate::errors::{AssemblyError, Shortfall};
use crate::fragment::{NodeProof, RedeemerData, TxFragment};
use crate::nodes;
use crate::requests::{BurnRequest, ListRequest, MintRequest, RegisterRequest, SeizeRequest, TransferRequest};
use crate::selection::{contributes, settle, sort_candidates, SelectionConfig, Settlement};
use crate::substandard::{
    Issuance, ListChange, RegistrationTerms, SeizeTerms, Substandard, SubstandardRegistry, TokenContext,
    TransferTerms,
};

/// Where input selection may draw from and where change goes
struct Funding<'a> {
    utxos: &'a [Utxo],
    change_address: Address,
    /// Programmable address that may be spent from, with the policies its
    /// UTxOs may hold
    programmable: Option<(Address, BTreeSet<PolicyId>)>,
}

impl<'a> Funding<'a> {
    fn wallet(utxos: &'a [Utxo], change_address: Address) -> Self {
        Self {
            utxos,
            change_address,
            programmable: None,
        }
    }

    fn with_programmable(mut self, address: Address, policy: PolicyId) -> Self {
        self.programmable = Some((address, [policy].into_iter().collect()));
        self
    }
}

fn check_quantity(quantity: Decimal) -> Result<(), AssemblyError> {
    if quantity <= Decimal::ZERO || !quantity.fract().is_zero() {
        return Err(AssemblyError::InvalidRequest(format!(
            "quantity must be a positive whole number, got {}",
            quantity
        )));
    }
    Ok(())
}

pub struct TransactionAssembler {
    params: ProtocolBootstrapParams,
    substandards: SubstandardRegistry,
    config: SelectionConfig,
}

impl TransactionAssembler {
    pub fn new(params: ProtocolBootstrapParams, substandards: SubstandardRegistry, config: SelectionConfig) -> Self {
        Self {
            params,
            substandards,
            config,
        }
    }

    pub fn params(&self) -> &ProtocolBootstrapParams {
        &self.params
    }

    pub fn substandards(&self) -> &SubstandardRegistry {
        &self.substandards
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    /// Resolve a registered token's handler and context
    fn token<'a>(
        &'a self,
        state: &'a IndexerState,
        policy: PolicyId,
    ) -> Result<(&'a dyn Substandard, TokenContext<'a>), AssemblyError> {
        let not_registered = || AssemblyError::NotRegistered {
            policy: policy.to_hex(),
        };
        let entry = state
            .registry_node(policy.as_bytes())
            .and_then(|node| node.entry.as_ref())
            .ok_or_else(not_registered)?;
        let token = state.token(&policy).ok_or_else(not_registered)?;
        let handler = self.substandards.resolve(&token.substandard_id)?;
        let ctx = TokenContext {
            params: &self.params,
            state,
            policy,
            entry,
            selection: &self.config,
        };
        Ok((handler, ctx))
    }

    /// Minimum deposit plus `quantity` of `unit`
    fn carrying(&self, unit: &Unit, quantity: Decimal) -> Result<Value, ValueError> {
        let mut value = Value::new();
        value.insert(Unit::Lovelace, self.config.min_output_lovelace)?;
        value.insert(unit.clone(), quantity)?;
        Ok(value)
    }

    // ── Operations ──────────────────────────────────────────────────

    /// Insert the policy into the registry by splitting its covering node
    pub fn register(&self, state: &IndexerState, request: &RegisterRequest) -> Result<Transaction, AssemblyError> {
        let handler = self.substandards.resolve(&request.substandard_id)?;
        let key = request.policy_id.as_bytes();
        if state.registry_node(key).is_some() {
            return Err(RegistryError::AlreadyRegistered {
                key: request.policy_id.to_hex(),
            }
            .into());
        }

        let registration = handler.register(
            &self.params,
            &RegistrationTerms {
                policy: request.policy_id,
                issuer: request.issuer,
                list_policy: request.list_policy,
            },
        )?;
        let plan = state.registry()?.plan_insert(key, registration.entry.clone())?;
        let covering = state
            .registry_node(&plan.covering.key)
            .ok_or_else(|| RegistryError::NodeNotFound {
                key: plan.covering.key_hex(),
            })?;
        let split = nodes::split(
            &covering.utxo,
            encode_node(&plan.predecessor()),
            key,
            encode_node(&plan.new_node()),
            Unit::asset(self.params.directory_node_policy, marker_name(key)?),
            self.config.min_output_lovelace,
        )?;
        let fragment = registration.fragment.merge(split)?;

        let tx = self.finish(
            state,
            fragment,
            None,
            &Funding::wallet(&request.utxos, request.change_address),
        )?;
        info!(
            policy_id = %request.policy_id,
            substandard = handler.id(),
            covering = %plan.covering.key_hex(),
            "Registration assembled"
        );
        Ok(tx)
    }

    pub fn mint(&self, state: &IndexerState, request: &MintRequest) -> Result<Transaction, AssemblyError> {
        check_quantity(request.quantity)?;
        let (handler, ctx) = self.token(state, request.policy_id)?;
        let unit = Unit::asset(request.policy_id, request.asset_name.clone());
        let mut fragment = handler.mint(
            &ctx,
            &Issuance {
                unit: unit.clone(),
                quantity: request.quantity,
                issuer: request.issuer,
            },
        )?;
        let recipient = programmable_address_of(&self.params, &request.recipient)?;
        fragment.pay(TxOutput::new(recipient, self.carrying(&unit, request.quantity)?));

        let tx = self.finish(
            state,
            fragment,
            Some(CoordinatorAct::ThirdParty),
            &Funding::wallet(&request.utxos, request.change_address),
        )?;
        info!(policy_id = %request.policy_id, quantity = %request.quantity, "Mint assembled");
        Ok(tx)
    }

    pub fn burn(&self, state: &IndexerState, request: &BurnRequest) -> Result<Transaction, AssemblyError> {
        check_quantity(request.quantity)?;
        let (handler, ctx) = self.token(state, request.policy_id)?;
        let fragment = handler.burn(
            &ctx,
            &Issuance {
                unit: Unit::asset(request.policy_id, request.asset_name.clone()),
                quantity: request.quantity,
                issuer: request.issuer,
            },
        )?;
        let holdings = self.params.programmable_address(Credential::Key(request.issuer));

        let tx = self.finish(
            state,
            fragment,
            Some(CoordinatorAct::ThirdParty),
            &Funding::wallet(&request.utxos, request.change_address).with_programmable(holdings, request.policy_id),
        )?;
        info!(policy_id = %request.policy_id, quantity = %request.quantity, "Burn assembled");
        Ok(tx)
    }

    pub fn transfer(&self, state: &IndexerState, request: &TransferRequest) -> Result<Transaction, AssemblyError> {
        check_quantity(request.quantity)?;
        let (handler, ctx) = self.token(state, request.policy_id)?;
        let sender = owner_credential(&self.params, &request.sender)?;
        let recipient = owner_credential(&self.params, &request.recipient)?;
        let mut recipients = vec![recipient];
        if sender != recipient {
            recipients.push(sender);
        }

        let mut fragment = handler.transfer(
            &ctx,
            &TransferTerms {
                senders: vec![sender],
                recipients,
            },
        )?;
        let unit = Unit::asset(request.policy_id, request.asset_name.clone());
        fragment.pay(TxOutput::new(
            self.params.programmable_address(recipient),
            self.carrying(&unit, request.quantity)?,
        ));
        fragment.authorize(sender);

        let tx = self.finish(
            state,
            fragment,
            Some(CoordinatorAct::Transfer),
            &Funding::wallet(&request.utxos, request.change_address)
                .with_programmable(self.params.programmable_address(sender), request.policy_id),
        )?;
        info!(
            policy_id = %request.policy_id,
            quantity = %request.quantity,
            sender = %sender.hash_hex(),
            recipient = %recipient.hash_hex(),
            "Transfer assembled"
        );
        Ok(tx)
    }

    pub fn blacklist(&self, state: &IndexerState, request: &ListRequest) -> Result<Transaction, AssemblyError> {
        let (handler, ctx) = self.token(state, request.policy_id)?;
        let fragment = handler.blacklist(&ctx, &list_change(request))?;
        self.finish(state, fragment, None, &Funding::wallet(&request.utxos, request.change_address))
    }

    pub fn whitelist(&self, state: &IndexerState, request: &ListRequest) -> Result<Transaction, AssemblyError> {
        let (handler, ctx) = self.token(state, request.policy_id)?;
        let fragment = handler.whitelist(&ctx, &list_change(request))?;
        self.finish(state, fragment, None, &Funding::wallet(&request.utxos, request.change_address))
    }

    /// Move a holder's tokens to the issuer's programmable address
    pub fn seize(&self, state: &IndexerState, request: &SeizeRequest) -> Result<Transaction, AssemblyError> {
        if let Some(quantity) = request.quantity {
            check_quantity(quantity)?;
        }
        let (handler, ctx) = self.token(state, request.policy_id)?;
        let mut fragment = handler.seize(&ctx, &SeizeTerms { issuer: request.issuer })?;

        let unit = Unit::asset(request.policy_id, request.asset_name.clone());
        let holder = programmable_address_of(&self.params, &request.holder)?;
        let holdings = sort_candidates(
            request
                .utxos
                .iter()
                .filter(|u| *u.address() == holder && !u.value().get(&unit).is_zero()),
        );

        let mut seized = Decimal::ZERO;
        for utxo in holdings {
            let take = match request.quantity {
                Some(limit) if seized >= limit => break,
                Some(limit) => utxo.value().get(&unit).min(limit - seized),
                None => utxo.value().get(&unit),
            };
            let mut left = ValueDiff::from(utxo.value().clone());
            left.add_amount(unit.clone(), -take)?;
            fragment.spend(utxo.clone(), Some(PlutusData::unit()));
            fragment.pay(TxOutput::new(holder, left.into_value()?));
            seized += take;
        }
        let wanted = request.quantity.unwrap_or(Decimal::ONE);
        if seized < wanted {
            let mut shortfall = Value::new();
            shortfall.insert(unit, wanted - seized)?;
            return Err(AssemblyError::insufficient(shortfall));
        }

        let issuer = self.params.programmable_address(Credential::Key(request.issuer));
        fragment.pay(TxOutput::new(issuer, self.carrying(&unit, seized)?));
        let tx = self.finish(
            state,
            fragment,
            Some(CoordinatorAct::ThirdParty),
            &Funding::wallet(&request.utxos, request.change_address),
        )?;
        info!(policy_id = %request.policy_id, seized = %seized, holder = %holder, "Seizure assembled");
        Ok(tx)
    }

    // ── Assembly ────────────────────────────────────────────────────

    fn eligible(&self, utxo: &Utxo, funding: &Funding<'_>) -> bool {
        let address = utxo.address();
        if !self.params.is_programmable(address) {
            return !address.payment.is_script();
        }
        funding
            .programmable
            .as_ref()
            .is_some_and(|(owner, allowed)| address == owner && utxo.value().policies().is_subset(allowed))
    }

    /// Select inputs, place change, attach the coordinator and validate
    fn finish(
        &self,
        state: &IndexerState,
        mut fragment: TxFragment,
        act: Option<CoordinatorAct>,
        funding: &Funding<'_>,
    ) -> Result<Transaction, AssemblyError> {
        let candidates = sort_candidates(funding.utxos.iter().filter(|u| self.eligible(u, funding)));

        let change = loop {
            let surplus = fragment.surplus(self.config.fee_reserve)?;
            let programmable = match &funding.programmable {
                Some((address, _)) => fragment.policies_at(address),
                None => BTreeSet::new(),
            };
            match settle(&surplus, &programmable, &self.config)? {
                Settlement::Balanced(change) => break change,
                Settlement::Short(need) => {
                    let pick = candidates
                        .iter()
                        .find(|u| !fragment.is_attached(&u.out_ref) && contributes(u, &need));
                    let Some(utxo) = pick else {
                        warn!(shortfall = %Shortfall(need.clone()), "Insufficient funds");
                        return Err(AssemblyError::insufficient(need));
                    };
                    debug!(out_ref = %utxo.out_ref, "Input selected");
                    let redeemer = self.params.is_programmable(utxo.address()).then(PlutusData::unit);
                    fragment.spend((*utxo).clone(), redeemer);
                }
            }
        };

        if let Some(value) = change.programmable {
            let (address, _) = funding.programmable.as_ref().ok_or_else(|| {
                AssemblyError::InvalidRequest("programmable change has no owner address".to_string())
            })?;
            fragment.pay(TxOutput::new(*address, value));
        }
        if let Some(value) = change.wallet {
            fragment.pay(TxOutput::new(funding.change_address, value));
        }
        let fee = self.config.fee_reserve + change.dust;

        if let Some(act) = act {
            self.attach_coordinator(state, &mut fragment, act, fee)?;
        }
        let tx = fragment.into_transaction(fee)?;
        let report = validate_transaction(&tx, &self.params)?;
        debug!(
            inputs = tx.inputs.len(),
            reference_inputs = tx.reference_inputs.len(),
            outputs = tx.outputs.len(),
            fee = %tx.fee,
            registered = report.registered.len(),
            "Transaction assembled"
        );
        Ok(tx)
    }

    /// Reference one registry node per touched policy and invoke the
    /// coordinator with the matching proofs.
    fn attach_coordinator(
        &self,
        state: &IndexerState,
        fragment: &mut TxFragment,
        act: CoordinatorAct,
        fee: Decimal,
    ) -> Result<(), AssemblyError> {
        let draft = fragment.draft(fee);
        let touched = TransactionContext::new(&draft, &self.params).touched_policies();
        let mut proofs = Vec::with_capacity(touched.len());
        for policy in touched {
            let key = policy.as_bytes();
            let (record, proof) = match state.registry_node(key) {
                Some(record) => (record, NodeProof::Exists(record.utxo.out_ref)),
                None => {
                    let record = state
                        .covering_registry_node(key)
                        .ok_or_else(|| RegistryError::NodeNotFound { key: policy.to_hex() })?;
                    (record, NodeProof::NotRegistered(record.utxo.out_ref))
                }
            };
            fragment.reference(record.utxo.clone());
            proofs.push(proof);
        }
        fragment.invoke(
            self.params.programmable_logic_global,
            RedeemerData::Coordinator { act, proofs },
        );
        Ok(())
    }
}

fn list_change(request: &ListRequest) -> ListChange {
    ListChange {
        action: request.action,
        target: request.target,
        issuer: request.issuer,
    }
}

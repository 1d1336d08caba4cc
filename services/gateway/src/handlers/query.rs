use crate::error::AppError;
use crate::models::{BalanceResponse, HistoryQuery, HistoryResponse, RegistryResponse, StatusResponse};
use crate::state::AppState;
use assembler::substandard::SubstandardInfo;
use axum::{
    Json,
    extract::{Path, Query, State},
};
use types::address::Address;
use types::ids::PolicyId;

pub async fn get_balance(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<BalanceResponse>, AppError> {
    let address: Address = address
        .parse()
        .map_err(|e| AppError::BadRequest(format!("Invalid address: {}", e)))?;

    let guard = state.indexer.read().await;
    let latest = guard.state().latest_entry(&address);
    Ok(Json(BalanceResponse {
        address,
        balance: latest.map(|e| e.balance_snapshot.clone()).unwrap_or_default(),
        as_of: latest.map(|e| e.point()),
        tx_id: latest.map(|e| e.tx_id),
    }))
}

pub async fn get_history(
    State(state): State<AppState>,
    Path(stake_key_hash): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, AppError> {
    let guard = state.indexer.read().await;
    let entries = guard
        .state()
        .history_by_stake(&stake_key_hash, query.limit())
        .into_iter()
        .cloned()
        .collect();
    Ok(Json(HistoryResponse { stake_key_hash, entries }))
}

pub async fn list_substandards(State(state): State<AppState>) -> Json<Vec<SubstandardInfo>> {
    Json(state.assembler.substandards().list())
}

pub async fn get_registry_entry(
    State(state): State<AppState>,
    Path(policy_id): Path<String>,
) -> Result<Json<RegistryResponse>, AppError> {
    let policy: PolicyId = policy_id
        .parse()
        .map_err(|e| AppError::BadRequest(format!("Invalid policy id: {}", e)))?;

    let guard = state.indexer.read().await;
    let indexed = guard.state();
    let not_registered = || AppError::NotFound(format!("Token {} is not registered", policy));
    let registration = indexed.token(&policy).ok_or_else(not_registered)?;
    let node = indexed.registry_node(policy.as_bytes()).ok_or_else(not_registered)?;
    let entry = node.entry.clone().ok_or_else(not_registered)?;

    Ok(Json(RegistryResponse {
        registration: registration.clone(),
        entry,
        node: node.utxo.out_ref,
    }))
}

pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let guard = state.indexer.read().await;
    let indexed = guard.state();
    Json(StatusResponse {
        cursor: indexed.cursor,
        tokens: indexed.tokens.len(),
        balance_rows: indexed.row_count(),
    })
}

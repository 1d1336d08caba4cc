//! Token operations
//!
//! Each handler assembles an unsigned transaction against a consistent view
//! of the indexer. Nothing is submitted; the caller signs and posts the
//! result to `/v1/tx/submit`.

use crate::error::AppError;
use crate::models::AssembledResponse;
use crate::state::AppState;
use assembler::{BurnRequest, ListRequest, MintRequest, RegisterRequest, SeizeRequest, TransferRequest};
use axum::{Json, extract::State};

pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<AssembledResponse>, AppError> {
    let guard = state.indexer.read().await;
    let tx = state.assembler.register(guard.state(), &request)?;
    Ok(Json(tx.into()))
}

pub async fn mint(
    State(state): State<AppState>,
    Json(request): Json<MintRequest>,
) -> Result<Json<AssembledResponse>, AppError> {
    let guard = state.indexer.read().await;
    let tx = state.assembler.mint(guard.state(), &request)?;
    Ok(Json(tx.into()))
}

pub async fn burn(
    State(state): State<AppState>,
    Json(request): Json<BurnRequest>,
) -> Result<Json<AssembledResponse>, AppError> {
    let guard = state.indexer.read().await;
    let tx = state.assembler.burn(guard.state(), &request)?;
    Ok(Json(tx.into()))
}

pub async fn transfer(
    State(state): State<AppState>,
    Json(request): Json<TransferRequest>,
) -> Result<Json<AssembledResponse>, AppError> {
    let guard = state.indexer.read().await;
    let tx = state.assembler.transfer(guard.state(), &request)?;
    Ok(Json(tx.into()))
}

pub async fn blacklist(
    State(state): State<AppState>,
    Json(request): Json<ListRequest>,
) -> Result<Json<AssembledResponse>, AppError> {
    let guard = state.indexer.read().await;
    let tx = state.assembler.blacklist(guard.state(), &request)?;
    Ok(Json(tx.into()))
}

pub async fn whitelist(
    State(state): State<AppState>,
    Json(request): Json<ListRequest>,
) -> Result<Json<AssembledResponse>, AppError> {
    let guard = state.indexer.read().await;
    let tx = state.assembler.whitelist(guard.state(), &request)?;
    Ok(Json(tx.into()))
}

pub async fn seize(
    State(state): State<AppState>,
    Json(request): Json<SeizeRequest>,
) -> Result<Json<AssembledResponse>, AppError> {
    let guard = state.indexer.read().await;
    let tx = state.assembler.seize(guard.state(), &request)?;
    Ok(Json(tx.into()))
}

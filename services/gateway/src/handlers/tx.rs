use crate::error::AppError;
use crate::models::{SubmitRequest, SubmitResponse};
use crate::state::AppState;
use axum::{Json, extract::State};
use tracing::info;

pub async fn submit(
    State(state): State<AppState>,
    Json(payload): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, AppError> {
    if payload.cbor.is_empty() || hex::decode(&payload.cbor).is_err() {
        return Err(AppError::BadRequest("cbor must be a non-empty hex string".into()));
    }
    let tx_id = state.provider.submit(&payload.cbor).await?;
    info!(tx_id = %tx_id, "Transaction submitted");
    Ok(Json(SubmitResponse { tx_id }))
}

use crate::handlers::{query, tokens, tx};
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/balances/{address}", get(query::get_balance))
        .route("/history/{stake_key_hash}", get(query::get_history))
        .route("/substandards", get(query::list_substandards))
        .route("/registry/{policy_id}", get(query::get_registry_entry))
        .route("/status", get(query::get_status))
        .route("/tokens/register", post(tokens::register))
        .route("/tokens/mint", post(tokens::mint))
        .route("/tokens/burn", post(tokens::burn))
        .route("/tokens/transfer", post(tokens::transfer))
        .route("/tokens/blacklist", post(tokens::blacklist))
        .route("/tokens/whitelist", post(tokens::whitelist))
        .route("/tokens/seize", post(tokens::seize))
        .route("/tx/submit", post(tx::submit));

    Router::new()
        .nest("/v1", api_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

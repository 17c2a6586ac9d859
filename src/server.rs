use alloy::primitives::U256;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::chain::EscrowChain;
use crate::config::ApiConfig;
use crate::error::{EscrowError, Result};
use crate::models::OperationView;

pub const FETCH_ERROR: &str = "Failed to fetch operation";

/// HTTP read endpoint for single operations.
pub struct ApiServer {
    config: ApiConfig,
    chain: Arc<dyn EscrowChain>,
}

impl ApiServer {
    pub fn new(config: ApiConfig, chain: Arc<dyn EscrowChain>) -> Self {
        Self { config, chain }
    }

    pub async fn run(self) -> Result<()> {
        let addr = self.config.address();
        let app = router(self.chain, self.config.cors_enabled);

        info!(address = %addr, "Starting operation API server");

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await?;
        Ok(())
    }
}

pub fn router(chain: Arc<dyn EscrowChain>, cors_enabled: bool) -> Router {
    let cors = if cors_enabled {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
    };

    Router::new()
        .route("/api/operation/{id}", get(get_operation))
        .route("/health", get(health_check))
        .with_state(chain)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Any failure, including a malformed or unknown id, is a 500 with the same body.
async fn get_operation(
    State(chain): State<Arc<dyn EscrowChain>>,
    Path(id): Path<String>,
) -> Response {
    let fetched = async {
        let id = id
            .parse::<U256>()
            .map_err(|e| EscrowError::InvalidInput(format!("invalid operation id '{}': {}", id, e)))?;
        chain.get_operation(id).await
    }
    .await;

    match fetched {
        Ok(op) => Json(OperationView::from(&op)).into_response(),
        Err(e) => {
            debug!(error = %e, "Operation lookup failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": FETCH_ERROR })),
            )
                .into_response()
        }
    }
}

async fn health_check() -> impl IntoResponse {
    "OK"
}

//! Payment configuration endpoint.

use axum::extract::State;

use super::{success, ApiResult};
use crate::models::RegistryConfig;
use crate::AppState;

/// GET /api/config - Get the payment key and QR image.
pub async fn get_config(State(state): State<AppState>) -> ApiResult<RegistryConfig> {
    success(state.registry.fetch_config().await)
}

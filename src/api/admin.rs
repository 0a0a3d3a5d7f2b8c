//! Admin API endpoints. All routes here sit behind the PSK layer.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;

use super::{success, ApiResult};
use crate::models::{Gift, GiftForm, RegistrySummary, SavePixKeyRequest, SaveQrCodeRequest};
use crate::workflow::{ConfirmOutcome, ResetConfirmation};
use crate::AppState;

/// GET /api/admin/gifts - The admin console's view of the catalog.
pub async fn admin_list_gifts(State(state): State<AppState>) -> ApiResult<Vec<Gift>> {
    state.admin.reattach_if_stopped();
    success(state.admin.gifts())
}

/// PUT /api/admin/gifts - Replace the whole catalog.
pub async fn replace_gifts(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Vec<Gift>> {
    state.admin.save_raw_catalog(&body).await?;
    success(state.admin.gifts())
}

/// POST /api/admin/gifts - Add a gift from the admin form.
pub async fn create_gift(
    State(state): State<AppState>,
    Json(form): Json<GiftForm>,
) -> ApiResult<Gift> {
    success(state.admin.add_gift(&form).await?)
}

/// PUT /api/admin/gifts/:id - Edit a gift from the admin form.
pub async fn update_gift(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(form): Json<GiftForm>,
) -> ApiResult<Gift> {
    success(state.admin.edit_gift(id, &form).await?)
}

/// DELETE /api/admin/gifts/:id - Delete an unreserved gift.
pub async fn delete_gift(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    state.admin.delete_gift(id).await?;
    success(())
}

/// PUT /api/admin/config/pix-key - Save the payment key.
pub async fn save_pix_key(
    State(state): State<AppState>,
    Json(request): Json<SavePixKeyRequest>,
) -> ApiResult<String> {
    state.admin.save_pix_key(&request.pix_key).await?;
    success(state.admin.config().pix_key)
}

/// PUT /api/admin/config/qrcode - Save the payment QR image.
pub async fn save_qrcode(
    State(state): State<AppState>,
    Json(request): Json<SaveQrCodeRequest>,
) -> ApiResult<()> {
    state.admin.save_qrcode(&request.qrcode).await?;
    success(())
}

/// GET /api/admin/summary - Reservation totals.
pub async fn get_summary(State(state): State<AppState>) -> ApiResult<RegistrySummary> {
    state.admin.reattach_if_stopped();
    success(state.admin.summary())
}

/// POST /api/admin/reset - Ask to clear every reservation.
pub async fn request_reset(State(state): State<AppState>) -> ApiResult<ResetConfirmation> {
    success(state.admin.request_reset())
}

/// POST /api/admin/reset/confirm - Confirm the reset; the second confirmation runs it.
pub async fn confirm_reset(State(state): State<AppState>) -> ApiResult<ConfirmOutcome> {
    success(state.admin.confirm_reset().await?)
}

/// DELETE /api/admin/reset - Abandon a requested reset.
pub async fn cancel_reset(State(state): State<AppState>) -> ApiResult<ResetConfirmation> {
    state.admin.cancel_reset();
    success(state.admin.reset_confirmation())
}

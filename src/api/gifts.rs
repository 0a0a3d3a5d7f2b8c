//! Public gift endpoints used by guests.

use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::{success, ApiResult};
use crate::errors::AppError;
use crate::models::{
    category_options, CatalogQuery, Category, CategoryOption, Gift, PaymentInstructions,
    ReserveRequest,
};
use crate::workflow::ReservationFlow;
use crate::AppState;

/// GET /api/gifts - List the catalog in display order, optionally filtered by category.
pub async fn list_gifts(
    State(state): State<AppState>,
    Query(query): Query<CatalogQuery>,
) -> ApiResult<Vec<Gift>> {
    let category = match query.category.as_deref().map(str::trim) {
        None | Some("") | Some("all") => None,
        Some(raw) => Some(
            Category::from_str(raw)
                .ok_or_else(|| AppError::Validation(format!("Unknown category: {}", raw)))?,
        ),
    };

    let mut flow = ReservationFlow::new(state.registry.clone());
    flow.load().await;
    flow.set_filter(category);
    success(flow.visible_gifts())
}

/// GET /api/categories - Categories with their display labels.
pub async fn list_categories() -> ApiResult<Vec<CategoryOption>> {
    success(category_options())
}

/// POST /api/gifts/:id/reserve - Reserve a gift or contribute to an open-amount gift.
pub async fn reserve_gift(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<ReserveRequest>,
) -> ApiResult<PaymentInstructions> {
    let mut flow = ReservationFlow::new(state.registry.clone());
    flow.try_load().await?;

    if !flow.select(id) {
        return if flow.catalog().iter().any(|g| g.id == id) {
            Err(AppError::Conflict(format!(
                "Gift {} has already been reserved",
                id
            )))
        } else {
            Err(AppError::NotFound(format!("Gift {} not found", id)))
        };
    }

    let payment = flow
        .submit(&request.guest_name, request.amount.as_deref())
        .await?;
    success(payment)
}

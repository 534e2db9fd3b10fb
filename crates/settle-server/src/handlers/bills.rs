//! Bill handlers: expanded detail and unlink ("Desvincular")

use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    Json,
};
use serde::Serialize;

use crate::{get_user_email, AppError, AppState};
use settle_core::models::{Transaction, UnlinkResult};
use settle_core::reconcile::Reconciler;

#[derive(Serialize)]
pub struct BillDetailsResponse {
    pub bill: Transaction,
    /// Statement rows absorbed by the bill
    pub rows: Vec<Transaction>,
}

/// GET /api/bills/:id/details - A bill and the statement rows linked to it
pub async fn get_bill_details(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Json<BillDetailsResponse>, AppError> {
    let user_email = get_user_email(request.headers());

    let bill = state
        .db
        .get_transaction(&user_email, id)?
        .ok_or_else(|| AppError::not_found("Bill not found"))?;
    let rows = state.db.linked_rows(&user_email, id)?;

    Ok(Json(BillDetailsResponse { bill, rows }))
}

/// POST /api/bills/:id/unlink - Collapse a bill and release its statement rows
pub async fn unlink_bill(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Json<UnlinkResult>, AppError> {
    let user_email = get_user_email(request.headers());

    let reconciler = Reconciler::with_config(&state.db, &state.config.reconcile)?;
    let result = reconciler.unlink(&user_email, id)?;

    Ok(Json(result))
}

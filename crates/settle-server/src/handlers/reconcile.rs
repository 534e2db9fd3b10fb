//! Reconciliation handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{get_user_email, AppError, AppState};
use settle_core::models::{CycleStatus, PendingCycle};
use settle_core::reconcile::{BillingCycle, Reconciler, TriggerOutcome};

/// GET /api/reconcile/pending - Cycles waiting for a bill (dashboard)
pub async fn list_pending_cycles(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<Vec<PendingCycle>>, AppError> {
    let user_email = get_user_email(request.headers());
    let cycles = state.db.list_pending_cycles(&user_email)?;
    Ok(Json(cycles))
}

#[derive(Serialize)]
pub struct CycleStatusResponse {
    pub billing_cycle: BillingCycle,
    pub status: CycleStatus,
}

fn parse_cycle(s: &str) -> Result<BillingCycle, AppError> {
    s.parse()
        .map_err(|_| AppError::bad_request("Invalid billing cycle, expected YYYY-MM"))
}

/// GET /api/reconcile/:cycle - Reconciliation state of one cycle
pub async fn get_cycle_status(
    State(state): State<Arc<AppState>>,
    Path(cycle): Path<String>,
    request: Request,
) -> Result<Json<CycleStatusResponse>, AppError> {
    let user_email = get_user_email(request.headers());
    let billing_cycle = parse_cycle(&cycle)?;

    let status = state.db.cycle_status(&user_email, billing_cycle)?;

    Ok(Json(CycleStatusResponse {
        billing_cycle,
        status,
    }))
}

/// Request body for the manual "Reconcile" action
#[derive(Debug, Deserialize)]
pub struct ReconcileRequest {
    pub billing_cycle: String,
    /// Bill picked by the user (one of the listed candidates unless `force`)
    pub bill_id: Option<i64>,
    /// Link `bill_id` regardless of amount tolerance
    #[serde(default)]
    pub force: bool,
}

/// POST /api/reconcile - Reconcile a cycle, optionally confirming or forcing a bill
pub async fn reconcile_cycle(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<TriggerOutcome>, AppError> {
    let user_email = get_user_email(request.headers());

    let bytes = axum::body::to_bytes(request.into_body(), 1024 * 10)
        .await
        .map_err(|_| AppError::bad_request("Invalid request body"))?;
    let req: ReconcileRequest =
        serde_json::from_slice(&bytes).map_err(|_| AppError::bad_request("Invalid JSON"))?;

    let cycle = parse_cycle(&req.billing_cycle)?;
    let (forced, confirmed) = match (req.force, req.bill_id) {
        (true, None) => return Err(AppError::bad_request("force requires bill_id")),
        (true, Some(id)) => (Some(id), None),
        (false, bill_id) => (None, bill_id),
    };

    let reconciler = Reconciler::with_config(&state.db, &state.config.reconcile)?;
    let outcome = reconciler.reconcile_on_demand(&user_email, cycle, forced, confirmed)?;

    Ok(Json(outcome))
}

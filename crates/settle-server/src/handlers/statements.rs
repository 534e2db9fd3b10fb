//! Statement import handlers

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{get_user_email, AppError, AppState, MAX_UPLOAD_SIZE};
use settle_core::import::parse_statement;
use settle_core::models::ImportSummary;
use settle_core::reconcile::{BillingCycle, Reconciler, TriggerOutcome};

/// Request body for a statement import
#[derive(Debug, Deserialize)]
pub struct ImportStatementRequest {
    /// Statement CSV content
    pub csv: String,
    /// Cycle the statement belongs to (YYYY-MM); defaults to the latest row's month
    pub billing_cycle: Option<String>,
}

#[derive(Serialize)]
pub struct ImportStatementResponse {
    pub import: ImportSummary,
    pub reconciliation: TriggerOutcome,
}

/// POST /api/statements/import - Import a credit-card statement and reconcile its cycle
pub async fn import_statement(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<ImportStatementResponse>, AppError> {
    let user_email = get_user_email(request.headers());

    let bytes = axum::body::to_bytes(request.into_body(), MAX_UPLOAD_SIZE)
        .await
        .map_err(|_| AppError::bad_request("Invalid request body or file too large"))?;
    let req: ImportStatementRequest =
        serde_json::from_slice(&bytes).map_err(|_| AppError::bad_request("Invalid JSON"))?;

    let cycle = req
        .billing_cycle
        .as_deref()
        .map(str::parse::<BillingCycle>)
        .transpose()
        .map_err(|_| AppError::bad_request("Invalid billing_cycle, expected YYYY-MM"))?;

    let rows = parse_statement(req.csv.as_bytes())?;
    let summary = state.db.import_statement(&user_email, cycle, &rows)?;

    let details = json!({
        "billing_cycle": summary.billing_cycle,
        "imported": summary.imported,
        "skipped": summary.skipped,
    });
    state.db.log_audit(
        &user_email,
        "import",
        Some("statement"),
        None,
        Some(&details.to_string()),
    )?;

    let reconciler = Reconciler::with_config(&state.db, &state.config.reconcile)?;
    let reconciliation = reconciler.after_statement_import(&user_email, summary.billing_cycle)?;

    Ok(Json(ImportStatementResponse {
        import: summary,
        reconciliation,
    }))
}

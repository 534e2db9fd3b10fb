//! Transaction handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, Request, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{get_user_email, AppError, AppState, SuccessResponse, MAX_PAGE_LIMIT};
use settle_core::models::{NewTransaction, Transaction, TransactionKind};
use settle_core::reconcile::{Reconciler, TriggerOutcome};

/// Query parameters for listing transactions
#[derive(Debug, Deserialize)]
pub struct TransactionQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Serialize)]
pub struct TransactionResponse {
    pub transactions: Vec<Transaction>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// GET /api/transactions - List transactions
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TransactionQuery>,
    request: Request,
) -> Result<Json<TransactionResponse>, AppError> {
    let user_email = get_user_email(request.headers());

    // Input validation: clamp pagination parameters
    let limit = params.limit.clamp(1, MAX_PAGE_LIMIT);
    let offset = params.offset.max(0);

    let transactions = state.db.list_transactions(&user_email, limit, offset)?;
    let total = state.db.count_transactions(&user_email)?;

    Ok(Json(TransactionResponse {
        transactions,
        total,
        limit,
        offset,
    }))
}

/// GET /api/transactions/:id - Get a single transaction
pub async fn get_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Json<Transaction>, AppError> {
    let user_email = get_user_email(request.headers());

    let transaction = state
        .db
        .get_transaction(&user_email, id)?
        .ok_or_else(|| AppError::not_found("Transaction not found"))?;

    Ok(Json(transaction))
}

/// Request body for creating a transaction
#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    pub date: NaiveDate,
    pub description: String,
    pub amount: Decimal,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub category: Option<String>,
    /// Explicitly mark as a credit-card bill payment
    #[serde(default)]
    pub is_credit_card_payment: bool,
}

#[derive(Serialize)]
pub struct CreateTransactionResponse {
    pub transaction: Transaction,
    /// What the bill trigger did for each pending cycle in range
    pub reconciliation: Vec<TriggerOutcome>,
}

/// POST /api/transactions - Create a transaction, reconciling pending cycles if it is a bill
pub async fn create_transaction(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<(StatusCode, Json<CreateTransactionResponse>), AppError> {
    let user_email = get_user_email(request.headers());

    let bytes = axum::body::to_bytes(request.into_body(), 1024 * 10)
        .await
        .map_err(|_| AppError::bad_request("Invalid request body"))?;
    let req: CreateTransactionRequest =
        serde_json::from_slice(&bytes).map_err(|_| AppError::bad_request("Invalid JSON"))?;

    let kind: TransactionKind = match req.kind.as_deref() {
        Some(kind) => kind.parse().map_err(|e: String| AppError::bad_request(&e))?,
        None => TransactionKind::Expense,
    };
    if req.amount.is_sign_negative() {
        return Err(AppError::bad_request(
            "Amount must be positive; use type=income for credits",
        ));
    }

    let reconciler = Reconciler::with_config(&state.db, &state.config.reconcile)?;
    let new_tx = reconciler.classify(NewTransaction {
        date: req.date,
        description: req.description,
        amount: req.amount,
        kind,
        category: req.category,
        billing_cycle: None,
        is_credit_card_payment: req.is_credit_card_payment,
        import_hash: None,
        original_data: None,
    });

    let transaction = state.db.create_transaction(&user_email, &new_tx)?;

    state.db.log_audit(
        &user_email,
        "create",
        Some("transaction"),
        Some(transaction.id),
        Some(&format!("bill={}", transaction.is_credit_card_payment)),
    )?;

    let reconciliation = reconciler.after_bill_created(&user_email, &transaction)?;
    if !reconciliation.is_empty() {
        info!(
            id = transaction.id,
            cycles = reconciliation.len(),
            "Bill creation re-evaluated pending cycles"
        );
    }

    Ok((
        StatusCode::CREATED,
        Json(CreateTransactionResponse {
            transaction,
            reconciliation,
        }),
    ))
}

/// POST /api/transactions/:id/archive - Hide a transaction from listings and reconciliation
pub async fn archive_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Json<SuccessResponse>, AppError> {
    let user_email = get_user_email(request.headers());

    state.db.set_transaction_archived(&user_email, id, true)?;
    state
        .db
        .log_audit(&user_email, "archive", Some("transaction"), Some(id), None)?;

    Ok(Json(SuccessResponse { success: true }))
}

/// POST /api/transactions/:id/unarchive - Unarchive a transaction
pub async fn unarchive_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Json<SuccessResponse>, AppError> {
    let user_email = get_user_email(request.headers());

    state.db.set_transaction_archived(&user_email, id, false)?;
    state.db.log_audit(
        &user_email,
        "unarchive",
        Some("transaction"),
        Some(id),
        None,
    )?;

    Ok(Json(SuccessResponse { success: true }))
}

/// DELETE /api/transactions/:id - Soft-delete a transaction (expanded bills must be unlinked first)
pub async fn delete_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Json<SuccessResponse>, AppError> {
    let user_email = get_user_email(request.headers());

    state.db.delete_transaction(&user_email, id)?;
    state
        .db
        .log_audit(&user_email, "delete", Some("transaction"), Some(id), None)?;

    Ok(Json(SuccessResponse { success: true }))
}

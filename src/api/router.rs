use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers::{
    AppState, create_loan, get_loan_by_id, get_loan_events, list_loans, list_member_loans,
    list_overdue_loans, loan_summary_report, mark_lost, member_report, monthly_report, pay_fine,
    renew_loan, return_book, run_overdue_sweep,
};

/// Creates the API router with all loan management endpoints
///
/// Command endpoints (Write operations):
/// - POST /loans - Create a new loan
/// - POST /loans/:id/renew - Renew a loan
/// - POST /loans/:id/return - Return a book
/// - POST /loans/:id/lost - Mark a book lost
/// - POST /loans/:id/pay-fine - Pay the fine of a loan
/// - POST /admin/overdue-sweep - Run overdue detection now
///
/// Query endpoints (Read operations):
/// - GET /loans - List loans with filters and pagination
/// - GET /loans/overdue - List overdue loans
/// - GET /loans/:id - Get loan details
/// - GET /loans/:id/events - Get the audit trail of a loan
/// - GET /members/:id/loans - Loan history of a member
/// - GET /reports/loans, /reports/members, /reports/monthly - Aggregates
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        // Loans
        .route("/loans", post(create_loan).get(list_loans))
        .route("/loans/overdue", get(list_overdue_loans))
        .route("/loans/:id", get(get_loan_by_id))
        .route("/loans/:id/events", get(get_loan_events))
        .route("/loans/:id/renew", post(renew_loan))
        .route("/loans/:id/return", post(return_book))
        .route("/loans/:id/lost", post(mark_lost))
        .route("/loans/:id/pay-fine", post(pay_fine))
        .route("/members/:id/loans", get(list_member_loans))
        // Reports
        .route("/reports/loans", get(loan_summary_report))
        .route("/reports/members", get(member_report))
        .route("/reports/monthly", get(monthly_report))
        // Administration
        .route("/admin/overdue-sweep", post(run_overdue_sweep))
        // Add tracing middleware
        .layer(TraceLayer::new_for_http())
        // Add application state
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

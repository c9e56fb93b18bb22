use crate::application::loan::{LoanApplicationError, PreconditionFailure};
use crate::ports::BoxError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::types::ErrorResponse;

/// API層のエラー型
///
/// アプリケーション層のエラーと入力検証エラーをHTTPレスポンスへマッピングする。
#[derive(Debug)]
pub enum ApiError {
    Application(LoanApplicationError),
    /// リクエストの形式・値が不正
    Validation(String),
}

impl From<LoanApplicationError> for ApiError {
    fn from(err: LoanApplicationError) -> Self {
        ApiError::Application(err)
    }
}

fn internal_error(kind: &str, err: &BoxError) -> (StatusCode, ErrorResponse) {
    // 内部エラーの詳細はログに記録し、クライアントには一般的なメッセージのみを返す
    tracing::error!(error = %err, "{} error", kind);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        ErrorResponse::new("INTERNAL_ERROR", "An unexpected error occurred"),
    )
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = match self {
            ApiError::Validation(message) => {
                let body = ErrorResponse::new("VALIDATION_ERROR", message);
                return (StatusCode::BAD_REQUEST, Json(body)).into_response();
            }
            ApiError::Application(err) => err,
        };

        let message = err.to_string();
        let (status, body) = match &err {
            // 404 Not Found - リクエストされたリソースが存在しない
            LoanApplicationError::LoanNotFound => (
                StatusCode::NOT_FOUND,
                ErrorResponse::new("LOAN_NOT_FOUND", message),
            ),
            LoanApplicationError::BookNotFound => (
                StatusCode::NOT_FOUND,
                ErrorResponse::new("BOOK_NOT_FOUND", message),
            ),
            LoanApplicationError::MemberNotFound => (
                StatusCode::NOT_FOUND,
                ErrorResponse::new("MEMBER_NOT_FOUND", message),
            ),

            // 409 Conflict - 同時更新・重複貸出
            LoanApplicationError::VersionConflict(_) => (
                StatusCode::CONFLICT,
                ErrorResponse::new("VERSION_CONFLICT", message),
            ),
            LoanApplicationError::PreconditionFailed(
                failure @ PreconditionFailure::DuplicateLoan,
            ) => (
                StatusCode::CONFLICT,
                ErrorResponse::new("PRECONDITION_FAILED", message).with_reason(failure.code()),
            ),

            // 422 Unprocessable Entity - ビジネスルール違反
            LoanApplicationError::PreconditionFailed(failure) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorResponse::new("PRECONDITION_FAILED", message).with_reason(failure.code()),
            ),
            LoanApplicationError::NotRenewable(reason) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorResponse::new("NOT_RENEWABLE", message).with_reason(*reason),
            ),
            LoanApplicationError::AlreadyReturned => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorResponse::new("ALREADY_RETURNED", message),
            ),
            LoanApplicationError::InvalidLoanState(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorResponse::new("INVALID_LOAN_STATE", message),
            ),
            LoanApplicationError::InsufficientPayment { .. } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorResponse::new("INSUFFICIENT_PAYMENT", message),
            ),

            // 500 Internal Server Error - システム障害
            LoanApplicationError::RepositoryError(e) => internal_error("Repository", e),
            LoanApplicationError::CatalogServiceError(e) => {
                internal_error("Catalog service", e)
            }
            LoanApplicationError::MemberServiceError(e) => {
                internal_error("Member service", e)
            }
        };

        (status, Json(body)).into_response()
    }
}

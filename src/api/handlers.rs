use crate::application::loan::{self, ServiceDependencies, reports};
use crate::domain::{
    events::DomainEvent,
    value_objects::{LoanId, MemberId},
};
use crate::ports::{LoanFilter, LoanSummary, MemberLoanStats, MonthlyLoanStats};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{Datelike, Utc};
use std::sync::Arc;
use uuid::Uuid;

use super::{
    error::ApiError,
    types::{
        ListLoansQuery, LoanBookRequest, LoanListResponse, LoanResponse, MarkLostRequest,
        MonthlyReportQuery, OverdueSweepResponse, PayFineRequest, RenewLoanRequest,
        ReturnBookRequest,
    },
};

// ============================================================================
// State
// ============================================================================

/// ハンドラー間で共有されるアプリケーション状態
#[derive(Clone)]
pub struct AppState {
    pub service_deps: ServiceDependencies,
}

// ============================================================================
// Command handlers (POST)
// ============================================================================

/// POST /loans - 新しい貸出を作成
///
/// 強制されるビジネスルール:
/// - 返却期限が現在より後であること
/// - 会員が存在し、有効であること
/// - 書籍に在庫があり、貸出可能な状態であること
/// - 会員に延滞中の貸出がないこと
/// - 同じ書籍を既に借りていないこと
pub async fn create_loan(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoanBookRequest>,
) -> Result<(StatusCode, Json<LoanResponse>), ApiError> {
    let now = Utc::now();
    let cmd = req.to_command(now).map_err(ApiError::Validation)?;

    let loan = loan::loan_book(&state.service_deps, cmd).await?;

    Ok((
        StatusCode::CREATED,
        Json(LoanResponse::from_record(&loan, now)),
    ))
}

/// POST /loans/:id/renew - 貸出を延長
///
/// 強制されるビジネスルール:
/// - 貸出がActive状態であること
/// - 延長回数が3回未満であること
/// - 返却期限前であること
pub async fn renew_loan(
    State(state): State<Arc<AppState>>,
    Path(loan_id): Path<Uuid>,
    Json(req): Json<RenewLoanRequest>,
) -> Result<Json<LoanResponse>, ApiError> {
    let now = Utc::now();
    let cmd = req
        .to_command(LoanId::from_uuid(loan_id), now, &state.service_deps.policy)
        .map_err(ApiError::Validation)?;

    let loan = loan::renew_loan(&state.service_deps, cmd).await?;

    Ok(Json(LoanResponse::from_record(&loan, now)))
}

/// POST /loans/:id/return - 書籍を返却
///
/// 延滞中の貸出も返却可能。延滞料金は返却後も残る。
pub async fn return_book(
    State(state): State<Arc<AppState>>,
    Path(loan_id): Path<Uuid>,
    Json(req): Json<ReturnBookRequest>,
) -> Result<Json<LoanResponse>, ApiError> {
    let now = Utc::now();
    let cmd = req
        .to_command(LoanId::from_uuid(loan_id), now)
        .map_err(ApiError::Validation)?;

    let loan = loan::return_book(&state.service_deps, cmd).await?;

    Ok(Json(LoanResponse::from_record(&loan, now)))
}

/// POST /loans/:id/lost - 書籍を紛失扱いにする
pub async fn mark_lost(
    State(state): State<Arc<AppState>>,
    Path(loan_id): Path<Uuid>,
    Json(req): Json<MarkLostRequest>,
) -> Result<Json<LoanResponse>, ApiError> {
    let now = Utc::now();
    let cmd = req.to_command(LoanId::from_uuid(loan_id), now);

    let loan = loan::mark_lost(&state.service_deps, cmd).await?;

    Ok(Json(LoanResponse::from_record(&loan, now)))
}

/// POST /loans/:id/pay-fine - 延滞料金を支払う
pub async fn pay_fine(
    State(state): State<Arc<AppState>>,
    Path(loan_id): Path<Uuid>,
    Json(req): Json<PayFineRequest>,
) -> Result<Json<LoanResponse>, ApiError> {
    let now = Utc::now();
    let cmd = req
        .to_command(LoanId::from_uuid(loan_id), now)
        .map_err(ApiError::Validation)?;

    let loan = loan::pay_fine(&state.service_deps, cmd).await?;

    Ok(Json(LoanResponse::from_record(&loan, now)))
}

/// POST /admin/overdue-sweep - 延滞検出バッチを即時実行
pub async fn run_overdue_sweep(
    State(state): State<Arc<AppState>>,
) -> Result<Json<OverdueSweepResponse>, ApiError> {
    let detected = loan::detect_overdue_loans(&state.service_deps, Utc::now()).await?;
    Ok(Json(OverdueSweepResponse { detected }))
}

// ============================================================================
// Query handlers (GET)
// ============================================================================

/// GET /loans/:id - 貸出詳細をIDで取得
///
/// 状態は現在時刻で再計算され、延滞への遷移があれば保存される。
pub async fn get_loan_by_id(
    State(state): State<Arc<AppState>>,
    Path(loan_id): Path<Uuid>,
) -> Result<Json<LoanResponse>, ApiError> {
    let now = Utc::now();
    let loan = loan::get_loan(&state.service_deps, LoanId::from_uuid(loan_id), now).await?;

    Ok(Json(LoanResponse::from_record(&loan, now)))
}

/// GET /loans/:id/events - 貸出の監査ログ
pub async fn get_loan_events(
    State(state): State<Arc<AppState>>,
    Path(loan_id): Path<Uuid>,
) -> Result<Json<Vec<DomainEvent>>, ApiError> {
    let events = loan::loan_history(&state.service_deps, LoanId::from_uuid(loan_id)).await?;
    Ok(Json(events))
}

/// GET /loans - フィルタ・ページング付き貸出一覧
///
/// クエリパラメータ:
/// - member_id, book_id, status, loaned_from, loaned_to, fine_paid
/// - page（1始まり、既定1）, limit（既定10、最大100）
pub async fn list_loans(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListLoansQuery>,
) -> Result<Json<LoanListResponse>, ApiError> {
    let filter = query.to_filter().map_err(ApiError::Validation)?;
    let (page, limit) = query.page_and_limit().map_err(ApiError::Validation)?;
    let pagination = query.pagination().map_err(ApiError::Validation)?;

    let now = Utc::now();
    let result = loan::list_loans(&state.service_deps, &filter, Some(pagination), now).await?;

    Ok(Json(LoanListResponse {
        loans: result
            .items
            .iter()
            .map(|loan| LoanResponse::from_record(loan, now))
            .collect(),
        total: result.total,
        page,
        limit,
        total_pages: result.total.div_ceil(u64::from(limit)),
    }))
}

/// GET /loans/overdue - 延滞中の貸出一覧（返却期限の古い順）
pub async fn list_overdue_loans(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<LoanResponse>>, ApiError> {
    let now = Utc::now();
    let loans = loan::overdue_loans(&state.service_deps, now).await?;

    Ok(Json(
        loans
            .iter()
            .map(|loan| LoanResponse::from_record(loan, now))
            .collect(),
    ))
}

/// GET /members/:id/loans - 会員の貸出履歴
pub async fn list_member_loans(
    State(state): State<Arc<AppState>>,
    Path(member_id): Path<Uuid>,
) -> Result<Json<Vec<LoanResponse>>, ApiError> {
    let now = Utc::now();
    let loans =
        loan::member_loans(&state.service_deps, MemberId::from_uuid(member_id), now).await?;

    Ok(Json(
        loans
            .iter()
            .map(|loan| LoanResponse::from_record(loan, now))
            .collect(),
    ))
}

// ============================================================================
// Report handlers (GET)
// ============================================================================

fn report_filter(query: &ListLoansQuery) -> Result<LoanFilter, ApiError> {
    query.to_filter().map_err(ApiError::Validation)
}

/// GET /reports/loans - ステータス別件数と延滞料金の合計
pub async fn loan_summary_report(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListLoansQuery>,
) -> Result<Json<LoanSummary>, ApiError> {
    let filter = report_filter(&query)?;
    let summary = reports::loan_summary(&state.service_deps, &filter).await?;
    Ok(Json(summary))
}

/// GET /reports/members - 会員別の集計
pub async fn member_report(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListLoansQuery>,
) -> Result<Json<Vec<MemberLoanStats>>, ApiError> {
    let filter = report_filter(&query)?;
    let stats = reports::member_breakdown(&state.service_deps, &filter).await?;
    Ok(Json(stats))
}

/// GET /reports/monthly?year= - 月別の集計
pub async fn monthly_report(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MonthlyReportQuery>,
) -> Result<Json<Vec<MonthlyLoanStats>>, ApiError> {
    let year = query.year.unwrap_or_else(|| Utc::now().year());
    let stats = reports::monthly_breakdown(&state.service_deps, year).await?;
    Ok(Json(stats))
}

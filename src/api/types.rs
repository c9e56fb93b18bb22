use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    LoanPolicy, MAX_NOTES_LEN,
    commands::{LoanBook, MarkLost, PayFine, RenewLoan, ReturnBook},
    loan::LoanRecord,
    value_objects::{BookId, LoanId, LoanStatus, MemberId, Money, StaffId},
};
use crate::ports::{LoanFilter, Pagination};

/// 一覧取得の既定件数
pub const DEFAULT_PAGE_LIMIT: u32 = 10;

/// 一覧取得の最大件数
pub const MAX_PAGE_LIMIT: u32 = 100;

fn validate_notes(notes: Option<String>) -> Result<Option<String>, String> {
    match notes {
        Some(notes) if notes.chars().count() > MAX_NOTES_LEN => Err(format!(
            "notes must be at most {} characters",
            MAX_NOTES_LEN
        )),
        notes => Ok(notes),
    }
}

// ============================================================================
// Requests
// ============================================================================

/// POST /loans のリクエスト
#[derive(Debug, Deserialize)]
pub struct LoanBookRequest {
    pub book_id: Uuid,
    pub member_id: Uuid,
    pub staff_id: Uuid,
    pub due_date: DateTime<Utc>,
    pub notes: Option<String>,
}

impl LoanBookRequest {
    pub fn to_command(self, now: DateTime<Utc>) -> Result<LoanBook, String> {
        Ok(LoanBook {
            book_id: BookId::from_uuid(self.book_id),
            member_id: MemberId::from_uuid(self.member_id),
            loaned_at: now,
            due_date: self.due_date,
            staff_id: StaffId::from_uuid(self.staff_id),
            notes: validate_notes(self.notes)?,
        })
    }
}

/// POST /loans/:id/renew のリクエスト
#[derive(Debug, Deserialize)]
pub struct RenewLoanRequest {
    pub staff_id: Uuid,
    /// 省略時はポリシーの既定日数（14日）
    pub additional_days: Option<i64>,
}

impl RenewLoanRequest {
    pub fn to_command(
        self,
        loan_id: LoanId,
        now: DateTime<Utc>,
        policy: &LoanPolicy,
    ) -> Result<RenewLoan, String> {
        let additional_days = self
            .additional_days
            .unwrap_or(policy.default_renewal_days);

        if !(1..=policy.max_renewal_days).contains(&additional_days) {
            return Err(format!(
                "additional_days must be between 1 and {}",
                policy.max_renewal_days
            ));
        }

        Ok(RenewLoan {
            loan_id,
            additional_days,
            renewed_at: now,
            staff_id: StaffId::from_uuid(self.staff_id),
        })
    }
}

/// POST /loans/:id/return のリクエスト
#[derive(Debug, Deserialize)]
pub struct ReturnBookRequest {
    pub staff_id: Uuid,
    pub notes: Option<String>,
}

impl ReturnBookRequest {
    pub fn to_command(self, loan_id: LoanId, now: DateTime<Utc>) -> Result<ReturnBook, String> {
        Ok(ReturnBook {
            loan_id,
            returned_at: now,
            staff_id: StaffId::from_uuid(self.staff_id),
            notes: validate_notes(self.notes)?,
        })
    }
}

/// POST /loans/:id/lost のリクエスト
#[derive(Debug, Deserialize)]
pub struct MarkLostRequest {
    pub staff_id: Uuid,
}

impl MarkLostRequest {
    pub fn to_command(self, loan_id: LoanId, now: DateTime<Utc>) -> MarkLost {
        MarkLost {
            loan_id,
            marked_at: now,
            staff_id: StaffId::from_uuid(self.staff_id),
        }
    }
}

/// POST /loans/:id/pay-fine のリクエスト
#[derive(Debug, Deserialize)]
pub struct PayFineRequest {
    pub staff_id: Uuid,
    pub amount: Decimal,
}

impl PayFineRequest {
    pub fn to_command(self, loan_id: LoanId, now: DateTime<Utc>) -> Result<PayFine, String> {
        if self.amount <= Decimal::ZERO {
            return Err("amount must be greater than 0".to_string());
        }
        let amount = Money::new(self.amount).map_err(|e| e.to_string())?;

        Ok(PayFine {
            loan_id,
            amount,
            paid_at: now,
            staff_id: StaffId::from_uuid(self.staff_id),
        })
    }
}

/// 貸出一覧・レポートのクエリパラメータ
#[derive(Debug, Default, Deserialize)]
pub struct ListLoansQuery {
    pub member_id: Option<Uuid>,
    pub book_id: Option<Uuid>,
    /// active, overdue, returned, lost
    pub status: Option<String>,
    pub loaned_from: Option<DateTime<Utc>>,
    pub loaned_to: Option<DateTime<Utc>>,
    pub fine_paid: Option<bool>,
    /// 1始まり
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ListLoansQuery {
    pub fn to_filter(&self) -> Result<LoanFilter, String> {
        let status = self
            .status
            .as_deref()
            .map(parse_status_filter)
            .transpose()?;

        if let (Some(from), Some(to)) = (self.loaned_from, self.loaned_to)
            && from > to
        {
            return Err("loaned_from must not be after loaned_to".to_string());
        }

        Ok(LoanFilter {
            member_id: self.member_id.map(MemberId::from_uuid),
            book_id: self.book_id.map(BookId::from_uuid),
            status,
            loaned_from: self.loaned_from,
            loaned_to: self.loaned_to,
            fine_paid: self.fine_paid,
        })
    }

    /// (page, limit) を検証して返す
    pub fn page_and_limit(&self) -> Result<(u32, u32), String> {
        let page = self.page.unwrap_or(1);
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_LIMIT);

        if page == 0 {
            return Err("page must be at least 1".to_string());
        }
        if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
            return Err(format!("limit must be between 1 and {}", MAX_PAGE_LIMIT));
        }

        Ok((page, limit))
    }

    pub fn pagination(&self) -> Result<Pagination, String> {
        let (page, limit) = self.page_and_limit()?;
        Ok(Pagination {
            offset: (page - 1).saturating_mul(limit),
            limit,
        })
    }
}

/// GET /reports/monthly のクエリパラメータ
#[derive(Debug, Deserialize)]
pub struct MonthlyReportQuery {
    /// 省略時は今年
    pub year: Option<i32>,
}

/// ステータスクエリパラメータのパースとバリデーション
pub fn parse_status_filter(status: &str) -> Result<LoanStatus, String> {
    status.parse::<LoanStatus>()
}

// ============================================================================
// Responses
// ============================================================================

/// 貸出レスポンス
#[derive(Debug, Serialize)]
pub struct LoanResponse {
    pub loan_id: Uuid,
    pub book_id: Uuid,
    pub member_id: Uuid,
    pub loaned_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub last_renewed_at: Option<DateTime<Utc>>,
    pub renewal_count: u8,
    pub status: LoanStatus,
    pub fine_amount: Money,
    pub fine_paid: bool,
    pub fine_paid_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub processed_by: Uuid,
    pub days_overdue: u32,
    /// 貸出日から返却日（未返却なら現在）までの日数
    pub borrowing_duration_days: u32,
    pub can_renew: bool,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LoanResponse {
    /// `now` 時点の延滞日数と延長可否を含めて変換する
    pub fn from_record(loan: &LoanRecord, now: DateTime<Utc>) -> Self {
        Self {
            loan_id: loan.loan_id.value(),
            book_id: loan.book_id.value(),
            member_id: loan.member_id.value(),
            loaned_at: loan.loaned_at,
            due_date: loan.due_date,
            returned_at: loan.returned_at,
            last_renewed_at: loan.last_renewed_at,
            renewal_count: loan.renewal_count.value(),
            status: loan.status,
            fine_amount: loan.fine_amount,
            fine_paid: loan.fine_paid,
            fine_paid_at: loan.fine_paid_at,
            notes: loan.notes.clone(),
            processed_by: loan.processed_by.value(),
            days_overdue: loan.days_overdue(now),
            borrowing_duration_days: loan.borrowing_duration_days(now),
            can_renew: loan.can_renew(now),
            version: loan.version,
            created_at: loan.created_at,
            updated_at: loan.updated_at,
        }
    }
}

/// 貸出一覧レスポンス
#[derive(Debug, Serialize)]
pub struct LoanListResponse {
    pub loans: Vec<LoanResponse>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
}

/// 延滞検出バッチのレスポンス
#[derive(Debug, Serialize)]
pub struct OverdueSweepResponse {
    pub detected: usize,
}

/// エラーレスポンス
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    /// 機械可読な理由コード（事前条件違反・延長不可など）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

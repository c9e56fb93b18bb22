use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BookId, LoanId, MemberId, Money, StaffId};

/// イベント：書籍が貸出された
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookLoaned {
    pub loan_id: LoanId,
    pub book_id: BookId,
    pub member_id: MemberId,
    pub loaned_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub loaned_by: StaffId,
}

/// イベント：貸出が延長された
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanRenewed {
    pub loan_id: LoanId,
    pub old_due_date: DateTime<Utc>,
    pub new_due_date: DateTime<Utc>,
    pub renewed_at: DateTime<Utc>,
    pub renewal_count: u8,
    pub renewed_by: StaffId,
}

/// イベント：貸出が延滞した
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanBecameOverdue {
    pub loan_id: LoanId,
    pub book_id: BookId,
    pub member_id: MemberId,
    pub due_date: DateTime<Utc>,
    pub detected_at: DateTime<Utc>,
    pub days_overdue: u32,
    pub fine_amount: Money,
}

/// イベント：書籍が返却された
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookReturned {
    pub loan_id: LoanId,
    pub book_id: BookId,
    pub member_id: MemberId,
    pub returned_at: DateTime<Utc>,
    pub was_overdue: bool,
    pub outstanding_fine: Money,
    pub returned_by: StaffId,
}

/// イベント：書籍が紛失扱いになった
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookMarkedLost {
    pub loan_id: LoanId,
    pub book_id: BookId,
    pub member_id: MemberId,
    pub marked_at: DateTime<Utc>,
    pub penalty: Money,
    pub fine_amount: Money,
    pub marked_by: StaffId,
}

/// イベント：延滞料金が支払われた
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinePaid {
    pub loan_id: LoanId,
    pub member_id: MemberId,
    pub fine_amount: Money,
    pub amount_paid: Money,
    pub paid_at: DateTime<Utc>,
    pub received_by: StaffId,
}

/// ドメインイベント統合型
///
/// 貸出レコードの保存と同時に監査ログとして追記される。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DomainEvent {
    BookLoaned(BookLoaned),
    LoanRenewed(LoanRenewed),
    LoanBecameOverdue(LoanBecameOverdue),
    BookReturned(BookReturned),
    BookMarkedLost(BookMarkedLost),
    FinePaid(FinePaid),
}

impl DomainEvent {
    /// イベント種別の識別子
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::BookLoaned(_) => "BookLoaned",
            DomainEvent::LoanRenewed(_) => "LoanRenewed",
            DomainEvent::LoanBecameOverdue(_) => "LoanBecameOverdue",
            DomainEvent::BookReturned(_) => "BookReturned",
            DomainEvent::BookMarkedLost(_) => "BookMarkedLost",
            DomainEvent::FinePaid(_) => "FinePaid",
        }
    }

    /// イベントの発生時刻
    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DomainEvent::BookLoaned(e) => e.loaned_at,
            DomainEvent::LoanRenewed(e) => e.renewed_at,
            DomainEvent::LoanBecameOverdue(e) => e.detected_at,
            DomainEvent::BookReturned(e) => e.returned_at,
            DomainEvent::BookMarkedLost(e) => e.marked_at,
            DomainEvent::FinePaid(e) => e.paid_at,
        }
    }

    pub fn loan_id(&self) -> LoanId {
        match self {
            DomainEvent::BookLoaned(e) => e.loan_id,
            DomainEvent::LoanRenewed(e) => e.loan_id,
            DomainEvent::LoanBecameOverdue(e) => e.loan_id,
            DomainEvent::BookReturned(e) => e.loan_id,
            DomainEvent::BookMarkedLost(e) => e.loan_id,
            DomainEvent::FinePaid(e) => e.loan_id,
        }
    }
}

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{
    BookId, BookLoaned, BookMarkedLost, BookReturned, FinePaid, LoanBecameOverdue, LoanBookError,
    LoanId, LoanPolicy, LoanRenewed, LoanStatus, MarkLostError, MemberId, Money, PayFineError,
    RenewLoanError, RenewalCount, ReturnBookError, StaffId,
};

/// 貸出レコード - 1冊の書籍の1回の貸出
///
/// 削除されることはなく、状態遷移のみを行う。
///
/// 不変条件：
/// - due_date > loaned_at
/// - status == Returned ⇔ returned_at が Some
/// - renewal_count <= 3
/// - fine_amount >= 0（Money型で保証）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanRecord {
    // 識別子
    pub loan_id: LoanId,

    // 他の集約への参照（IDのみ）
    pub book_id: BookId,
    pub member_id: MemberId,

    // 貸出管理の責務
    pub loaned_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub last_renewed_at: Option<DateTime<Utc>>,
    pub renewal_count: RenewalCount,
    pub status: LoanStatus,

    // 延滞料金
    pub fine_amount: Money,
    pub fine_paid: bool,
    pub fine_paid_at: Option<DateTime<Utc>>,

    pub notes: Option<String>,

    // 監査情報
    pub processed_by: StaffId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// 楽観的排他制御用のバージョン（未保存は0）
    pub version: u32,
}

impl LoanRecord {
    /// 延長可能か
    ///
    /// 貸出中、延長回数が上限未満、かつ返却期限前であること。
    pub fn can_renew(&self, now: DateTime<Utc>) -> bool {
        self.status == LoanStatus::Active && self.renewal_count.can_renew() && self.due_date > now
    }

    /// 現時点での延滞日数（貸出中で期限切れの場合のみ）
    pub fn days_overdue(&self, now: DateTime<Utc>) -> u32 {
        if self.status.is_open() && now > self.due_date {
            days_overdue(self.due_date, now)
        } else {
            0
        }
    }

    /// 貸出日から返却日（未返却なら現在）までの日数
    pub fn borrowing_duration_days(&self, now: DateTime<Utc>) -> u32 {
        let end = self.returned_at.unwrap_or(now);
        if end > self.loaned_at {
            days_overdue(self.loaned_at, end)
        } else {
            0
        }
    }
}

/// 期限からの経過日数（端数は切り上げ）
pub fn days_overdue(due_date: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    let elapsed = now - due_date;
    if elapsed <= Duration::zero() {
        return 0;
    }
    let whole_days = elapsed.num_days();
    let days = if elapsed > Duration::days(whole_days) {
        whole_days + 1
    } else {
        whole_days
    };
    u32::try_from(days).unwrap_or(u32::MAX)
}

/// 純粋関数：書籍を貸し出す
///
/// ビジネスルール：
/// - 返却期限は貸出日時より後であること
/// - 状態はActive、延長回数0、延滞料金0
///
/// 在庫・会員の事前条件はアプリケーション層で確認する。
/// 副作用なし。新しいLoanRecordとイベントを返す。
pub fn loan_book(
    book_id: BookId,
    member_id: MemberId,
    loaned_at: DateTime<Utc>,
    due_date: DateTime<Utc>,
    staff_id: StaffId,
    notes: Option<String>,
) -> Result<(LoanRecord, BookLoaned), LoanBookError> {
    if due_date <= loaned_at {
        return Err(LoanBookError::DueDateNotInFuture);
    }

    let loan_id = LoanId::new();

    let loan = LoanRecord {
        loan_id,
        book_id,
        member_id,
        loaned_at,
        due_date,
        returned_at: None,
        last_renewed_at: None,
        renewal_count: RenewalCount::new(),
        status: LoanStatus::Active,
        fine_amount: Money::zero(),
        fine_paid: false,
        fine_paid_at: None,
        notes,
        processed_by: staff_id,
        created_at: loaned_at,
        updated_at: loaned_at,
        version: 0,
    };

    let event = BookLoaned {
        loan_id,
        book_id,
        member_id,
        loaned_at,
        due_date,
        loaned_by: staff_id,
    };

    Ok((loan, event))
}

/// 純粋関数：現在時刻から状態を再計算する（遅延評価）
///
/// 貸出の読み込み時と延滞検出バッチから呼ばれる。
/// 延滞への遷移はこの関数でのみ起こる。
///
/// ビジネスルール：
/// - Activeかつ返却期限を過ぎている場合のみOverdueに遷移する
/// - 延滞料金 = 延滞日数（切り上げ） × 1日あたりの料金
///
/// 冪等：同じnowで2回適用しても結果は変わらない。
pub fn recompute_status(
    loan: &LoanRecord,
    now: DateTime<Utc>,
    policy: &LoanPolicy,
) -> (LoanRecord, Option<LoanBecameOverdue>) {
    if !is_overdue(loan, now) || loan.status != LoanStatus::Active {
        return (loan.clone(), None);
    }

    let days = days_overdue(loan.due_date, now);
    let fine_amount = policy.daily_fine.times(days);

    let new_loan = LoanRecord {
        status: LoanStatus::Overdue,
        fine_amount,
        updated_at: now,
        ..loan.clone()
    };

    let event = LoanBecameOverdue {
        loan_id: loan.loan_id,
        book_id: loan.book_id,
        member_id: loan.member_id,
        due_date: loan.due_date,
        detected_at: now,
        days_overdue: days,
        fine_amount,
    };

    (new_loan, Some(event))
}

/// 純粋関数：貸出を延長する
///
/// ビジネスルール：
/// - Active状態のみ延長可能（延滞中・返却済み・紛失は不可）
/// - 延長は3回まで
/// - 返却期限前であること
/// - 延長時：現在の返却期限 + additional_days
///
/// 延滞料金には触れない。副作用なし。
pub fn renew_loan(
    loan: &LoanRecord,
    additional_days: i64,
    renewed_at: DateTime<Utc>,
    staff_id: StaffId,
) -> Result<(LoanRecord, LoanRenewed), RenewLoanError> {
    if loan.status != LoanStatus::Active {
        return Err(RenewLoanError::NotActive(loan.status));
    }

    if !loan.renewal_count.can_renew() {
        return Err(RenewLoanError::RenewalLimitReached);
    }

    if loan.due_date <= renewed_at {
        return Err(RenewLoanError::DueDatePassed);
    }

    if additional_days <= 0 {
        return Err(RenewLoanError::InvalidPeriod(additional_days));
    }

    let old_due_date = loan.due_date;
    let new_due_date = Duration::try_days(additional_days)
        .and_then(|period| old_due_date.checked_add_signed(period))
        .ok_or(RenewLoanError::InvalidPeriod(additional_days))?;
    let renewal_count = loan.renewal_count.increment()?;

    let new_loan = LoanRecord {
        due_date: new_due_date,
        renewal_count,
        last_renewed_at: Some(renewed_at),
        processed_by: staff_id,
        updated_at: renewed_at,
        ..loan.clone()
    };

    let event = LoanRenewed {
        loan_id: loan.loan_id,
        old_due_date,
        new_due_date,
        renewed_at,
        renewal_count: renewal_count.value(),
        renewed_by: staff_id,
    };

    Ok((new_loan, event))
}

/// 純粋関数：書籍を返却する
///
/// ビジネスルール：
/// - 延滞していても返却は受け付ける
/// - 延滞料金は返却後も残り、支払いで精算する
/// - 返却済み・紛失の貸出は返却できない
///
/// 副作用なし。在庫数の更新はアプリケーション層が行う。
pub fn return_book(
    loan: &LoanRecord,
    returned_at: DateTime<Utc>,
    staff_id: StaffId,
    notes: Option<String>,
) -> Result<(LoanRecord, BookReturned), ReturnBookError> {
    match loan.status {
        LoanStatus::Returned => return Err(ReturnBookError::AlreadyReturned),
        LoanStatus::Lost => return Err(ReturnBookError::AlreadyLost),
        LoanStatus::Active | LoanStatus::Overdue => {}
    }

    let was_overdue = loan.status == LoanStatus::Overdue || returned_at > loan.due_date;

    let new_loan = LoanRecord {
        returned_at: Some(returned_at),
        status: LoanStatus::Returned,
        notes: notes.or_else(|| loan.notes.clone()),
        processed_by: staff_id,
        updated_at: returned_at,
        ..loan.clone()
    };

    let event = BookReturned {
        loan_id: loan.loan_id,
        book_id: loan.book_id,
        member_id: loan.member_id,
        returned_at,
        was_overdue,
        outstanding_fine: if loan.fine_paid {
            Money::zero()
        } else {
            loan.fine_amount
        },
        returned_by: staff_id,
    };

    Ok((new_loan, event))
}

/// 純粋関数：書籍を紛失扱いにする
///
/// ビジネスルール：
/// - 貸出中または延滞中のみ
/// - 延滞料金に紛失料金を加算する
pub fn mark_lost(
    loan: &LoanRecord,
    marked_at: DateTime<Utc>,
    policy: &LoanPolicy,
    staff_id: StaffId,
) -> Result<(LoanRecord, BookMarkedLost), MarkLostError> {
    match loan.status {
        LoanStatus::Returned => return Err(MarkLostError::AlreadyReturned),
        LoanStatus::Lost => return Err(MarkLostError::AlreadyLost),
        LoanStatus::Active | LoanStatus::Overdue => {}
    }

    let fine_amount = loan.fine_amount + policy.lost_item_penalty;

    let new_loan = LoanRecord {
        status: LoanStatus::Lost,
        fine_amount,
        processed_by: staff_id,
        updated_at: marked_at,
        ..loan.clone()
    };

    let event = BookMarkedLost {
        loan_id: loan.loan_id,
        book_id: loan.book_id,
        member_id: loan.member_id,
        marked_at,
        penalty: policy.lost_item_penalty,
        fine_amount,
        marked_by: staff_id,
    };

    Ok((new_loan, event))
}

/// 純粋関数：延滞料金を支払う
///
/// ビジネスルール：
/// - 支払額が延滞料金以上であること（過払いは黙って受け付ける）
/// - 延滞料金自体は変更せず、支払済みフラグを立てる
pub fn pay_fine(
    loan: &LoanRecord,
    amount: Money,
    paid_at: DateTime<Utc>,
    staff_id: StaffId,
) -> Result<(LoanRecord, FinePaid), PayFineError> {
    if amount < loan.fine_amount {
        return Err(PayFineError::InsufficientPayment {
            fine_amount: loan.fine_amount,
            offered: amount,
        });
    }

    let new_loan = LoanRecord {
        fine_paid: true,
        fine_paid_at: Some(paid_at),
        processed_by: staff_id,
        updated_at: paid_at,
        ..loan.clone()
    };

    let event = FinePaid {
        loan_id: loan.loan_id,
        member_id: loan.member_id,
        fine_amount: loan.fine_amount,
        amount_paid: amount,
        paid_at,
        received_by: staff_id,
    };

    Ok((new_loan, event))
}

/// 純粋関数：延滞判定
pub fn is_overdue(loan: &LoanRecord, now: DateTime<Utc>) -> bool {
    loan.status.is_open() && now > loan.due_date
}

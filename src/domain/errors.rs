use super::{LoanStatus, Money, RenewalError};

/// 貸出のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoanBookError {
    /// 返却期限が貸出日時より後ではない
    DueDateNotInFuture,
}

/// 延長のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenewLoanError {
    /// 貸出中ではない（延滞中・返却済み・紛失）
    NotActive(LoanStatus),
    /// 延長回数の上限を超えた
    RenewalLimitReached,
    /// 返却期限を過ぎている
    DueDatePassed,
    /// 延長日数が正ではない
    InvalidPeriod(i64),
}

impl RenewLoanError {
    /// 利用者向けの理由
    pub fn reason(&self) -> &'static str {
        match self {
            RenewLoanError::NotActive(LoanStatus::Overdue) => "loan is overdue",
            RenewLoanError::NotActive(LoanStatus::Returned) => "loan has been returned",
            RenewLoanError::NotActive(LoanStatus::Lost) => "book has been marked lost",
            RenewLoanError::NotActive(LoanStatus::Active) => "loan is not active",
            RenewLoanError::RenewalLimitReached => "renewal limit reached",
            RenewLoanError::DueDatePassed => "due date has passed",
            RenewLoanError::InvalidPeriod(_) => "renewal period must be positive",
        }
    }
}

impl From<RenewalError> for RenewLoanError {
    fn from(err: RenewalError) -> Self {
        match err {
            RenewalError::LimitExceeded => RenewLoanError::RenewalLimitReached,
        }
    }
}

/// 返却のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnBookError {
    /// 既に返却済み
    AlreadyReturned,
    /// 紛失扱い済み
    AlreadyLost,
}

/// 紛失処理のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkLostError {
    /// 既に返却済み
    AlreadyReturned,
    /// 紛失扱い済み
    AlreadyLost,
}

/// 延滞料金支払いのエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayFineError {
    /// 支払額が延滞料金に満たない
    InsufficientPayment { fine_amount: Money, offered: Money },
}

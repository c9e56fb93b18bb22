use crate::domain::{
    LoanBookError, MarkLostError, PayFineError, RenewLoanError, ReturnBookError,
    value_objects::{LoanId, Money},
};
use crate::ports::{BoxError, SaveError};
use thiserror::Error;

/// 貸出の事前条件違反
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PreconditionFailure {
    /// 返却期限が現在より後ではない
    #[error("Due date must be after the loan date")]
    InvalidDueDate,

    /// 会員のアカウントが無効
    #[error("Member account is not active")]
    MemberInactive,

    /// 在庫がない
    #[error("No copies available for borrowing")]
    NoCopiesAvailable,

    /// 書籍の状態が貸出不可（予約・紛失・破損・整備中）
    #[error("Book is not available for borrowing")]
    ItemUnavailable,

    /// 会員に延滞中の貸出がある
    #[error("Member has overdue books")]
    BorrowerHasOverdue,

    /// 同じ書籍を既に借りている
    #[error("Member has already borrowed this book")]
    DuplicateLoan,
}

impl PreconditionFailure {
    /// 機械可読な理由コード
    pub fn code(&self) -> &'static str {
        match self {
            PreconditionFailure::InvalidDueDate => "invalid-due-date",
            PreconditionFailure::MemberInactive => "member-inactive",
            PreconditionFailure::NoCopiesAvailable => "no-copies",
            PreconditionFailure::ItemUnavailable => "item-unavailable",
            PreconditionFailure::BorrowerHasOverdue => "borrower-overdue",
            PreconditionFailure::DuplicateLoan => "duplicate-loan",
        }
    }
}

/// 貸出管理アプリケーション層のエラー
#[derive(Debug, Error)]
pub enum LoanApplicationError {
    /// 貸出の事前条件違反
    #[error("Precondition failed: {0}")]
    PreconditionFailed(PreconditionFailure),

    /// 延長不可
    #[error("This loan cannot be renewed: {0}")]
    NotRenewable(&'static str),

    /// 既に返却済み
    #[error("Book has already been returned")]
    AlreadyReturned,

    /// 貸出の状態が不正（例: 紛失扱いの貸出の返却）
    #[error("Invalid loan state: {0}")]
    InvalidLoanState(String),

    /// 支払額が延滞料金に満たない
    #[error("Payment amount {offered} is less than the fine amount {fine_amount}")]
    InsufficientPayment { fine_amount: Money, offered: Money },

    /// 貸出が見つからない
    #[error("Loan not found")]
    LoanNotFound,

    /// 書籍が見つからない
    #[error("Book not found")]
    BookNotFound,

    /// 会員が見つからない
    #[error("Member not found")]
    MemberNotFound,

    /// 同時更新の競合（最新の状態で再試行可能）
    #[error("Loan {0} was modified concurrently")]
    VersionConflict(LoanId),

    /// LoanRepository / LoanReportsのエラー
    #[error("Repository error")]
    RepositoryError(#[source] BoxError),

    /// CatalogServiceのエラー
    #[error("Catalog service error")]
    CatalogServiceError(#[source] BoxError),

    /// MemberServiceのエラー
    #[error("Member service error")]
    MemberServiceError(#[source] BoxError),
}

impl From<PreconditionFailure> for LoanApplicationError {
    fn from(failure: PreconditionFailure) -> Self {
        LoanApplicationError::PreconditionFailed(failure)
    }
}

impl From<SaveError> for LoanApplicationError {
    fn from(err: SaveError) -> Self {
        match err {
            SaveError::VersionConflict { loan_id, .. } => {
                LoanApplicationError::VersionConflict(loan_id)
            }
            SaveError::DuplicateOpenLoan { .. } => {
                LoanApplicationError::PreconditionFailed(PreconditionFailure::DuplicateLoan)
            }
            SaveError::Storage(e) => LoanApplicationError::RepositoryError(e),
        }
    }
}

impl From<LoanBookError> for LoanApplicationError {
    fn from(err: LoanBookError) -> Self {
        match err {
            LoanBookError::DueDateNotInFuture => {
                LoanApplicationError::PreconditionFailed(PreconditionFailure::InvalidDueDate)
            }
        }
    }
}

impl From<RenewLoanError> for LoanApplicationError {
    fn from(err: RenewLoanError) -> Self {
        LoanApplicationError::NotRenewable(err.reason())
    }
}

impl From<ReturnBookError> for LoanApplicationError {
    fn from(err: ReturnBookError) -> Self {
        match err {
            ReturnBookError::AlreadyReturned => LoanApplicationError::AlreadyReturned,
            ReturnBookError::AlreadyLost => {
                LoanApplicationError::InvalidLoanState("Book has been marked lost".to_string())
            }
        }
    }
}

impl From<MarkLostError> for LoanApplicationError {
    fn from(err: MarkLostError) -> Self {
        match err {
            MarkLostError::AlreadyReturned => LoanApplicationError::AlreadyReturned,
            MarkLostError::AlreadyLost => LoanApplicationError::InvalidLoanState(
                "Book has already been marked lost".to_string(),
            ),
        }
    }
}

impl From<PayFineError> for LoanApplicationError {
    fn from(err: PayFineError) -> Self {
        match err {
            PayFineError::InsufficientPayment {
                fine_amount,
                offered,
            } => LoanApplicationError::InsufficientPayment {
                fine_amount,
                offered,
            },
        }
    }
}

/// アプリケーション層の Result型
pub type Result<T> = std::result::Result<T, LoanApplicationError>;

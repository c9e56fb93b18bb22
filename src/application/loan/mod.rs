mod errors;
mod loan_service;
mod overdue_detection;
mod queries;
pub mod reports;

pub use errors::{LoanApplicationError, PreconditionFailure, Result};
pub use loan_service::{
    ServiceDependencies, get_loan, loan_book, loan_history, mark_lost, pay_fine, renew_loan,
    return_book,
};
pub use overdue_detection::{detect_overdue_loans, spawn_overdue_sweep};
pub use queries::{list_loans, member_loans, overdue_loans};

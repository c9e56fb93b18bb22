use crate::ports::*;

use super::errors::{LoanApplicationError, Result};
use super::loan_service::ServiceDependencies;

/// ステータス別件数と延滞料金の合計
pub async fn loan_summary(deps: &ServiceDependencies, filter: &LoanFilter) -> Result<LoanSummary> {
    deps.loan_reports
        .summary(filter)
        .await
        .map_err(LoanApplicationError::RepositoryError)
}

/// 会員別の集計
pub async fn member_breakdown(
    deps: &ServiceDependencies,
    filter: &LoanFilter,
) -> Result<Vec<MemberLoanStats>> {
    deps.loan_reports
        .by_member(filter)
        .await
        .map_err(LoanApplicationError::RepositoryError)
}

/// 指定年の月別集計
pub async fn monthly_breakdown(
    deps: &ServiceDependencies,
    year: i32,
) -> Result<Vec<MonthlyLoanStats>> {
    deps.loan_reports
        .monthly(year)
        .await
        .map_err(LoanApplicationError::RepositoryError)
}

use crate::domain::{self, LoanStatus, loan::LoanRecord, value_objects::MemberId};
use crate::ports::*;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

use super::errors::{LoanApplicationError, Result};
use super::loan_service::ServiceDependencies;

/// 表示用に状態を再計算する（保存はしない）
fn recompute_for_display(
    deps: &ServiceDependencies,
    loan: LoanRecord,
    now: DateTime<Utc>,
) -> LoanRecord {
    domain::loan::recompute_status(&loan, now, &deps.policy).0
}

/// 条件で貸出を検索する
///
/// 絞り込みとページングは保存済みの状態に対して行われる。
/// 返却される各レコードは`now`時点の状態に再計算済み。
pub async fn list_loans(
    deps: &ServiceDependencies,
    filter: &LoanFilter,
    pagination: Option<Pagination>,
    now: DateTime<Utc>,
) -> Result<Page<LoanRecord>> {
    let page = deps
        .loan_repository
        .find(filter, pagination)
        .await
        .map_err(LoanApplicationError::RepositoryError)?;

    Ok(Page {
        items: page
            .items
            .into_iter()
            .map(|loan| recompute_for_display(deps, loan, now))
            .collect(),
        total: page.total,
    })
}

/// 会員の貸出履歴を取得する（貸出日時の新しい順）
pub async fn member_loans(
    deps: &ServiceDependencies,
    member_id: MemberId,
    now: DateTime<Utc>,
) -> Result<Vec<LoanRecord>> {
    let exists = deps
        .member_service
        .exists(member_id)
        .await
        .map_err(LoanApplicationError::MemberServiceError)?;

    if !exists {
        return Err(LoanApplicationError::MemberNotFound);
    }

    let page = list_loans(deps, &LoanFilter::for_member(member_id), None, now).await?;
    Ok(page.items)
}

/// 延滞中の貸出を取得する（返却期限の古い順）
///
/// 延滞状態が保存済みのものと、返却期限を過ぎたがまだ遷移していない
/// 貸出中のものを合わせて返す。
pub async fn overdue_loans(
    deps: &ServiceDependencies,
    now: DateTime<Utc>,
) -> Result<Vec<LoanRecord>> {
    let overdue_filter = LoanFilter {
        status: Some(LoanStatus::Overdue),
        ..LoanFilter::default()
    };

    let persisted = deps
        .loan_repository
        .find(&overdue_filter, None)
        .await
        .map_err(LoanApplicationError::RepositoryError)?;

    let candidates = deps
        .loan_repository
        .find_overdue_candidates(now)
        .await
        .map_err(LoanApplicationError::RepositoryError)?;

    let mut seen = HashSet::new();
    let mut loans: Vec<LoanRecord> = persisted
        .items
        .into_iter()
        .chain(candidates)
        .filter(|loan| seen.insert(loan.loan_id))
        .map(|loan| recompute_for_display(deps, loan, now))
        .filter(|loan| loan.status == LoanStatus::Overdue)
        .collect();

    loans.sort_by_key(|loan| loan.due_date);
    Ok(loans)
}

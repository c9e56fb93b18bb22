use crate::domain::{self, DomainEvent, LoanPolicy, commands::*, loan::LoanRecord, value_objects::*};
use crate::ports::*;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::errors::{LoanApplicationError, PreconditionFailure, Result};

/// サービスの依存関係
///
/// 関数型DDDの原則に従い、データ構造として定義。
/// 振る舞い（メソッド）は持たず、純粋な関数に依存関係を渡す。
#[derive(Clone)]
pub struct ServiceDependencies {
    pub loan_repository: Arc<dyn LoanRepository>,
    pub loan_reports: Arc<dyn LoanReports>,
    pub member_service: Arc<dyn MemberService>,
    pub catalog_service: Arc<dyn CatalogService>,
    pub policy: LoanPolicy,
}

/// 貸出を読み込み、現在時刻で状態を再計算するヘルパー関数
///
/// 延滞への遷移が起きた場合は、その場でLoanBecameOverdueイベントと共に保存する。
/// renew_loan, return_book, mark_lost, pay_fine, get_loan, overdue_detectionで共通利用される。
///
/// # エラー
/// - LoanNotFound: 貸出が存在しない
/// - VersionConflict: 再計算結果の保存中に別の更新が行われた
/// - RepositoryError: 読み込み・保存の失敗
pub(super) async fn load_loan(
    deps: &ServiceDependencies,
    loan_id: LoanId,
    now: DateTime<Utc>,
) -> Result<LoanRecord> {
    let loan = deps
        .loan_repository
        .load(loan_id)
        .await
        .map_err(LoanApplicationError::RepositoryError)?
        .ok_or(LoanApplicationError::LoanNotFound)?;

    let (loan, event) = domain::loan::recompute_status(&loan, now, &deps.policy);

    match event {
        Some(event) => {
            tracing::info!(
                loan_id = %loan.loan_id,
                days_overdue = event.days_overdue,
                fine_amount = %event.fine_amount,
                "Loan became overdue"
            );
            persist(deps, loan, vec![DomainEvent::LoanBecameOverdue(event)]).await
        }
        None => Ok(loan),
    }
}

/// 貸出とイベントを保存し、新しいバージョンを反映したレコードを返す
async fn persist(
    deps: &ServiceDependencies,
    mut loan: LoanRecord,
    events: Vec<DomainEvent>,
) -> Result<LoanRecord> {
    loan.version = deps.loan_repository.save(&loan, &events).await?;
    Ok(loan)
}

/// 書籍を貸し出す
///
/// ビジネスルール（確認順）：
/// - 返却期限が貸出日時より後であること
/// - 会員が存在し、アカウントが有効であること
/// - 書籍が存在し、在庫があり、貸出可能な状態であること
/// - 会員に延滞中の貸出がないこと
/// - 同じ書籍を既に借りていないこと
///
/// # 一貫性保証
///
/// 在庫の確保はカタログ側のアトミックな操作で行い、確保後に貸出を保存する。
/// 保存に失敗した場合は確保した在庫を戻す（補償処理）。
/// 同じ会員・書籍の同時貸出は、ストアの一意制約で1件のみ成功する。
///
/// # 戻り値
/// 作成された貸出（version は保存後の値）
pub async fn loan_book(deps: &ServiceDependencies, cmd: LoanBook) -> Result<LoanRecord> {
    // 1. ドメイン層の純粋関数（返却期限の検証）
    let (loan, event) = domain::loan::loan_book(
        cmd.book_id,
        cmd.member_id,
        cmd.loaned_at,
        cmd.due_date,
        cmd.staff_id,
        cmd.notes,
    )?;

    // 2. 会員の確認
    let member_exists = deps
        .member_service
        .exists(cmd.member_id)
        .await
        .map_err(LoanApplicationError::MemberServiceError)?;

    if !member_exists {
        return Err(LoanApplicationError::MemberNotFound);
    }

    let member_active = deps
        .member_service
        .is_active(cmd.member_id)
        .await
        .map_err(LoanApplicationError::MemberServiceError)?;

    if !member_active {
        return Err(PreconditionFailure::MemberInactive.into());
    }

    // 3. 書籍の確認
    let book = deps
        .catalog_service
        .find_book(cmd.book_id)
        .await
        .map_err(LoanApplicationError::CatalogServiceError)?
        .ok_or(LoanApplicationError::BookNotFound)?;

    if book.available_copies == 0 {
        return Err(PreconditionFailure::NoCopiesAvailable.into());
    }

    if !book.is_lendable() {
        return Err(PreconditionFailure::ItemUnavailable.into());
    }

    // 4. 会員の延滞確認
    let has_overdue = deps
        .loan_repository
        .has_overdue_loans(cmd.member_id, cmd.loaned_at)
        .await
        .map_err(LoanApplicationError::RepositoryError)?;

    if has_overdue {
        return Err(PreconditionFailure::BorrowerHasOverdue.into());
    }

    // 5. 重複貸出の確認
    let open_loan = deps
        .loan_repository
        .find_open_loan(cmd.member_id, cmd.book_id)
        .await
        .map_err(LoanApplicationError::RepositoryError)?;

    if open_loan.is_some() {
        return Err(PreconditionFailure::DuplicateLoan.into());
    }

    // 6. 在庫の確保（アトミック）
    let remaining = deps
        .catalog_service
        .decrement_available(cmd.book_id)
        .await
        .map_err(LoanApplicationError::CatalogServiceError)?;

    let Some(remaining) = remaining else {
        return Err(PreconditionFailure::NoCopiesAvailable.into());
    };

    // 7. 保存（失敗時は在庫を戻す）
    match persist(deps, loan, vec![DomainEvent::BookLoaned(event)]).await {
        Ok(loan) => {
            tracing::info!(
                loan_id = %loan.loan_id,
                book_id = %loan.book_id,
                member_id = %loan.member_id,
                remaining_copies = remaining,
                "Book loaned"
            );
            Ok(loan)
        }
        Err(err) => {
            tracing::warn!(
                book_id = %cmd.book_id,
                member_id = %cmd.member_id,
                error = %err,
                "Failed to save loan, releasing reserved copy"
            );
            if let Err(release_err) = deps.catalog_service.increment_available(cmd.book_id).await
            {
                tracing::error!(
                    book_id = %cmd.book_id,
                    error = %release_err,
                    "Failed to release reserved copy"
                );
            }
            Err(err)
        }
    }
}

/// 貸出を延長する
///
/// ビジネスルール：
/// - 読み込み時の再計算後もActive状態であること
/// - 延長回数が上限（3回）に達していないこと
/// - 返却期限前であること
///
/// 延滞中の貸出は、読み込み時にOverdueへ遷移したうえで延長不可となる。
pub async fn renew_loan(deps: &ServiceDependencies, cmd: RenewLoan) -> Result<LoanRecord> {
    let loan = load_loan(deps, cmd.loan_id, cmd.renewed_at).await?;

    let (renewed, event) =
        domain::loan::renew_loan(&loan, cmd.additional_days, cmd.renewed_at, cmd.staff_id)?;

    let renewed = persist(deps, renewed, vec![DomainEvent::LoanRenewed(event)]).await?;

    tracing::info!(
        loan_id = %renewed.loan_id,
        renewal_count = renewed.renewal_count.value(),
        due_date = %renewed.due_date,
        "Loan renewed"
    );

    Ok(renewed)
}

/// 書籍を返却する
///
/// ビジネスルール：
/// - 貸出中または延滞中であること
/// - 延滞料金は返却後も残る
///
/// 保存後にカタログの在庫を1戻す。
pub async fn return_book(deps: &ServiceDependencies, cmd: ReturnBook) -> Result<LoanRecord> {
    let loan = load_loan(deps, cmd.loan_id, cmd.returned_at).await?;

    let (returned, event) =
        domain::loan::return_book(&loan, cmd.returned_at, cmd.staff_id, cmd.notes)?;
    let was_overdue = event.was_overdue;

    let returned = persist(deps, returned, vec![DomainEvent::BookReturned(event)]).await?;

    if let Err(err) = deps
        .catalog_service
        .increment_available(returned.book_id)
        .await
    {
        tracing::error!(
            loan_id = %returned.loan_id,
            book_id = %returned.book_id,
            error = %err,
            "Loan returned but catalog copy count was not restored"
        );
        return Err(LoanApplicationError::CatalogServiceError(err));
    }

    tracing::info!(
        loan_id = %returned.loan_id,
        was_overdue,
        fine_amount = %returned.fine_amount,
        "Book returned"
    );

    Ok(returned)
}

/// 書籍を紛失扱いにする
///
/// ビジネスルール：
/// - 貸出中または延滞中であること
/// - 延滞料金に紛失料金を加算する
///
/// 保存後にカタログの書籍を紛失状態にする。在庫数の扱いは
/// `LoanPolicy::lost_copy_policy` に従う。
pub async fn mark_lost(deps: &ServiceDependencies, cmd: MarkLost) -> Result<LoanRecord> {
    let loan = load_loan(deps, cmd.loan_id, cmd.marked_at).await?;

    let (lost, event) = domain::loan::mark_lost(&loan, cmd.marked_at, &deps.policy, cmd.staff_id)?;

    let lost = persist(deps, lost, vec![DomainEvent::BookMarkedLost(event)]).await?;

    let remove_copy = deps.policy.lost_copy_policy.removes_copy();
    if let Err(err) = deps
        .catalog_service
        .mark_lost(lost.book_id, remove_copy)
        .await
    {
        tracing::error!(
            loan_id = %lost.loan_id,
            book_id = %lost.book_id,
            error = %err,
            "Loan marked lost but catalog was not updated"
        );
        return Err(LoanApplicationError::CatalogServiceError(err));
    }

    tracing::info!(
        loan_id = %lost.loan_id,
        fine_amount = %lost.fine_amount,
        remove_copy,
        "Book marked lost"
    );

    Ok(lost)
}

/// 延滞料金を支払う
///
/// ビジネスルール：
/// - 支払額が延滞料金以上であること
///
/// 延滞料金は読み込み時の再計算後の値で判定する。
pub async fn pay_fine(deps: &ServiceDependencies, cmd: PayFine) -> Result<LoanRecord> {
    let loan = load_loan(deps, cmd.loan_id, cmd.paid_at).await?;

    let (paid, event) = domain::loan::pay_fine(&loan, cmd.amount, cmd.paid_at, cmd.staff_id)?;

    let paid = persist(deps, paid, vec![DomainEvent::FinePaid(event)]).await?;

    tracing::info!(
        loan_id = %paid.loan_id,
        fine_amount = %paid.fine_amount,
        amount_paid = %cmd.amount,
        "Fine paid"
    );

    Ok(paid)
}

/// 貸出を取得する（状態は現在時刻で再計算される）
pub async fn get_loan(
    deps: &ServiceDependencies,
    loan_id: LoanId,
    now: DateTime<Utc>,
) -> Result<LoanRecord> {
    load_loan(deps, loan_id, now).await
}

/// 貸出の監査ログを取得する
pub async fn loan_history(deps: &ServiceDependencies, loan_id: LoanId) -> Result<Vec<DomainEvent>> {
    let exists = deps
        .loan_repository
        .load(loan_id)
        .await
        .map_err(LoanApplicationError::RepositoryError)?
        .is_some();

    if !exists {
        return Err(LoanApplicationError::LoanNotFound);
    }

    deps.loan_repository
        .load_events(loan_id)
        .await
        .map_err(LoanApplicationError::RepositoryError)
}

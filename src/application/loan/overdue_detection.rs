use crate::domain::LoanStatus;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::task::JoinHandle;

use super::errors::{LoanApplicationError, Result};
use super::loan_service::{ServiceDependencies, load_loan};

/// 延滞検出バッチ
///
/// 返却期限を過ぎた貸出中の貸出に遅延評価を一括適用し、
/// LoanBecameOverdueイベントと共に保存する。
///
/// ビジネスルール：
/// - 返却期限（due_date）を過ぎたActive状態の貸出を延滞とする
/// - 既にOverdue状態の貸出は処理しない（重複イベント防止）
/// - 同時に更新された貸出はスキップする（次回の読み込みで再計算される）
/// - 個々の貸出の読み込み・保存の失敗はログに残し、残りの貸出の処理を続ける
///
/// # 戻り値
/// 延滞として検出した貸出の件数
///
/// # エラー
/// 候補の検索失敗のみ
pub async fn detect_overdue_loans(deps: &ServiceDependencies, now: DateTime<Utc>) -> Result<usize> {
    let candidates = deps
        .loan_repository
        .find_overdue_candidates(now)
        .await
        .map_err(LoanApplicationError::RepositoryError)?;

    let mut detected_count = 0;

    for candidate in candidates {
        // load_loanが再計算と保存を行う
        match load_loan(deps, candidate.loan_id, now).await {
            Ok(loan)
                if loan.status == LoanStatus::Overdue && loan.version != candidate.version =>
            {
                detected_count += 1
            }
            Ok(_) => {}
            Err(LoanApplicationError::VersionConflict(loan_id)) => {
                tracing::warn!(%loan_id, "Skipping loan modified during overdue sweep");
            }
            Err(LoanApplicationError::LoanNotFound) => {}
            Err(err) => {
                tracing::error!(
                    loan_id = %candidate.loan_id,
                    error = %err,
                    "Failed to update loan during overdue sweep"
                );
            }
        }
    }

    tracing::info!(detected_count, "Overdue sweep finished");
    Ok(detected_count)
}

/// 延滞検出バッチを一定間隔で実行するタスクを起動する
///
/// バッチの失敗はログに残し、次の実行を続ける。
pub fn spawn_overdue_sweep(deps: ServiceDependencies, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(err) = detect_overdue_loans(&deps, Utc::now()).await {
                tracing::error!(error = %err, "Overdue sweep failed");
            }
        }
    })
}

use crate::domain::value_objects::{MemberId, Money};
use async_trait::async_trait;
use serde::Serialize;

use super::{LoanFilter, Result};

/// 貸出の集計（ステータス別件数と延滞料金の合計）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoanSummary {
    pub total: u64,
    pub active: u64,
    pub overdue: u64,
    pub returned: u64,
    pub lost: u64,
    pub total_fine_amount: Money,
    pub paid_fine_amount: Money,
    pub unpaid_fine_amount: Money,
}

/// 会員別の貸出集計
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberLoanStats {
    pub member_id: MemberId,
    #[serde(flatten)]
    pub summary: LoanSummary,
}

/// 月別の貸出集計
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyLoanStats {
    /// 1〜12
    pub month: u32,
    pub loans: u64,
    pub total_fine_amount: Money,
}

/// 貸出レポートポート
///
/// 保存済みの貸出レコードに対する読み取り専用の集計。
/// 状態は保存時点のもので、未保存の延滞遷移は反映されない。
#[async_trait]
pub trait LoanReports: Send + Sync {
    /// 条件に一致する貸出のステータス別件数と延滞料金合計
    async fn summary(&self, filter: &LoanFilter) -> Result<LoanSummary>;

    /// 会員別の集計（貸出件数の多い順）
    async fn by_member(&self, filter: &LoanFilter) -> Result<Vec<MemberLoanStats>>;

    /// 指定年の月別集計（貸出のあった月のみ、月の昇順）
    async fn monthly(&self, year: i32) -> Result<Vec<MonthlyLoanStats>>;
}

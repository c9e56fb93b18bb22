use serde::Deserialize;

use super::Money;

/// 延滞料金（1日あたり、単位）
pub const DAILY_FINE_UNITS: u32 = 1;

/// 紛失時の追加料金（単位）
pub const LOST_ITEM_PENALTY_UNITS: u32 = 50;

/// 延長時の既定日数
pub const DEFAULT_RENEWAL_DAYS: i64 = 14;

/// 1回の延長で指定できる最大日数
pub const MAX_RENEWAL_DAYS: i64 = 30;

/// 備考の最大文字数
pub const MAX_NOTES_LEN: usize = 500;

/// 紛失時の在庫数の扱い
///
/// 貸出時に既に在庫数を1減らしているため、紛失時にさらに減らすと
/// 貸出中の1冊が在庫から2回差し引かれることになる。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LostCopyPolicy {
    /// 紛失時にさらに在庫数を1減らす（0未満にはならない）
    #[default]
    RemoveFromPool,
    /// 在庫数は変更しない
    KeepCount,
}

impl LostCopyPolicy {
    pub fn removes_copy(&self) -> bool {
        matches!(self, LostCopyPolicy::RemoveFromPool)
    }
}

/// 貸出ポリシー
///
/// 料金と延長期間に関するビジネスルールのパラメータ。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoanPolicy {
    pub daily_fine: Money,
    pub lost_item_penalty: Money,
    pub default_renewal_days: i64,
    pub max_renewal_days: i64,
    pub lost_copy_policy: LostCopyPolicy,
}

impl Default for LoanPolicy {
    fn default() -> Self {
        Self {
            daily_fine: Money::from_units(DAILY_FINE_UNITS),
            lost_item_penalty: Money::from_units(LOST_ITEM_PENALTY_UNITS),
            default_renewal_days: DEFAULT_RENEWAL_DAYS,
            max_renewal_days: MAX_RENEWAL_DAYS,
            lost_copy_policy: LostCopyPolicy::default(),
        }
    }
}

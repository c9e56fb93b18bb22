use crate::domain::value_objects::BookId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::Result;

/// 書籍の状態（カタログ管理コンテキスト側の定義）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookStatus {
    Available,
    Borrowed,
    Reserved,
    Lost,
    Damaged,
    Maintenance,
}

impl BookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::Available => "available",
            BookStatus::Borrowed => "borrowed",
            BookStatus::Reserved => "reserved",
            BookStatus::Lost => "lost",
            BookStatus::Damaged => "damaged",
            BookStatus::Maintenance => "maintenance",
        }
    }
}

impl fmt::Display for BookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BookStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "available" => Ok(BookStatus::Available),
            "borrowed" => Ok(BookStatus::Borrowed),
            "reserved" => Ok(BookStatus::Reserved),
            "lost" => Ok(BookStatus::Lost),
            "damaged" => Ok(BookStatus::Damaged),
            "maintenance" => Ok(BookStatus::Maintenance),
            _ => Err(format!("Invalid book status: {}", s)),
        }
    }
}

/// 貸出に必要な書籍情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogItem {
    pub book_id: BookId,
    pub title: String,
    pub total_copies: u32,
    pub available_copies: u32,
    pub status: BookStatus,
}

impl CatalogItem {
    /// 書籍の状態が貸出を許すか（在庫数は別途確認する）
    pub fn is_lendable(&self) -> bool {
        matches!(self.status, BookStatus::Available | BookStatus::Borrowed)
    }
}

/// カタログサービスポート
///
/// 貸出コンテキストとカタログコンテキストの境界を維持する。
/// 在庫数の更新はすべてストア側のアトミックな操作で行い、
/// アプリケーション層で読み取り・変更・書き込みをしてはならない。
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// 書籍を取得する
    async fn find_book(&self, book_id: BookId) -> Result<Option<CatalogItem>>;

    /// 在庫数を1減らす
    ///
    /// 在庫が1以上の場合のみアトミックに減らし、残り在庫数を返す。
    /// 残りが0になった場合は状態を borrowed にする。
    /// 在庫がない（または書籍が存在しない）場合は `None`。
    async fn decrement_available(&self, book_id: BookId) -> Result<Option<u32>>;

    /// 在庫数を1増やす
    ///
    /// 状態が borrowed の場合は available に戻す。
    async fn increment_available(&self, book_id: BookId) -> Result<()>;

    /// 書籍を紛失状態にする
    ///
    /// `remove_copy` が真の場合は在庫数をさらに1減らす（0未満にはしない）。
    async fn mark_lost(&self, book_id: BookId, remove_copy: bool) -> Result<()>;
}

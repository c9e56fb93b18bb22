use crate::domain::{
    events::DomainEvent,
    loan::LoanRecord,
    value_objects::{BookId, LoanId, LoanStatus, MemberId},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use super::{BoxError, Result};

/// 保存時のエラー
#[derive(Debug, Error)]
pub enum SaveError {
    /// 読み込み後に別の更新が行われた
    #[error("Loan {loan_id} was modified concurrently (expected version {expected_version})")]
    VersionConflict {
        loan_id: LoanId,
        expected_version: u32,
    },

    /// 同じ会員・書籍の未返却の貸出が既に存在する
    #[error("Member {member_id} already has an open loan for book {book_id}")]
    DuplicateOpenLoan { member_id: MemberId, book_id: BookId },

    /// ストアのエラー
    #[error("Storage error")]
    Storage(#[source] BoxError),
}

/// 貸出の検索条件
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoanFilter {
    pub member_id: Option<MemberId>,
    pub book_id: Option<BookId>,
    pub status: Option<LoanStatus>,
    /// 貸出日時の下限（含む）
    pub loaned_from: Option<DateTime<Utc>>,
    /// 貸出日時の上限（含む）
    pub loaned_to: Option<DateTime<Utc>>,
    pub fine_paid: Option<bool>,
}

impl LoanFilter {
    pub fn for_member(member_id: MemberId) -> Self {
        Self {
            member_id: Some(member_id),
            ..Self::default()
        }
    }

    /// 条件に一致するか（インメモリ実装用）
    pub fn matches(&self, loan: &LoanRecord) -> bool {
        self.member_id.is_none_or(|id| loan.member_id == id)
            && self.book_id.is_none_or(|id| loan.book_id == id)
            && self.status.is_none_or(|status| loan.status == status)
            && self.loaned_from.is_none_or(|from| loan.loaned_at >= from)
            && self.loaned_to.is_none_or(|to| loan.loaned_at <= to)
            && self.fine_paid.is_none_or(|paid| loan.fine_paid == paid)
    }
}

/// ページ指定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub offset: u32,
    pub limit: u32,
}

/// 検索結果のページ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// ページングしない場合の総件数
    pub total: u64,
}

/// 貸出リポジトリポート
///
/// 貸出レコードの永続化と取得を抽象化する。
/// レコードの保存と同時にドメインイベントを監査ログとして追記する。
#[async_trait]
pub trait LoanRepository: Send + Sync {
    /// IDで貸出を取得する
    async fn load(&self, loan_id: LoanId) -> Result<Option<LoanRecord>>;

    /// 貸出を保存する
    ///
    /// `loan.version` が0なら新規作成、それ以外は保存済みのバージョンと
    /// 一致する場合のみ更新する（楽観的排他制御）。
    /// レコードとイベントは1つのトランザクションで書き込まれる。
    ///
    /// # 戻り値
    /// 保存後の新しいバージョン
    async fn save(
        &self,
        loan: &LoanRecord,
        events: &[DomainEvent],
    ) -> std::result::Result<u32, SaveError>;

    /// 会員・書籍の組で未返却（貸出中・延滞中）の貸出を取得する
    ///
    /// 同じ書籍の重複貸出を防ぐために使用される。
    async fn find_open_loan(
        &self,
        member_id: MemberId,
        book_id: BookId,
    ) -> Result<Option<LoanRecord>>;

    /// 会員が延滞中の貸出を持っているか確認する
    ///
    /// 延滞状態が保存済みのものに加え、`now` 時点で返却期限を過ぎた
    /// 貸出中のものも延滞とみなす。
    async fn has_overdue_loans(&self, member_id: MemberId, now: DateTime<Utc>) -> Result<bool>;

    /// 条件で貸出を検索する（貸出日時の新しい順）
    async fn find(
        &self,
        filter: &LoanFilter,
        pagination: Option<Pagination>,
    ) -> Result<Page<LoanRecord>>;

    /// 延滞候補の貸出を検索する
    ///
    /// due_date < cutoff かつ status が active の貸出を返却期限順に返す。
    async fn find_overdue_candidates(&self, cutoff: DateTime<Utc>) -> Result<Vec<LoanRecord>>;

    /// 貸出の監査ログ（イベント）を追記順に取得する
    async fn load_events(&self, loan_id: LoanId) -> Result<Vec<DomainEvent>>;
}

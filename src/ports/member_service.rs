use crate::domain::value_objects::MemberId;
use async_trait::async_trait;

use super::Result;

/// 会員サービスポート
///
/// 貸出コンテキストと会員コンテキストの境界を維持する。
/// 貸出コンテキストはMemberIDのみを知り、会員詳細は知らない。
#[async_trait]
pub trait MemberService: Send + Sync {
    /// 会員が存在するか確認する
    ///
    /// 貸出作成前の会員バリデーションに使用される。
    async fn exists(&self, member_id: MemberId) -> Result<bool>;

    /// 会員のアカウントが有効か確認する
    ///
    /// ビジネスルール: 無効な会員には貸出不可。
    async fn is_active(&self, member_id: MemberId) -> Result<bool>;
}

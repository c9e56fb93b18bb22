use crate::domain::value_objects::MemberId;
use crate::ports::{MemberService as MemberServiceTrait, Result};
use async_trait::async_trait;
use sqlx::PgPool;

/// PostgreSQL implementation of MemberService
///
/// Reads the `members` table maintained by the member directory.
pub struct MemberService {
    pool: PgPool,
}

impl MemberService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MemberServiceTrait for MemberService {
    async fn exists(&self, member_id: MemberId) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM members WHERE member_id = $1)")
                .bind(member_id.value())
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    async fn is_active(&self, member_id: MemberId) -> Result<bool> {
        let is_active: Option<bool> =
            sqlx::query_scalar("SELECT is_active FROM members WHERE member_id = $1")
                .bind(member_id.value())
                .fetch_optional(&self.pool)
                .await?;

        Ok(is_active.unwrap_or(false))
    }
}

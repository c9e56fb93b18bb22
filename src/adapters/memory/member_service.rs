use crate::domain::value_objects::MemberId;
use crate::ports::{MemberService, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory implementation of MemberService
///
/// Stores member IDs with their active flag.
#[derive(Default)]
pub struct InMemoryMemberService {
    members: RwLock<HashMap<MemberId, bool>>,
}

impl InMemoryMemberService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an active member
    pub async fn add_member(&self, member_id: MemberId) {
        self.members.write().await.insert(member_id, true);
    }

    /// Deactivate a registered member
    pub async fn deactivate(&self, member_id: MemberId) {
        if let Some(active) = self.members.write().await.get_mut(&member_id) {
            *active = false;
        }
    }
}

#[async_trait]
impl MemberService for InMemoryMemberService {
    async fn exists(&self, member_id: MemberId) -> Result<bool> {
        Ok(self.members.read().await.contains_key(&member_id))
    }

    async fn is_active(&self, member_id: MemberId) -> Result<bool> {
        Ok(self
            .members
            .read()
            .await
            .get(&member_id)
            .copied()
            .unwrap_or(false))
    }
}

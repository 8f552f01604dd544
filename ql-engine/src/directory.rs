//! User directory seam
//!
//! Read-only lookup of profile data owned by an external system. The engine
//! uses it to enumerate users and circles for batch jobs and to exclude
//! professional-role members from circle point rewards.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use ql_core::types::{CircleId, Metadata, UserId};

use crate::error::EngineResult;

/// Role of a directory member
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UserRole {
    Member,
    /// Coaches / dietitians; excluded from circle reward fan-out
    Professional,
}

/// Directory profile
#[derive(Clone, Debug)]
pub struct UserProfile {
    pub user_id: UserId,
    pub display_name: String,
    pub role: UserRole,
    pub attributes: Metadata,
}

impl UserProfile {
    pub fn member(user_id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
            role: UserRole::Member,
            attributes: Metadata::new(),
        }
    }

    pub fn professional(user_id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
            role: UserRole::Professional,
            attributes: Metadata::new(),
        }
    }
}

/// Read-only user directory
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn list_users(&self) -> EngineResult<Vec<UserId>>;

    async fn profile(&self, user_id: &UserId) -> EngineResult<Option<UserProfile>>;

    async fn list_circles(&self) -> EngineResult<Vec<CircleId>>;

    async fn circle_members(&self, circle_id: &CircleId) -> EngineResult<Vec<UserId>>;

    async fn circles_of(&self, user_id: &UserId) -> EngineResult<Vec<CircleId>>;
}

/// In-process directory backed by maps; used by tests and single-node setups
#[derive(Default)]
pub struct StaticDirectory {
    profiles: RwLock<HashMap<UserId, UserProfile>>,
    circles: RwLock<HashMap<CircleId, Vec<UserId>>>,
}

impl StaticDirectory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn add_profile(&self, profile: UserProfile) {
        self.profiles
            .write()
            .await
            .insert(profile.user_id.clone(), profile);
    }

    pub async fn add_circle(&self, circle_id: CircleId, members: Vec<UserId>) {
        self.circles.write().await.insert(circle_id, members);
    }
}

#[async_trait]
impl UserDirectory for StaticDirectory {
    async fn list_users(&self) -> EngineResult<Vec<UserId>> {
        let mut users: Vec<UserId> = self.profiles.read().await.keys().cloned().collect();
        users.sort();
        Ok(users)
    }

    async fn profile(&self, user_id: &UserId) -> EngineResult<Option<UserProfile>> {
        Ok(self.profiles.read().await.get(user_id).cloned())
    }

    async fn list_circles(&self) -> EngineResult<Vec<CircleId>> {
        let mut circles: Vec<CircleId> = self.circles.read().await.keys().cloned().collect();
        circles.sort();
        Ok(circles)
    }

    async fn circle_members(&self, circle_id: &CircleId) -> EngineResult<Vec<UserId>> {
        Ok(self
            .circles
            .read()
            .await
            .get(circle_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn circles_of(&self, user_id: &UserId) -> EngineResult<Vec<CircleId>> {
        Ok(self
            .circles
            .read()
            .await
            .iter()
            .filter(|(_, members)| members.contains(user_id))
            .map(|(id, _)| id.clone())
            .collect())
    }
}

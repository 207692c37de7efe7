//! # cs-directory-simple
//!
//! In-memory implementation of `UserDirectory`, standing in for the external
//! identity/profile system. The scheduling core only ever reads profiles
//! here (and writes the one field a counselor controls, capacity), so a
//! concurrent map is all the state this adapter needs. Capacity is looked
//! up live on every check; nothing in the scheduling path caches it.

use async_trait::async_trait;
use cs_core::error::{AppError, Result};
use cs_core::models::{UserProfile, UserRole};
use cs_core::traits::UserDirectory;
use dashmap::DashMap;
use uuid::Uuid;

#[derive(Default)]
pub struct SimpleUserDirectory {
    users: DashMap<Uuid, UserProfile>,
}

impl SimpleUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserDirectory for SimpleUserDirectory {
    async fn get_user(&self, id: Uuid) -> Result<UserProfile> {
        self.users
            .get(&id)
            .map(|entry| entry.clone())
            .ok_or_else(|| AppError::NotFound("user".into(), id.to_string()))
    }

    async fn update_counselor_capacity(&self, id: Uuid, capacity: u32) -> Result<UserProfile> {
        if capacity == 0 {
            return Err(AppError::InvalidInput(
                "capacity must be a positive integer".into(),
            ));
        }
        let mut entry = self
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("user".into(), id.to_string()))?;
        if entry.role != UserRole::Counselor {
            return Err(AppError::NotOwner(format!("user {id} is not a counselor")));
        }
        entry.capacity = Some(capacity);
        Ok(entry.clone())
    }

    async fn upsert_user(&self, profile: UserProfile) -> Result<()> {
        self.users.insert(profile.id, profile);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counselor(id: Uuid) -> UserProfile {
        UserProfile {
            id,
            role: UserRole::Counselor,
            name: "Dana".to_string(),
            email: "dana@example.edu".to_string(),
            capacity: None,
            verified: true,
        }
    }

    #[tokio::test]
    async fn test_get_and_update_capacity() {
        let dir = SimpleUserDirectory::new();
        let id = Uuid::now_v7();
        dir.upsert_user(counselor(id)).await.unwrap();

        assert!(dir.get_user(id).await.unwrap().capacity.is_none());
        let updated = dir.update_counselor_capacity(id, 3).await.unwrap();
        assert_eq!(updated.capacity, Some(3));
        assert_eq!(dir.get_user(id).await.unwrap().effective_capacity(), 3);
    }

    #[tokio::test]
    async fn test_rejects_bad_updates() {
        let dir = SimpleUserDirectory::new();
        let id = Uuid::now_v7();
        dir.upsert_user(counselor(id)).await.unwrap();

        assert!(matches!(
            dir.update_counselor_capacity(id, 0).await,
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            dir.update_counselor_capacity(Uuid::now_v7(), 2).await,
            Err(AppError::NotFound(_, _))
        ));

        let student_id = Uuid::now_v7();
        dir.upsert_user(UserProfile {
            id: student_id,
            role: UserRole::Student,
            name: "Ari".to_string(),
            email: "ari@example.edu".to_string(),
            capacity: None,
            verified: true,
        })
        .await
        .unwrap();
        assert!(matches!(
            dir.update_counselor_capacity(student_id, 2).await,
            Err(AppError::NotOwner(_))
        ));
    }
}

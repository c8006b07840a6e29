//! In-memory implementations of the external collaborator seams.
//!
//! These back the server binary and the integration tests. Production
//! deployments replace them with clients for the real verification,
//! profile and persistence services.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{
    DurableStore, HighlightRecord, UserDirectory, UserId, UserProfile, VerificationService,
};

/// Verification service backed by a set of verified user ids.
#[derive(Default)]
pub struct InMemoryVerificationService {
    verified: Mutex<HashSet<UserId>>,
    approve_all: bool,
}

impl InMemoryVerificationService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Service that reports every user as verified, for local development.
    pub fn approving_everyone() -> Self {
        Self {
            verified: Mutex::new(HashSet::new()),
            approve_all: true,
        }
    }

    pub async fn mark_verified(&self, user_id: UserId) {
        self.verified.lock().await.insert(user_id);
    }
}

#[async_trait]
impl VerificationService for InMemoryVerificationService {
    async fn verification_status(&self, user_id: &UserId) -> Result<bool, String> {
        if self.approve_all {
            return Ok(true);
        }
        Ok(self.verified.lock().await.contains(user_id))
    }
}

/// Profile store backed by a map; unknown ids resolve to `None`.
#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: Mutex<HashMap<UserId, UserProfile>>,
    /// When set, unknown users are materialized on first lookup. Useful
    /// for local runs without a seeded directory.
    auto_register: bool,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory that accepts any user id, for local development.
    pub fn accepting_anyone() -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
            auto_register: true,
        }
    }

    pub async fn add_user(&self, profile: UserProfile) {
        self.users.lock().await.insert(profile.id.clone(), profile);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn get_user(&self, user_id: &UserId) -> Result<Option<UserProfile>, String> {
        let mut users = self.users.lock().await;
        if let Some(profile) = users.get(user_id) {
            return Ok(Some(profile.clone()));
        }
        if self.auto_register {
            let profile = UserProfile {
                id: user_id.clone(),
                display_name: user_id.as_str().to_string(),
                role: "user".to_string(),
            };
            users.insert(user_id.clone(), profile.clone());
            return Ok(Some(profile));
        }
        Ok(None)
    }
}

/// Durable-fact sink that records writes in memory.
#[derive(Default)]
pub struct InMemoryDurableStore {
    highlights: Mutex<Vec<HighlightRecord>>,
    settings: Mutex<HashMap<String, serde_json::Value>>,
}

impl InMemoryDurableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn highlights(&self) -> Vec<HighlightRecord> {
        self.highlights.lock().await.clone()
    }

    pub async fn settings_for(&self, stream_id: &str) -> Option<serde_json::Value> {
        self.settings.lock().await.get(stream_id).cloned()
    }
}

#[async_trait]
impl DurableStore for InMemoryDurableStore {
    async fn create_highlight(&self, highlight: HighlightRecord) -> Result<(), String> {
        self.highlights.lock().await.push(highlight);
        Ok(())
    }

    async fn update_stream_settings(
        &self,
        stream_id: &str,
        settings: serde_json::Value,
    ) -> Result<(), String> {
        self.settings
            .lock()
            .await
            .insert(stream_id.to_string(), settings);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str) -> UserId {
        UserId::new(name.to_string()).unwrap()
    }

    #[tokio::test]
    async fn test_verification_defaults_to_unverified() {
        // given:
        let service = InMemoryVerificationService::new();

        // when / then:
        assert_eq!(service.verification_status(&user("x")).await, Ok(false));

        // when: marked verified
        service.mark_verified(user("x")).await;
        assert_eq!(service.verification_status(&user("x")).await, Ok(true));
    }

    #[tokio::test]
    async fn test_directory_returns_none_for_unknown_user() {
        // given:
        let directory = InMemoryUserDirectory::new();

        // when / then:
        assert_eq!(directory.get_user(&user("ghost")).await, Ok(None));
    }

    #[tokio::test]
    async fn test_accepting_directory_materializes_profiles() {
        // given:
        let directory = InMemoryUserDirectory::accepting_anyone();

        // when:
        let profile = directory.get_user(&user("new")).await.unwrap().unwrap();

        // then:
        assert_eq!(profile.display_name, "new");
    }

    #[tokio::test]
    async fn test_durable_store_records_highlights_and_settings() {
        // given:
        let store = InMemoryDurableStore::new();

        // when:
        store
            .create_highlight(HighlightRecord {
                stream_id: "s1".to_string(),
                start_time: 10,
                end_time: 20,
                kind: "clip".to_string(),
                score: 0.9,
            })
            .await
            .unwrap();
        store
            .update_stream_settings("s1", serde_json::json!({"quality": "720p"}))
            .await
            .unwrap();

        // then:
        assert_eq!(store.highlights().await.len(), 1);
        assert_eq!(
            store.settings_for("s1").await,
            Some(serde_json::json!({"quality": "720p"}))
        );
    }
}

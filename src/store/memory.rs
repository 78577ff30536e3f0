//! In-memory `Database` backend.
//!
//! Backs tests and local experiments where a file database is overkill.
//! Semantics mirror the libSQL backend, including the completion
//! compare-and-set.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::automation::AutomationConfig;
use crate::deploy::record::{DeploymentRecord, DeploymentStatus};
use crate::error::DatabaseError;
use crate::store::traits::{Database, OauthStatus, UserRecord};

#[derive(Default)]
struct Inner {
    users: HashMap<String, UserRecord>,
    configs: HashMap<String, AutomationConfig>,
    deployments: HashMap<String, DeploymentRecord>,
}

/// HashMap-backed database.
#[derive(Default)]
pub struct MemoryBackend {
    inner: RwLock<Inner>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Database for MemoryBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn upsert_deployment(&self, record: &DeploymentRecord) -> Result<(), DatabaseError> {
        self.inner
            .write()
            .await
            .deployments
            .insert(record.user_id.clone(), record.clone());
        Ok(())
    }

    async fn get_deployment(
        &self,
        user_id: &str,
    ) -> Result<Option<DeploymentRecord>, DatabaseError> {
        Ok(self.inner.read().await.deployments.get(user_id).cloned())
    }

    async fn update_deployment_status(
        &self,
        user_id: &str,
        status: DeploymentStatus,
        last_error: Option<&str>,
    ) -> Result<(), DatabaseError> {
        let mut inner = self.inner.write().await;
        if let Some(record) = inner.deployments.get_mut(user_id) {
            record.status = status;
            record.last_error = last_error.map(String::from);
            record.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete_deployment(&self, user_id: &str) -> Result<(), DatabaseError> {
        self.inner.write().await.deployments.remove(user_id);
        Ok(())
    }

    async fn list_deployment_user_ids(&self) -> Result<Vec<String>, DatabaseError> {
        let mut ids: Vec<String> = self
            .inner
            .read()
            .await
            .deployments
            .keys()
            .cloned()
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>, DatabaseError> {
        Ok(self.inner.read().await.users.get(user_id).cloned())
    }

    async fn upsert_user(&self, user: &UserRecord) -> Result<(), DatabaseError> {
        self.inner
            .write()
            .await
            .users
            .insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn set_oauth_status(
        &self,
        user_id: &str,
        status: OauthStatus,
    ) -> Result<(), DatabaseError> {
        let mut inner = self.inner.write().await;
        match inner.users.get_mut(user_id) {
            Some(user) => {
                user.oauth_status = status;
                Ok(())
            }
            None => Err(DatabaseError::NotFound {
                entity: "user".into(),
                id: user_id.into(),
            }),
        }
    }

    async fn try_complete_onboarding(
        &self,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, DatabaseError> {
        let mut inner = self.inner.write().await;
        match inner.users.get_mut(user_id) {
            Some(user) if !user.onboarding_completed => {
                user.onboarding_completed = true;
                user.onboarding_completed_at = Some(at);
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(DatabaseError::NotFound {
                entity: "user".into(),
                id: user_id.into(),
            }),
        }
    }

    async fn get_automation_config(
        &self,
        user_id: &str,
    ) -> Result<Option<AutomationConfig>, DatabaseError> {
        Ok(self.inner.read().await.configs.get(user_id).cloned())
    }

    async fn save_automation_config(
        &self,
        user_id: &str,
        config: &AutomationConfig,
    ) -> Result<(), DatabaseError> {
        self.inner
            .write()
            .await
            .configs
            .insert(user_id.into(), config.clone());
        Ok(())
    }
}

//! libSQL backend — async `Database` trait implementation.
//!
//! Supports local file and in-memory databases. Timestamps are stored as
//! RFC 3339 strings; JSON columns hold serde-serialized snapshots.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::automation::AutomationConfig;
use crate::deploy::record::{DeploymentRecord, DeploymentStatus};
use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::{Database, OauthStatus, UserRecord};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Connection(format!("Failed to open database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Connection(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn status_to_str(status: DeploymentStatus) -> &'static str {
    match status {
        DeploymentStatus::Deploying => "deploying",
        DeploymentStatus::Testing => "testing",
        DeploymentStatus::Active => "active",
        DeploymentStatus::Inactive => "inactive",
        DeploymentStatus::Failed => "failed",
        DeploymentStatus::NeedsReauth => "needs_reauth",
    }
}

fn str_to_status(s: &str) -> DeploymentStatus {
    match s {
        "deploying" => DeploymentStatus::Deploying,
        "testing" => DeploymentStatus::Testing,
        "active" => DeploymentStatus::Active,
        "inactive" => DeploymentStatus::Inactive,
        "needs_reauth" => DeploymentStatus::NeedsReauth,
        _ => DeploymentStatus::Failed,
    }
}

/// Convert `Option<&str>` to a libsql Value (NULL when absent).
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

fn opt_text_owned(s: Option<String>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s),
        None => libsql::Value::Null,
    }
}

fn oauth_to_str(status: OauthStatus) -> &'static str {
    match status {
        OauthStatus::Valid => "valid",
        OauthStatus::Expired => "expired",
        OauthStatus::Disconnected => "disconnected",
    }
}

fn str_to_oauth(s: &str) -> OauthStatus {
    match s {
        "valid" => OauthStatus::Valid,
        "expired" => OauthStatus::Expired,
        _ => OauthStatus::Disconnected,
    }
}

const DEPLOYMENT_COLUMNS: &str =
    "user_id, workflow_id, name, status, config_snapshot, last_error, deployed_at, updated_at";

fn row_to_deployment(row: &libsql::Row) -> Result<DeploymentRecord, DatabaseError> {
    let snapshot_json: String = row
        .get(4)
        .map_err(|e| DatabaseError::Query(format!("config_snapshot column: {e}")))?;
    let config_snapshot: AutomationConfig = serde_json::from_str(&snapshot_json)
        .map_err(|e| DatabaseError::Serialization(format!("config snapshot: {e}")))?;

    let status_str: String = row
        .get(3)
        .map_err(|e| DatabaseError::Query(format!("status column: {e}")))?;
    let deployed_str: String = row
        .get(6)
        .map_err(|e| DatabaseError::Query(format!("deployed_at column: {e}")))?;
    let updated_str: String = row
        .get(7)
        .map_err(|e| DatabaseError::Query(format!("updated_at column: {e}")))?;

    Ok(DeploymentRecord {
        user_id: row
            .get(0)
            .map_err(|e| DatabaseError::Query(format!("user_id column: {e}")))?,
        workflow_id: row
            .get(1)
            .map_err(|e| DatabaseError::Query(format!("workflow_id column: {e}")))?,
        name: row
            .get(2)
            .map_err(|e| DatabaseError::Query(format!("name column: {e}")))?,
        status: str_to_status(&status_str),
        config_snapshot,
        last_error: row.get::<String>(5).ok(),
        deployed_at: parse_datetime(&deployed_str),
        updated_at: parse_datetime(&updated_str),
    })
}

const USER_COLUMNS: &str = "id, email, email_verified, business_type, oauth_status, \
     onboarding_completed, onboarding_completed_at";

fn row_to_user(row: &libsql::Row) -> Result<UserRecord, DatabaseError> {
    let oauth_str: String = row
        .get(4)
        .map_err(|e| DatabaseError::Query(format!("oauth_status column: {e}")))?;
    let completed_at: Option<String> = row.get::<String>(6).ok();

    Ok(UserRecord {
        id: row
            .get(0)
            .map_err(|e| DatabaseError::Query(format!("id column: {e}")))?,
        email: row
            .get(1)
            .map_err(|e| DatabaseError::Query(format!("email column: {e}")))?,
        email_verified: row.get::<i64>(2).unwrap_or(0) != 0,
        business_type: row.get::<String>(3).ok(),
        oauth_status: str_to_oauth(&oauth_str),
        onboarding_completed: row.get::<i64>(5).unwrap_or(0) != 0,
        onboarding_completed_at: completed_at.as_deref().map(parse_datetime),
    })
}

// ── Database trait ──────────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    async fn upsert_deployment(&self, record: &DeploymentRecord) -> Result<(), DatabaseError> {
        let snapshot = serde_json::to_string(&record.config_snapshot)
            .map_err(|e| DatabaseError::Serialization(format!("config snapshot: {e}")))?;

        self.conn()
            .execute(
                "INSERT INTO deployments (user_id, workflow_id, name, status, config_snapshot, \
                 last_error, deployed_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
                 ON CONFLICT(user_id) DO UPDATE SET \
                 workflow_id = excluded.workflow_id, name = excluded.name, \
                 status = excluded.status, config_snapshot = excluded.config_snapshot, \
                 last_error = excluded.last_error, deployed_at = excluded.deployed_at, \
                 updated_at = excluded.updated_at",
                params![
                    record.user_id.clone(),
                    record.workflow_id.clone(),
                    record.name.clone(),
                    status_to_str(record.status),
                    snapshot,
                    opt_text(record.last_error.as_deref()),
                    record.deployed_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("upsert_deployment: {e}")))?;

        debug!(user_id = %record.user_id, status = %record.status, "Deployment upserted");
        Ok(())
    }

    async fn get_deployment(
        &self,
        user_id: &str,
    ) -> Result<Option<DeploymentRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {DEPLOYMENT_COLUMNS} FROM deployments WHERE user_id = ?1"),
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_deployment: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_deployment(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_deployment: {e}"))),
        }
    }

    async fn update_deployment_status(
        &self,
        user_id: &str,
        status: DeploymentStatus,
        last_error: Option<&str>,
    ) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "UPDATE deployments SET status = ?1, last_error = ?2, updated_at = ?3 \
                 WHERE user_id = ?4",
                params![
                    status_to_str(status),
                    opt_text(last_error),
                    Utc::now().to_rfc3339(),
                    user_id
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_deployment_status: {e}")))?;
        Ok(())
    }

    async fn delete_deployment(&self, user_id: &str) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "DELETE FROM deployments WHERE user_id = ?1",
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_deployment: {e}")))?;
        Ok(())
    }

    async fn list_deployment_user_ids(&self) -> Result<Vec<String>, DatabaseError> {
        let mut rows = self
            .conn()
            .query("SELECT user_id FROM deployments ORDER BY user_id", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("list_deployment_user_ids: {e}")))?;

        let mut ids = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            ids.push(
                row.get(0)
                    .map_err(|e| DatabaseError::Query(format!("user_id column: {e}")))?,
            );
        }
        Ok(ids)
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_user: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_user(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_user: {e}"))),
        }
    }

    async fn upsert_user(&self, user: &UserRecord) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "INSERT INTO users (id, email, email_verified, business_type, oauth_status, \
                 onboarding_completed, onboarding_completed_at, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8) \
                 ON CONFLICT(id) DO UPDATE SET \
                 email = excluded.email, email_verified = excluded.email_verified, \
                 business_type = excluded.business_type, oauth_status = excluded.oauth_status, \
                 onboarding_completed = excluded.onboarding_completed, \
                 onboarding_completed_at = excluded.onboarding_completed_at, \
                 updated_at = excluded.updated_at",
                params![
                    user.id.clone(),
                    user.email.clone(),
                    user.email_verified as i64,
                    opt_text(user.business_type.as_deref()),
                    oauth_to_str(user.oauth_status),
                    user.onboarding_completed as i64,
                    opt_text_owned(user.onboarding_completed_at.map(|t| t.to_rfc3339())),
                    now,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("upsert_user: {e}")))?;
        Ok(())
    }

    async fn set_oauth_status(
        &self,
        user_id: &str,
        status: OauthStatus,
    ) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "UPDATE users SET oauth_status = ?1, updated_at = ?2 WHERE id = ?3",
                params![oauth_to_str(status), Utc::now().to_rfc3339(), user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("set_oauth_status: {e}")))?;
        Ok(())
    }

    async fn try_complete_onboarding(
        &self,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, DatabaseError> {
        let changed = self
            .conn()
            .execute(
                "UPDATE users SET onboarding_completed = 1, onboarding_completed_at = ?1, \
                 updated_at = ?1 WHERE id = ?2 AND onboarding_completed = 0",
                params![at.to_rfc3339(), user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("try_complete_onboarding: {e}")))?;
        Ok(changed > 0)
    }

    async fn get_automation_config(
        &self,
        user_id: &str,
    ) -> Result<Option<AutomationConfig>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT config FROM automation_configs WHERE user_id = ?1",
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_automation_config: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let raw: String = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("config column: {e}")))?;
                let config = serde_json::from_str(&raw)
                    .map_err(|e| DatabaseError::Serialization(format!("config: {e}")))?;
                Ok(Some(config))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_automation_config: {e}"))),
        }
    }

    async fn save_automation_config(
        &self,
        user_id: &str,
        config: &AutomationConfig,
    ) -> Result<(), DatabaseError> {
        let raw = serde_json::to_string(config)
            .map_err(|e| DatabaseError::Serialization(format!("config: {e}")))?;

        self.conn()
            .execute(
                "INSERT INTO automation_configs (user_id, config, updated_at) \
                 VALUES (?1, ?2, ?3) \
                 ON CONFLICT(user_id) DO UPDATE SET \
                 config = excluded.config, updated_at = excluded.updated_at",
                params![user_id, raw, Utc::now().to_rfc3339()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("save_automation_config: {e}")))?;
        Ok(())
    }
}

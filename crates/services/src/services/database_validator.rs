//! Startup check that the schema the server expects is in place.

use db::MIGRATOR;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};

/// Every table the CRM routes read or write.
pub const REQUIRED_TABLES: &[&str] = &[
    "teams",
    "users",
    "companies",
    "customers",
    "deals",
    "tasks",
    "call_notes",
    "activities",
    "team_insights",
];

#[derive(Debug, Error)]
pub enum DatabaseValidationError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("database not initialized")]
    NotInitialized,
    #[error("schema incomplete: {0}")]
    Incomplete(String),
}

pub struct DatabaseValidator {
    pool: SqlitePool,
}

impl DatabaseValidator {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inspect the migrations table and the CRM tables.
    pub async fn validate(&self) -> Result<ValidationResult, DatabaseValidationError> {
        if !self.table_exists("_sqlx_migrations").await? {
            warn!("_sqlx_migrations table does not exist");
            return Ok(ValidationResult {
                is_initialized: false,
                migrations_applied: 0,
                pending_migrations: MIGRATOR.iter().map(|m| m.description.to_string()).collect(),
                missing_tables: REQUIRED_TABLES.iter().map(|t| t.to_string()).collect(),
            });
        }

        let applied: Vec<i64> =
            sqlx::query_scalar("SELECT version FROM _sqlx_migrations WHERE success = 1")
                .fetch_all(&self.pool)
                .await?;
        let pending_migrations = MIGRATOR
            .iter()
            .filter(|m| !applied.contains(&m.version))
            .map(|m| m.description.to_string())
            .collect();
        let missing_tables = self.missing_tables(REQUIRED_TABLES).await?;

        let result = ValidationResult {
            is_initialized: true,
            migrations_applied: applied.len(),
            pending_migrations,
            missing_tables,
        };
        if result.is_ok() {
            info!(migrations_applied = result.migrations_applied, "database schema ok");
        } else {
            warn!(summary = %result.summary(), "database schema problems");
        }
        Ok(result)
    }

    /// Like `validate`, but any problem is an error.
    pub async fn ensure_ready(&self) -> Result<ValidationResult, DatabaseValidationError> {
        let result = self.validate().await?;
        if !result.is_initialized {
            return Err(DatabaseValidationError::NotInitialized);
        }
        if !result.is_ok() {
            return Err(DatabaseValidationError::Incomplete(result.summary()));
        }
        Ok(result)
    }

    pub async fn missing_tables(&self, required: &[&str]) -> Result<Vec<String>, DatabaseValidationError> {
        let mut missing = Vec::new();
        for table in required {
            if !self.table_exists(table).await? {
                missing.push(table.to_string());
            }
        }
        Ok(missing)
    }

    pub async fn latest_migration(&self) -> Result<Option<String>, DatabaseValidationError> {
        let description = sqlx::query_scalar::<_, String>(
            "SELECT description FROM _sqlx_migrations WHERE success = 1 ORDER BY version DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(description)
    }

    async fn table_exists(&self, name: &str) -> Result<bool, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = $1",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }
}

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_initialized: bool,
    pub migrations_applied: usize,
    pub pending_migrations: Vec<String>,
    pub missing_tables: Vec<String>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.is_initialized && self.pending_migrations.is_empty() && self.missing_tables.is_empty()
    }

    pub fn summary(&self) -> String {
        if !self.is_initialized {
            return "database not initialized, migrations need to be run".to_string();
        }
        let mut problems = Vec::new();
        if !self.pending_migrations.is_empty() {
            problems.push(format!("pending migrations: {}", self.pending_migrations.join(", ")));
        }
        if !self.missing_tables.is_empty() {
            problems.push(format!("missing tables: {}", self.missing_tables.join(", ")));
        }
        if problems.is_empty() {
            format!("{} migrations applied", self.migrations_applied)
        } else {
            problems.join("; ")
        }
    }
}

#[cfg(test)]
mod tests {
    use db::DBService;
    use sqlx::sqlite::SqlitePoolOptions;

    use super::*;

    #[tokio::test]
    async fn migrated_database_is_ready() {
        let db = DBService::new_in_memory().await.unwrap();
        let validator = DatabaseValidator::new(db.pool.clone());
        let result = validator.ensure_ready().await.unwrap();
        assert_eq!(result.migrations_applied, MIGRATOR.iter().count());
        assert!(result.missing_tables.is_empty());
        assert!(validator.latest_migration().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn empty_database_is_not_initialized() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let validator = DatabaseValidator::new(pool);

        let result = validator.validate().await.unwrap();
        assert!(!result.is_initialized);
        assert_eq!(result.missing_tables.len(), REQUIRED_TABLES.len());
        assert!(matches!(
            validator.ensure_ready().await,
            Err(DatabaseValidationError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn dropped_table_is_reported() {
        let db = DBService::new_in_memory().await.unwrap();
        sqlx::query("DROP TABLE team_insights").execute(&db.pool).await.unwrap();

        let validator = DatabaseValidator::new(db.pool.clone());
        let result = validator.validate().await.unwrap();
        assert_eq!(result.missing_tables, vec!["team_insights".to_string()]);
        assert!(result.summary().contains("team_insights"));
        assert!(matches!(
            validator.ensure_ready().await,
            Err(DatabaseValidationError::Incomplete(_))
        ));
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UserRole {
    Admin,
    SalesLead,
    #[default]
    SalesAgent,
}

impl UserRole {
    /// Admins and sales leads see beyond their own records.
    pub fn is_manager(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::SalesLead)
    }
}

#[derive(Debug, Clone, FromRow, Serialize, TS)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub team_id: Option<Uuid>,
    #[serde(skip_serializing)]
    #[ts(skip)]
    pub password_hash: String,
    pub weekly_capacity_hours: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateUser {
    pub email: String,
    pub name: String,
    pub password: String,
    pub role: Option<UserRole>,
    pub team_id: Option<Uuid>,
    pub weekly_capacity_hours: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateUser {
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Option<UserRole>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[ts(optional, as = "Option<Uuid>")]
    pub team_id: Option<Option<Uuid>>,
    pub weekly_capacity_hours: Option<f64>,
    pub is_active: Option<bool>,
    pub password: Option<String>,
}

impl UpdateUser {
    /// Merge the patch into `user`. The password is handled by the caller.
    pub fn apply(&self, mut user: User) -> User {
        if let Some(email) = &self.email {
            user.email = email.trim().to_lowercase();
        }
        if let Some(name) = &self.name {
            user.name = name.trim().to_string();
        }
        if let Some(role) = self.role {
            user.role = role;
        }
        if let Some(team_id) = self.team_id {
            user.team_id = team_id;
        }
        if let Some(hours) = self.weekly_capacity_hours {
            user.weekly_capacity_hours = hours;
        }
        if let Some(is_active) = self.is_active {
            user.is_active = is_active;
        }
        user
    }
}

impl User {
    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_email(
        pool: &SqlitePool,
        email: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email.trim().to_lowercase())
            .fetch_optional(pool)
            .await
    }

    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY name ASC")
            .fetch_all(pool)
            .await
    }

    pub async fn find_by_team(pool: &SqlitePool, team_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE team_id = $1 ORDER BY name ASC")
            .bind(team_id)
            .fetch_all(pool)
            .await
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await
    }

    pub async fn create(
        pool: &SqlitePool,
        data: &CreateUser,
        user_id: Uuid,
        password_hash: &str,
        default_capacity_hours: f64,
    ) -> Result<Self, sqlx::Error> {
        let now = Utc::now();
        sqlx::query_as::<_, User>(
            r#"INSERT INTO users (id, email, name, role, team_id, password_hash, weekly_capacity_hours, is_active, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, 1, $8, $8)
               RETURNING *"#,
        )
        .bind(user_id)
        .bind(data.email.trim().to_lowercase())
        .bind(data.name.trim())
        .bind(data.role.unwrap_or_default())
        .bind(data.team_id)
        .bind(password_hash)
        .bind(data.weekly_capacity_hours.unwrap_or(default_capacity_hours))
        .bind(now)
        .fetch_one(pool)
        .await
    }

    pub async fn update<'e, E>(executor: E, user: &User) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, User>(
            r#"UPDATE users
               SET email = $2, name = $3, role = $4, team_id = $5, weekly_capacity_hours = $6, is_active = $7, updated_at = $8
               WHERE id = $1
               RETURNING *"#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(user.role)
        .bind(user.team_id)
        .bind(user.weekly_capacity_hours)
        .bind(user.is_active)
        .bind(Utc::now())
        .fetch_one(executor)
        .await
    }

    pub async fn update_password<'e, E>(
        executor: E,
        id: Uuid,
        password_hash: &str,
    ) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .bind(Utc::now())
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Users own CRM records, so they are deactivated rather than deleted.
    pub async fn deactivate(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET is_active = 0, updated_at = $2 WHERE id = $1")
            .bind(id)
            .bind(Utc::now())
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support;

    #[tokio::test]
    async fn email_lookup_is_case_insensitive() {
        let db = test_support::db().await;
        let created = test_support::user(&db, "Ada@Example.com", UserRole::SalesAgent).await;
        assert_eq!(created.email, "ada@example.com");

        let found = User::find_by_email(&db.pool, "ADA@example.COM").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(created.id));
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let db = test_support::db().await;
        test_support::user(&db, "dup@example.com", UserRole::SalesAgent).await;
        let data = CreateUser {
            email: "DUP@example.com".into(),
            name: "Dup".into(),
            password: "irrelevant".into(),
            role: None,
            team_id: None,
            weekly_capacity_hours: None,
        };
        let err = User::create(&db.pool, &data, Uuid::new_v4(), "hash", 40.0)
            .await
            .unwrap_err();
        assert!(matches!(err, sqlx::Error::Database(ref e) if e.is_unique_violation()));
    }

    #[tokio::test]
    async fn update_and_deactivate() {
        let db = test_support::db().await;
        let user = test_support::user(&db, "lead@example.com", UserRole::SalesAgent).await;

        let patch = UpdateUser {
            role: Some(UserRole::SalesLead),
            weekly_capacity_hours: Some(32.0),
            ..Default::default()
        };
        let updated = User::update(&db.pool, &patch.apply(user.clone())).await.unwrap();
        assert_eq!(updated.role, UserRole::SalesLead);
        assert_eq!(updated.weekly_capacity_hours, 32.0);
        assert!(updated.is_active);

        assert_eq!(User::deactivate(&db.pool, user.id).await.unwrap(), 1);
        let reloaded = User::find_by_id(&db.pool, user.id).await.unwrap().unwrap();
        assert!(!reloaded.is_active);
    }

    #[test]
    fn password_hash_is_never_serialized() {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: "a@b.c".into(),
            name: "A".into(),
            role: UserRole::Admin,
            team_id: None,
            password_hash: "secret".into(),
            weekly_capacity_hours: 40.0,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "admin");
    }

    #[test]
    fn team_patch_distinguishes_clear_from_absent() {
        let absent: UpdateUser = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.team_id, None);
        let cleared: UpdateUser = serde_json::from_str(r#"{"team_id": null}"#).unwrap();
        assert_eq!(cleared.team_id, Some(None));
    }

    #[test]
    fn patch_declaration_exports_clearable_fields_as_optional() {
        let decl = UpdateUser::decl();
        assert!(decl.contains("team_id?: string"), "{decl}");
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, QueryBuilder, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use utils::date_range::DateRange;
use uuid::Uuid;

use super::call_note::CallNote;
use crate::scope::{Scope, push_range};

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, Hash, TS, EnumString, Display,
)]
#[sqlx(type_name = "activity_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActivityType {
    Call,
    Meeting,
    Email,
    Note,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Activity {
    pub id: Uuid,
    pub activity_type: ActivityType,
    pub user_id: Uuid,
    pub customer_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
    pub deal_id: Option<Uuid>,
    pub call_note_id: Option<Uuid>, // Set when recorded alongside a call note
    pub description: String,
    pub occurred_at: DateTime<Utc>,
    pub duration_minutes: i64,
    pub created_at: DateTime<Utc>,
}

impl Activity {
    pub fn duration_hours(&self) -> f64 {
        self.duration_minutes as f64 / 60.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateActivity {
    pub activity_type: ActivityType,
    pub customer_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
    pub deal_id: Option<Uuid>,
    pub description: String,
    pub occurred_at: Option<DateTime<Utc>>, // Defaults to now
    pub duration_minutes: Option<i64>,
}

impl CreateActivity {
    /// The activity logged for a call note
    pub fn from_call_note(note: &CallNote) -> Self {
        Self {
            activity_type: ActivityType::Call,
            customer_id: Some(note.customer_id),
            company_id: None,
            deal_id: note.deal_id,
            description: format!("Call: {}", note.subject),
            occurred_at: Some(note.call_date),
            duration_minutes: Some(note.duration_minutes),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct ActivityFilters {
    pub activity_type: Option<ActivityType>,
    pub user_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
    pub deal_id: Option<Uuid>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct ActivityTypeCount {
    pub activity_type: ActivityType,
    pub count: i64,
}

impl Activity {
    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Activity>("SELECT * FROM activities WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(
        pool: &SqlitePool,
        scope: &Scope,
        filters: &ActivityFilters,
        range: Option<&DateRange>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM activities WHERE 1 = 1");
        scope.push_filter(&mut qb, "user_id");
        push_range(&mut qb, "occurred_at", range);
        if let Some(activity_type) = filters.activity_type {
            qb.push(" AND activity_type = ").push_bind(activity_type);
        }
        if let Some(user_id) = filters.user_id {
            qb.push(" AND user_id = ").push_bind(user_id);
        }
        if let Some(customer_id) = filters.customer_id {
            qb.push(" AND customer_id = ").push_bind(customer_id);
        }
        if let Some(company_id) = filters.company_id {
            qb.push(" AND company_id = ").push_bind(company_id);
        }
        if let Some(deal_id) = filters.deal_id {
            qb.push(" AND deal_id = ").push_bind(deal_id);
        }
        qb.push(" ORDER BY occurred_at DESC");
        qb.build_query_as::<Activity>().fetch_all(pool).await
    }

    pub async fn count_by_type(
        pool: &SqlitePool,
        scope: &Scope,
        range: Option<&DateRange>,
    ) -> Result<Vec<ActivityTypeCount>, sqlx::Error> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT activity_type, COUNT(*) AS count FROM activities WHERE 1 = 1",
        );
        scope.push_filter(&mut qb, "user_id");
        push_range(&mut qb, "occurred_at", range);
        qb.push(" GROUP BY activity_type ORDER BY activity_type ASC");
        qb.build_query_as::<ActivityTypeCount>().fetch_all(pool).await
    }

    /// Activities inside `range`, the logged-time side of the capacity computation.
    pub async fn find_for_capacity(
        pool: &SqlitePool,
        scope: &Scope,
        range: &DateRange,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM activities WHERE 1 = 1");
        scope.push_filter(&mut qb, "user_id");
        push_range(&mut qb, "occurred_at", Some(range));
        qb.build_query_as::<Activity>().fetch_all(pool).await
    }

    pub async fn create<'e, E>(
        executor: E,
        data: &CreateActivity,
        activity_id: Uuid,
        user_id: Uuid,
        call_note_id: Option<Uuid>,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let now = Utc::now();
        sqlx::query_as::<_, Activity>(
            r#"INSERT INTO activities (id, activity_type, user_id, customer_id, company_id, deal_id, call_note_id, description, occurred_at, duration_minutes, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
               RETURNING *"#,
        )
        .bind(activity_id)
        .bind(data.activity_type)
        .bind(user_id)
        .bind(data.customer_id)
        .bind(data.company_id)
        .bind(data.deal_id)
        .bind(call_note_id)
        .bind(data.description.trim())
        .bind(data.occurred_at.unwrap_or(now))
        .bind(data.duration_minutes.unwrap_or(0))
        .bind(now)
        .fetch_one(executor)
        .await
    }

    /// Keep the activity recorded for a call note in step with the note.
    pub async fn sync_with_call_note<'e, E>(executor: E, note: &CallNote) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let data = CreateActivity::from_call_note(note);
        let result = sqlx::query(
            r#"UPDATE activities
               SET customer_id = $2, deal_id = $3, description = $4, occurred_at = $5, duration_minutes = $6
               WHERE call_note_id = $1"#,
        )
        .bind(note.id)
        .bind(data.customer_id)
        .bind(data.deal_id)
        .bind(data.description)
        .bind(data.occurred_at)
        .bind(data.duration_minutes)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM activities WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

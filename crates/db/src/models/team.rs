use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Team {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub lead_id: Option<Uuid>, // Sales lead responsible for the team
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateTeam {
    pub name: String,
    pub description: Option<String>,
    pub lead_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateTeam {
    pub name: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[ts(optional, as = "Option<String>")]
    pub description: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[ts(optional, as = "Option<Uuid>")]
    pub lead_id: Option<Option<Uuid>>,
}

impl UpdateTeam {
    pub fn apply(&self, mut team: Team) -> Team {
        if let Some(name) = &self.name {
            team.name = name.trim().to_string();
        }
        if let Some(description) = &self.description {
            team.description = description.clone();
        }
        if let Some(lead_id) = self.lead_id {
            team.lead_id = lead_id;
        }
        team
    }
}

impl Team {
    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Team>("SELECT * FROM teams WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Team>("SELECT * FROM teams ORDER BY name ASC")
            .fetch_all(pool)
            .await
    }

    /// Teams whose lead is `user_id`
    pub async fn find_led_by(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Team>("SELECT * FROM teams WHERE lead_id = $1 ORDER BY name ASC")
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Ids of every member of the given teams, deactivated ones included, so
    /// their records stay reachable by the team lead.
    pub async fn member_ids(pool: &SqlitePool, team_ids: &[Uuid]) -> Result<Vec<Uuid>, sqlx::Error> {
        if team_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb = sqlx::QueryBuilder::<sqlx::Sqlite>::new(
            "SELECT id FROM users WHERE team_id IN (",
        );
        let mut separated = qb.separated(", ");
        for id in team_ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");
        qb.build_query_scalar::<Uuid>().fetch_all(pool).await
    }

    pub async fn create(
        pool: &SqlitePool,
        data: &CreateTeam,
        team_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let now = Utc::now();
        sqlx::query_as::<_, Team>(
            r#"INSERT INTO teams (id, name, description, lead_id, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $5)
               RETURNING *"#,
        )
        .bind(team_id)
        .bind(data.name.trim())
        .bind(&data.description)
        .bind(data.lead_id)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    pub async fn update(pool: &SqlitePool, team: &Team) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Team>(
            r#"UPDATE teams
               SET name = $2, description = $3, lead_id = $4, updated_at = $5
               WHERE id = $1
               RETURNING *"#,
        )
        .bind(team.id)
        .bind(&team.name)
        .bind(&team.description)
        .bind(team.lead_id)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM teams WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

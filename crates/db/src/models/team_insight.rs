use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use tracing::warn;
use ts_rs::TS;
use utils::date_range::DateRange;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display)]
#[sqlx(type_name = "insight_source", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InsightSource {
    Ai,
    RuleBased,
}

/// Stored row; list fields are JSON arrays of strings.
#[derive(Debug, Clone, FromRow)]
struct TeamInsightRow {
    id: Uuid,
    team_id: Uuid,
    generated_by: Option<Uuid>,
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
    summary: String,
    highlights: String,
    risks: String,
    recommendations: String,
    source: InsightSource,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct TeamInsight {
    pub id: Uuid,
    pub team_id: Uuid,
    pub generated_by: Option<Uuid>,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub summary: String,
    pub highlights: Vec<String>,
    pub risks: Vec<String>,
    pub recommendations: Vec<String>,
    pub source: InsightSource,
    pub created_at: DateTime<Utc>,
}

fn parse_list(insight_id: Uuid, field: &'static str, json: &str) -> Vec<String> {
    serde_json::from_str(json).unwrap_or_else(|e| {
        warn!(%insight_id, field, error = %e, "unreadable insight list column, returning it empty");
        Vec::new()
    })
}

impl From<TeamInsightRow> for TeamInsight {
    fn from(row: TeamInsightRow) -> Self {
        Self {
            id: row.id,
            team_id: row.team_id,
            generated_by: row.generated_by,
            period_start: row.period_start,
            period_end: row.period_end,
            summary: row.summary,
            highlights: parse_list(row.id, "highlights", &row.highlights),
            risks: parse_list(row.id, "risks", &row.risks),
            recommendations: parse_list(row.id, "recommendations", &row.recommendations),
            source: row.source,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateTeamInsight {
    pub team_id: Uuid,
    pub generated_by: Option<Uuid>,
    pub period: DateRange,
    pub summary: String,
    pub highlights: Vec<String>,
    pub risks: Vec<String>,
    pub recommendations: Vec<String>,
    pub source: InsightSource,
}

impl TeamInsight {
    pub async fn create(
        pool: &SqlitePool,
        data: &CreateTeamInsight,
        insight_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let to_json = |items: &Vec<String>| serde_json::to_string(items).unwrap_or_else(|_| "[]".into());
        let row = sqlx::query_as::<_, TeamInsightRow>(
            r#"INSERT INTO team_insights (id, team_id, generated_by, period_start, period_end, summary, highlights, risks, recommendations, source, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
               RETURNING *"#,
        )
        .bind(insight_id)
        .bind(data.team_id)
        .bind(data.generated_by)
        .bind(data.period.start)
        .bind(data.period.end)
        .bind(&data.summary)
        .bind(to_json(&data.highlights))
        .bind(to_json(&data.risks))
        .bind(to_json(&data.recommendations))
        .bind(data.source)
        .bind(Utc::now())
        .fetch_one(pool)
        .await?;
        Ok(row.into())
    }

    pub async fn find_latest(pool: &SqlitePool, team_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let row = sqlx::query_as::<_, TeamInsightRow>(
            "SELECT * FROM team_insights WHERE team_id = $1 ORDER BY created_at DESC, rowid DESC LIMIT 1",
        )
        .bind(team_id)
        .fetch_optional(pool)
        .await?;
        Ok(row.map(Into::into))
    }

    pub async fn find_by_team(
        pool: &SqlitePool,
        team_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let rows = sqlx::query_as::<_, TeamInsightRow>(
            "SELECT * FROM team_insights WHERE team_id = $1 ORDER BY created_at DESC, rowid DESC LIMIT $2",
        )
        .bind(team_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::models::{
        team::{CreateTeam, Team},
        test_support,
    };

    #[tokio::test]
    async fn lists_round_trip_through_json_columns() {
        let db = test_support::db().await;
        let team = Team::create(
            &db.pool,
            &CreateTeam {
                name: "North".into(),
                description: None,
                lead_id: None,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        let now = Utc::now();
        let period = DateRange::new(now - Duration::days(7), now).unwrap();

        for summary in ["first", "second"] {
            let data = CreateTeamInsight {
                team_id: team.id,
                generated_by: None,
                period,
                summary: summary.into(),
                highlights: vec!["Two deals won".into()],
                risks: vec![],
                recommendations: vec!["Rebalance tasks".into(), "Follow up".into()],
                source: InsightSource::RuleBased,
            };
            TeamInsight::create(&db.pool, &data, Uuid::new_v4()).await.unwrap();
        }

        let latest = TeamInsight::find_latest(&db.pool, team.id).await.unwrap().unwrap();
        assert_eq!(latest.summary, "second");
        assert_eq!(latest.recommendations.len(), 2);
        assert!(latest.risks.is_empty());

        let all = TeamInsight::find_by_team(&db.pool, team.id, 10).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(TeamInsight::find_by_team(&db.pool, team.id, 1).await.unwrap().len(), 1);

        // A corrupt list column reads back empty instead of failing the row
        sqlx::query("UPDATE team_insights SET risks = 'not json' WHERE id = $1")
            .bind(latest.id)
            .execute(&db.pool)
            .await
            .unwrap();
        let reread = TeamInsight::find_latest(&db.pool, team.id).await.unwrap().unwrap();
        assert!(reread.risks.is_empty());
        assert_eq!(reread.recommendations.len(), 2);
    }
}

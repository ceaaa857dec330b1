use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use utils::date_range::DateRange;
use uuid::Uuid;

use crate::scope::{Scope, push_range};

/// Pipeline stage. Variants are declared in pipeline order.
#[derive(
    Debug,
    Clone,
    Copy,
    Type,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    TS,
    EnumString,
    Display,
    Default,
)]
#[sqlx(type_name = "deal_stage", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DealStage {
    #[default]
    Prospecting,
    Qualification,
    Proposal,
    Negotiation,
    ClosedWon,
    ClosedLost,
}

impl DealStage {
    pub const ALL: [DealStage; 6] = [
        DealStage::Prospecting,
        DealStage::Qualification,
        DealStage::Proposal,
        DealStage::Negotiation,
        DealStage::ClosedWon,
        DealStage::ClosedLost,
    ];

    /// Win probability assumed when a deal enters this stage
    pub fn default_probability(&self) -> i32 {
        match self {
            DealStage::Prospecting => 10,
            DealStage::Qualification => 25,
            DealStage::Proposal => 50,
            DealStage::Negotiation => 75,
            DealStage::ClosedWon => 100,
            DealStage::ClosedLost => 0,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, DealStage::ClosedWon | DealStage::ClosedLost)
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Deal {
    pub id: Uuid,
    pub title: String,
    pub value: f64,
    pub stage: DealStage,
    pub probability: i32, // 0..=100
    pub customer_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
    pub owner_id: Uuid,
    pub expected_close_date: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>, // Set while the deal sits in a closed stage
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Deal {
    /// Move the deal to `stage`, resetting probability to the stage default.
    /// Entering a closed stage stamps `closed_at`; reopening clears it.
    pub fn with_stage(mut self, stage: DealStage, now: DateTime<Utc>) -> Self {
        if self.stage == stage {
            return self;
        }
        if stage.is_closed() {
            if !self.stage.is_closed() || self.closed_at.is_none() {
                self.closed_at = Some(now);
            }
        } else {
            self.closed_at = None;
        }
        self.stage = stage;
        self.probability = stage.default_probability();
        self
    }

    pub fn weighted_value(&self) -> f64 {
        self.value * f64::from(self.probability) / 100.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateDeal {
    pub title: String,
    pub value: f64,
    pub stage: Option<DealStage>,
    pub probability: Option<i32>,
    pub customer_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
    pub owner_id: Option<Uuid>,
    pub expected_close_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateDeal {
    pub title: Option<String>,
    pub value: Option<f64>,
    pub stage: Option<DealStage>,
    pub probability: Option<i32>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[ts(optional, as = "Option<Uuid>")]
    pub customer_id: Option<Option<Uuid>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[ts(optional, as = "Option<Uuid>")]
    pub company_id: Option<Option<Uuid>>,
    pub owner_id: Option<Uuid>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[ts(optional, as = "Option<DateTime<Utc>>")]
    pub expected_close_date: Option<Option<DateTime<Utc>>>,
}

impl UpdateDeal {
    pub fn apply(&self, mut deal: Deal, now: DateTime<Utc>) -> Deal {
        if let Some(stage) = self.stage {
            deal = deal.with_stage(stage, now);
        }
        // An explicit probability wins over the stage default
        if let Some(probability) = self.probability {
            deal.probability = probability;
        }
        if let Some(title) = &self.title {
            deal.title = title.trim().to_string();
        }
        if let Some(value) = self.value {
            deal.value = value;
        }
        if let Some(customer_id) = self.customer_id {
            deal.customer_id = customer_id;
        }
        if let Some(company_id) = self.company_id {
            deal.company_id = company_id;
        }
        if let Some(owner_id) = self.owner_id {
            deal.owner_id = owner_id;
        }
        if let Some(expected_close_date) = self.expected_close_date {
            deal.expected_close_date = expected_close_date;
        }
        deal
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct DealFilters {
    pub stage: Option<DealStage>,
    pub customer_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
    pub search: Option<String>,
}

/// Aggregate for one pipeline stage
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct StageSummary {
    pub stage: DealStage,
    pub deal_count: i64,
    pub total_value: f64,
    pub weighted_value: f64,
}

/// Deals closed within a period
#[derive(Debug, Clone, Default, FromRow, Serialize, Deserialize, TS)]
pub struct ClosedDealsSummary {
    pub won_count: i64,
    pub won_value: f64,
    pub lost_count: i64,
}

impl ClosedDealsSummary {
    /// Share of closed deals that were won, in percent. `None` when nothing closed.
    pub fn win_rate(&self) -> Option<f64> {
        let closed = self.won_count + self.lost_count;
        (closed > 0).then(|| self.won_count as f64 / closed as f64 * 100.0)
    }
}

impl Deal {
    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Deal>("SELECT * FROM deals WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(
        pool: &SqlitePool,
        scope: &Scope,
        filters: &DealFilters,
        range: Option<&DateRange>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM deals WHERE 1 = 1");
        scope.push_filter(&mut qb, "owner_id");
        push_range(&mut qb, "created_at", range);
        if let Some(stage) = filters.stage {
            qb.push(" AND stage = ").push_bind(stage);
        }
        if let Some(customer_id) = filters.customer_id {
            qb.push(" AND customer_id = ").push_bind(customer_id);
        }
        if let Some(company_id) = filters.company_id {
            qb.push(" AND company_id = ").push_bind(company_id);
        }
        if let Some(term) = filters.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            qb.push(" AND title LIKE ").push_bind(format!("%{term}%"));
        }
        qb.push(" ORDER BY created_at DESC");
        qb.build_query_as::<Deal>().fetch_all(pool).await
    }

    /// Count and value per stage, one entry for every stage in pipeline order.
    pub async fn pipeline_summary(
        pool: &SqlitePool,
        scope: &Scope,
    ) -> Result<Vec<StageSummary>, sqlx::Error> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            r#"SELECT stage,
                      COUNT(*) AS deal_count,
                      CAST(COALESCE(SUM(value), 0) AS REAL) AS total_value,
                      CAST(COALESCE(SUM(value * probability / 100.0), 0) AS REAL) AS weighted_value
               FROM deals WHERE 1 = 1"#,
        );
        scope.push_filter(&mut qb, "owner_id");
        qb.push(" GROUP BY stage");
        let rows = qb.build_query_as::<StageSummary>().fetch_all(pool).await?;

        Ok(DealStage::ALL
            .iter()
            .map(|stage| {
                rows.iter()
                    .find(|row| row.stage == *stage)
                    .cloned()
                    .unwrap_or(StageSummary {
                        stage: *stage,
                        deal_count: 0,
                        total_value: 0.0,
                        weighted_value: 0.0,
                    })
            })
            .collect())
    }

    pub async fn closed_summary(
        pool: &SqlitePool,
        scope: &Scope,
        range: Option<&DateRange>,
    ) -> Result<ClosedDealsSummary, sqlx::Error> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            r#"SELECT
                 CAST(COALESCE(SUM(CASE WHEN stage = 'closed_won' THEN 1 ELSE 0 END), 0) AS INTEGER) AS won_count,
                 CAST(COALESCE(SUM(CASE WHEN stage = 'closed_won' THEN value ELSE 0 END), 0) AS REAL) AS won_value,
                 CAST(COALESCE(SUM(CASE WHEN stage = 'closed_lost' THEN 1 ELSE 0 END), 0) AS INTEGER) AS lost_count
               FROM deals
               WHERE closed_at IS NOT NULL"#,
        );
        scope.push_filter(&mut qb, "owner_id");
        push_range(&mut qb, "closed_at", range);
        qb.build_query_as::<ClosedDealsSummary>().fetch_one(pool).await
    }

    pub async fn create(
        pool: &SqlitePool,
        data: &CreateDeal,
        deal_id: Uuid,
        owner_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let now = Utc::now();
        let stage = data.stage.unwrap_or_default();
        let probability = data.probability.unwrap_or_else(|| stage.default_probability());
        let closed_at = stage.is_closed().then_some(now);
        sqlx::query_as::<_, Deal>(
            r#"INSERT INTO deals (id, title, value, stage, probability, customer_id, company_id, owner_id, expected_close_date, closed_at, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
               RETURNING *"#,
        )
        .bind(deal_id)
        .bind(data.title.trim())
        .bind(data.value)
        .bind(stage)
        .bind(probability)
        .bind(data.customer_id)
        .bind(data.company_id)
        .bind(owner_id)
        .bind(data.expected_close_date)
        .bind(closed_at)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    pub async fn update(pool: &SqlitePool, deal: &Deal) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Deal>(
            r#"UPDATE deals
               SET title = $2, value = $3, stage = $4, probability = $5, customer_id = $6, company_id = $7,
                   owner_id = $8, expected_close_date = $9, closed_at = $10, updated_at = $11
               WHERE id = $1
               RETURNING *"#,
        )
        .bind(deal.id)
        .bind(&deal.title)
        .bind(deal.value)
        .bind(deal.stage)
        .bind(deal.probability)
        .bind(deal.customer_id)
        .bind(deal.company_id)
        .bind(deal.owner_id)
        .bind(deal.expected_close_date)
        .bind(deal.closed_at)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM deals WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

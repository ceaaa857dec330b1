use chrono::{DateTime, Utc};
use db::{
    models::{
        activity::{Activity, ActivityTypeCount},
        customer::Customer,
        deal::{Deal, StageSummary},
        task::Task,
    },
    scope::Scope,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use ts_rs::TS;
use utils::date_range::DateRange;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Headline numbers for the records in a scope. `range` is `None` for all time.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct DashboardSummary {
    pub range: Option<DateRange>,
    pub deals_won: i64,
    pub won_value: f64,
    pub deals_lost: i64,
    pub win_rate: Option<f64>,
    pub open_deals: i64,
    pub open_pipeline_value: f64,
    pub weighted_pipeline_value: f64,
    pub activities_by_type: Vec<ActivityTypeCount>,
    pub total_activities: i64,
    pub tasks_completed: i64,
    pub tasks_overdue: i64,
    pub new_customers: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct PipelineOverview {
    pub stages: Vec<StageSummary>,
    pub open_value: f64,
    pub weighted_value: f64,
}

impl PipelineOverview {
    fn from_stages(stages: Vec<StageSummary>) -> Self {
        let open = stages.iter().filter(|s| !s.stage.is_closed());
        let (open_value, weighted_value) = open.fold((0.0, 0.0), |(value, weighted), s| {
            (value + s.total_value, weighted + s.weighted_value)
        });
        Self {
            stages,
            open_value,
            weighted_value,
        }
    }

    fn open_deals(&self) -> i64 {
        self.stages
            .iter()
            .filter(|s| !s.stage.is_closed())
            .map(|s| s.deal_count)
            .sum()
    }
}

pub struct DashboardService;

impl DashboardService {
    /// Closed deals, activities, completed tasks and new customers are counted
    /// inside `range`. The open pipeline and overdue tasks are as of `now`.
    pub async fn summary(
        pool: &SqlitePool,
        scope: &Scope,
        range: Option<&DateRange>,
        now: DateTime<Utc>,
    ) -> Result<DashboardSummary, DashboardError> {
        let closed = Deal::closed_summary(pool, scope, range).await?;
        let pipeline = Self::pipeline(pool, scope).await?;
        let activities_by_type = Activity::count_by_type(pool, scope, range).await?;
        let tasks_completed = Task::count_completed(pool, scope, range).await?;
        let tasks_overdue = Task::find_overdue(pool, scope, now).await?.len() as i64;
        let new_customers = Customer::count_created(pool, scope, range).await?;

        Ok(DashboardSummary {
            range: range.copied(),
            deals_won: closed.won_count,
            won_value: closed.won_value,
            deals_lost: closed.lost_count,
            win_rate: closed.win_rate().map(|rate| (rate * 10.0).round() / 10.0),
            open_deals: pipeline.open_deals(),
            open_pipeline_value: pipeline.open_value,
            weighted_pipeline_value: pipeline.weighted_value,
            total_activities: activities_by_type.iter().map(|c| c.count).sum(),
            activities_by_type,
            tasks_completed,
            tasks_overdue,
            new_customers,
        })
    }

    pub async fn pipeline(pool: &SqlitePool, scope: &Scope) -> Result<PipelineOverview, DashboardError> {
        let stages = Deal::pipeline_summary(pool, scope).await?;
        Ok(PipelineOverview::from_stages(stages))
    }
}

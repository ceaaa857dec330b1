//! Narrative insights about a team's recent performance.
//!
//! Metrics are gathered from the dashboard and capacity services, handed to an
//! [`InsightGenerator`], and the result is stored as a `TeamInsight`. When the
//! AI generator fails the rule-based generator is used instead, so generation
//! only fails on database errors.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use db::{
    models::{
        team::Team,
        team_insight::{CreateTeamInsight, InsightSource, TeamInsight},
    },
    scope::Scope,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;
use utils::date_range::DateRange;
use uuid::Uuid;

use super::{
    authorization::{Actor, AuthorizationError},
    capacity::{CapacityError, CapacityService, CapacityStatus, TeamCapacityInfo},
    claude_api::{ClaudeApiClient, ClaudeApiError},
    config::Config,
    dashboard::{DashboardError, DashboardService, DashboardSummary},
};

pub const DEFAULT_HISTORY_LIMIT: i64 = 10;
pub const MAX_HISTORY_LIMIT: i64 = 100;

#[derive(Debug, Error)]
pub enum InsightError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),
    #[error(transparent)]
    Capacity(#[from] CapacityError),
    #[error(transparent)]
    Dashboard(#[from] DashboardError),
    #[error("insight provider failed: {0}")]
    Ai(#[from] ClaudeApiError),
}

/// Everything a generator gets to see about a team.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct TeamMetrics {
    pub team_id: Uuid,
    pub team_name: String,
    pub period: DateRange,
    pub member_count: usize,
    pub performance: DashboardSummary,
    pub capacity: TeamCapacityInfo,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, TS)]
pub struct GeneratedInsight {
    pub summary: String,
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default)]
    pub risks: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

#[async_trait]
pub trait InsightGenerator: Send + Sync {
    fn source(&self) -> InsightSource;

    async fn generate(&self, metrics: &TeamMetrics) -> Result<GeneratedInsight, InsightError>;
}

/// Deterministic heuristics over the metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedInsightGenerator;

impl RuleBasedInsightGenerator {
    pub fn build(&self, metrics: &TeamMetrics) -> GeneratedInsight {
        let perf = &metrics.performance;
        let capacity = &metrics.capacity;
        let mut highlights = Vec::new();
        let mut risks = Vec::new();
        let mut recommendations = Vec::new();

        let utilization = capacity
            .utilization_percent
            .map_or_else(|| "n/a".to_string(), |u| format!("{u:.1}%"));
        let summary = format!(
            "{} closed {} won and {} lost deals ({:.2} won) with {:.2} in open pipeline. \
             Team utilization this week is {} across {} members.",
            metrics.team_name,
            perf.deals_won,
            perf.deals_lost,
            perf.won_value,
            perf.open_pipeline_value,
            utilization,
            metrics.member_count,
        );

        if perf.deals_won > 0 {
            highlights.push(format!(
                "{} deals won for a total of {:.2}",
                perf.deals_won, perf.won_value
            ));
        }
        match perf.win_rate {
            Some(rate) if rate >= 50.0 => highlights.push(format!("Win rate of {rate:.1}%")),
            Some(rate) if rate < 25.0 => {
                risks.push(format!("Win rate is low at {rate:.1}%"));
                recommendations.push(
                    "Review lost deals for common objections and tighten qualification".to_string(),
                );
            }
            _ => {}
        }
        if perf.weighted_pipeline_value > 0.0 {
            highlights.push(format!(
                "Weighted pipeline of {:.2} across {} open deals",
                perf.weighted_pipeline_value, perf.open_deals
            ));
        } else {
            risks.push("No weighted value in the open pipeline".to_string());
            recommendations.push("Prioritize prospecting to rebuild the pipeline".to_string());
        }

        if perf.total_activities == 0 {
            risks.push("No customer activity was logged in the period".to_string());
            recommendations.push("Agree a minimum weekly outreach target per rep".to_string());
        } else {
            highlights.push(format!("{} activities logged", perf.total_activities));
        }

        if perf.tasks_overdue > 0 {
            risks.push(format!("{} open tasks are overdue", perf.tasks_overdue));
            recommendations.push("Triage overdue tasks in the next team meeting".to_string());
        }

        let overloaded = names_with_status(capacity, CapacityStatus::Overloaded);
        let idle = names_with_status(capacity, CapacityStatus::Underutilized);
        if !overloaded.is_empty() {
            risks.push(format!("Overloaded this week: {}", overloaded.join(", ")));
            if idle.is_empty() {
                recommendations.push("Push back lower priority due dates for overloaded reps".to_string());
            } else {
                recommendations.push(format!(
                    "Rebalance work from {} to {}",
                    overloaded.join(", "),
                    idle.join(", ")
                ));
            }
        }
        let optimal = capacity.status_counts.optimal + capacity.status_counts.at_capacity;
        if optimal > 0 && overloaded.is_empty() {
            highlights.push(format!("{optimal} members have a healthy workload"));
        }

        if recommendations.is_empty() {
            recommendations.push("Keep the current cadence and review again next week".to_string());
        }

        GeneratedInsight {
            summary,
            highlights,
            risks,
            recommendations,
        }
    }
}

fn names_with_status(capacity: &TeamCapacityInfo, status: CapacityStatus) -> Vec<String> {
    capacity
        .members_with_status(status)
        .map(|m| m.user_name.clone())
        .collect()
}

#[async_trait]
impl InsightGenerator for RuleBasedInsightGenerator {
    fn source(&self) -> InsightSource {
        InsightSource::RuleBased
    }

    async fn generate(&self, metrics: &TeamMetrics) -> Result<GeneratedInsight, InsightError> {
        Ok(self.build(metrics))
    }
}

const SYSTEM_PROMPT: &str = "You are a sales operations analyst. You receive JSON metrics for one sales team \
and reply with a single JSON object with the keys \"summary\" (string, at most three sentences), \
\"highlights\", \"risks\" and \"recommendations\" (arrays of short strings). Reply with JSON only.";

pub struct ClaudeInsightGenerator {
    client: ClaudeApiClient,
}

impl ClaudeInsightGenerator {
    pub fn new(client: ClaudeApiClient) -> Self {
        Self { client }
    }

    fn prompt(metrics: &TeamMetrics) -> Result<String, InsightError> {
        let json = serde_json::to_string_pretty(metrics)
            .map_err(|e| ClaudeApiError::InvalidResponse(e.to_string()))?;
        Ok(format!(
            "Metrics for team \"{}\" from {} to {}:\n{}",
            metrics.team_name,
            metrics.period.start.to_rfc3339(),
            metrics.period.end.to_rfc3339(),
            json
        ))
    }
}

#[async_trait]
impl InsightGenerator for ClaudeInsightGenerator {
    fn source(&self) -> InsightSource {
        InsightSource::Ai
    }

    async fn generate(&self, metrics: &TeamMetrics) -> Result<GeneratedInsight, InsightError> {
        let prompt = Self::prompt(metrics)?;
        let insight: GeneratedInsight = self.client.ask_json(&prompt, Some(SYSTEM_PROMPT)).await?;
        if insight.summary.trim().is_empty() {
            return Err(ClaudeApiError::InvalidResponse("empty summary".to_string()).into());
        }
        Ok(insight)
    }
}

#[derive(Clone)]
pub struct InsightService {
    pool: SqlitePool,
    generator: Arc<dyn InsightGenerator>,
}

impl InsightService {
    pub fn new(pool: SqlitePool, generator: Arc<dyn InsightGenerator>) -> Self {
        Self { pool, generator }
    }

    /// AI generation when an API key is configured, rule-based otherwise.
    pub fn from_config(pool: SqlitePool, config: &Config) -> Self {
        let generator: Arc<dyn InsightGenerator> = match ClaudeApiClient::from_config(config) {
            Ok(client) => {
                info!(model = client.model(), "AI insights enabled");
                Arc::new(ClaudeInsightGenerator::new(client))
            }
            Err(e) => {
                info!(reason = %e, "AI insights disabled, using rule-based insights");
                Arc::new(RuleBasedInsightGenerator)
            }
        };
        Self::new(pool, generator)
    }

    pub fn source(&self) -> InsightSource {
        self.generator.source()
    }

    pub async fn collect_metrics(
        &self,
        team: &Team,
        period: &DateRange,
        now: DateTime<Utc>,
    ) -> Result<TeamMetrics, InsightError> {
        let member_ids = Team::member_ids(&self.pool, &[team.id]).await?;
        let scope = Scope::Users(member_ids);

        let performance = DashboardService::summary(&self.pool, &scope, Some(period), now).await?;
        let capacity =
            CapacityService::team_capacity_info(&self.pool, team, capacity_week(period, now)).await?;

        Ok(TeamMetrics {
            team_id: team.id,
            team_name: team.name.clone(),
            period: *period,
            member_count: capacity.members.len(),
            performance,
            capacity,
        })
    }

    /// Generate and store a new insight for `team` covering `period`.
    pub async fn generate(
        &self,
        team: &Team,
        period: &DateRange,
        actor: &Actor,
    ) -> Result<TeamInsight, InsightError> {
        actor.ensure_can_manage_team(team)?;

        let metrics = self.collect_metrics(team, period, Utc::now()).await?;
        let (generated, source) = match self.generator.generate(&metrics).await {
            Ok(generated) => (generated, self.generator.source()),
            Err(e) => {
                warn!(team_id = %team.id, error = %e, "insight generation failed, using rule-based fallback");
                (RuleBasedInsightGenerator.build(&metrics), InsightSource::RuleBased)
            }
        };

        let data = CreateTeamInsight {
            team_id: team.id,
            generated_by: Some(actor.id()),
            period: *period,
            summary: generated.summary,
            highlights: generated.highlights,
            risks: generated.risks,
            recommendations: generated.recommendations,
            source,
        };
        let insight = TeamInsight::create(&self.pool, &data, Uuid::new_v4()).await?;
        info!(team_id = %team.id, insight_id = %insight.id, %source, "stored team insight");
        Ok(insight)
    }

    pub async fn latest(&self, team: &Team, actor: &Actor) -> Result<Option<TeamInsight>, InsightError> {
        ensure_can_read(actor, team)?;
        Ok(TeamInsight::find_latest(&self.pool, team.id).await?)
    }

    pub async fn list(
        &self,
        team: &Team,
        limit: Option<i64>,
        actor: &Actor,
    ) -> Result<Vec<TeamInsight>, InsightError> {
        ensure_can_read(actor, team)?;
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, MAX_HISTORY_LIMIT);
        Ok(TeamInsight::find_by_team(&self.pool, team.id, limit).await?)
    }
}

fn ensure_can_read(actor: &Actor, team: &Team) -> Result<(), AuthorizationError> {
    actor.ensure_manager()?;
    actor.ensure_can_manage_team(team)
}

/// The current week when `now` falls inside the period, else the period's last week.
fn capacity_week(period: &DateRange, now: DateTime<Utc>) -> DateTime<Utc> {
    if period.contains(now) {
        now
    } else {
        period.end - Duration::seconds(1)
    }
}

//! Weekly workload against each user's capacity.
//!
//! A user's load for a week is the estimated hours of their open tasks due
//! that week plus the time logged on their activities that week.

use chrono::{DateTime, Utc};
use db::{
    models::{activity::Activity, task::Task, team::Team, user::User},
    scope::Scope,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use strum_macros::Display;
use thiserror::Error;
use tracing::debug;
use ts_rs::TS;
use utils::date_range::DateRange;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CapacityError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("forecast range spans {0} weeks, the limit is {MAX_FORECAST_WEEKS}")]
    RangeTooLong(usize),
}

pub const MAX_FORECAST_WEEKS: usize = 26;

/// Utilization thresholds, in percent
const OPTIMAL_FROM: f64 = 50.0;
const AT_CAPACITY_FROM: f64 = 85.0;
const FULL: f64 = 100.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CapacityStatus {
    Underutilized,
    Optimal,
    AtCapacity,
    Overloaded,
}

impl CapacityStatus {
    pub fn from_utilization(percent: f64) -> Self {
        if percent > FULL {
            CapacityStatus::Overloaded
        } else if percent >= AT_CAPACITY_FROM {
            CapacityStatus::AtCapacity
        } else if percent >= OPTIMAL_FROM {
            CapacityStatus::Optimal
        } else {
            CapacityStatus::Underutilized
        }
    }

    /// `utilization` is `None` when there is load but no capacity at all.
    fn classify(utilization: Option<f64>) -> Self {
        utilization.map_or(CapacityStatus::Overloaded, Self::from_utilization)
    }
}

/// Load as a percentage of capacity, rounded to one decimal.
/// Zero capacity yields `Some(0.0)` when idle and `None` otherwise.
pub fn utilization_percent(load_hours: f64, capacity_hours: f64) -> Option<f64> {
    if capacity_hours <= 0.0 {
        return (load_hours <= 0.0).then_some(0.0);
    }
    Some(round1(load_hours / capacity_hours * 100.0))
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UserCapacityInfo {
    pub user_id: Uuid,
    pub user_name: String,
    pub week_start: DateTime<Utc>,
    pub week_end: DateTime<Utc>,
    pub weekly_capacity_hours: f64,
    pub task_hours: f64,
    pub activity_hours: f64,
    pub load_hours: f64,
    pub available_hours: f64,
    pub utilization_percent: Option<f64>,
    pub status: CapacityStatus,
    pub open_task_count: usize,
    pub activity_count: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct StatusCounts {
    pub underutilized: usize,
    pub optimal: usize,
    pub at_capacity: usize,
    pub overloaded: usize,
}

impl StatusCounts {
    fn record(&mut self, status: CapacityStatus) {
        match status {
            CapacityStatus::Underutilized => self.underutilized += 1,
            CapacityStatus::Optimal => self.optimal += 1,
            CapacityStatus::AtCapacity => self.at_capacity += 1,
            CapacityStatus::Overloaded => self.overloaded += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct TeamCapacityInfo {
    pub team_id: Uuid,
    pub team_name: String,
    pub week_start: DateTime<Utc>,
    pub week_end: DateTime<Utc>,
    pub members: Vec<UserCapacityInfo>,
    pub total_capacity_hours: f64,
    pub total_load_hours: f64,
    pub utilization_percent: Option<f64>,
    pub status: CapacityStatus,
    pub status_counts: StatusCounts,
}

impl TeamCapacityInfo {
    pub fn members_with_status(&self, status: CapacityStatus) -> impl Iterator<Item = &UserCapacityInfo> {
        self.members.iter().filter(move |m| m.status == status)
    }
}

/// Compute one user's load for `week`. Records belonging to other users or
/// falling outside the week are ignored, as are closed tasks.
pub fn compute_user_capacity(
    user: &User,
    week: &DateRange,
    tasks: &[Task],
    activities: &[Activity],
) -> UserCapacityInfo {
    let open_tasks: Vec<&Task> = tasks
        .iter()
        .filter(|t| t.assignee_id == user.id && t.status.is_open())
        .filter(|t| t.due_date.is_some_and(|due| week.contains(due)))
        .collect();
    let logged: Vec<&Activity> = activities
        .iter()
        .filter(|a| a.user_id == user.id && week.contains(a.occurred_at))
        .collect();

    let task_hours: f64 = open_tasks.iter().map(|t| t.estimated_hours.max(0.0)).sum();
    let activity_hours: f64 = logged.iter().map(|a| a.duration_hours().max(0.0)).sum();
    let load_hours = task_hours + activity_hours;
    let capacity = user.weekly_capacity_hours.max(0.0);
    let utilization = utilization_percent(load_hours, capacity);

    UserCapacityInfo {
        user_id: user.id,
        user_name: user.name.clone(),
        week_start: week.start,
        week_end: week.end,
        weekly_capacity_hours: capacity,
        task_hours: round2(task_hours),
        activity_hours: round2(activity_hours),
        load_hours: round2(load_hours),
        available_hours: round2((capacity - load_hours).max(0.0)),
        utilization_percent: utilization,
        status: CapacityStatus::classify(utilization),
        open_task_count: open_tasks.len(),
        activity_count: logged.len(),
    }
}

/// Roll member figures up into team totals.
pub fn summarize_team(team: &Team, week: &DateRange, members: Vec<UserCapacityInfo>) -> TeamCapacityInfo {
    let total_capacity_hours: f64 = members.iter().map(|m| m.weekly_capacity_hours).sum();
    let total_load_hours: f64 = members.iter().map(|m| m.load_hours).sum();
    let utilization = utilization_percent(total_load_hours, total_capacity_hours);

    let mut status_counts = StatusCounts::default();
    for member in &members {
        status_counts.record(member.status);
    }

    TeamCapacityInfo {
        team_id: team.id,
        team_name: team.name.clone(),
        week_start: week.start,
        week_end: week.end,
        members,
        total_capacity_hours: round2(total_capacity_hours),
        total_load_hours: round2(total_load_hours),
        utilization_percent: utilization,
        status: CapacityStatus::classify(utilization),
        status_counts,
    }
}

pub struct CapacityService;

impl CapacityService {
    /// `week_start` may be any instant; it is normalized to the Monday of its week.
    pub async fn user_capacity_info(
        pool: &SqlitePool,
        user: &User,
        week_start: DateTime<Utc>,
    ) -> Result<UserCapacityInfo, CapacityError> {
        let week = DateRange::week_of(week_start);
        let scope = Scope::single(user.id);
        let tasks = Task::find_for_capacity(pool, &scope, &week).await?;
        let activities = Activity::find_for_capacity(pool, &scope, &week).await?;
        Ok(compute_user_capacity(user, &week, &tasks, &activities))
    }

    /// Capacity for every active member of `team`.
    pub async fn team_capacity_info(
        pool: &SqlitePool,
        team: &Team,
        week_start: DateTime<Utc>,
    ) -> Result<TeamCapacityInfo, CapacityError> {
        let week = DateRange::week_of(week_start);
        let members: Vec<User> = User::find_by_team(pool, team.id)
            .await?
            .into_iter()
            .filter(|u| u.is_active)
            .collect();

        let scope = Scope::Users(members.iter().map(|m| m.id).collect());
        let tasks = Task::find_for_capacity(pool, &scope, &week).await?;
        let activities = Activity::find_for_capacity(pool, &scope, &week).await?;

        let infos = members
            .iter()
            .map(|member| compute_user_capacity(member, &week, &tasks, &activities))
            .collect();
        let info = summarize_team(team, &week, infos);

        debug!(
            team_id = %team.id,
            week_start = %week.start,
            utilization = ?info.utilization_percent,
            "computed team capacity"
        );
        Ok(info)
    }

    /// One entry per week overlapping `range`.
    pub async fn user_capacity_forecast(
        pool: &SqlitePool,
        user: &User,
        range: &DateRange,
    ) -> Result<Vec<UserCapacityInfo>, CapacityError> {
        let weeks = range.weeks();
        if weeks.len() > MAX_FORECAST_WEEKS {
            return Err(CapacityError::RangeTooLong(weeks.len()));
        }
        let (Some(first), Some(last)) = (weeks.first(), weeks.last()) else {
            return Ok(Vec::new());
        };

        // One fetch covering every week, then bucket in memory
        let span = DateRange::week_of(*first);
        let span = DateRange {
            start: span.start,
            end: DateRange::week_of(*last).end,
        };
        let scope = Scope::single(user.id);
        let tasks = Task::find_for_capacity(pool, &scope, &span).await?;
        let activities = Activity::find_for_capacity(pool, &scope, &span).await?;

        Ok(weeks
            .into_iter()
            .map(|monday| {
                let week = DateRange::week_of(monday);
                compute_user_capacity(user, &week, &tasks, &activities)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use db::{
        DBService,
        models::{
            activity::{ActivityType, CreateActivity},
            task::{CreateTask, TaskPriority, TaskStatus},
            team::CreateTeam,
            user::{CreateUser, UserRole},
        },
    };

    use super::*;

    fn monday() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 12, 0, 0, 0).unwrap()
    }

    fn user_with_capacity(hours: f64) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: "rep@example.com".into(),
            name: "Rep".into(),
            role: UserRole::SalesAgent,
            team_id: None,
            password_hash: String::new(),
            weekly_capacity_hours: hours,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn task(assignee: Uuid, due: Option<DateTime<Utc>>, hours: f64, status: TaskStatus) -> Task {
        let now = Utc::now();
        Task {
            id: Uuid::new_v4(),
            title: "t".into(),
            description: None,
            status,
            priority: TaskPriority::Medium,
            due_date: due,
            estimated_hours: hours,
            assignee_id: assignee,
            customer_id: None,
            deal_id: None,
            completed_at: None,
            created_by: assignee,
            created_at: now,
            updated_at: now,
        }
    }

    fn activity(user: Uuid, at: DateTime<Utc>, minutes: i64) -> Activity {
        Activity {
            id: Uuid::new_v4(),
            activity_type: ActivityType::Meeting,
            user_id: user,
            customer_id: None,
            company_id: None,
            deal_id: None,
            call_note_id: None,
            description: "m".into(),
            occurred_at: at,
            duration_minutes: minutes,
            created_at: at,
        }
    }

    #[test]
    fn status_buckets() {
        assert_eq!(CapacityStatus::from_utilization(0.0), CapacityStatus::Underutilized);
        assert_eq!(CapacityStatus::from_utilization(49.9), CapacityStatus::Underutilized);
        assert_eq!(CapacityStatus::from_utilization(50.0), CapacityStatus::Optimal);
        assert_eq!(CapacityStatus::from_utilization(84.9), CapacityStatus::Optimal);
        assert_eq!(CapacityStatus::from_utilization(85.0), CapacityStatus::AtCapacity);
        assert_eq!(CapacityStatus::from_utilization(100.0), CapacityStatus::AtCapacity);
        assert_eq!(CapacityStatus::from_utilization(100.1), CapacityStatus::Overloaded);
    }

    #[test]
    fn zero_capacity() {
        assert_eq!(utilization_percent(0.0, 0.0), Some(0.0));
        assert_eq!(utilization_percent(2.0, 0.0), None);
        assert_eq!(CapacityStatus::classify(None), CapacityStatus::Overloaded);
        assert_eq!(utilization_percent(1.0, 3.0), Some(33.3));
    }

    #[test]
    fn load_combines_open_tasks_and_activities_in_week() {
        let user = user_with_capacity(40.0);
        let week = DateRange::week_of(monday() + Duration::days(2));
        let tasks = vec![
            task(user.id, Some(monday() + Duration::days(1)), 10.0, TaskStatus::Todo),
            task(user.id, Some(monday() + Duration::days(4)), 6.0, TaskStatus::InProgress),
            // Closed, outside the week, undated, or someone else's: all ignored
            task(user.id, Some(monday() + Duration::days(1)), 50.0, TaskStatus::Done),
            task(user.id, Some(monday() + Duration::days(7)), 50.0, TaskStatus::Todo),
            task(user.id, None, 50.0, TaskStatus::Todo),
            task(Uuid::new_v4(), Some(monday()), 50.0, TaskStatus::Todo),
        ];
        let activities = vec![
            activity(user.id, monday() + Duration::hours(10), 90),
            activity(user.id, monday() + Duration::days(6) + Duration::hours(23), 30),
            activity(user.id, monday() - Duration::minutes(1), 600),
        ];

        let info = compute_user_capacity(&user, &week, &tasks, &activities);
        assert_eq!(info.week_start, monday());
        assert_eq!(info.task_hours, 16.0);
        assert_eq!(info.activity_hours, 2.0);
        assert_eq!(info.load_hours, 18.0);
        assert_eq!(info.available_hours, 22.0);
        assert_eq!(info.utilization_percent, Some(45.0));
        assert_eq!(info.status, CapacityStatus::Underutilized);
        assert_eq!(info.open_task_count, 2);
        assert_eq!(info.activity_count, 2);
    }

    #[test]
    fn overload_has_no_available_hours() {
        let user = user_with_capacity(20.0);
        let week = DateRange::week_of(monday());
        let tasks = vec![task(user.id, Some(monday()), 25.0, TaskStatus::Todo)];
        let info = compute_user_capacity(&user, &week, &tasks, &[]);
        assert_eq!(info.utilization_percent, Some(125.0));
        assert_eq!(info.status, CapacityStatus::Overloaded);
        assert_eq!(info.available_hours, 0.0);
    }

    #[test]
    fn team_summary_totals() {
        let now = Utc::now();
        let team = Team {
            id: Uuid::new_v4(),
            name: "Inside Sales".into(),
            description: None,
            lead_id: None,
            created_at: now,
            updated_at: now,
        };
        let week = DateRange::week_of(monday());
        let busy = user_with_capacity(40.0);
        let idle = user_with_capacity(40.0);
        let tasks = vec![task(busy.id, Some(monday()), 44.0, TaskStatus::Todo)];
        let members = vec![
            compute_user_capacity(&busy, &week, &tasks, &[]),
            compute_user_capacity(&idle, &week, &tasks, &[]),
        ];

        let info = summarize_team(&team, &week, members);
        assert_eq!(info.total_capacity_hours, 80.0);
        assert_eq!(info.total_load_hours, 44.0);
        assert_eq!(info.utilization_percent, Some(55.0));
        assert_eq!(info.status, CapacityStatus::Optimal);
        assert_eq!(info.status_counts.overloaded, 1);
        assert_eq!(info.status_counts.underutilized, 1);
        assert_eq!(info.members_with_status(CapacityStatus::Overloaded).count(), 1);
    }

    #[tokio::test]
    async fn service_reads_from_database() {
        let db = DBService::new_in_memory().await.unwrap();
        let team = Team::create(
            &db.pool,
            &CreateTeam {
                name: "Field".into(),
                description: None,
                lead_id: None,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        let rep = User::create(
            &db.pool,
            &CreateUser {
                email: "field@example.com".into(),
                name: "Field Rep".into(),
                password: String::new(),
                role: None,
                team_id: Some(team.id),
                weekly_capacity_hours: Some(10.0),
            },
            Uuid::new_v4(),
            "hash",
            40.0,
        )
        .await
        .unwrap();

        let due = monday() + Duration::days(2);
        Task::create(
            &db.pool,
            &CreateTask {
                title: "Prepare proposal".into(),
                description: None,
                status: None,
                priority: None,
                due_date: Some(due),
                estimated_hours: Some(6.0),
                assignee_id: None,
                customer_id: None,
                deal_id: None,
            },
            Uuid::new_v4(),
            rep.id,
            rep.id,
        )
        .await
        .unwrap();
        Activity::create(
            &db.pool,
            &CreateActivity {
                activity_type: ActivityType::Call,
                customer_id: None,
                company_id: None,
                deal_id: None,
                description: "Discovery".into(),
                occurred_at: Some(monday() + Duration::days(8)),
                duration_minutes: Some(120),
            },
            Uuid::new_v4(),
            rep.id,
            None,
        )
        .await
        .unwrap();

        let info = CapacityService::user_capacity_info(&db.pool, &rep, due).await.unwrap();
        assert_eq!(info.week_start, monday());
        assert_eq!(info.load_hours, 6.0);
        assert_eq!(info.status, CapacityStatus::Optimal);

        let team_info = CapacityService::team_capacity_info(&db.pool, &team, monday()).await.unwrap();
        assert_eq!(team_info.members.len(), 1);
        assert_eq!(team_info.utilization_percent, Some(60.0));

        let range = DateRange::new(monday(), monday() + Duration::days(14)).unwrap();
        let forecast = CapacityService::user_capacity_forecast(&db.pool, &rep, &range)
            .await
            .unwrap();
        assert_eq!(forecast.len(), 2);
        assert_eq!(forecast[0].task_hours, 6.0);
        assert_eq!(forecast[1].activity_hours, 2.0);
        assert_eq!(forecast[1].status, CapacityStatus::Underutilized);

        let too_long = DateRange::new(monday(), monday() + Duration::weeks(40)).unwrap();
        assert!(matches!(
            CapacityService::user_capacity_forecast(&db.pool, &rep, &too_long).await,
            Err(CapacityError::RangeTooLong(_))
        ));
    }
}

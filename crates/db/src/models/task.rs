use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use utils::date_range::DateRange;
use uuid::Uuid;

use crate::scope::{Scope, push_range};

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
    Cancelled,
}

impl TaskStatus {
    /// Open tasks still count towards a user's workload
    pub fn is_open(&self) -> bool {
        matches!(self, TaskStatus::Todo | TaskStatus::InProgress)
    }
}

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "task_priority", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    pub estimated_hours: f64,
    pub assignee_id: Uuid,
    pub customer_id: Option<Uuid>,
    pub deal_id: Option<Uuid>,
    pub completed_at: Option<DateTime<Utc>>, // Set while status is done
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn with_status(mut self, status: TaskStatus, now: DateTime<Utc>) -> Self {
        if self.status == status {
            return self;
        }
        self.completed_at = (status == TaskStatus::Done).then_some(now);
        self.status = status;
        self
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status.is_open() && self.due_date.is_some_and(|due| due < now)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateTask {
    pub title: String,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<DateTime<Utc>>,
    pub estimated_hours: Option<f64>,
    pub assignee_id: Option<Uuid>, // Defaults to the creating user
    pub customer_id: Option<Uuid>,
    pub deal_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateTask {
    pub title: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[ts(optional, as = "Option<String>")]
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[ts(optional, as = "Option<DateTime<Utc>>")]
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub estimated_hours: Option<f64>,
    pub assignee_id: Option<Uuid>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[ts(optional, as = "Option<Uuid>")]
    pub customer_id: Option<Option<Uuid>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[ts(optional, as = "Option<Uuid>")]
    pub deal_id: Option<Option<Uuid>>,
}

impl UpdateTask {
    pub fn apply(&self, mut task: Task, now: DateTime<Utc>) -> Task {
        if let Some(status) = self.status {
            task = task.with_status(status, now);
        }
        if let Some(title) = &self.title {
            task.title = title.trim().to_string();
        }
        if let Some(description) = &self.description {
            task.description = description.clone();
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
        if let Some(hours) = self.estimated_hours {
            task.estimated_hours = hours;
        }
        if let Some(assignee_id) = self.assignee_id {
            task.assignee_id = assignee_id;
        }
        if let Some(customer_id) = self.customer_id {
            task.customer_id = customer_id;
        }
        if let Some(deal_id) = self.deal_id {
            task.deal_id = deal_id;
        }
        task
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct TaskFilters {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assignee_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub deal_id: Option<Uuid>,
}

impl Task {
    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Tasks assigned within `scope`, optionally limited to those due in `range`.
    pub async fn list(
        pool: &SqlitePool,
        scope: &Scope,
        filters: &TaskFilters,
        range: Option<&DateRange>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM tasks WHERE 1 = 1");
        scope.push_filter(&mut qb, "assignee_id");
        push_range(&mut qb, "due_date", range);
        if let Some(status) = filters.status {
            qb.push(" AND status = ").push_bind(status);
        }
        if let Some(priority) = filters.priority {
            qb.push(" AND priority = ").push_bind(priority);
        }
        if let Some(assignee_id) = filters.assignee_id {
            qb.push(" AND assignee_id = ").push_bind(assignee_id);
        }
        if let Some(customer_id) = filters.customer_id {
            qb.push(" AND customer_id = ").push_bind(customer_id);
        }
        if let Some(deal_id) = filters.deal_id {
            qb.push(" AND deal_id = ").push_bind(deal_id);
        }
        qb.push(" ORDER BY due_date IS NULL, due_date ASC, created_at DESC");
        qb.build_query_as::<Task>().fetch_all(pool).await
    }

    /// Open tasks whose due date has passed
    pub async fn find_overdue(
        pool: &SqlitePool,
        scope: &Scope,
        now: DateTime<Utc>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT * FROM tasks WHERE status IN ('todo', 'in_progress') AND due_date IS NOT NULL AND due_date < ",
        );
        qb.push_bind(now);
        scope.push_filter(&mut qb, "assignee_id");
        qb.push(" ORDER BY due_date ASC");
        qb.build_query_as::<Task>().fetch_all(pool).await
    }

    /// Open tasks due inside `range`, the task side of the capacity computation.
    pub async fn find_for_capacity(
        pool: &SqlitePool,
        scope: &Scope,
        range: &DateRange,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT * FROM tasks WHERE status IN ('todo', 'in_progress')",
        );
        scope.push_filter(&mut qb, "assignee_id");
        push_range(&mut qb, "due_date", Some(range));
        qb.build_query_as::<Task>().fetch_all(pool).await
    }

    pub async fn count_completed(
        pool: &SqlitePool,
        scope: &Scope,
        range: Option<&DateRange>,
    ) -> Result<i64, sqlx::Error> {
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT COUNT(*) FROM tasks WHERE status = 'done' AND completed_at IS NOT NULL",
        );
        scope.push_filter(&mut qb, "assignee_id");
        push_range(&mut qb, "completed_at", range);
        qb.build_query_scalar::<i64>().fetch_one(pool).await
    }

    pub async fn create(
        pool: &SqlitePool,
        data: &CreateTask,
        task_id: Uuid,
        assignee_id: Uuid,
        created_by: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let now = Utc::now();
        let status = data.status.unwrap_or_default();
        let completed_at = (status == TaskStatus::Done).then_some(now);
        sqlx::query_as::<_, Task>(
            r#"INSERT INTO tasks (id, title, description, status, priority, due_date, estimated_hours, assignee_id, customer_id, deal_id, completed_at, created_by, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13)
               RETURNING *"#,
        )
        .bind(task_id)
        .bind(data.title.trim())
        .bind(&data.description)
        .bind(status)
        .bind(data.priority.unwrap_or_default())
        .bind(data.due_date)
        .bind(data.estimated_hours.unwrap_or(0.0))
        .bind(assignee_id)
        .bind(data.customer_id)
        .bind(data.deal_id)
        .bind(completed_at)
        .bind(created_by)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    pub async fn update(pool: &SqlitePool, task: &Task) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Task>(
            r#"UPDATE tasks
               SET title = $2, description = $3, status = $4, priority = $5, due_date = $6, estimated_hours = $7,
                   assignee_id = $8, customer_id = $9, deal_id = $10, completed_at = $11, updated_at = $12
               WHERE id = $1
               RETURNING *"#,
        )
        .bind(task.id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status)
        .bind(task.priority)
        .bind(task.due_date)
        .bind(task.estimated_hours)
        .bind(task.assignee_id)
        .bind(task.customer_id)
        .bind(task.deal_id)
        .bind(task.completed_at)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

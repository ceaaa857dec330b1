use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, QueryBuilder, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use utils::date_range::DateRange;
use uuid::Uuid;

use crate::scope::{Scope, push_range};

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "call_outcome", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CallOutcome {
    #[default]
    Connected,
    Voicemail,
    NoAnswer,
    ScheduledFollowUp,
    ClosedDeal,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct CallNote {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub user_id: Uuid,
    pub deal_id: Option<Uuid>,
    pub subject: String,
    pub notes: String,
    pub outcome: CallOutcome,
    pub call_date: DateTime<Utc>,
    pub duration_minutes: i64,
    pub follow_up_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateCallNote {
    pub customer_id: Uuid,
    pub deal_id: Option<Uuid>,
    pub subject: String,
    pub notes: Option<String>,
    pub outcome: Option<CallOutcome>,
    pub call_date: Option<DateTime<Utc>>, // Defaults to now
    pub duration_minutes: Option<i64>,
    pub follow_up_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateCallNote {
    pub subject: Option<String>,
    pub notes: Option<String>,
    pub outcome: Option<CallOutcome>,
    pub call_date: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[ts(optional, as = "Option<Uuid>")]
    pub deal_id: Option<Option<Uuid>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[ts(optional, as = "Option<DateTime<Utc>>")]
    pub follow_up_date: Option<Option<DateTime<Utc>>>,
}

impl UpdateCallNote {
    pub fn apply(&self, mut note: CallNote) -> CallNote {
        if let Some(subject) = &self.subject {
            note.subject = subject.trim().to_string();
        }
        if let Some(notes) = &self.notes {
            note.notes = notes.clone();
        }
        if let Some(outcome) = self.outcome {
            note.outcome = outcome;
        }
        if let Some(call_date) = self.call_date {
            note.call_date = call_date;
        }
        if let Some(minutes) = self.duration_minutes {
            note.duration_minutes = minutes;
        }
        if let Some(deal_id) = self.deal_id {
            note.deal_id = deal_id;
        }
        if let Some(follow_up_date) = self.follow_up_date {
            note.follow_up_date = follow_up_date;
        }
        note
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct CallNoteFilters {
    pub customer_id: Option<Uuid>,
    pub deal_id: Option<Uuid>,
    pub outcome: Option<CallOutcome>,
}

impl CallNote {
    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, CallNote>("SELECT * FROM call_notes WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(
        pool: &SqlitePool,
        scope: &Scope,
        filters: &CallNoteFilters,
        range: Option<&DateRange>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM call_notes WHERE 1 = 1");
        scope.push_filter(&mut qb, "user_id");
        push_range(&mut qb, "call_date", range);
        if let Some(customer_id) = filters.customer_id {
            qb.push(" AND customer_id = ").push_bind(customer_id);
        }
        if let Some(deal_id) = filters.deal_id {
            qb.push(" AND deal_id = ").push_bind(deal_id);
        }
        if let Some(outcome) = filters.outcome {
            qb.push(" AND outcome = ").push_bind(outcome);
        }
        qb.push(" ORDER BY call_date DESC");
        qb.build_query_as::<CallNote>().fetch_all(pool).await
    }

    pub async fn create<'e, E>(
        executor: E,
        data: &CreateCallNote,
        call_note_id: Uuid,
        user_id: Uuid,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let now = Utc::now();
        sqlx::query_as::<_, CallNote>(
            r#"INSERT INTO call_notes (id, customer_id, user_id, deal_id, subject, notes, outcome, call_date, duration_minutes, follow_up_date, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
               RETURNING *"#,
        )
        .bind(call_note_id)
        .bind(data.customer_id)
        .bind(user_id)
        .bind(data.deal_id)
        .bind(data.subject.trim())
        .bind(data.notes.clone().unwrap_or_default())
        .bind(data.outcome.unwrap_or_default())
        .bind(data.call_date.unwrap_or(now))
        .bind(data.duration_minutes.unwrap_or(0))
        .bind(data.follow_up_date)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    pub async fn update<'e, E>(executor: E, note: &CallNote) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, CallNote>(
            r#"UPDATE call_notes
               SET deal_id = $2, subject = $3, notes = $4, outcome = $5, call_date = $6, duration_minutes = $7,
                   follow_up_date = $8, updated_at = $9
               WHERE id = $1
               RETURNING *"#,
        )
        .bind(note.id)
        .bind(note.deal_id)
        .bind(&note.subject)
        .bind(&note.notes)
        .bind(note.outcome)
        .bind(note.call_date)
        .bind(note.duration_minutes)
        .bind(note.follow_up_date)
        .bind(Utc::now())
        .fetch_one(executor)
        .await
    }

    /// Deleting a note cascades to the activity recorded with it.
    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM call_notes WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        activity::{Activity, ActivityFilters, ActivityType, CreateActivity},
        customer::{CreateCustomer, Customer},
        test_support,
        user::UserRole,
    };

    #[tokio::test]
    async fn note_and_activity_share_a_transaction() {
        let db = test_support::db().await;
        let rep = test_support::user(&db, "rep@example.com", UserRole::SalesAgent).await;
        let customer = Customer::create(
            &db.pool,
            &CreateCustomer {
                first_name: "Linus".into(),
                last_name: "T".into(),
                email: None,
                phone: None,
                company_id: None,
                owner_id: None,
                status: None,
            },
            Uuid::new_v4(),
            rep.id,
        )
        .await
        .unwrap();

        let data = CreateCallNote {
            customer_id: customer.id,
            deal_id: None,
            subject: "Intro".into(),
            notes: Some("Interested in Q3".into()),
            outcome: Some(CallOutcome::ScheduledFollowUp),
            call_date: None,
            duration_minutes: Some(45),
            follow_up_date: None,
        };

        let mut tx = db.pool.begin().await.unwrap();
        let note = CallNote::create(&mut *tx, &data, Uuid::new_v4(), rep.id).await.unwrap();
        Activity::create(&mut *tx, &CreateActivity::from_call_note(&note), Uuid::new_v4(), rep.id, Some(note.id))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let activities = Activity::list(&db.pool, &Scope::All, &ActivityFilters::default(), None)
            .await
            .unwrap();
        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].activity_type, ActivityType::Call);
        assert_eq!(activities[0].duration_minutes, 45);
        assert_eq!(activities[0].description, "Call: Intro");

        let patch = UpdateCallNote {
            subject: Some("Intro call".into()),
            duration_minutes: Some(50),
            ..Default::default()
        };
        let updated = CallNote::update(&db.pool, &patch.apply(note.clone())).await.unwrap();
        assert_eq!(Activity::sync_with_call_note(&db.pool, &updated).await.unwrap(), 1);
        let synced = Activity::find_by_id(&db.pool, activities[0].id).await.unwrap().unwrap();
        assert_eq!(synced.description, "Call: Intro call");
        assert_eq!(synced.duration_minutes, 50);

        CallNote::delete(&db.pool, note.id).await.unwrap();
        assert!(Activity::find_by_id(&db.pool, activities[0].id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rolled_back_note_leaves_nothing() {
        let db = test_support::db().await;
        let rep = test_support::user(&db, "rep@example.com", UserRole::SalesAgent).await;
        let data = CreateCallNote {
            customer_id: Uuid::new_v4(), // no such customer
            deal_id: None,
            subject: "Ghost".into(),
            notes: None,
            outcome: None,
            call_date: None,
            duration_minutes: None,
            follow_up_date: None,
        };
        let mut tx = db.pool.begin().await.unwrap();
        assert!(CallNote::create(&mut *tx, &data, Uuid::new_v4(), rep.id).await.is_err());
        tx.rollback().await.unwrap();

        let notes = CallNote::list(&db.pool, &Scope::All, &CallNoteFilters::default(), None)
            .await
            .unwrap();
        assert!(notes.is_empty());
    }
}

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
#[sqlx(type_name = "customer_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CustomerStatus {
    #[default]
    Lead,
    Active,
    Inactive,
    Churned,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Customer {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company_id: Option<Uuid>,
    pub owner_id: Uuid,
    pub status: CustomerStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateCustomer {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company_id: Option<Uuid>,
    pub owner_id: Option<Uuid>,
    pub status: Option<CustomerStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateCustomer {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[ts(optional, as = "Option<String>")]
    pub email: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[ts(optional, as = "Option<String>")]
    pub phone: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[ts(optional, as = "Option<Uuid>")]
    pub company_id: Option<Option<Uuid>>,
    pub owner_id: Option<Uuid>,
    pub status: Option<CustomerStatus>,
}

impl UpdateCustomer {
    pub fn apply(&self, mut customer: Customer) -> Customer {
        if let Some(first_name) = &self.first_name {
            customer.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = &self.last_name {
            customer.last_name = last_name.trim().to_string();
        }
        if let Some(email) = &self.email {
            customer.email = email.as_ref().map(|e| e.trim().to_lowercase());
        }
        if let Some(phone) = &self.phone {
            customer.phone = phone.clone();
        }
        if let Some(company_id) = self.company_id {
            customer.company_id = company_id;
        }
        if let Some(owner_id) = self.owner_id {
            customer.owner_id = owner_id;
        }
        if let Some(status) = self.status {
            customer.status = status;
        }
        customer
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct CustomerFilters {
    pub status: Option<CustomerStatus>,
    pub company_id: Option<Uuid>,
    pub search: Option<String>,
}

impl Customer {
    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List customers visible in `scope`, optionally limited to those created in `range`.
    pub async fn list(
        pool: &SqlitePool,
        scope: &Scope,
        filters: &CustomerFilters,
        range: Option<&DateRange>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM customers WHERE 1 = 1");
        scope.push_filter(&mut qb, "owner_id");
        push_range(&mut qb, "created_at", range);
        if let Some(status) = filters.status {
            qb.push(" AND status = ").push_bind(status);
        }
        if let Some(company_id) = filters.company_id {
            qb.push(" AND company_id = ").push_bind(company_id);
        }
        if let Some(term) = filters.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{term}%");
            qb.push(" AND (first_name LIKE ")
                .push_bind(pattern.clone())
                .push(" OR last_name LIKE ")
                .push_bind(pattern.clone())
                .push(" OR email LIKE ")
                .push_bind(pattern)
                .push(")");
        }
        qb.push(" ORDER BY last_name ASC, first_name ASC");
        qb.build_query_as::<Customer>().fetch_all(pool).await
    }

    pub async fn count_created(
        pool: &SqlitePool,
        scope: &Scope,
        range: Option<&DateRange>,
    ) -> Result<i64, sqlx::Error> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM customers WHERE 1 = 1");
        scope.push_filter(&mut qb, "owner_id");
        push_range(&mut qb, "created_at", range);
        qb.build_query_scalar::<i64>().fetch_one(pool).await
    }

    pub async fn create(
        pool: &SqlitePool,
        data: &CreateCustomer,
        customer_id: Uuid,
        owner_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let now = Utc::now();
        sqlx::query_as::<_, Customer>(
            r#"INSERT INTO customers (id, first_name, last_name, email, phone, company_id, owner_id, status, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
               RETURNING *"#,
        )
        .bind(customer_id)
        .bind(data.first_name.trim())
        .bind(data.last_name.trim())
        .bind(data.email.as_ref().map(|e| e.trim().to_lowercase()))
        .bind(&data.phone)
        .bind(data.company_id)
        .bind(owner_id)
        .bind(data.status.unwrap_or_default())
        .bind(now)
        .fetch_one(pool)
        .await
    }

    pub async fn update(pool: &SqlitePool, customer: &Customer) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Customer>(
            r#"UPDATE customers
               SET first_name = $2, last_name = $3, email = $4, phone = $5, company_id = $6, owner_id = $7, status = $8, updated_at = $9
               WHERE id = $1
               RETURNING *"#,
        )
        .bind(customer.id)
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(customer.company_id)
        .bind(customer.owner_id)
        .bind(customer.status)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM customers WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::models::{test_support, user::UserRole};

    fn customer(first: &str, last: &str, status: Option<CustomerStatus>) -> CreateCustomer {
        CreateCustomer {
            first_name: first.into(),
            last_name: last.into(),
            email: Some(format!("{}@Example.com", first)),
            phone: None,
            company_id: None,
            owner_id: None,
            status,
        }
    }

    #[tokio::test]
    async fn filters_compose() {
        let db = test_support::db().await;
        let owner = test_support::user(&db, "owner@example.com", UserRole::SalesAgent).await;

        let grace = Customer::create(&db.pool, &customer("Grace", "Hopper", Some(CustomerStatus::Active)), Uuid::new_v4(), owner.id)
            .await
            .unwrap();
        assert_eq!(grace.email.as_deref(), Some("grace@example.com"));
        Customer::create(&db.pool, &customer("Alan", "Turing", None), Uuid::new_v4(), owner.id)
            .await
            .unwrap();

        let active = CustomerFilters {
            status: Some(CustomerStatus::Active),
            ..Default::default()
        };
        let found = Customer::list(&db.pool, &Scope::All, &active, None).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].full_name(), "Grace Hopper");

        let search = CustomerFilters {
            search: Some("tur".into()),
            ..Default::default()
        };
        let found = Customer::list(&db.pool, &Scope::All, &search, None).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].status, CustomerStatus::Lead);

        let nobody = Scope::single(Uuid::new_v4());
        assert!(Customer::list(&db.pool, &nobody, &CustomerFilters::default(), None)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn count_created_in_range() {
        let db = test_support::db().await;
        let owner = test_support::user(&db, "owner@example.com", UserRole::SalesAgent).await;
        Customer::create(&db.pool, &customer("Ken", "Thompson", None), Uuid::new_v4(), owner.id)
            .await
            .unwrap();

        let now = Utc::now();
        let recent = DateRange::new(now - Duration::hours(1), now + Duration::hours(1)).unwrap();
        let old = DateRange::new(now - Duration::days(10), now - Duration::days(9)).unwrap();
        assert_eq!(Customer::count_created(&db.pool, &Scope::All, Some(&recent)).await.unwrap(), 1);
        assert_eq!(Customer::count_created(&db.pool, &Scope::All, Some(&old)).await.unwrap(), 0);
        assert_eq!(Customer::count_created(&db.pool, &Scope::All, None).await.unwrap(), 1);
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

use crate::scope::Scope;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    pub industry: Option<String>,
    pub website: Option<String>,
    pub size: Option<String>,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateCompany {
    pub name: String,
    pub industry: Option<String>,
    pub website: Option<String>,
    pub size: Option<String>,
    pub owner_id: Option<Uuid>, // Defaults to the creating user
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateCompany {
    pub name: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[ts(optional, as = "Option<String>")]
    pub industry: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[ts(optional, as = "Option<String>")]
    pub website: Option<Option<String>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[ts(optional, as = "Option<String>")]
    pub size: Option<Option<String>>,
    pub owner_id: Option<Uuid>,
}

impl UpdateCompany {
    pub fn apply(&self, mut company: Company) -> Company {
        if let Some(name) = &self.name {
            company.name = name.trim().to_string();
        }
        if let Some(industry) = &self.industry {
            company.industry = industry.clone();
        }
        if let Some(website) = &self.website {
            company.website = website.clone();
        }
        if let Some(size) = &self.size {
            company.size = size.clone();
        }
        if let Some(owner_id) = self.owner_id {
            company.owner_id = owner_id;
        }
        company
    }
}

impl Company {
    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(
        pool: &SqlitePool,
        scope: &Scope,
        search: Option<&str>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM companies WHERE 1 = 1");
        scope.push_filter(&mut qb, "owner_id");
        if let Some(term) = search.map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{term}%");
            qb.push(" AND (name LIKE ")
                .push_bind(pattern.clone())
                .push(" OR industry LIKE ")
                .push_bind(pattern)
                .push(")");
        }
        qb.push(" ORDER BY name ASC");
        qb.build_query_as::<Company>().fetch_all(pool).await
    }

    pub async fn create(
        pool: &SqlitePool,
        data: &CreateCompany,
        company_id: Uuid,
        owner_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let now = Utc::now();
        sqlx::query_as::<_, Company>(
            r#"INSERT INTO companies (id, name, industry, website, size, owner_id, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
               RETURNING *"#,
        )
        .bind(company_id)
        .bind(data.name.trim())
        .bind(&data.industry)
        .bind(&data.website)
        .bind(&data.size)
        .bind(owner_id)
        .bind(now)
        .fetch_one(pool)
        .await
    }

    pub async fn update(pool: &SqlitePool, company: &Company) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Company>(
            r#"UPDATE companies
               SET name = $2, industry = $3, website = $4, size = $5, owner_id = $6, updated_at = $7
               WHERE id = $1
               RETURNING *"#,
        )
        .bind(company.id)
        .bind(&company.name)
        .bind(&company.industry)
        .bind(&company.website)
        .bind(&company.size)
        .bind(company.owner_id)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM companies WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{test_support, user::UserRole};

    fn company(name: &str, industry: Option<&str>) -> CreateCompany {
        CreateCompany {
            name: name.into(),
            industry: industry.map(Into::into),
            website: None,
            size: None,
            owner_id: None,
        }
    }

    #[tokio::test]
    async fn list_respects_scope_and_search() {
        let db = test_support::db().await;
        let alice = test_support::user(&db, "alice@example.com", UserRole::SalesAgent).await;
        let bob = test_support::user(&db, "bob@example.com", UserRole::SalesAgent).await;

        Company::create(&db.pool, &company("Acme", Some("Manufacturing")), Uuid::new_v4(), alice.id)
            .await
            .unwrap();
        Company::create(&db.pool, &company("Globex", Some("Energy")), Uuid::new_v4(), bob.id)
            .await
            .unwrap();

        let all = Company::list(&db.pool, &Scope::All, None).await.unwrap();
        assert_eq!(all.len(), 2);

        let mine = Company::list(&db.pool, &Scope::single(alice.id), None).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].name, "Acme");

        let energy = Company::list(&db.pool, &Scope::All, Some("energ")).await.unwrap();
        assert_eq!(energy.len(), 1);
        assert_eq!(energy[0].name, "Globex");
    }

    #[tokio::test]
    async fn update_clears_optional_fields() {
        let db = test_support::db().await;
        let owner = test_support::user(&db, "o@example.com", UserRole::SalesAgent).await;
        let created = Company::create(&db.pool, &company("Initech", Some("Software")), Uuid::new_v4(), owner.id)
            .await
            .unwrap();

        let patch: UpdateCompany = serde_json::from_str(r#"{"industry": null, "website": "https://initech.example"}"#).unwrap();
        let updated = Company::update(&db.pool, &patch.apply(created)).await.unwrap();
        assert_eq!(updated.industry, None);
        assert_eq!(updated.website.as_deref(), Some("https://initech.example"));
    }
}

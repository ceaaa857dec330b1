pub mod activity;
pub mod call_note;
pub mod company;
pub mod customer;
pub mod deal;
pub mod task;
pub mod team;
pub mod team_insight;
pub mod user;

#[cfg(test)]
pub(crate) mod test_support {
    use uuid::Uuid;

    use super::user::{CreateUser, User, UserRole};
    use crate::DBService;

    pub async fn db() -> DBService {
        DBService::new_in_memory().await.unwrap()
    }

    pub async fn user(db: &DBService, email: &str, role: UserRole) -> User {
        let data = CreateUser {
            email: email.to_string(),
            name: email.split('@').next().unwrap_or(email).to_string(),
            password: "not-used-here".to_string(),
            role: Some(role),
            team_id: None,
            weekly_capacity_hours: None,
        };
        User::create(&db.pool, &data, Uuid::new_v4(), "hash", 40.0)
            .await
            .unwrap()
    }
}

//! Role based visibility.
//!
//! Admins see everything. A sales lead sees their own records plus those of
//! every active member of the teams they lead. A sales agent sees only their
//! own records.

pub use db::scope::Scope;
use db::models::{
    team::Team,
    user::{User, UserRole},
};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AuthorizationError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found")]
    NotFound,
}

/// The authenticated caller together with the owners they may see.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user: User,
    pub scope: Scope,
}

impl Actor {
    pub async fn resolve(pool: &SqlitePool, user: User) -> Result<Self, sqlx::Error> {
        let scope = resolve_scope(pool, &user).await?;
        Ok(Self { user, scope })
    }

    pub fn id(&self) -> Uuid {
        self.user.id
    }

    pub fn role(&self) -> UserRole {
        self.user.role
    }

    pub fn can_view(&self, owner_id: Uuid) -> bool {
        self.scope.includes(owner_id)
    }

    /// Reads outside the scope look like missing records.
    pub fn ensure_can_view(&self, owner_id: Uuid) -> Result<(), AuthorizationError> {
        if self.can_view(owner_id) {
            Ok(())
        } else {
            Err(AuthorizationError::NotFound)
        }
    }

    /// Writes to records owned outside the caller's scope are refused.
    pub fn ensure_can_modify(&self, owner_id: Uuid) -> Result<(), AuthorizationError> {
        if self.can_view(owner_id) {
            Ok(())
        } else {
            Err(AuthorizationError::Forbidden(
                "record belongs to a user outside your scope".to_string(),
            ))
        }
    }

    /// Records may only be handed to users inside the caller's scope.
    pub fn ensure_can_assign(&self, assignee_id: Uuid) -> Result<(), AuthorizationError> {
        if self.can_view(assignee_id) {
            Ok(())
        } else {
            Err(AuthorizationError::Forbidden(
                "cannot assign records to a user outside your scope".to_string(),
            ))
        }
    }

    pub fn ensure_role(&self, allowed: &[UserRole]) -> Result<(), AuthorizationError> {
        if allowed.contains(&self.user.role) {
            Ok(())
        } else {
            Err(AuthorizationError::Forbidden(format!(
                "role {} may not perform this action",
                self.user.role
            )))
        }
    }

    pub fn ensure_admin(&self) -> Result<(), AuthorizationError> {
        self.ensure_role(&[UserRole::Admin])
    }

    pub fn ensure_manager(&self) -> Result<(), AuthorizationError> {
        self.ensure_role(&[UserRole::Admin, UserRole::SalesLead])
    }

    /// Admins manage every team; a sales lead only the teams they lead.
    pub fn can_manage_team(&self, team: &Team) -> bool {
        match self.user.role {
            UserRole::Admin => true,
            UserRole::SalesLead => team.lead_id == Some(self.user.id),
            UserRole::SalesAgent => false,
        }
    }

    pub fn ensure_can_manage_team(&self, team: &Team) -> Result<(), AuthorizationError> {
        if self.can_manage_team(team) {
            Ok(())
        } else {
            Err(AuthorizationError::Forbidden(format!(
                "not allowed to manage team {}",
                team.name
            )))
        }
    }

    /// Team members may read team-level data about their own team.
    pub fn can_view_team(&self, team: &Team) -> bool {
        self.can_manage_team(team) || self.user.team_id == Some(team.id)
    }
}

pub async fn resolve_scope(pool: &SqlitePool, user: &User) -> Result<Scope, sqlx::Error> {
    let scope = match user.role {
        UserRole::Admin => Scope::All,
        UserRole::SalesAgent => Scope::single(user.id),
        UserRole::SalesLead => {
            let team_ids: Vec<Uuid> = Team::find_led_by(pool, user.id)
                .await?
                .into_iter()
                .map(|team| team.id)
                .collect();
            let mut ids = Team::member_ids(pool, &team_ids).await?;
            if !ids.contains(&user.id) {
                ids.push(user.id);
            }
            Scope::Users(ids)
        }
    };
    debug!(user_id = %user.id, role = %user.role, ?scope, "resolved scope");
    Ok(scope)
}

#[cfg(test)]
mod tests {
    use db::{
        DBService,
        models::{
            team::CreateTeam,
            user::{CreateUser, UpdateUser},
        },
    };

    use super::*;

    async fn user(db: &DBService, email: &str, role: UserRole, team_id: Option<Uuid>) -> User {
        let data = CreateUser {
            email: email.into(),
            name: email.into(),
            password: String::new(),
            role: Some(role),
            team_id,
            weekly_capacity_hours: None,
        };
        User::create(&db.pool, &data, Uuid::new_v4(), "hash", 40.0)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn scopes_follow_roles() {
        let db = DBService::new_in_memory().await.unwrap();
        let admin = user(&db, "admin@example.com", UserRole::Admin, None).await;
        let lead = user(&db, "lead@example.com", UserRole::SalesLead, None).await;
        let team = Team::create(
            &db.pool,
            &CreateTeam {
                name: "Enterprise".into(),
                description: None,
                lead_id: Some(lead.id),
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        let member = user(&db, "member@example.com", UserRole::SalesAgent, Some(team.id)).await;
        let outsider = user(&db, "outsider@example.com", UserRole::SalesAgent, None).await;

        assert_eq!(resolve_scope(&db.pool, &admin).await.unwrap(), Scope::All);

        let lead_scope = resolve_scope(&db.pool, &lead).await.unwrap();
        assert!(lead_scope.includes(lead.id));
        assert!(lead_scope.includes(member.id));
        assert!(!lead_scope.includes(outsider.id));

        let member_scope = resolve_scope(&db.pool, &member).await.unwrap();
        assert_eq!(member_scope, Scope::single(member.id));

        // A deactivated member's records stay with the lead
        User::deactivate(&db.pool, member.id).await.unwrap();
        let lead_scope = resolve_scope(&db.pool, &lead).await.unwrap();
        assert!(lead_scope.includes(member.id));

        // Moving the lead into their own team must not duplicate them
        let patch = UpdateUser {
            team_id: Some(Some(team.id)),
            ..Default::default()
        };
        let lead = User::update(&db.pool, &patch.apply(lead)).await.unwrap();
        match resolve_scope(&db.pool, &lead).await.unwrap() {
            Scope::Users(ids) => assert_eq!(ids.iter().filter(|id| **id == lead.id).count(), 1),
            Scope::All => panic!("lead must not see everything"),
        }
    }

    #[tokio::test]
    async fn team_management_rules() {
        let db = DBService::new_in_memory().await.unwrap();
        let lead = user(&db, "lead@example.com", UserRole::SalesLead, None).await;
        let other_lead = user(&db, "other@example.com", UserRole::SalesLead, None).await;
        let team = Team::create(
            &db.pool,
            &CreateTeam {
                name: "SMB".into(),
                description: None,
                lead_id: Some(lead.id),
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        let agent = user(&db, "agent@example.com", UserRole::SalesAgent, Some(team.id)).await;

        let lead_actor = Actor::resolve(&db.pool, lead).await.unwrap();
        let other_actor = Actor::resolve(&db.pool, other_lead).await.unwrap();
        let agent_actor = Actor::resolve(&db.pool, agent).await.unwrap();

        assert!(lead_actor.ensure_can_manage_team(&team).is_ok());
        assert!(other_actor.ensure_can_manage_team(&team).is_err());
        assert!(agent_actor.ensure_can_manage_team(&team).is_err());
        assert!(agent_actor.can_view_team(&team));
        assert!(!other_actor.can_view_team(&team));

        assert!(agent_actor.ensure_manager().is_err());
        assert!(lead_actor.ensure_manager().is_ok());
        assert!(lead_actor.ensure_admin().is_err());
        assert!(lead_actor.ensure_can_assign(agent_actor.id()).is_ok());
        assert!(agent_actor.ensure_can_modify(lead_actor.id()).is_err());
        assert!(matches!(
            agent_actor.ensure_can_view(lead_actor.id()),
            Err(AuthorizationError::NotFound)
        ));
        assert!(lead_actor.ensure_can_view(agent_actor.id()).is_ok());
    }
}

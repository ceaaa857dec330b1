//! Password hashing and signed session tokens.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Duration, Utc};
use db::models::user::{CreateUser, User, UserRole};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;
use uuid::Uuid;

use super::config::Config;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("missing or invalid session token")]
    InvalidToken,
    #[error("user account is inactive")]
    Inactive,
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

/// Claims carried in a session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: Uuid,
    pub role: UserRole,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct SessionToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct LoginResponse {
    pub user: User,
    pub session: SessionToken,
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!(error = %e, "stored password hash is malformed");
            false
        }
    }
}

#[derive(Clone)]
pub struct AuthService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl AuthService {
    pub fn new(secret: &[u8], ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl: Duration::hours(ttl_hours.clamp(1, Config::MAX_SESSION_TTL_HOURS)),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.session_secret.expose_secret().as_bytes(),
            config.session_ttl_hours,
        )
    }

    pub fn issue_token(&self, user: &User) -> Result<SessionToken, AuthError> {
        let now = Utc::now();
        let expires_at = now + self.ttl;
        let claims = SessionClaims {
            sub: user.id,
            role: user.role,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| {
                warn!(error = %e, "failed to sign session token");
                AuthError::InvalidToken
            })?;
        Ok(SessionToken { token, expires_at })
    }

    pub fn verify_token(&self, token: &str) -> Result<SessionClaims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        jsonwebtoken::decode::<SessionClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidToken)
    }

    /// Check credentials and issue a session. Unknown email, wrong password and
    /// inactive accounts are indistinguishable to the caller.
    pub async fn login(
        &self,
        pool: &SqlitePool,
        email: &str,
        password: &str,
    ) -> Result<LoginResponse, AuthError> {
        let user = User::find_by_email(pool, email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !user.is_active || !verify_password(password, &user.password_hash) {
            warn!(user_id = %user.id, "failed login attempt");
            return Err(AuthError::InvalidCredentials);
        }

        let session = self.issue_token(&user)?;
        info!(user_id = %user.id, role = %user.role, "user logged in");
        Ok(LoginResponse { user, session })
    }

    /// Resolve a bearer token to the active user it was issued for.
    pub async fn authenticate(&self, pool: &SqlitePool, token: &str) -> Result<User, AuthError> {
        let claims = self.verify_token(token)?;
        let user = User::find_by_id(pool, claims.sub)
            .await?
            .ok_or(AuthError::InvalidToken)?;
        if !user.is_active {
            return Err(AuthError::Inactive);
        }
        Ok(user)
    }
}

/// Create the first admin account when the user table is empty.
pub async fn bootstrap_admin(pool: &SqlitePool, config: &Config) -> Result<Option<User>, AuthError> {
    let Some(admin) = &config.bootstrap_admin else {
        return Ok(None);
    };
    if User::count(pool).await? > 0 {
        return Ok(None);
    }

    let password_hash = hash_password(admin.password.expose_secret())?;
    let data = CreateUser {
        email: admin.email.clone(),
        name: admin.name.clone(),
        password: String::new(),
        role: Some(UserRole::Admin),
        team_id: None,
        weekly_capacity_hours: None,
    };
    let user = User::create(
        pool,
        &data,
        Uuid::new_v4(),
        &password_hash,
        config.default_weekly_capacity_hours,
    )
    .await?;
    info!(user_id = %user.id, email = %user.email, "bootstrapped admin account");
    Ok(Some(user))
}

#[cfg(test)]
mod tests {
    use db::DBService;

    use super::*;

    async fn seeded(password: &str, active: bool) -> (DBService, User) {
        let db = DBService::new_in_memory().await.unwrap();
        let data = CreateUser {
            email: "rep@example.com".into(),
            name: "Rep".into(),
            password: password.into(),
            role: None,
            team_id: None,
            weekly_capacity_hours: None,
        };
        let hash = hash_password(password).unwrap();
        let mut user = User::create(&db.pool, &data, Uuid::new_v4(), &hash, 40.0)
            .await
            .unwrap();
        if !active {
            User::deactivate(&db.pool, user.id).await.unwrap();
            user.is_active = false;
        }
        (db, user)
    }

    #[test]
    fn hashes_verify_and_are_salted() {
        let first = hash_password("correct horse").unwrap();
        let second = hash_password("correct horse").unwrap();
        assert_ne!(first, second);
        assert!(verify_password("correct horse", &first));
        assert!(!verify_password("battery staple", &first));
        assert!(!verify_password("correct horse", "not-a-hash"));
    }

    #[test]
    fn tokens_are_bound_to_the_secret() {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: "a@b.c".into(),
            name: "A".into(),
            role: UserRole::SalesLead,
            team_id: None,
            password_hash: String::new(),
            weekly_capacity_hours: 40.0,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let auth = AuthService::new(b"one secret", 1);
        let session = auth.issue_token(&user).unwrap();
        let claims = auth.verify_token(&session.token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.role, UserRole::SalesLead);

        let other = AuthService::new(b"another secret", 1);
        assert!(matches!(other.verify_token(&session.token), Err(AuthError::InvalidToken)));
        assert!(matches!(auth.verify_token("garbage"), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn huge_ttl_is_capped_at_a_year() {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: "a@b.c".into(),
            name: "A".into(),
            role: UserRole::SalesAgent,
            team_id: None,
            password_hash: String::new(),
            weekly_capacity_hours: 40.0,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let auth = AuthService::new(b"secret", i64::MAX);
        let session = auth.issue_token(&user).unwrap();
        assert!(session.expires_at <= Utc::now() + Duration::hours(Config::MAX_SESSION_TTL_HOURS));
        assert!(session.expires_at > now + Duration::hours(Config::MAX_SESSION_TTL_HOURS - 1));
    }

    #[tokio::test]
    async fn login_round_trip() {
        let (db, user) = seeded("hunter2hunter2", true).await;
        let auth = AuthService::new(b"secret", 24);

        let response = auth.login(&db.pool, "REP@example.com", "hunter2hunter2").await.unwrap();
        assert_eq!(response.user.id, user.id);

        let resolved = auth.authenticate(&db.pool, &response.session.token).await.unwrap();
        assert_eq!(resolved.id, user.id);

        assert!(matches!(
            auth.login(&db.pool, "rep@example.com", "wrong-password").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login(&db.pool, "nobody@example.com", "hunter2hunter2").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn inactive_users_cannot_log_in() {
        let (db, _) = seeded("hunter2hunter2", false).await;
        let auth = AuthService::new(b"secret", 24);
        assert!(matches!(
            auth.login(&db.pool, "rep@example.com", "hunter2hunter2").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn bootstrap_only_runs_on_empty_database() {
        let db = DBService::new_in_memory().await.unwrap();
        let config = Config::from_lookup(|key| match key {
            "BOOTSTRAP_ADMIN_EMAIL" => Some("root@example.com".into()),
            "BOOTSTRAP_ADMIN_PASSWORD" => Some("changeme123".into()),
            "SESSION_SECRET" => Some("x".into()),
            _ => None,
        })
        .unwrap();

        let admin = bootstrap_admin(&db.pool, &config).await.unwrap().unwrap();
        assert_eq!(admin.role, UserRole::Admin);
        assert!(verify_password("changeme123", &admin.password_hash));
        assert!(bootstrap_admin(&db.pool, &config).await.unwrap().is_none());
    }
}

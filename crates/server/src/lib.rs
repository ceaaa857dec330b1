use std::sync::Arc;

use db::DBService;
use services::services::{auth::AuthService, config::Config, insights::InsightService};

pub mod error;
pub mod middleware;
pub mod routes;

/// Shared state handed to every route.
#[derive(Clone)]
pub struct AppState {
    db: DBService,
    config: Arc<Config>,
    auth: AuthService,
    insights: InsightService,
}

impl AppState {
    pub fn new(db: DBService, config: Config) -> Self {
        let auth = AuthService::from_config(&config);
        let insights = InsightService::from_config(db.pool.clone(), &config);
        Self {
            db,
            config: Arc::new(config),
            auth,
            insights,
        }
    }

    /// Replace the insight service, e.g. with a different generator.
    pub fn with_insights(mut self, insights: InsightService) -> Self {
        self.insights = insights;
        self
    }

    pub fn db(&self) -> &DBService {
        &self.db
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    pub fn insights(&self) -> &InsightService {
        &self.insights
    }
}

pub use routes::router;

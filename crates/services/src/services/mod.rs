pub mod auth;
pub mod authorization;
pub mod capacity;
pub mod claude_api;
pub mod config;
pub mod dashboard;
pub mod database_validator;
pub mod insights;
pub mod validation;

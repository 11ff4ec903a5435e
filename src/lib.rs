pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use crate::database::store::AssessmentStore;
use crate::services::{attempt_service::AttemptService, stats_service::StatsService};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn AssessmentStore>,
    pub attempt_service: AttemptService,
    pub stats_service: StatsService,
    pub jwt_secret: Arc<str>,
}

impl AppState {
    pub fn new(store: Arc<dyn AssessmentStore>, jwt_secret: impl Into<Arc<str>>) -> Self {
        let attempt_service = AttemptService::new(store.clone());
        let stats_service = StatsService::new(store.clone());

        Self {
            store,
            attempt_service,
            stats_service,
            jwt_secret: jwt_secret.into(),
        }
    }
}

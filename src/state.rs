use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::{cache::{Singleflight, SurveyCache}, config::Config, models::survey::Survey};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub cache: SurveyCache,
    /// Shared miss-collapsing group for the survey read path.
    pub flights: Arc<Singleflight<Survey>>,
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for SurveyCache {
    fn from_ref(state: &AppState) -> Self {
        state.cache.clone()
    }
}

impl FromRef<AppState> for Arc<Singleflight<Survey>> {
    fn from_ref(state: &AppState) -> Self {
        state.flights.clone()
    }
}

use crate::config::Config;
use crate::utils::templates::{self, Templates};
use axum::extract::FromRef;
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub templates: Templates,
}

impl AppState {
    /// Builds the shared state, compiling the page templates once.
    pub fn new(pool: PgPool, config: Config) -> Result<Self, minijinja::Error> {
        Ok(Self {
            pool,
            config,
            templates: templates::load()?,
        })
    }
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

impl FromRef<AppState> for Templates {
    fn from_ref(state: &AppState) -> Self {
        state.templates.clone()
    }
}

// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{config::Config, models::question_type::QuestionTypeRegistry, store::SurveyStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SurveyStore>,
    pub config: Config,
    /// Built once at startup; read-only afterwards.
    pub registry: Arc<QuestionTypeRegistry>,
}

impl AppState {
    pub fn new(store: Arc<dyn SurveyStore>, config: Config) -> Self {
        Self {
            store,
            config,
            registry: Arc::new(QuestionTypeRegistry::with_builtin()),
        }
    }
}

impl FromRef<AppState> for Arc<dyn SurveyStore> {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<QuestionTypeRegistry> {
    fn from_ref(state: &AppState) -> Self {
        state.registry.clone()
    }
}

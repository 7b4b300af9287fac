use crate::api::LLMApiProvider;
use std::sync::Arc;

// Shared state handed to every proxy request
#[derive(Clone)]
pub struct AppState {
    pub api_provider: Arc<dyn LLMApiProvider>,
}

impl AppState {
    pub fn new(api_provider: Arc<dyn LLMApiProvider>) -> Self {
        Self { api_provider }
    }
}

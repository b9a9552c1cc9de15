//! Handler types and shared dependencies.

use std::sync::Arc;

use crate::state::AppState;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub state: Arc<AppState>,
}

impl HandlerDeps {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }
}

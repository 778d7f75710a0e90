use std::sync::Arc;

use crate::config::Config;
use crate::reviews::ReviewService;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Owns the canonical review collection and its previews.
    pub reviews: Arc<ReviewService>,
    pub config: Config,
}

//! Shared state for the HTTP API.

use std::sync::Arc;
use std::time::Instant;

use crate::auth::AuthService;
use crate::qa::QaEngine;

/// State shared across all API handlers.
#[derive(Debug)]
pub struct ApiState {
    pub qa: Arc<QaEngine>,
    pub auth: AuthService,
    pub started_at: Instant,
}

impl ApiState {
    #[inline]
    pub fn new(qa: Arc<QaEngine>, auth: AuthService) -> Self {
        Self {
            qa,
            auth,
            started_at: Instant::now(),
        }
    }
}

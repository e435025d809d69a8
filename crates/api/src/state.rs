//! Shared application state.

use domain::{EngineContext, Engines};

/// Everything a handler needs, shared behind an `Arc`.
pub struct AppState {
    pub engines: Engines,
    /// Front-end origin payment redirects land on.
    pub client_url: String,
}

impl AppState {
    pub fn new(ctx: EngineContext, client_url: impl Into<String>) -> Self {
        Self {
            engines: Engines::new(ctx),
            client_url: client_url.into(),
        }
    }
}

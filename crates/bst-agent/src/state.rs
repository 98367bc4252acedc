//! Shared application state.

use std::sync::Arc;

use crate::engine::BstApp;

/// State shared across all request handlers and the collector task.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<Inner>,
}

struct Inner {
    app: BstApp,
}

impl AppState {
    pub fn new(app: BstApp) -> Self {
        Self {
            inner: Arc::new(Inner { app }),
        }
    }

    pub fn app(&self) -> &BstApp {
        &self.inner.app
    }
}

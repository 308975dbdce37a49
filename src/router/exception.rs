use std::sync::Arc;

use crate::error::{ApiError, ErrorKind};
use crate::response::HandlerResponse;

/// Custom translation of an error into a response. Returning `None` declines
/// the error and lets the next matching handler (or the default body) run.
pub type ExceptionHandlerFn = Arc<dyn Fn(&ApiError) -> Option<HandlerResponse> + Send + Sync>;

/// Registration-ordered `(kind, handler)` table.
///
/// Lookup walks the table in registration order; the first handler whose
/// kind matches the error (see [`ErrorKind::matches`]) and accepts it wins.
#[derive(Clone, Default)]
pub struct ExceptionHandlers {
    handlers: Vec<(ErrorKind, ExceptionHandlerFn)>,
}

impl ExceptionHandlers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, kind: ErrorKind, handler: F)
    where
        F: Fn(&ApiError) -> Option<HandlerResponse> + Send + Sync + 'static,
    {
        self.handlers.push((kind, Arc::new(handler)));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    #[must_use]
    pub fn handle(&self, err: &ApiError) -> Option<HandlerResponse> {
        self.handlers
            .iter()
            .filter(|(kind, _)| kind.matches(err))
            .find_map(|(_, handler)| handler(err))
    }
}

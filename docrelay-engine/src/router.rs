//! Picks an engine per action.

use crate::engine::{ProcessOutput, ProcessRequest, ProcessingEngine};
use crate::error::ProcessingError;
use docrelay_protocol::Action;
use tracing::debug;

/// Delegates each request to the first registered engine that supports it.
#[derive(Default)]
pub struct RoutingEngine {
    engines: Vec<Box<dyn ProcessingEngine>>,
}

impl RoutingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `engine` after those already present.
    pub fn with<E: ProcessingEngine + 'static>(mut self, engine: E) -> Self {
        self.engines.push(Box::new(engine));
        self
    }

    /// Name of the engine that would handle `action`.
    pub fn route(&self, action: Action) -> Option<&str> {
        self.select(action).map(|engine| engine.name())
    }

    fn select(&self, action: Action) -> Option<&dyn ProcessingEngine> {
        self.engines
            .iter()
            .find(|engine| engine.supports(action))
            .map(|engine| &**engine)
    }
}

impl std::fmt::Debug for RoutingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.engines.iter().map(|e| e.name()))
            .finish()
    }
}

impl ProcessingEngine for RoutingEngine {
    fn name(&self) -> &str {
        "router"
    }

    fn supports(&self, action: Action) -> bool {
        self.select(action).is_some()
    }

    fn process(&self, request: &ProcessRequest) -> Result<ProcessOutput, ProcessingError> {
        let engine = self
            .select(request.action)
            .ok_or(ProcessingError::Unsupported {
                action: request.action,
            })?;
        debug!(action = %request.action, engine = engine.name(), "routing request");
        engine.process(request)
    }
}

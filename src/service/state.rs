//! Service state management.

use std::sync::Arc;

use crate::dispatch::Dispatcher;

/// Shared service state.
///
/// Holds the dispatcher, which in turn owns the configuration and the
/// backends. Cloning is cheap.
#[derive(Clone)]
pub struct ServiceState {
    /// The request pipeline.
    pub dispatcher: Arc<Dispatcher>,
}

impl ServiceState {
    /// Wrap an initialized dispatcher.
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
        }
    }
}

impl From<Arc<Dispatcher>> for ServiceState {
    fn from(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }
}

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::collection::Collection;
use crate::transport::Transport;

/// Namespaces collection handles and caches them by name.
pub struct Database {
    name: String,
    transport: Arc<Transport>,
    collections: Mutex<HashMap<String, Collection>>,
}

impl Database {
    pub(crate) fn new(name: &str, transport: Arc<Transport>) -> Self {
        Self {
            name: name.to_string(),
            transport,
            collections: Mutex::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn collection(&self, name: &str) -> Collection {
        let mut collections = self
            .collections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        collections
            .entry(name.to_string())
            .or_insert_with(|| Collection::new(name, Arc::clone(&self.transport)))
            .clone()
    }
}

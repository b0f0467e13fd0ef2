//! Static loader registry
//!
//! Maps every [`LoaderKind`] to a constructor. The set of loaders is closed:
//! unknown names never reach this point because config validation rejects
//! them first.

use std::collections::HashMap;
use std::sync::Arc;

use super::{ModelAdapter, OllamaModel, OpenAiModel};
use crate::config::LoaderKind;

/// Builds a fresh, unloaded adapter
pub type LoaderConstructor = Arc<dyn Fn() -> Box<dyn ModelAdapter> + Send + Sync>;

/// Registry of model adapter constructors
#[derive(Clone)]
pub struct LoaderRegistry {
    constructors: HashMap<LoaderKind, LoaderConstructor>,
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LoaderRegistry {
    /// Registry with all built-in loaders
    pub fn new() -> Self {
        let mut constructors: HashMap<LoaderKind, LoaderConstructor> = HashMap::new();
        constructors.insert(LoaderKind::Ollama, Arc::new(|| Box::new(OllamaModel::new())));
        constructors.insert(LoaderKind::Openai, Arc::new(|| Box::new(OpenAiModel::new())));

        Self { constructors }
    }

    /// Replace the constructor for a loader
    pub fn with_loader<F>(mut self, kind: LoaderKind, constructor: F) -> Self
    where
        F: Fn() -> Box<dyn ModelAdapter> + Send + Sync + 'static,
    {
        self.constructors.insert(kind, Arc::new(constructor));
        self
    }

    /// Instantiate an unloaded adapter
    pub fn create(&self, kind: LoaderKind) -> Option<Box<dyn ModelAdapter>> {
        self.constructors.get(&kind).map(|build| build())
    }
}

// An explicit, owned map from stage name to constructor. The pipeline builder is
// given a registry instead of discovering stages through global state, so the set
// of available stages is visible at the call site and easy to swap in tests.

use crate::error::StageError;
use crate::stage::{InRangeStage, Stage};
use std::collections::HashMap;

pub type StageFactory = fn() -> Box<dyn Stage>;

#[derive(Default)]
pub struct StageRegistry {
    factories: HashMap<&'static str, StageFactory>,
}

impl StageRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every stage this crate provides.
    pub fn with_builtin_stages() -> Self {
        let mut registry = Self::new();
        registry.register(InRangeStage::NAME, InRangeStage::create);
        registry
    }

    /// Registers a factory, returning the one it replaced, if any.
    pub fn register(&mut self, name: &'static str, factory: StageFactory) -> Option<StageFactory> {
        self.factories.insert(name, factory)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Builds a fresh, unconfigured stage.
    pub fn create(&self, name: &str) -> Result<Box<dyn Stage>, StageError> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| StageError::UnknownStage(name.to_string()))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.factories.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_knows_inrange() {
        let registry = StageRegistry::with_builtin_stages();
        assert!(registry.contains("inrange"));
        assert_eq!(registry.names(), ["inrange"]);
        assert_eq!(registry.create("inrange").unwrap().name(), "inrange");
    }

    #[test]
    fn unknown_name_is_an_error() {
        let registry = StageRegistry::new();
        assert!(matches!(registry.create("inrange"), Err(StageError::UnknownStage(name)) if name == "inrange"));
    }

    #[test]
    fn register_replaces_existing_factory() {
        let mut registry = StageRegistry::with_builtin_stages();
        assert!(registry.register("inrange", InRangeStage::create).is_some());
        assert!(registry.register("inrange_copy", InRangeStage::create).is_none());
        assert_eq!(registry.names(), ["inrange", "inrange_copy"]);
    }
}

use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::error::ScenarioError;

use super::Scenario;
use super::builtins;

pub type ScenarioFactory = fn() -> Box<dyn Scenario>;

/// Name to factory map. Built once; read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct ScenarioRegistry {
    factories: BTreeMap<&'static str, (ScenarioFactory, &'static str)>,
}

impl ScenarioRegistry {
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::default();
        for factory in builtins::builtins() {
            if let Err(err) = registry.register(*factory) {
                tracing::warn!("Skipping duplicate builtin scenario: {}", err);
            }
        }
        registry
    }

    /// Registers a scenario under the name its instance reports.
    ///
    /// # Errors
    ///
    /// Returns an error when a scenario with the same name is already
    /// registered.
    pub fn register(&mut self, factory: ScenarioFactory) -> Result<(), String> {
        let scenario = factory();
        let name = scenario.name();
        if self.factories.contains_key(name) {
            return Err(format!("Scenario already registered: {}", name));
        }
        self.factories
            .insert(name, (factory, scenario.description()));
        Ok(())
    }

    /// Builds a fresh scenario instance.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::UnknownScenario`] listing the known names.
    pub fn create(&self, name: &str) -> Result<Box<dyn Scenario>, ScenarioError> {
        self.factories
            .get(name.trim())
            .map(|(factory, _)| factory())
            .ok_or_else(|| ScenarioError::UnknownScenario {
                name: name.to_owned(),
                available: self.names().join(", "),
            })
    }

    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    /// `(name, description)` pairs in name order.
    pub fn entries(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.factories
            .iter()
            .map(|(name, (_, description))| (*name, *description))
    }
}

#[must_use]
pub fn scenario_registry() -> &'static ScenarioRegistry {
    static REGISTRY: OnceLock<ScenarioRegistry> = OnceLock::new();
    REGISTRY.get_or_init(ScenarioRegistry::with_builtins)
}

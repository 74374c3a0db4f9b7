//! Input plugins and their registry.
//!
//! An [`Input`] gathers measurements into an [`Accumulator`] once per pass.
//! Inputs are made available through an [`InputRegistry`] that the hosting
//! application fills explicitly at startup (see [`crate::register_inputs`]).

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

use crate::collector::CollectError;
use crate::config::ConfigError;
use crate::metric::Accumulator;

/// A source of measurements driven by an external scheduler.
pub trait Input {
    /// Registry name of the input.
    fn name(&self) -> &'static str;

    /// One-line human readable description.
    fn description(&self) -> &'static str;

    /// Commented sample configuration snippet.
    fn sample_config(&self) -> &'static str;

    /// Applies the input's section of the configuration document.
    fn configure(&mut self, document: &Value) -> Result<(), ConfigError>;

    /// Runs one gather pass, pushing every measurement into `acc`.
    fn gather(&mut self, acc: &mut dyn Accumulator) -> Result<(), CollectError>;
}

/// Constructor stored in the registry.
pub type InputFactory = fn() -> Box<dyn Input>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("input '{0}' is already registered")]
    Duplicate(String),

    #[error("unknown input '{0}'")]
    Unknown(String),
}

/// Name to constructor mapping owned by the composition root.
#[derive(Default)]
pub struct InputRegistry {
    factories: BTreeMap<&'static str, InputFactory>,
}

impl InputRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a constructor under `name`. Names are unique.
    pub fn register(
        &mut self,
        name: &'static str,
        factory: InputFactory,
    ) -> Result<(), RegistryError> {
        if self.factories.contains_key(name) {
            return Err(RegistryError::Duplicate(name.to_string()));
        }
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Builds a fresh input instance.
    pub fn create(&self, name: &str) -> Result<Box<dyn Input>, RegistryError> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| RegistryError::Unknown(name.to_string()))
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}

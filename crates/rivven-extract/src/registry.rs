//! Driver registry
//!
//! Drivers are registered under string ids at process start and resolved by the
//! extractor when it is configured.
//!
//! ```rust,ignore
//! use rivven_extract::prelude::*;
//! use std::sync::Arc;
//!
//! let mut drivers = DriverRegistry::with_defaults();
//! drivers.register("warehouse", Arc::new(MyWarehouseDriver));
//!
//! let extractor = RdbcExtractor::new(Arc::new(drivers));
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::connection::Driver;
use crate::error::{Error, Result};

/// Registry of available source drivers, keyed by lower-cased id
#[derive(Default, Clone)]
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn Driver>>,
}

impl DriverRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in network drivers.
    ///
    /// The memory driver is not included; register it with its database explicitly.
    #[allow(unused_mut)]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        #[cfg(feature = "postgres")]
        {
            let pg: Arc<dyn Driver> = Arc::new(crate::postgres::PgDriver);
            registry.register("postgres", Arc::clone(&pg));
            registry.register("postgresql", pg);
        }

        registry
    }

    /// Register a driver, replacing any previous driver with the same id
    pub fn register(&mut self, id: impl AsRef<str>, driver: Arc<dyn Driver>) {
        self.drivers.insert(id.as_ref().to_ascii_lowercase(), driver);
    }

    /// Resolve a driver by id (case-insensitive)
    pub fn resolve(&self, id: &str) -> Result<Arc<dyn Driver>> {
        self.drivers
            .get(&id.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| Error::config(format!("driver '{}' not found", id)))
    }

    /// Whether a driver is registered under this id
    pub fn contains(&self, id: &str) -> bool {
        self.drivers.contains_key(&id.to_ascii_lowercase())
    }

    /// Registered ids, sorted
    pub fn driver_ids(&self) -> Vec<&str> {
        let mut ids: Vec<_> = self.drivers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("drivers", &self.driver_ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;

    #[test]
    fn test_resolution_is_case_insensitive() {
        let mut registry = DriverRegistry::new();
        registry.register("Memory", Arc::new(crate::memory::MemoryDriver::default()));
        assert!(registry.contains("memory"));
        assert!(registry.contains("MEMORY"));
        assert_eq!(registry.resolve("mEmOrY").unwrap().name(), "memory");
    }

    #[test]
    fn test_defaults_exclude_memory() {
        let registry = DriverRegistry::with_defaults();
        assert!(!registry.contains("memory"));
        let err = registry.resolve("memory").err().unwrap();
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }

    #[test]
    fn test_unknown_driver_is_configuration_error() {
        let registry = DriverRegistry::new();
        let err = registry.resolve("oracle").err().unwrap();
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert!(err.to_string().contains("oracle"));
    }
}

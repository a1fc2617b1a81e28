//! Registry of index types (index providers) known to a host engine.
//!
//! The registry is an explicit object owned by the host engine, not a process
//! global: two engines in one process can expose different index types.
//!
//! # Thread Safety
//!
//! The registry uses a `RwLock` to ensure thread-safe access, allowing multiple concurrent
//! readers while ensuring exclusive access during registration.

use std::sync::{Arc, RwLock};

use hashdex_common::{Result, error::Error};

use crate::IndexType;

#[derive(Default)]
pub struct IndexTypeRegistry {
    types: RwLock<ahash::HashMap<String, Arc<dyn IndexType>>>,
}

impl IndexTypeRegistry {
    pub fn new() -> IndexTypeRegistry {
        Default::default()
    }

    /// Registers an index type under its [`IndexType::name`], replacing any
    /// type previously registered under that name.
    pub fn add(&self, index_type: impl Into<Arc<dyn IndexType>>) -> Result<()> {
        let index_type = index_type.into();
        let name = index_type.name().to_string();
        self.types
            .write()
            .map_err(|_| Error::invalid_operation("index type registry: lock poisoned"))?
            .insert(name, index_type);
        Ok(())
    }

    /// Retrieves an index type by name.
    ///
    /// # Errors
    ///
    /// Returns an `Error::invalid_arg` if no index type with the specified name is registered.
    pub fn get(&self, name: impl AsRef<str>) -> Result<Arc<dyn IndexType>> {
        let name = name.as_ref();
        let index_type = self
            .types
            .read()
            .map_err(|_| Error::invalid_operation("index type registry: lock poisoned"))?
            .get(name)
            .cloned();
        index_type.ok_or_else(|| {
            Error::invalid_arg("index name", format!("Index provider '{name}' not found"))
        })
    }

    /// Names of all registered index types, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names = self
            .types
            .read()
            .map(|types| types.keys().cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Capabilities, QueryKind};

    struct TestIndexType(Capabilities);

    impl IndexType for TestIndexType {
        fn name(&self) -> &str {
            "test-index"
        }

        fn capabilities(&self) -> &Capabilities {
            &self.0
        }
    }

    #[test]
    fn test_registry_add_get() {
        let registry = IndexTypeRegistry::new();
        assert!(registry.get("test-index").is_err());
        let index_type: Arc<dyn IndexType> =
            Arc::new(TestIndexType(Capabilities::new([QueryKind::Equal], 10)));
        registry.add(index_type).unwrap();
        let found = registry.get("test-index").unwrap();
        assert!(found.capabilities().supports(QueryKind::Equal));
        assert!(!found.capabilities().supports(QueryKind::Has));
        assert_eq!(registry.names(), vec!["test-index".to_string()]);

        // Separate registries do not share state.
        assert!(IndexTypeRegistry::new().get("test-index").is_err());
    }
}

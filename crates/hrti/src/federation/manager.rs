// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hrti-team

//! Cross-federation state: the registry and the handle counter.
//!
//! Everything process-wide lives in an [`RtiContext`] value the host
//! builds once and passes explicitly; there are no ambient singletons.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::RtiConfig;
use crate::model::{FederationHandle, ObjectModel};
use crate::{Result, RtiError};

use super::Federation;

/// Registry of active federations, by name and by handle.
pub struct FederationManager {
    config: RtiConfig,
    handle_counter: AtomicU16,
    federations: RwLock<Registry>,
}

#[derive(Default)]
struct Registry {
    by_name: HashMap<String, Arc<Federation>>,
    by_handle: HashMap<FederationHandle, Arc<Federation>>,
}

impl FederationManager {
    pub fn new(config: RtiConfig) -> Self {
        Self {
            config,
            handle_counter: AtomicU16::new(0),
            federations: RwLock::new(Registry::default()),
        }
    }

    pub fn contains_federation(&self, name: &str) -> bool {
        self.federations.read().by_name.contains_key(name)
    }

    pub fn federation_named(&self, name: &str) -> Option<Arc<Federation>> {
        self.federations.read().by_name.get(name).cloned()
    }

    pub fn federation(&self, handle: FederationHandle) -> Option<Arc<Federation>> {
        self.federations.read().by_handle.get(&handle).cloned()
    }

    pub fn active_federations(&self) -> Vec<Arc<Federation>> {
        self.federations.read().by_handle.values().cloned().collect()
    }

    /// Create a federation and start its outgoing processor.
    ///
    /// Federation handles travel in a 4-bit header field, so at most 15
    /// federations can be live at once.
    pub fn create_federation(&self, name: &str, fom: ObjectModel) -> Result<Arc<Federation>> {
        let mut registry = self.federations.write();
        if registry.by_name.contains_key(name) {
            return Err(RtiError::AlreadyExists(format!("federation name: {}", name)));
        }

        let handle = self.handle_counter.fetch_add(1, Ordering::SeqCst) + 1;
        if handle > 0x0F {
            self.handle_counter.fetch_sub(1, Ordering::SeqCst);
            return Err(RtiError::internal(
                "federation handle space exhausted (15 concurrent federations)",
            ));
        }

        let federation = Federation::new(handle, name, fom, self.config.outgoing_queue_capacity());
        registry.by_name.insert(name.to_string(), Arc::clone(&federation));
        registry.by_handle.insert(handle, Arc::clone(&federation));
        federation.created_federation();
        log::info!(
            "[FederationManager::create_federation] created federation [{}] with handle {}",
            name,
            handle
        );
        Ok(federation)
    }

    /// Tear a federation down and remove it from the registry.
    pub fn destroy_federation(&self, name: &str) -> Result<()> {
        let mut registry = self.federations.write();
        let Some(federation) = registry.by_name.remove(name) else {
            return Err(RtiError::NotFound(format!("federation name: {}", name)));
        };
        if federation.federate_count() > 0 {
            // put it back; members must resign first
            registry.by_name.insert(name.to_string(), federation);
            return Err(RtiError::internal(format!(
                "federation [{}] still has joined federates",
                name
            )));
        }
        registry.by_handle.remove(&federation.handle());
        drop(registry);

        federation.destroyed_federation();
        log::info!(
            "[FederationManager::destroy_federation] destroyed federation [{}]",
            name
        );
        Ok(())
    }
}

/// Process-wide RTI state, passed explicitly to whoever needs it.
pub struct RtiContext {
    config: RtiConfig,
    federations: FederationManager,
}

impl RtiContext {
    pub fn new(config: RtiConfig) -> Self {
        Self {
            federations: FederationManager::new(config.clone()),
            config,
        }
    }

    pub fn config(&self) -> &RtiConfig {
        &self.config
    }

    pub fn federations(&self) -> &FederationManager {
        &self.federations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::federation::tests_support::dummy_connection;
    use crate::federation::Federate;
    use crate::model::ObjectModelBuilder;

    fn fom() -> ObjectModel {
        ObjectModelBuilder::new().object_class(1, "A", None).build()
    }

    #[test]
    fn test_create_and_lookup() {
        let manager = FederationManager::new(RtiConfig::default());
        let federation = manager.create_federation("alpha", fom()).unwrap();
        assert!(manager.contains_federation("alpha"));
        assert!(Arc::ptr_eq(
            &manager.federation_named("alpha").unwrap(),
            &federation
        ));
        assert!(Arc::ptr_eq(
            &manager.federation(federation.handle()).unwrap(),
            &federation
        ));
        manager.destroy_federation("alpha").unwrap();
        assert!(!manager.contains_federation("alpha"));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let manager = FederationManager::new(RtiConfig::default());
        manager.create_federation("alpha", fom()).unwrap();
        assert!(matches!(
            manager.create_federation("alpha", fom()),
            Err(RtiError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_destroy_unknown_fails() {
        let manager = FederationManager::new(RtiConfig::default());
        assert!(matches!(
            manager.destroy_federation("ghost"),
            Err(RtiError::NotFound(_))
        ));
    }

    #[test]
    fn test_destroy_with_members_refused() {
        let manager = FederationManager::new(RtiConfig::default());
        let federation = manager.create_federation("alpha", fom()).unwrap();
        federation
            .join_federate(Federate::new("one", "test", dummy_connection()))
            .unwrap();
        assert!(manager.destroy_federation("alpha").is_err());
        assert!(manager.contains_federation("alpha"));

        federation.resign_federate(1).unwrap();
        manager.destroy_federation("alpha").unwrap();
    }

    #[test]
    fn test_handles_are_sequential() {
        let manager = FederationManager::new(RtiConfig::default());
        let first = manager.create_federation("one", fom()).unwrap();
        let second = manager.create_federation("two", fom()).unwrap();
        assert_eq!(first.handle(), 1);
        assert_eq!(second.handle(), 2);
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hrti-team

//! One joined federation member.

use std::sync::Arc;

use crate::model::{FederateHandle, HlaVersion, NULL_HANDLE};
use crate::network::Connection;

/// A joined federate: identity plus the connection it arrived through.
///
/// Several federates in one process may share a single connection; the
/// federation tracks the distinct set separately.
#[derive(Clone)]
pub struct Federate {
    handle: FederateHandle,
    name: String,
    federate_type: String,
    hla_version: HlaVersion,
    connection: Arc<Connection>,
    /// Designators of FOM modules this federate contributed on join.
    fom_modules: Vec<String>,
}

impl Federate {
    pub fn new(name: &str, federate_type: &str, connection: Arc<Connection>) -> Self {
        Self {
            handle: NULL_HANDLE, // assigned by the federation on join
            name: name.to_string(),
            federate_type: federate_type.to_string(),
            hla_version: HlaVersion::default(),
            connection,
            fom_modules: Vec::new(),
        }
    }

    pub fn with_fom_modules(mut self, modules: Vec<String>) -> Self {
        self.fom_modules = modules;
        self
    }

    pub fn with_hla_version(mut self, hla_version: HlaVersion) -> Self {
        self.hla_version = hla_version;
        self
    }

    pub fn hla_version(&self) -> HlaVersion {
        self.hla_version
    }

    pub fn handle(&self) -> FederateHandle {
        self.handle
    }

    pub(crate) fn set_handle(&mut self, handle: FederateHandle) {
        self.handle = handle;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn federate_type(&self) -> &str {
        &self.federate_type
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    pub fn fom_modules(&self) -> &[String] {
        &self.fom_modules
    }
}

impl std::fmt::Debug for Federate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Federate")
            .field("handle", &self.handle)
            .field("name", &self.name)
            .field("type", &self.federate_type)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests_support::dummy_connection;
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let federate = Federate::new("gunner", "simulator", dummy_connection());
        assert_eq!(federate.handle(), NULL_HANDLE);
        assert_eq!(federate.name(), "gunner");
        assert_eq!(federate.federate_type(), "simulator");
        assert_eq!(federate.hla_version(), HlaVersion::Ieee1516e);
        assert!(federate.fom_modules().is_empty());
    }

    #[test]
    fn test_builder_extras() {
        let federate = Federate::new("gunner", "simulator", dummy_connection())
            .with_hla_version(HlaVersion::Hla13)
            .with_fom_modules(vec!["base.xml".to_string()]);
        assert_eq!(federate.hla_version(), HlaVersion::Hla13);
        assert_eq!(federate.fom_modules(), ["base.xml".to_string()]);
    }
}

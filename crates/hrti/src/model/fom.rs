// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hrti-team

//! The FOM metadata graph.
//!
//! A read-only description of everything a federation can talk about:
//! object classes with their attributes, interaction classes, routing
//! spaces and dimensions. Class inheritance is modelled with parent
//! handles into the same table, so walking an inheritance chain is a
//! series of map lookups rather than pointer chasing.
//!
//! Building a model happens once, before the federation exists, through
//! [`ObjectModelBuilder`]; afterwards the graph never changes (hot FOM
//! replacement is unsupported).

use std::collections::HashMap;

use super::handles::{
    AttributeHandle, ClassHandle, DimensionHandle, InteractionHandle, SpaceHandle, NULL_OBJECT,
};

/// An attribute declared on an object class.
#[derive(Debug, Clone)]
pub struct AttributeClass {
    handle: AttributeHandle,
    name: String,
    /// Routing space this attribute is associated with, if any.
    space: Option<SpaceHandle>,
}

impl AttributeClass {
    pub fn handle(&self) -> AttributeHandle {
        self.handle
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn space(&self) -> Option<SpaceHandle> {
        self.space
    }
}

/// An object class: named, optionally parented, carrying attributes.
///
/// Attributes are *not* inherited into this table; inheritance is resolved
/// by walking parents (see [`ObjectModel::object_class_attributes`]).
#[derive(Debug, Clone)]
pub struct ObjectClass {
    handle: ClassHandle,
    name: String,
    parent: Option<ClassHandle>,
    attributes: HashMap<AttributeHandle, AttributeClass>,
}

impl ObjectClass {
    pub fn handle(&self) -> ClassHandle {
        self.handle
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<ClassHandle> {
        self.parent
    }

    /// Attribute declared directly on this class (not on an ancestor).
    pub fn attribute(&self, handle: AttributeHandle) -> Option<&AttributeClass> {
        self.attributes.get(&handle)
    }

    pub fn has_attribute(&self, handle: AttributeHandle) -> bool {
        self.attributes.contains_key(&handle)
    }

    /// Handles of the attributes declared directly on this class.
    pub fn attribute_handles(&self) -> impl Iterator<Item = AttributeHandle> + '_ {
        self.attributes.keys().copied()
    }
}

/// An interaction class: named, optionally parented, optionally bound to a
/// routing space.
#[derive(Debug, Clone)]
pub struct InteractionClass {
    handle: InteractionHandle,
    name: String,
    parent: Option<InteractionHandle>,
    space: Option<SpaceHandle>,
}

impl InteractionClass {
    pub fn handle(&self) -> InteractionHandle {
        self.handle
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<InteractionHandle> {
        self.parent
    }

    pub fn space(&self) -> Option<SpaceHandle> {
        self.space
    }
}

/// A DDM routing space with its dimensions.
#[derive(Debug, Clone)]
pub struct Space {
    handle: SpaceHandle,
    name: String,
    dimensions: Vec<DimensionHandle>,
}

impl Space {
    pub fn handle(&self) -> SpaceHandle {
        self.handle
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dimensions(&self) -> &[DimensionHandle] {
        &self.dimensions
    }
}

/// The full read-only metadata graph for one federation.
#[derive(Debug, Clone, Default)]
pub struct ObjectModel {
    object_classes: HashMap<ClassHandle, ObjectClass>,
    interaction_classes: HashMap<InteractionHandle, InteractionClass>,
    spaces: HashMap<SpaceHandle, Space>,
}

impl ObjectModel {
    pub fn object_class(&self, handle: ClassHandle) -> Option<&ObjectClass> {
        if handle == NULL_OBJECT {
            return None;
        }
        self.object_classes.get(&handle)
    }

    pub fn interaction_class(&self, handle: InteractionHandle) -> Option<&InteractionClass> {
        if handle == NULL_OBJECT {
            return None;
        }
        self.interaction_classes.get(&handle)
    }

    pub fn space(&self, handle: SpaceHandle) -> Option<&Space> {
        self.spaces.get(&handle)
    }

    /// Walk the inheritance chain upwards from `handle`, yielding the class
    /// itself first, then each ancestor in order.
    pub fn object_class_ancestry(
        &self,
        handle: ClassHandle,
    ) -> impl Iterator<Item = &ObjectClass> + '_ {
        std::iter::successors(self.object_class(handle), move |current| {
            current.parent.and_then(|parent| self.object_class(parent))
        })
    }

    /// Walk the interaction inheritance chain, most specific first.
    pub fn interaction_class_ancestry(
        &self,
        handle: InteractionHandle,
    ) -> impl Iterator<Item = &InteractionClass> + '_ {
        std::iter::successors(self.interaction_class(handle), move |current| {
            current.parent.and_then(|parent| self.interaction_class(parent))
        })
    }

    /// Attribute lookup with inheritance: the class itself, then ancestors.
    pub fn resolve_attribute(
        &self,
        class: ClassHandle,
        attribute: AttributeHandle,
    ) -> Option<&AttributeClass> {
        self.object_class_ancestry(class)
            .find_map(|c| c.attribute(attribute))
    }

    /// All attribute handles visible on a class, inherited included.
    pub fn object_class_attributes(&self, class: ClassHandle) -> Vec<AttributeHandle> {
        let mut out = Vec::new();
        for c in self.object_class_ancestry(class) {
            out.extend(c.attribute_handles());
        }
        out.sort_unstable();
        out
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builds an [`ObjectModel`] one declaration at a time.
///
/// Handles are caller-assigned so that tests and FOM front-ends control the
/// numbering. Parent handles must already be declared when a child is added.
#[derive(Debug, Default)]
pub struct ObjectModelBuilder {
    model: ObjectModel,
}

impl ObjectModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a routing space with its dimensions.
    pub fn space(
        mut self,
        handle: SpaceHandle,
        name: &str,
        dimensions: &[DimensionHandle],
    ) -> Self {
        self.model.spaces.insert(
            handle,
            Space {
                handle,
                name: name.to_string(),
                dimensions: dimensions.to_vec(),
            },
        );
        self
    }

    /// Declare an object class. `parent` of `None` makes it a root.
    pub fn object_class(
        mut self,
        handle: ClassHandle,
        name: &str,
        parent: Option<ClassHandle>,
    ) -> Self {
        debug_assert!(
            parent.map_or(true, |p| self.model.object_classes.contains_key(&p)),
            "parent class must be declared first"
        );
        self.model.object_classes.insert(
            handle,
            ObjectClass {
                handle,
                name: name.to_string(),
                parent,
                attributes: HashMap::new(),
            },
        );
        self
    }

    /// Declare an attribute directly on an object class.
    pub fn attribute(
        mut self,
        class: ClassHandle,
        handle: AttributeHandle,
        name: &str,
        space: Option<SpaceHandle>,
    ) -> Self {
        let class = self
            .model
            .object_classes
            .get_mut(&class)
            .expect("attribute declared on unknown class");
        class.attributes.insert(
            handle,
            AttributeClass {
                handle,
                name: name.to_string(),
                space,
            },
        );
        self
    }

    /// Declare an interaction class.
    pub fn interaction_class(
        mut self,
        handle: InteractionHandle,
        name: &str,
        parent: Option<InteractionHandle>,
        space: Option<SpaceHandle>,
    ) -> Self {
        self.model.interaction_classes.insert(
            handle,
            InteractionClass {
                handle,
                name: name.to_string(),
                parent,
                space,
            },
        );
        self
    }

    pub fn build(self) -> ObjectModel {
        self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain_model() -> ObjectModel {
        // C1 <- C2 <- C3 with one attribute at each level
        ObjectModelBuilder::new()
            .object_class(1, "C1", None)
            .attribute(1, 11, "a1", None)
            .object_class(2, "C2", Some(1))
            .attribute(2, 12, "a2", None)
            .object_class(3, "C3", Some(2))
            .attribute(3, 13, "a3", None)
            .build()
    }

    #[test]
    fn test_ancestry_walk_most_specific_first() {
        let model = chain_model();
        let names: Vec<&str> = model.object_class_ancestry(3).map(|c| c.name()).collect();
        assert_eq!(names, vec!["C3", "C2", "C1"]);
    }

    #[test]
    fn test_ancestry_of_unknown_class_is_empty() {
        let model = chain_model();
        assert_eq!(model.object_class_ancestry(99).count(), 0);
    }

    #[test]
    fn test_attribute_resolution_inherits() {
        let model = chain_model();
        // a1 declared on C1, visible from C3
        assert!(model.resolve_attribute(3, 11).is_some());
        // a3 declared on C3, not visible from C1
        assert!(model.resolve_attribute(1, 13).is_none());
    }

    #[test]
    fn test_visible_attributes_include_inherited() {
        let model = chain_model();
        assert_eq!(model.object_class_attributes(3), vec![11, 12, 13]);
        assert_eq!(model.object_class_attributes(1), vec![11]);
    }

    #[test]
    fn test_interaction_ancestry() {
        let model = ObjectModelBuilder::new()
            .interaction_class(1, "I1", None, None)
            .interaction_class(2, "I2", Some(1), None)
            .build();
        let handles: Vec<u32> = model.interaction_class_ancestry(2).map(|c| c.handle()).collect();
        assert_eq!(handles, vec![2, 1]);
    }

    #[test]
    fn test_null_handle_resolves_to_nothing() {
        let model = chain_model();
        assert!(model.object_class(0).is_none());
        assert!(model.interaction_class(0).is_none());
    }
}

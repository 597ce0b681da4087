// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hrti-team

//! Publication and subscription interest, per federation.
//!
//! Four registries: published/subscribed object classes and
//! published/subscribed interaction classes. Registration is additive (a
//! second subscribe merges attributes and regions into the existing
//! entry); removal takes an explicit attribute set, where an empty set
//! means "the whole class".
//!
//! Discovery resolution follows HLA's inheritance rule: a federate
//! discovers an instance of class C as the *most specific class along C's
//! inheritance chain it is subscribed to*, or not at all. All the
//! `*_subscribed` predicates that are not marked "directly" walk the same
//! chain.
//!
//! Region filtering (DDM) is optional per entry: `None` means "default
//! region, match unconditionally"; a set of region tokens matches an
//! update iff any of them overlaps the update's region.
//!
//! Every public method takes the manager's lock once, so readers observe a
//! consistent snapshot per call and writers serialize per federation.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::model::{
    AttributeHandle, ClassHandle, FederateHandle, InteractionHandle, ObjectModel, Region,
    RegionStore, RegionToken,
};
use crate::saverestore::SaveRestoreTarget;
use crate::wire::{WireReader, WireWriter};
use crate::{Result, RtiError};

/// One federate's interest in an object class.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct OcEntry {
    attributes: BTreeSet<AttributeHandle>,
    /// `None` = no DDM, match unconditionally.
    regions: Option<BTreeSet<RegionToken>>,
}

/// Interest registry for one object class: federate -> entry.
#[derive(Debug, Clone, Default)]
struct OcInterest {
    entries: BTreeMap<FederateHandle, OcEntry>,
}

/// Interest registry for one interaction class: federate -> regions.
#[derive(Debug, Clone, Default)]
struct IcInterest {
    entries: BTreeMap<FederateHandle, Option<BTreeSet<RegionToken>>>,
}

#[derive(Debug, Default)]
struct Registries {
    published_objects: BTreeMap<ClassHandle, OcInterest>,
    subscribed_objects: BTreeMap<ClassHandle, OcInterest>,
    published_interactions: BTreeMap<InteractionHandle, IcInterest>,
    subscribed_interactions: BTreeMap<InteractionHandle, IcInterest>,
}

/// The per-federation interest manager.
pub struct InterestManager {
    fom: Arc<ObjectModel>,
    regions: Arc<RwLock<RegionStore>>,
    registries: RwLock<Registries>,
}

impl InterestManager {
    pub fn new(fom: Arc<ObjectModel>, regions: Arc<RwLock<RegionStore>>) -> Self {
        Self {
            fom,
            regions,
            registries: RwLock::new(Registries::default()),
        }
    }

    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------

    fn validate_object_class(
        &self,
        action: &str,
        class: ClassHandle,
        attributes: &BTreeSet<AttributeHandle>,
    ) -> Result<()> {
        let Some(metadata) = self.fom.object_class(class) else {
            return Err(RtiError::NotFound(format!(
                "{}: object class not defined: {}",
                action, class
            )));
        };
        for attribute in attributes {
            if self.fom.resolve_attribute(metadata.handle(), *attribute).is_none() {
                return Err(RtiError::NotFound(format!(
                    "{}: attribute [{}] not defined in object class [{}]",
                    action,
                    attribute,
                    metadata.name()
                )));
            }
        }
        Ok(())
    }

    /// A region may only filter attributes whose FOM-declared routing
    /// space is the region's space.
    fn validate_object_region(
        &self,
        action: &str,
        class: ClassHandle,
        attributes: &BTreeSet<AttributeHandle>,
        token: RegionToken,
    ) -> Result<()> {
        let regions = self.regions.read();
        let Some(region) = regions.get_region(token) else {
            return Err(RtiError::NotFound(format!("{}: region token {}", action, token)));
        };
        for attribute in attributes {
            let space = self
                .fom
                .resolve_attribute(class, *attribute)
                .and_then(|metadata| metadata.space());
            if space != Some(region.space()) {
                return Err(RtiError::InvalidRegionContext(format!(
                    "{}: attribute [{}] can't be associated with region [token:{}]: \
                     routing space not associated with attribute in FOM",
                    action, attribute, token
                )));
            }
        }
        Ok(())
    }

    fn validate_interaction_region(
        &self,
        action: &str,
        class: InteractionHandle,
        federate: FederateHandle,
        token: RegionToken,
    ) -> Result<()> {
        let regions = self.regions.read();
        let Some(region) = regions.get_region_created_by(token, federate) else {
            return Err(RtiError::NotFound(format!("{}: region token {}", action, token)));
        };
        let space = self
            .fom
            .interaction_class(class)
            .and_then(|metadata| metadata.space());
        if space != Some(region.space()) {
            return Err(RtiError::InvalidRegionContext(format!(
                "{}: the routing space for the region differs from the routing space \
                 associated with the interaction class in the FOM",
                action
            )));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Object class publication
    // ------------------------------------------------------------------

    pub fn publish_object_class(
        &self,
        federate: FederateHandle,
        class: ClassHandle,
        attributes: BTreeSet<AttributeHandle>,
    ) -> Result<()> {
        self.validate_object_class("PUBLISH-OBJECT", class, &attributes)?;
        let mut registries = self.registries.write();
        let entry = registries
            .published_objects
            .entry(class)
            .or_default()
            .entries
            .entry(federate)
            .or_default();
        entry.attributes.extend(attributes);
        Ok(())
    }

    /// Empty `attributes` removes the whole registration.
    pub fn unpublish_object_class(
        &self,
        federate: FederateHandle,
        class: ClassHandle,
        attributes: &BTreeSet<AttributeHandle>,
    ) -> Result<()> {
        self.validate_object_class("UNPUBLISH-OBJECT", class, &BTreeSet::new())?;
        let mut registries = self.registries.write();
        remove_oc_entry(
            &mut registries.published_objects,
            "UNPUBLISH-OBJECT",
            federate,
            class,
            attributes,
        )
    }

    pub fn get_published_attributes(
        &self,
        federate: FederateHandle,
        class: ClassHandle,
    ) -> Result<BTreeSet<AttributeHandle>> {
        let registries = self.registries.read();
        oc_attributes(&registries.published_objects, federate, class)
            .ok_or_else(|| no_registration("PUBLISH-OBJECT", class))
    }

    pub fn is_object_class_published(&self, federate: FederateHandle, class: ClassHandle) -> bool {
        let registries = self.registries.read();
        oc_has_interest(&registries.published_objects, federate, class)
    }

    pub fn is_attribute_class_published(
        &self,
        federate: FederateHandle,
        class: ClassHandle,
        attribute: AttributeHandle,
    ) -> bool {
        let registries = self.registries.read();
        oc_attributes(&registries.published_objects, federate, class)
            .is_some_and(|attributes| attributes.contains(&attribute))
    }

    /// Classes this federate publishes, for MOM-style reflection.
    pub fn get_all_published_object_classes(
        &self,
        federate: FederateHandle,
    ) -> BTreeSet<ClassHandle> {
        let registries = self.registries.read();
        collect_oc_classes(&registries.published_objects, federate)
    }

    // ------------------------------------------------------------------
    // Object class subscription
    // ------------------------------------------------------------------

    pub fn subscribe_object_class(
        &self,
        federate: FederateHandle,
        class: ClassHandle,
        attributes: BTreeSet<AttributeHandle>,
        region: Option<RegionToken>,
    ) -> Result<()> {
        self.validate_object_class("SUBSCRIBE-OBJECT", class, &attributes)?;
        if let Some(token) = region {
            self.validate_object_region("SUBSCRIBE-OBJECT-DDM", class, &attributes, token)?;
        }

        let mut registries = self.registries.write();
        let entry = registries
            .subscribed_objects
            .entry(class)
            .or_default()
            .entries
            .entry(federate)
            .or_default();
        entry.attributes.extend(attributes);
        if let Some(token) = region {
            entry.regions.get_or_insert_with(BTreeSet::new).insert(token);
        }
        Ok(())
    }

    /// Empty `attributes` removes the whole registration.
    pub fn unsubscribe_object_class(
        &self,
        federate: FederateHandle,
        class: ClassHandle,
        attributes: &BTreeSet<AttributeHandle>,
    ) -> Result<()> {
        self.validate_object_class("UNSUBSCRIBE-OBJECT", class, &BTreeSet::new())?;
        let mut registries = self.registries.write();
        remove_oc_entry(
            &mut registries.subscribed_objects,
            "UNSUBSCRIBE-OBJECT",
            federate,
            class,
            attributes,
        )
    }

    pub fn get_subscribed_attributes(
        &self,
        federate: FederateHandle,
        class: ClassHandle,
    ) -> Result<BTreeSet<AttributeHandle>> {
        let registries = self.registries.read();
        oc_attributes(&registries.subscribed_objects, federate, class)
            .ok_or_else(|| no_registration("SUBSCRIBE-OBJECT", class))
    }

    pub fn is_object_class_subscribed_directly(
        &self,
        federate: FederateHandle,
        class: ClassHandle,
    ) -> bool {
        let registries = self.registries.read();
        oc_has_interest(&registries.subscribed_objects, federate, class)
    }

    /// Subscription test with inheritance: true if the federate subscribes
    /// to `class` or any of its ancestors.
    pub fn is_object_class_subscribed(&self, federate: FederateHandle, class: ClassHandle) -> bool {
        let registries = self.registries.read();
        self.fom
            .object_class_ancestry(class)
            .any(|ancestor| oc_has_interest(&registries.subscribed_objects, federate, ancestor.handle()))
    }

    pub fn is_attribute_class_subscribed(
        &self,
        federate: FederateHandle,
        class: ClassHandle,
        attribute: AttributeHandle,
    ) -> bool {
        let registries = self.registries.read();
        oc_attributes(&registries.subscribed_objects, federate, class)
            .is_some_and(|attributes| attributes.contains(&attribute))
    }

    /// Classes this federate subscribes to directly.
    pub fn get_all_subscribed_object_classes(
        &self,
        federate: FederateHandle,
    ) -> BTreeSet<ClassHandle> {
        let registries = self.registries.read();
        collect_oc_classes(&registries.subscribed_objects, federate)
    }

    /// The HLA discovery rule: walk up from `class` and return the first
    /// class the federate subscribes to directly, or `None` if the chain
    /// runs out.
    pub fn get_discovery_type(
        &self,
        federate: FederateHandle,
        class: ClassHandle,
    ) -> Option<ClassHandle> {
        let registries = self.registries.read();
        self.fom
            .object_class_ancestry(class)
            .find(|candidate| {
                oc_has_interest(&registries.subscribed_objects, federate, candidate.handle())
            })
            .map(|candidate| candidate.handle())
    }

    /// Union of every federate interested in `class` or an ancestor.
    pub fn get_all_subscribers(&self, class: ClassHandle) -> BTreeSet<FederateHandle> {
        let registries = self.registries.read();
        let mut subscribers = BTreeSet::new();
        for ancestor in self.fom.object_class_ancestry(class) {
            if let Some(interest) = registries.subscribed_objects.get(&ancestor.handle()) {
                subscribers.extend(interest.entries.keys().copied());
            }
        }
        subscribers
    }

    /// Like [`Self::get_all_subscribers`], but also records the most
    /// specific subscribed class per federate (the class each one will
    /// discover instances as).
    pub fn get_all_subscribers_with_types(
        &self,
        class: ClassHandle,
    ) -> BTreeMap<FederateHandle, ClassHandle> {
        let registries = self.registries.read();
        let mut subscribers = BTreeMap::new();
        for ancestor in self.fom.object_class_ancestry(class) {
            if let Some(interest) = registries.subscribed_objects.get(&ancestor.handle()) {
                for federate in interest.entries.keys() {
                    subscribers.entry(*federate).or_insert_with(|| ancestor.handle());
                }
            }
        }
        subscribers
    }

    /// Does this federate's subscription to `class` match an update
    /// carrying `update_region`? Missing regions on either side match
    /// unconditionally; otherwise any overlapping subscription region is
    /// enough.
    pub fn subscription_matches_region(
        &self,
        federate: FederateHandle,
        class: ClassHandle,
        update_region: Option<&Region>,
    ) -> bool {
        let registries = self.registries.read();
        let Some(entry) = registries
            .subscribed_objects
            .get(&class)
            .and_then(|interest| interest.entries.get(&federate))
        else {
            return false;
        };
        let (Some(tokens), Some(update_region)) = (&entry.regions, update_region) else {
            return true;
        };
        let regions = self.regions.read();
        tokens
            .iter()
            .filter_map(|token| regions.get_region(*token))
            .any(|subscribed| subscribed.overlaps(update_region))
    }

    // ------------------------------------------------------------------
    // Interaction classes
    // ------------------------------------------------------------------

    pub fn publish_interaction_class(
        &self,
        federate: FederateHandle,
        class: InteractionHandle,
    ) -> Result<()> {
        self.require_interaction_class("PUBLISH-INTERACTION", class)?;
        let mut registries = self.registries.write();
        registries
            .published_interactions
            .entry(class)
            .or_default()
            .entries
            .entry(federate)
            .or_insert(None);
        Ok(())
    }

    pub fn unpublish_interaction_class(
        &self,
        federate: FederateHandle,
        class: InteractionHandle,
    ) -> Result<()> {
        self.require_interaction_class("UNPUBLISH-INTERACTION", class)?;
        let mut registries = self.registries.write();
        remove_ic_entry(
            &mut registries.published_interactions,
            "UNPUBLISH-INTERACTION",
            federate,
            class,
        )
    }

    pub fn is_interaction_class_published(
        &self,
        federate: FederateHandle,
        class: InteractionHandle,
    ) -> bool {
        let registries = self.registries.read();
        ic_has_interest(&registries.published_interactions, federate, class)
    }

    pub fn subscribe_interaction_class(
        &self,
        federate: FederateHandle,
        class: InteractionHandle,
        region: Option<RegionToken>,
    ) -> Result<()> {
        self.require_interaction_class("SUBSCRIBE-INTERACTION", class)?;
        if let Some(token) = region {
            self.validate_interaction_region("SUBSCRIBE-INTERACTION-DDM", class, federate, token)?;
        }

        let mut registries = self.registries.write();
        let entry = registries
            .subscribed_interactions
            .entry(class)
            .or_default()
            .entries
            .entry(federate)
            .or_insert(None);
        if let Some(token) = region {
            entry.get_or_insert_with(BTreeSet::new).insert(token);
        }
        Ok(())
    }

    pub fn unsubscribe_interaction_class(
        &self,
        federate: FederateHandle,
        class: InteractionHandle,
    ) -> Result<()> {
        self.require_interaction_class("UNSUBSCRIBE-INTERACTION", class)?;
        let mut registries = self.registries.write();
        remove_ic_entry(
            &mut registries.subscribed_interactions,
            "UNSUBSCRIBE-INTERACTION",
            federate,
            class,
        )
    }

    pub fn is_interaction_class_subscribed_directly(
        &self,
        federate: FederateHandle,
        class: InteractionHandle,
    ) -> bool {
        let registries = self.registries.read();
        ic_has_interest(&registries.subscribed_interactions, federate, class)
    }

    pub fn is_interaction_class_subscribed(
        &self,
        federate: FederateHandle,
        class: InteractionHandle,
    ) -> bool {
        let registries = self.registries.read();
        self.fom.interaction_class_ancestry(class).any(|ancestor| {
            ic_has_interest(&registries.subscribed_interactions, federate, ancestor.handle())
        })
    }

    /// Inheritance walk for interactions: the most specific subscribed
    /// class, or `None`.
    pub fn get_subscribed_interaction_type(
        &self,
        federate: FederateHandle,
        class: InteractionHandle,
    ) -> Option<InteractionHandle> {
        let registries = self.registries.read();
        self.fom
            .interaction_class_ancestry(class)
            .find(|candidate| {
                ic_has_interest(&registries.subscribed_interactions, federate, candidate.handle())
            })
            .map(|candidate| candidate.handle())
    }

    /// Union of every federate interested in `class` or an ancestor.
    pub fn get_all_interaction_subscribers(
        &self,
        class: InteractionHandle,
    ) -> BTreeSet<FederateHandle> {
        let registries = self.registries.read();
        let mut subscribers = BTreeSet::new();
        for ancestor in self.fom.interaction_class_ancestry(class) {
            if let Some(interest) = registries.subscribed_interactions.get(&ancestor.handle()) {
                subscribers.extend(interest.entries.keys().copied());
            }
        }
        subscribers
    }

    pub fn get_all_published_interaction_classes(
        &self,
        federate: FederateHandle,
    ) -> BTreeSet<InteractionHandle> {
        let registries = self.registries.read();
        collect_ic_classes(&registries.published_interactions, federate)
    }

    pub fn get_all_subscribed_interaction_classes(
        &self,
        federate: FederateHandle,
    ) -> BTreeSet<InteractionHandle> {
        let registries = self.registries.read();
        collect_ic_classes(&registries.subscribed_interactions, federate)
    }

    fn require_interaction_class(&self, action: &str, class: InteractionHandle) -> Result<()> {
        if self.fom.interaction_class(class).is_none() {
            return Err(RtiError::NotFound(format!(
                "{}: interaction class not defined: {}",
                action, class
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Registry helpers
// ============================================================================

fn no_registration(action: &str, class: u32) -> RtiError {
    RtiError::NotRegistered(format!(
        "{}: federate has no pub/sub interest in {}",
        action, class
    ))
}

fn oc_has_interest(
    map: &BTreeMap<ClassHandle, OcInterest>,
    federate: FederateHandle,
    class: ClassHandle,
) -> bool {
    map.get(&class)
        .is_some_and(|interest| interest.entries.contains_key(&federate))
}

fn oc_attributes(
    map: &BTreeMap<ClassHandle, OcInterest>,
    federate: FederateHandle,
    class: ClassHandle,
) -> Option<BTreeSet<AttributeHandle>> {
    map.get(&class)
        .and_then(|interest| interest.entries.get(&federate))
        .map(|entry| entry.attributes.clone())
}

fn collect_oc_classes(
    map: &BTreeMap<ClassHandle, OcInterest>,
    federate: FederateHandle,
) -> BTreeSet<ClassHandle> {
    map.iter()
        .filter(|(_, interest)| interest.entries.contains_key(&federate))
        .map(|(class, _)| *class)
        .collect()
}

fn ic_has_interest(
    map: &BTreeMap<InteractionHandle, IcInterest>,
    federate: FederateHandle,
    class: InteractionHandle,
) -> bool {
    map.get(&class)
        .is_some_and(|interest| interest.entries.contains_key(&federate))
}

fn collect_ic_classes(
    map: &BTreeMap<InteractionHandle, IcInterest>,
    federate: FederateHandle,
) -> BTreeSet<InteractionHandle> {
    map.iter()
        .filter(|(_, interest)| interest.entries.contains_key(&federate))
        .map(|(class, _)| *class)
        .collect()
}

fn remove_oc_entry(
    map: &mut BTreeMap<ClassHandle, OcInterest>,
    action: &str,
    federate: FederateHandle,
    class: ClassHandle,
    attributes: &BTreeSet<AttributeHandle>,
) -> Result<()> {
    let interest = map
        .get_mut(&class)
        .ok_or_else(|| no_registration(action, class))?;
    if !interest.entries.contains_key(&federate) {
        return Err(no_registration(action, class));
    }

    if attributes.is_empty() {
        interest.entries.remove(&federate);
    } else if let Some(entry) = interest.entries.get_mut(&federate) {
        for attribute in attributes {
            entry.attributes.remove(attribute);
        }
        if entry.attributes.is_empty() {
            interest.entries.remove(&federate);
        }
    }
    Ok(())
}

fn remove_ic_entry(
    map: &mut BTreeMap<InteractionHandle, IcInterest>,
    action: &str,
    federate: FederateHandle,
    class: InteractionHandle,
) -> Result<()> {
    let interest = map
        .get_mut(&class)
        .ok_or_else(|| no_registration(action, class))?;
    if interest.entries.remove(&federate).is_none() {
        return Err(no_registration(action, class));
    }
    Ok(())
}

// ============================================================================
// Save / restore
// ============================================================================

impl SaveRestoreTarget for InterestManager {
    fn save_to_stream(&self, writer: &mut WireWriter) {
        let registries = self.registries.read();
        save_oc_map(writer, &registries.published_objects);
        save_oc_map(writer, &registries.subscribed_objects);
        save_ic_map(writer, &registries.published_interactions);
        save_ic_map(writer, &registries.subscribed_interactions);
    }

    fn restore_from_stream(&mut self, reader: &mut WireReader) -> Result<()> {
        let registries = Registries {
            published_objects: restore_oc_map(reader)?,
            subscribed_objects: restore_oc_map(reader)?,
            published_interactions: restore_ic_map(reader)?,
            subscribed_interactions: restore_ic_map(reader)?,
        };
        *self.registries.write() = registries;
        Ok(())
    }
}

fn save_regions(writer: &mut WireWriter, regions: &Option<BTreeSet<RegionToken>>) {
    match regions {
        None => writer.put_bool(false),
        Some(tokens) => {
            writer.put_bool(true);
            writer.put_u16(tokens.len() as u16);
            for token in tokens {
                writer.put_u32(*token);
            }
        }
    }
}

fn restore_regions(reader: &mut WireReader) -> Result<Option<BTreeSet<RegionToken>>> {
    if !reader.get_bool()? {
        return Ok(None);
    }
    let count = reader.get_u16()?;
    let mut tokens = BTreeSet::new();
    for _ in 0..count {
        tokens.insert(reader.get_u32()?);
    }
    Ok(Some(tokens))
}

fn save_oc_map(writer: &mut WireWriter, map: &BTreeMap<ClassHandle, OcInterest>) {
    writer.put_u16(map.len() as u16);
    for (class, interest) in map {
        writer.put_u32(*class);
        writer.put_u16(interest.entries.len() as u16);
        for (federate, entry) in &interest.entries {
            writer.put_u16(*federate);
            writer.put_u16(entry.attributes.len() as u16);
            for attribute in &entry.attributes {
                writer.put_u32(*attribute);
            }
            save_regions(writer, &entry.regions);
        }
    }
}

fn restore_oc_map(reader: &mut WireReader) -> Result<BTreeMap<ClassHandle, OcInterest>> {
    let class_count = reader.get_u16()?;
    let mut map = BTreeMap::new();
    for _ in 0..class_count {
        let class = reader.get_u32()?;
        let entry_count = reader.get_u16()?;
        let mut interest = OcInterest::default();
        for _ in 0..entry_count {
            let federate = reader.get_u16()?;
            let attribute_count = reader.get_u16()?;
            let mut attributes = BTreeSet::new();
            for _ in 0..attribute_count {
                attributes.insert(reader.get_u32()?);
            }
            let regions = restore_regions(reader)?;
            interest.entries.insert(federate, OcEntry { attributes, regions });
        }
        map.insert(class, interest);
    }
    Ok(map)
}

fn save_ic_map(writer: &mut WireWriter, map: &BTreeMap<InteractionHandle, IcInterest>) {
    writer.put_u16(map.len() as u16);
    for (class, interest) in map {
        writer.put_u32(*class);
        writer.put_u16(interest.entries.len() as u16);
        for (federate, regions) in &interest.entries {
            writer.put_u16(*federate);
            save_regions(writer, regions);
        }
    }
}

fn restore_ic_map(reader: &mut WireReader) -> Result<BTreeMap<InteractionHandle, IcInterest>> {
    let class_count = reader.get_u16()?;
    let mut map = BTreeMap::new();
    for _ in 0..class_count {
        let class = reader.get_u32()?;
        let entry_count = reader.get_u16()?;
        let mut interest = IcInterest::default();
        for _ in 0..entry_count {
            let federate = reader.get_u16()?;
            let regions = restore_regions(reader)?;
            interest.entries.insert(federate, regions);
        }
        map.insert(class, interest);
    }
    Ok(map)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Extent, ObjectModelBuilder, Range};

    /// FOM used throughout: A(a1) <- B(+a2) <- C(+a3), interactions
    /// I1 <- I2, one routing space with one dimension.
    fn manager() -> InterestManager {
        let fom = ObjectModelBuilder::new()
            .space(1, "TestSpace", &[1])
            .object_class(1, "A", None)
            .attribute(1, 11, "a1", Some(1))
            .object_class(2, "B", Some(1))
            .attribute(2, 12, "a2", None)
            .object_class(3, "C", Some(2))
            .attribute(3, 13, "a3", None)
            .interaction_class(1, "I1", None, Some(1))
            .interaction_class(2, "I2", Some(1), None)
            .build();
        InterestManager::new(Arc::new(fom), Arc::new(RwLock::new(RegionStore::new())))
    }

    fn attrs(handles: &[AttributeHandle]) -> BTreeSet<AttributeHandle> {
        handles.iter().copied().collect()
    }

    fn region(manager: &InterestManager, token: RegionToken, creator: FederateHandle, lo: i64, hi: i64) {
        let mut extent = Extent::new(&[1]);
        extent.set_range(1, Range::new(lo, hi)).unwrap();
        manager
            .regions
            .write()
            .add_region(Region::new(token, creator, 1, vec![extent]))
            .unwrap();
    }

    #[test]
    fn test_unknown_class_and_attribute_rejected() {
        let m = manager();
        assert!(matches!(
            m.publish_object_class(1, 99, attrs(&[11])),
            Err(RtiError::NotFound(_))
        ));
        // a3 lives on C, not on A
        assert!(matches!(
            m.publish_object_class(1, 1, attrs(&[13])),
            Err(RtiError::NotFound(_))
        ));
        // inherited attribute on a child class is fine
        m.publish_object_class(1, 3, attrs(&[11, 13])).unwrap();
    }

    #[test]
    fn test_registration_is_additive() {
        let m = manager();
        m.subscribe_object_class(1, 2, attrs(&[11]), None).unwrap();
        m.subscribe_object_class(1, 2, attrs(&[12]), None).unwrap();
        assert_eq!(m.get_subscribed_attributes(1, 2).unwrap(), attrs(&[11, 12]));
    }

    #[test]
    fn test_unsubscribe_specific_and_all() {
        let m = manager();
        m.subscribe_object_class(1, 2, attrs(&[11, 12]), None).unwrap();

        m.unsubscribe_object_class(1, 2, &attrs(&[12])).unwrap();
        assert_eq!(m.get_subscribed_attributes(1, 2).unwrap(), attrs(&[11]));

        // empty set removes the whole registration
        m.unsubscribe_object_class(1, 2, &BTreeSet::new()).unwrap();
        assert!(!m.is_object_class_subscribed_directly(1, 2));
        assert!(matches!(
            m.unsubscribe_object_class(1, 2, &BTreeSet::new()),
            Err(RtiError::NotRegistered(_))
        ));
    }

    #[test]
    fn test_removing_last_attribute_removes_entry() {
        let m = manager();
        m.subscribe_object_class(1, 2, attrs(&[11]), None).unwrap();
        m.unsubscribe_object_class(1, 2, &attrs(&[11])).unwrap();
        assert!(!m.is_object_class_subscribed_directly(1, 2));
    }

    #[test]
    fn test_discovery_type_walks_the_chain() {
        // invariant: f subscribes to B; discovery of C resolves to B,
        // discovery of A fails
        let m = manager();
        m.subscribe_object_class(7, 2, attrs(&[11]), None).unwrap();

        assert_eq!(m.get_discovery_type(7, 3), Some(2));
        assert_eq!(m.get_discovery_type(7, 2), Some(2));
        assert_eq!(m.get_discovery_type(7, 1), None);
        assert_eq!(m.get_discovery_type(7, 99), None);

        assert!(m.is_object_class_subscribed(7, 3));
        assert!(!m.is_object_class_subscribed(7, 1));
    }

    #[test]
    fn test_publish_subscribe_discovery_scenario() {
        // f1 publishes B{a1,a2}; f2 subscribes A{a1}
        let m = manager();
        m.publish_object_class(1, 2, attrs(&[11, 12])).unwrap();
        m.subscribe_object_class(2, 1, attrs(&[11]), None).unwrap();

        let with_types = m.get_all_subscribers_with_types(2);
        assert_eq!(with_types, [(2u16, 1u32)].into_iter().collect());

        assert!(m.is_attribute_class_subscribed(2, 1, 11));
        // f2's subscription lives on A, so a lookup against B sees nothing
        assert!(!m.is_attribute_class_subscribed(2, 2, 12));
        assert!(!m.is_attribute_class_subscribed(2, 2, 11));
    }

    #[test]
    fn test_subscribers_with_types_prefers_most_specific() {
        let m = manager();
        m.subscribe_object_class(1, 1, attrs(&[11]), None).unwrap();
        m.subscribe_object_class(1, 3, attrs(&[11]), None).unwrap();
        m.subscribe_object_class(2, 1, attrs(&[11]), None).unwrap();

        let with_types = m.get_all_subscribers_with_types(3);
        assert_eq!(with_types.get(&1), Some(&3), "most specific wins");
        assert_eq!(with_types.get(&2), Some(&1));
        assert_eq!(m.get_all_subscribers(3), [1, 2].into_iter().collect());
        // nobody subscribes below A for class 1 lookups
        assert_eq!(m.get_all_subscribers(1), [1, 2].into_iter().collect());
    }

    #[test]
    fn test_region_validation() {
        let m = manager();
        region(&m, 5, 1, 0, 100);

        // a1 is in the routing space; fine
        m.subscribe_object_class(1, 1, attrs(&[11]), Some(5)).unwrap();

        // a2 has no declared space: invalid region context
        assert!(matches!(
            m.subscribe_object_class(1, 2, attrs(&[12]), Some(5)),
            Err(RtiError::InvalidRegionContext(_))
        ));

        // unknown token
        assert!(matches!(
            m.subscribe_object_class(1, 1, attrs(&[11]), Some(77)),
            Err(RtiError::NotFound(_))
        ));
    }

    #[test]
    fn test_region_matching_union_and_defaults() {
        let m = manager();
        region(&m, 5, 1, 0, 10);
        region(&m, 6, 1, 50, 60);
        m.subscribe_object_class(1, 1, attrs(&[11]), Some(5)).unwrap();
        m.subscribe_object_class(1, 1, attrs(&[11]), Some(6)).unwrap();

        let update_in = {
            let mut extent = Extent::new(&[1]);
            extent.set_range(1, Range::new(55, 58)).unwrap();
            Region::new(99, 2, 1, vec![extent])
        };
        let update_out = {
            let mut extent = Extent::new(&[1]);
            extent.set_range(1, Range::new(20, 30)).unwrap();
            Region::new(98, 2, 1, vec![extent])
        };

        assert!(m.subscription_matches_region(1, 1, Some(&update_in)));
        assert!(!m.subscription_matches_region(1, 1, Some(&update_out)));
        // an update with no region matches any subscription
        assert!(m.subscription_matches_region(1, 1, None));

        // a region-less subscription matches everything
        m.subscribe_object_class(2, 1, attrs(&[11]), None).unwrap();
        assert!(m.subscription_matches_region(2, 1, Some(&update_out)));

        // no subscription at all matches nothing
        assert!(!m.subscription_matches_region(3, 1, Some(&update_in)));
    }

    #[test]
    fn test_interaction_inheritance_and_lifecycle() {
        let m = manager();
        m.publish_interaction_class(1, 2).unwrap();
        assert!(m.is_interaction_class_published(1, 2));

        m.subscribe_interaction_class(2, 1, None).unwrap();
        assert_eq!(m.get_subscribed_interaction_type(2, 2), Some(1));
        assert!(m.is_interaction_class_subscribed(2, 2));
        assert!(!m.is_interaction_class_subscribed_directly(2, 2));
        assert_eq!(m.get_all_interaction_subscribers(2), [2].into_iter().collect());

        m.unsubscribe_interaction_class(2, 1).unwrap();
        assert_eq!(m.get_subscribed_interaction_type(2, 2), None);
        assert!(matches!(
            m.unsubscribe_interaction_class(2, 1),
            Err(RtiError::NotRegistered(_))
        ));
    }

    #[test]
    fn test_interaction_region_requires_creator_and_space() {
        let m = manager();
        region(&m, 5, 1, 0, 10);

        // I1 is in the space and federate 1 created the region
        m.subscribe_interaction_class(1, 1, Some(5)).unwrap();

        // federate 2 did not create region 5
        assert!(matches!(
            m.subscribe_interaction_class(2, 1, Some(5)),
            Err(RtiError::NotFound(_))
        ));

        // I2 has no routing space
        assert!(matches!(
            m.subscribe_interaction_class(1, 2, Some(5)),
            Err(RtiError::InvalidRegionContext(_))
        ));
    }

    #[test]
    fn test_reflection_queries() {
        let m = manager();
        m.publish_object_class(1, 1, attrs(&[11])).unwrap();
        m.publish_object_class(1, 3, attrs(&[13])).unwrap();
        m.subscribe_object_class(1, 2, attrs(&[11]), None).unwrap();
        m.publish_interaction_class(1, 1).unwrap();
        m.subscribe_interaction_class(1, 2, None).unwrap();

        assert_eq!(m.get_all_published_object_classes(1), [1, 3].into_iter().collect());
        assert_eq!(m.get_all_subscribed_object_classes(1), [2].into_iter().collect());
        assert_eq!(m.get_all_published_interaction_classes(1), [1].into_iter().collect());
        assert_eq!(m.get_all_subscribed_interaction_classes(1), [2].into_iter().collect());
        assert!(m.is_attribute_class_published(1, 1, 11));
        assert!(!m.is_attribute_class_published(1, 1, 12));
    }

    #[test]
    fn test_save_restore_roundtrip() {
        let m = manager();
        region(&m, 5, 1, 0, 10);
        m.publish_object_class(1, 2, attrs(&[11, 12])).unwrap();
        m.subscribe_object_class(1, 1, attrs(&[11]), Some(5)).unwrap();
        m.subscribe_object_class(2, 3, attrs(&[13]), None).unwrap();
        m.publish_interaction_class(1, 1).unwrap();
        m.subscribe_interaction_class(1, 1, Some(5)).unwrap();

        let mut writer = WireWriter::new();
        m.save_to_stream(&mut writer);
        let bytes = writer.finish();

        let mut restored = manager();
        region(&restored, 5, 1, 0, 10);
        restored
            .restore_from_stream(&mut WireReader::new(&bytes))
            .unwrap();

        assert_eq!(
            restored.get_published_attributes(1, 2).unwrap(),
            attrs(&[11, 12])
        );
        assert_eq!(restored.get_subscribed_attributes(1, 1).unwrap(), attrs(&[11]));
        assert_eq!(restored.get_discovery_type(2, 3), Some(3));
        assert!(restored.is_interaction_class_published(1, 1));
        assert!(restored.is_interaction_class_subscribed_directly(1, 1));

        // saving the restored state reproduces the same bytes
        let mut second = WireWriter::new();
        restored.save_to_stream(&mut second);
        assert_eq!(second.finish(), bytes);
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hrti-team

//! Synchronization points: labeled barriers across a federation.
//!
//! A point is *federation-wide* (every current member must achieve it) or
//! *restricted* to an explicit federate subset. Status only ever moves
//! forward:
//!
//! ```text
//! ANNOUNCED --(every required federate achieves)--> SYNCHRONIZED
//! ```
//!
//! Achieving an already-synchronized point is accepted and changes
//! nothing. When a federate resigns, federation-wide points are
//! re-evaluated against the shrunken membership; restricted points keep
//! their declared subset.

use std::collections::{BTreeMap, BTreeSet};

use parking_lot::Mutex;

use crate::model::FederateHandle;
use crate::saverestore::SaveRestoreTarget;
use crate::wire::{WireReader, WireWriter};
use crate::{Result, RtiError};

/// Lifecycle of a synchronization point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPointStatus {
    /// The point has been announced to its audience.
    Announced,
    /// Every required federate has achieved the point.
    Synchronized,
}

/// One labeled barrier.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncPoint {
    label: String,
    tag: Vec<u8>,
    /// Empty means federation-wide.
    federates: BTreeSet<FederateHandle>,
    registrant: FederateHandle,
    achieved: BTreeSet<FederateHandle>,
    status: SyncPointStatus,
}

impl SyncPoint {
    fn new(
        label: String,
        tag: Vec<u8>,
        federates: BTreeSet<FederateHandle>,
        registrant: FederateHandle,
    ) -> Self {
        Self {
            label,
            tag,
            federates,
            registrant,
            achieved: BTreeSet::new(),
            status: SyncPointStatus::Announced,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn tag(&self) -> &[u8] {
        &self.tag
    }

    pub fn registrant(&self) -> FederateHandle {
        self.registrant
    }

    pub fn is_federation_wide(&self) -> bool {
        self.federates.is_empty()
    }

    pub fn is_restricted(&self) -> bool {
        !self.is_federation_wide()
    }

    /// The declared subset; empty for federation-wide points.
    pub fn federates(&self) -> &BTreeSet<FederateHandle> {
        &self.federates
    }

    pub fn has_federate_achieved(&self, federate: FederateHandle) -> bool {
        self.achieved.contains(&federate)
    }

    pub fn status(&self) -> SyncPointStatus {
        self.status
    }

    pub fn is_synchronized(&self) -> bool {
        self.status == SyncPointStatus::Synchronized
    }

    /// Re-derive the status. Restricted points check their declared
    /// subset; federation-wide points check the membership passed in.
    /// Synchronized is sticky.
    fn update_status(&mut self, members: &BTreeSet<FederateHandle>) {
        if self.status == SyncPointStatus::Synchronized {
            return;
        }
        let required = if self.is_restricted() {
            &self.federates
        } else {
            members
        };
        if required.iter().all(|federate| self.achieved.contains(federate)) {
            self.status = SyncPointStatus::Synchronized;
        }
    }
}

// ============================================================================
// SyncPointManager
// ============================================================================

/// All synchronization points for one federation.
pub struct SyncPointManager {
    points: Mutex<BTreeMap<String, SyncPoint>>,
}

impl SyncPointManager {
    pub fn new() -> Self {
        Self {
            points: Mutex::new(BTreeMap::new()),
        }
    }

    /// Announce a new point. `federates` empty means federation-wide.
    pub fn register(
        &self,
        label: &str,
        tag: Vec<u8>,
        federates: BTreeSet<FederateHandle>,
        registrant: FederateHandle,
    ) -> Result<()> {
        let mut points = self.points.lock();
        if points.contains_key(label) {
            return Err(RtiError::AlreadyExists(format!(
                "synchronization point already exists: label={}",
                label
            )));
        }
        points.insert(
            label.to_string(),
            SyncPoint::new(label.to_string(), tag, federates, registrant),
        );
        Ok(())
    }

    /// Record that `federate` achieved the point, then re-evaluate
    /// synchronization against `members` (the federation's current
    /// handles). Returns the resulting status.
    pub fn achieve(
        &self,
        label: &str,
        federate: FederateHandle,
        members: &BTreeSet<FederateHandle>,
    ) -> Result<SyncPointStatus> {
        let mut points = self.points.lock();
        let point = points.get_mut(label).ok_or_else(|| {
            RtiError::NotFound(format!("synchronization point not announced: {}", label))
        })?;

        point.achieved.insert(federate);
        point.update_status(members);
        Ok(point.status)
    }

    /// A federate resigned: federation-wide points may now be complete.
    pub fn federate_resigned(&self, members: &BTreeSet<FederateHandle>) {
        let mut points = self.points.lock();
        for point in points.values_mut() {
            if point.is_federation_wide() {
                point.update_status(members);
            }
        }
    }

    pub fn is_synchronized(&self, label: &str) -> Result<bool> {
        let points = self.points.lock();
        points
            .get(label)
            .map(SyncPoint::is_synchronized)
            .ok_or_else(|| {
                RtiError::NotFound(format!("synchronization point not announced: {}", label))
            })
    }

    pub fn contains_point(&self, label: &str) -> bool {
        self.points.lock().contains_key(label)
    }

    pub fn get_point(&self, label: &str) -> Option<SyncPoint> {
        self.points.lock().get(label).cloned()
    }

    pub fn remove_point(&self, label: &str) -> Option<SyncPoint> {
        self.points.lock().remove(label)
    }

    pub fn all_points(&self) -> Vec<SyncPoint> {
        self.points.lock().values().cloned().collect()
    }

    /// Labels of federation-wide points still waiting on someone.
    pub fn all_unsynchronized_labels(&self) -> BTreeSet<String> {
        self.points
            .lock()
            .values()
            .filter(|point| point.is_federation_wide() && !point.is_synchronized())
            .map(|point| point.label.clone())
            .collect()
    }
}

impl Default for SyncPointManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SaveRestoreTarget for SyncPointManager {
    fn save_to_stream(&self, writer: &mut WireWriter) {
        let points = self.points.lock();
        writer.put_u16(points.len() as u16);
        for point in points.values() {
            writer.put_string(&point.label);
            writer.put_bytes(&point.tag);
            writer.put_u16(point.registrant);
            writer.put_u16(point.federates.len() as u16);
            for federate in &point.federates {
                writer.put_u16(*federate);
            }
            writer.put_u16(point.achieved.len() as u16);
            for federate in &point.achieved {
                writer.put_u16(*federate);
            }
            writer.put_bool(point.is_synchronized());
        }
    }

    fn restore_from_stream(&mut self, reader: &mut WireReader) -> Result<()> {
        let count = reader.get_u16()?;
        let mut points = BTreeMap::new();
        for _ in 0..count {
            let label = reader.get_string()?;
            let tag = reader.get_bytes()?;
            let registrant = reader.get_u16()?;
            let federate_count = reader.get_u16()?;
            let mut federates = BTreeSet::new();
            for _ in 0..federate_count {
                federates.insert(reader.get_u16()?);
            }
            let achieved_count = reader.get_u16()?;
            let mut achieved = BTreeSet::new();
            for _ in 0..achieved_count {
                achieved.insert(reader.get_u16()?);
            }
            let synchronized = reader.get_bool()?;

            let mut point = SyncPoint::new(label.clone(), tag, federates, registrant);
            point.achieved = achieved;
            if synchronized {
                point.status = SyncPointStatus::Synchronized;
            }
            points.insert(label, point);
        }
        *self.points.lock() = points;
        Ok(())
    }
}

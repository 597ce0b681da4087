// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hrti-team

//! Logical time: per-federate advancement state and the federation LBTS.
//!
//! Each federate carries a [`TimeStatus`]: whether it is time-constrained,
//! whether it regulates others, and where it sits in the advance cycle.
//!
//! ```text
//!             timeAdvanceRequested(t)
//!   NONE ------------------------------> REQUESTED / AVAILABLE
//!     ^                                        |
//!     | grant callback processed               | canAdvance(federationLbts)
//!     |                                        v
//!     +---------------------------------- PROVISIONAL
//! ```
//!
//! The federation's LBTS is the minimum LBTS over all regulating
//! federates; a constrained federate may only advance below it (strictly
//! below for a plain TAR, at-or-below for the TARA variant).

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::model::FederateHandle;
use crate::saverestore::SaveRestoreTarget;
use crate::wire::{WireReader, WireWriter};
use crate::{Result, RtiError};

/// Constrained/regulating are three-valued: enabling is itself a
/// federation-wide handshake, so each spends time in `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriState {
    On,
    Pending,
    Off,
}

impl TriState {
    fn id(self) -> u8 {
        match self {
            Self::On => 0,
            Self::Pending => 1,
            Self::Off => 2,
        }
    }

    fn from_id(id: u8) -> Result<Self> {
        match id {
            0 => Ok(Self::On),
            1 => Ok(Self::Pending),
            2 => Ok(Self::Off),
            other => Err(RtiError::Protocol(format!("TriState id not known: {}", other))),
        }
    }
}

/// Where a federate sits in the time-advance request cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tar {
    /// No advance outstanding.
    None,
    /// A plain time-advance request is outstanding.
    Requested,
    /// A time-advance-request-available is outstanding.
    Available,
    /// The advance was granted internally; the grant callback has not been
    /// processed by the federate yet.
    Provisional,
}

impl Tar {
    fn id(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Requested => 1,
            Self::Available => 2,
            Self::Provisional => 3,
        }
    }

    fn from_id(id: u8) -> Result<Self> {
        match id {
            0 => Ok(Self::None),
            1 => Ok(Self::Requested),
            2 => Ok(Self::Available),
            3 => Ok(Self::Provisional),
            other => Err(RtiError::Protocol(format!("TAR id not known: {}", other))),
        }
    }
}

/// Per-federate time state.
///
/// `lbts` is derived state (`requested_time + lookahead`) and every mutator
/// keeps it in step; there is no way to set it directly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeStatus {
    constrained: TriState,
    regulating: TriState,
    advancing: Tar,
    current_time: f64,
    requested_time: f64,
    lookahead: f64,
    lbts: f64,
    asynchronous: bool,
}

impl Default for TimeStatus {
    fn default() -> Self {
        Self {
            constrained: TriState::Off,
            regulating: TriState::Off,
            advancing: Tar::None,
            current_time: 0.0,
            requested_time: 0.0,
            lookahead: 0.0,
            lbts: 0.0,
            asynchronous: false,
        }
    }
}

impl TimeStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_constrained(&self) -> bool {
        self.constrained == TriState::On
    }

    pub fn is_constrained_pending(&self) -> bool {
        self.constrained == TriState::Pending
    }

    pub fn constrained(&self) -> TriState {
        self.constrained
    }

    pub fn set_constrained(&mut self, constrained: TriState) {
        self.constrained = constrained;
    }

    pub fn is_regulating(&self) -> bool {
        self.regulating == TriState::On
    }

    pub fn is_regulating_pending(&self) -> bool {
        self.regulating == TriState::Pending
    }

    pub fn regulating(&self) -> TriState {
        self.regulating
    }

    pub fn set_regulating(&mut self, regulating: TriState) {
        self.regulating = regulating;
    }

    pub fn advancing(&self) -> Tar {
        self.advancing
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn requested_time(&self) -> f64 {
        self.requested_time
    }

    pub fn lookahead(&self) -> f64 {
        self.lookahead
    }

    pub fn set_lookahead(&mut self, lookahead: f64) {
        self.lookahead = lookahead;
        self.lbts = self.requested_time + self.lookahead;
    }

    pub fn lbts(&self) -> f64 {
        self.lbts
    }

    pub fn is_asynchronous(&self) -> bool {
        self.asynchronous
    }

    pub fn set_asynchronous(&mut self, asynchronous: bool) {
        self.asynchronous = asynchronous;
    }

    /// True while an advance request of either flavour is outstanding.
    pub fn is_in_advancing_state(&self) -> bool {
        matches!(self.advancing, Tar::Requested | Tar::Available)
    }

    /// True until the grant callback has been processed.
    pub fn is_advance_request_outstanding(&self) -> bool {
        self.advancing != Tar::None
    }

    /// Record a time-advance request. `available` selects the TARA
    /// variant. Requires that no advance is outstanding.
    pub fn time_advance_requested(&mut self, requested_time: f64, available: bool) -> Result<()> {
        if self.advancing != Tar::None {
            return Err(RtiError::internal(format!(
                "time advance to {} requested while one is outstanding ({:?})",
                requested_time, self.advancing
            )));
        }
        self.requested_time = requested_time;
        self.lbts = self.requested_time + self.lookahead;
        self.advancing = if available { Tar::Available } else { Tar::Requested };
        Ok(())
    }

    /// Can this federate be granted its advance, given the federation's
    /// LBTS? Unconstrained federates advance freely; constrained ones stay
    /// strictly below the LBTS (at-or-below for TARA).
    pub fn can_advance(&self, federation_lbts: f64) -> bool {
        match self.advancing {
            Tar::None | Tar::Provisional => false,
            Tar::Requested => !self.is_constrained() || self.requested_time < federation_lbts,
            Tar::Available => !self.is_constrained() || self.requested_time <= federation_lbts,
        }
    }

    /// Move the federate to `new_time`. Only valid once [`Self::can_advance`]
    /// holds; the grant callback is still owed to the federate.
    pub fn advance_federate(&mut self, new_time: f64) {
        self.current_time = new_time;
        self.lbts = self.current_time + self.lookahead;
        self.advancing = Tar::Provisional;
    }

    /// The federate has processed its grant callback; the cycle is closed.
    pub fn advance_grant_callback_processed(&mut self, new_time: f64) {
        self.advancing = Tar::None;
        self.current_time = new_time;
        self.requested_time = new_time;
    }

    fn encode(&self, writer: &mut WireWriter) {
        writer.put_u8(self.constrained.id());
        writer.put_u8(self.regulating.id());
        writer.put_u8(self.advancing.id());
        writer.put_f64(self.current_time);
        writer.put_f64(self.requested_time);
        writer.put_f64(self.lookahead);
        writer.put_f64(self.lbts);
        writer.put_bool(self.asynchronous);
    }

    fn decode(reader: &mut WireReader<'_>) -> Result<Self> {
        Ok(Self {
            constrained: TriState::from_id(reader.get_u8()?)?,
            regulating: TriState::from_id(reader.get_u8()?)?,
            advancing: Tar::from_id(reader.get_u8()?)?,
            current_time: reader.get_f64()?,
            requested_time: reader.get_f64()?,
            lookahead: reader.get_f64()?,
            lbts: reader.get_f64()?,
            asynchronous: reader.get_bool()?,
        })
    }
}

// ============================================================================
// TimeManager
// ============================================================================

/// All time state for one federation.
pub struct TimeManager {
    statuses: RwLock<BTreeMap<FederateHandle, TimeStatus>>,
}

impl TimeManager {
    pub fn new() -> Self {
        Self {
            statuses: RwLock::new(BTreeMap::new()),
        }
    }

    /// A federate joined; it starts with a default status.
    pub fn joined_federation(&self, federate: FederateHandle) {
        self.statuses.write().insert(federate, TimeStatus::new());
    }

    /// A federate resigned; its status no longer weighs on the LBTS.
    pub fn resigned_federation(&self, federate: FederateHandle) {
        self.statuses.write().remove(&federate);
    }

    /// Copy of a federate's status.
    pub fn status(&self, federate: FederateHandle) -> Option<TimeStatus> {
        self.statuses.read().get(&federate).copied()
    }

    /// Mutate one federate's status under the manager's lock.
    pub fn with_status<T>(
        &self,
        federate: FederateHandle,
        mutate: impl FnOnce(&mut TimeStatus) -> T,
    ) -> Result<T> {
        let mut statuses = self.statuses.write();
        match statuses.get_mut(&federate) {
            Some(status) => Ok(mutate(status)),
            None => Err(RtiError::NotFound(format!(
                "no time status for federate {}",
                federate
            ))),
        }
    }

    /// The minimum LBTS over every regulating federate, or +inf when no
    /// one regulates.
    pub fn federation_lbts(&self) -> f64 {
        self.statuses
            .read()
            .values()
            .filter(|status| status.is_regulating())
            .map(TimeStatus::lbts)
            .fold(f64::INFINITY, f64::min)
    }

    pub fn len(&self) -> usize {
        self.statuses.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.read().is_empty()
    }
}

impl Default for TimeManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SaveRestoreTarget for TimeManager {
    fn save_to_stream(&self, writer: &mut WireWriter) {
        let statuses = self.statuses.read();
        writer.put_u16(statuses.len() as u16);
        for (federate, status) in statuses.iter() {
            writer.put_u16(*federate);
            status.encode(writer);
        }
    }

    fn restore_from_stream(&mut self, reader: &mut WireReader) -> Result<()> {
        let count = reader.get_u16()?;
        let mut statuses = BTreeMap::new();
        for _ in 0..count {
            let federate = reader.get_u16()?;
            statuses.insert(federate, TimeStatus::decode(reader)?);
        }
        *self.statuses.write() = statuses;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let status = TimeStatus::new();
        assert!(!status.is_constrained());
        assert!(!status.is_regulating());
        assert_eq!(status.advancing(), Tar::None);
        assert_eq!(status.lbts(), 0.0);
        assert!(!status.is_asynchronous());
    }

    #[test]
    fn test_lbts_tracks_every_mutator() {
        let mut status = TimeStatus::new();
        status.set_lookahead(1.5);
        assert_eq!(status.lbts(), 1.5);

        status.time_advance_requested(10.0, false).unwrap();
        assert_eq!(status.lbts(), 11.5);

        status.advance_federate(10.0);
        assert_eq!(status.lbts(), 11.5);

        status.advance_grant_callback_processed(10.0);
        status.set_lookahead(0.25);
        assert_eq!(status.lbts(), 10.25);
    }

    #[test]
    fn test_advance_cycle() {
        let mut status = TimeStatus::new();
        status.time_advance_requested(5.5, false).unwrap();
        assert_eq!(status.advancing(), Tar::Requested);
        assert!(status.is_in_advancing_state());

        // a second request while one is outstanding is refused
        assert!(status.time_advance_requested(6.0, false).is_err());

        status.advance_federate(5.5);
        assert_eq!(status.advancing(), Tar::Provisional);
        assert!(!status.is_in_advancing_state());
        assert!(status.is_advance_request_outstanding());

        status.advance_grant_callback_processed(5.5);
        assert_eq!(status.advancing(), Tar::None);
        assert_eq!(status.current_time(), 5.5);
        assert_eq!(status.requested_time(), 5.5);
    }

    #[test]
    fn test_can_advance_constraint_boundaries() {
        let mut status = TimeStatus::new();
        // nothing outstanding: can never advance
        assert!(!status.can_advance(100.0));

        status.set_constrained(TriState::On);
        status.time_advance_requested(5.5, false).unwrap();
        assert!(status.can_advance(6.0)); // 5.5 < 6.0
        assert!(!status.can_advance(5.5)); // strict for TAR

        let mut tara = TimeStatus::new();
        tara.set_constrained(TriState::On);
        tara.time_advance_requested(5.5, true).unwrap();
        assert!(tara.can_advance(5.5)); // at-or-below for TARA
        assert!(!tara.can_advance(5.4));

        // unconstrained: the federation lbts is irrelevant
        let mut free = TimeStatus::new();
        free.time_advance_requested(50.0, false).unwrap();
        assert!(free.can_advance(0.0));
    }

    #[test]
    fn test_provisional_blocks_can_advance() {
        let mut status = TimeStatus::new();
        status.time_advance_requested(1.0, false).unwrap();
        status.advance_federate(1.0);
        assert!(!status.can_advance(f64::INFINITY));
    }

    #[test]
    fn test_federation_lbts_minimum_over_regulators() {
        let manager = TimeManager::new();
        manager.joined_federation(1);
        manager.joined_federation(2);
        manager.joined_federation(3);

        // nobody regulating yet
        assert_eq!(manager.federation_lbts(), f64::INFINITY);

        manager
            .with_status(1, |status| {
                status.set_regulating(TriState::On);
                status.set_lookahead(1.0);
                status.time_advance_requested(5.0, false)
            })
            .unwrap()
            .unwrap();
        assert_eq!(manager.federation_lbts(), 6.0);

        manager
            .with_status(2, |status| {
                status.set_regulating(TriState::On);
                status.set_lookahead(0.5);
                status.time_advance_requested(3.0, false)
            })
            .unwrap()
            .unwrap();
        assert_eq!(manager.federation_lbts(), 3.5);

        // resignation re-opens the bound
        manager.resigned_federation(2);
        assert_eq!(manager.federation_lbts(), 6.0);
    }

    #[test]
    fn test_scenario_constrained_advance() {
        // f1 regulating with lookahead 1.0 at requested time 5.0
        let manager = TimeManager::new();
        manager.joined_federation(1);
        manager.joined_federation(2);
        manager
            .with_status(1, |status| {
                status.set_regulating(TriState::On);
                status.set_lookahead(1.0);
                status.time_advance_requested(5.0, false)
            })
            .unwrap()
            .unwrap();
        assert_eq!(manager.federation_lbts(), 6.0);

        // f2 constrained, asks for 5.5
        manager
            .with_status(2, |status| {
                status.set_constrained(TriState::On);
                status.time_advance_requested(5.5, false)
            })
            .unwrap()
            .unwrap();

        let lbts = manager.federation_lbts();
        let granted = manager
            .with_status(2, |status| {
                assert!(status.can_advance(lbts));
                status.advance_federate(5.5);
                status.advancing()
            })
            .unwrap();
        assert_eq!(granted, Tar::Provisional);

        manager
            .with_status(2, |status| {
                status.advance_grant_callback_processed(5.5);
                assert_eq!(status.advancing(), Tar::None);
                assert_eq!(status.current_time(), 5.5);
            })
            .unwrap();
    }

    #[test]
    fn test_save_restore_roundtrip() {
        let manager = TimeManager::new();
        manager.joined_federation(1);
        manager.joined_federation(9);
        manager
            .with_status(9, |status| {
                status.set_constrained(TriState::Pending);
                status.set_regulating(TriState::On);
                status.set_lookahead(2.0);
                status.time_advance_requested(4.0, true)
            })
            .unwrap()
            .unwrap();

        let mut writer = WireWriter::new();
        manager.save_to_stream(&mut writer);
        let bytes = writer.finish();

        let mut restored = TimeManager::new();
        restored
            .restore_from_stream(&mut WireReader::new(&bytes))
            .unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.status(9), manager.status(9));
        assert_eq!(restored.federation_lbts(), manager.federation_lbts());
    }
}

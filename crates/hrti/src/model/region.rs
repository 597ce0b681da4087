// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hrti-team

//! DDM geometry: ranges, extents, regions and the per-federation store.
//!
//! A [`Region`] spans one routing space and owns a set of [`Extent`]s; each
//! extent carries one [`Range`] per dimension of that space. Two extents
//! overlap iff they overlap in every shared dimension, where a range is
//! half-open `[lower, upper)` and ranges with equal lower bounds always
//! count as overlapping.

use std::collections::BTreeMap;

use super::handles::{DimensionHandle, FederateHandle, RegionToken, SpaceHandle};
use crate::saverestore::SaveRestoreTarget;
use crate::wire::{WireReader, WireWriter};
use crate::{Result, RtiError};

/// A half-open interval `[lower, upper)` on one dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub lower: i64,
    pub upper: i64,
}

impl Range {
    pub fn new(lower: i64, upper: i64) -> Self {
        Self { lower, upper }
    }

    /// Full-axis range, the default for a freshly created extent.
    pub fn unbounded() -> Self {
        Self {
            lower: i64::MIN,
            upper: i64::MAX,
        }
    }
}

impl Default for Range {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// One range per dimension of the owning region's routing space.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Extent {
    // BTreeMap keeps save/restore output deterministic.
    ranges: BTreeMap<DimensionHandle, Range>,
}

impl Extent {
    /// New extent with an unbounded range on each given dimension.
    pub fn new(dimensions: &[DimensionHandle]) -> Self {
        let mut ranges = BTreeMap::new();
        for &dimension in dimensions {
            ranges.insert(dimension, Range::unbounded());
        }
        Self { ranges }
    }

    pub fn range(&self, dimension: DimensionHandle) -> Option<Range> {
        self.ranges.get(&dimension).copied()
    }

    /// Replace the range on a dimension this extent already spans.
    pub fn set_range(&mut self, dimension: DimensionHandle, range: Range) -> Result<()> {
        match self.ranges.get_mut(&dimension) {
            Some(slot) => {
                *slot = range;
                Ok(())
            }
            None => Err(RtiError::NotFound(format!(
                "dimension [{}] not found in extent",
                dimension
            ))),
        }
    }

    pub fn dimension_count(&self) -> usize {
        self.ranges.len()
    }

    /// Overlap test: for every dimension both extents span, the ranges must
    /// intersect. Equal lower bounds count as overlap even for empty ranges.
    pub fn overlaps(&self, other: &Extent) -> bool {
        for (dimension, ours) in &self.ranges {
            let Some(theirs) = other.ranges.get(dimension) else {
                continue;
            };
            if ours.lower == theirs.lower {
                continue;
            }
            if ours.lower >= theirs.upper || ours.upper <= theirs.lower {
                return false;
            }
        }
        true
    }
}

/// A region instance: token, owning federate, routing space and extents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    token: RegionToken,
    creator: FederateHandle,
    space: SpaceHandle,
    extents: Vec<Extent>,
}

impl Region {
    pub fn new(
        token: RegionToken,
        creator: FederateHandle,
        space: SpaceHandle,
        extents: Vec<Extent>,
    ) -> Self {
        Self {
            token,
            creator,
            space,
            extents,
        }
    }

    pub fn token(&self) -> RegionToken {
        self.token
    }

    pub fn creator(&self) -> FederateHandle {
        self.creator
    }

    pub fn space(&self) -> SpaceHandle {
        self.space
    }

    pub fn extents(&self) -> &[Extent] {
        &self.extents
    }

    pub fn extents_mut(&mut self) -> &mut [Extent] {
        &mut self.extents
    }

    /// Two regions overlap iff any extent of one overlaps any extent of the
    /// other. Different routing spaces never overlap.
    pub fn overlaps(&self, other: &Region) -> bool {
        if self.space != other.space {
            return false;
        }
        self.extents
            .iter()
            .any(|a| other.extents.iter().any(|b| a.overlaps(b)))
    }
}

// ============================================================================
// RegionStore
// ============================================================================

/// All region instances known to one federation, keyed by token.
#[derive(Debug, Default)]
pub struct RegionStore {
    regions: BTreeMap<RegionToken, Region>,
}

impl RegionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_region(&mut self, region: Region) -> Result<()> {
        if self.regions.contains_key(&region.token()) {
            return Err(RtiError::AlreadyExists(format!(
                "region token {}",
                region.token()
            )));
        }
        self.regions.insert(region.token(), region);
        Ok(())
    }

    pub fn get_region(&self, token: RegionToken) -> Option<&Region> {
        self.regions.get(&token)
    }

    /// Region lookup restricted to the federate that created it.
    pub fn get_region_created_by(
        &self,
        token: RegionToken,
        federate: FederateHandle,
    ) -> Option<&Region> {
        self.regions
            .get(&token)
            .filter(|region| region.creator() == federate)
    }

    pub fn remove_region(&mut self, token: RegionToken) -> Option<Region> {
        self.regions.remove(&token)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

impl SaveRestoreTarget for RegionStore {
    fn save_to_stream(&self, writer: &mut WireWriter) {
        writer.put_u32(self.regions.len() as u32);
        for region in self.regions.values() {
            writer.put_u32(region.token);
            writer.put_u16(region.creator);
            writer.put_u32(region.space);
            writer.put_u16(region.extents.len() as u16);
            for extent in &region.extents {
                writer.put_u16(extent.ranges.len() as u16);
                for (dimension, range) in &extent.ranges {
                    writer.put_u32(*dimension);
                    writer.put_i64(range.lower);
                    writer.put_i64(range.upper);
                }
            }
        }
    }

    fn restore_from_stream(&mut self, reader: &mut WireReader) -> Result<()> {
        let mut regions = BTreeMap::new();
        let count = reader.get_u32()?;
        for _ in 0..count {
            let token = reader.get_u32()?;
            let creator = reader.get_u16()?;
            let space = reader.get_u32()?;
            let extent_count = reader.get_u16()?;
            let mut extents = Vec::with_capacity(extent_count as usize);
            for _ in 0..extent_count {
                let range_count = reader.get_u16()?;
                let mut ranges = BTreeMap::new();
                for _ in 0..range_count {
                    let dimension = reader.get_u32()?;
                    let lower = reader.get_i64()?;
                    let upper = reader.get_i64()?;
                    ranges.insert(dimension, Range { lower, upper });
                }
                extents.push(Extent { ranges });
            }
            regions.insert(token, Region { token, creator, space, extents });
        }
        self.regions = regions;
        Ok(())
    }
}

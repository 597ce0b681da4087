// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hrti-team

//! Read-only simulation metadata: handle space, the FOM graph and DDM
//! geometry.
//!
//! The FOM (Federation Object Model) parser is out of scope; this crate
//! consumes an already-built [`ObjectModel`] graph of object classes,
//! attributes, interaction classes, routing spaces and dimensions.

mod fom;
mod handles;
mod region;

pub use fom::{
    AttributeClass, InteractionClass, ObjectClass, ObjectModel, ObjectModelBuilder, Space,
};
pub use handles::{
    AttributeHandle, ClassHandle, DimensionHandle, FederateHandle, FederationHandle, HlaVersion,
    InteractionHandle, RegionToken, SpaceHandle, MAX_PAYLOAD_SIZE, NULL_HANDLE, NULL_OBJECT,
    NULL_TIME, RTI_HANDLE, TARGET_ALL_HANDLE, TARGET_MANY_HANDLE,
};
pub use region::{Extent, Range, Region, RegionStore};

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hrti-team

//! Save/restore plumbing for federation state.
//!
//! Components that participate in federation save implement
//! [`SaveRestoreTarget`]: they serialize their maps into an ordered byte
//! stream and can later re-hydrate from it. The format is internal and
//! versionless, but it is *deterministic*: saving the same logical state
//! twice yields the same bytes, and `restore(save(s))` is observationally
//! equal to `s`.

use crate::wire::{WireReader, WireWriter};
use crate::Result;

/// Implemented by every stateful manager that participates in a federation
/// save: the interest manager, sync point manager, region store and time
/// manager.
pub trait SaveRestoreTarget {
    /// Serialize the full state into the stream.
    fn save_to_stream(&self, writer: &mut WireWriter);

    /// Replace the current state with the one in the stream.
    ///
    /// On error the target may be left partially restored; callers are
    /// expected to discard it.
    fn restore_from_stream(&mut self, reader: &mut WireReader) -> Result<()>;
}

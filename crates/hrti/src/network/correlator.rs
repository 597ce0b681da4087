// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hrti-team

//! Request/response correlation for control traffic.
//!
//! A control request carries a 16-bit id; its response carries the same id
//! back. The [`ResponseCorrelator`] hands out ids, parks the requesting
//! thread, and wakes exactly that thread when the matching response is
//! offered. Responses may arrive in any order relative to request
//! submission; each waiter only ever observes its own slot, so there is no
//! cross-talk between ids.
//!
//! Id 0 is reserved for traffic that needs no correlation; allocation wraps
//! around the 16-bit space and skips ids still in flight.

use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::messaging::ResponseMessage;

/// One in-flight request: its own lock and wakeup signal.
struct Slot {
    response: Mutex<Option<ResponseMessage>>,
    arrived: Condvar,
}

/// Allocates request ids and routes responses back to blocked callers.
pub struct ResponseCorrelator {
    slots: Mutex<SlotMap>,
}

struct SlotMap {
    next_id: u16,
    in_flight: HashMap<u16, Arc<Slot>>,
}

impl ResponseCorrelator {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(SlotMap {
                next_id: 0,
                in_flight: HashMap::new(),
            }),
        }
    }

    /// Allocate a fresh request id and open its slot.
    ///
    /// Never returns 0 and never returns an id that is still in flight.
    pub fn register(&self) -> u16 {
        let mut slots = self.slots.lock();
        loop {
            slots.next_id = slots.next_id.wrapping_add(1);
            let id = slots.next_id;
            if id == 0 || slots.in_flight.contains_key(&id) {
                continue;
            }
            slots.in_flight.insert(
                id,
                Arc::new(Slot {
                    response: Mutex::new(None),
                    arrived: Condvar::new(),
                }),
            );
            return id;
        }
    }

    /// Block until the response for `id` arrives or `timeout` passes.
    ///
    /// Returns `None` on timeout or if the id was never registered. The
    /// slot is removed either way, so a response arriving after the
    /// deadline is dropped (and logged) rather than delivered to a later
    /// reuse of the id.
    pub fn wait_for(&self, id: u16, timeout: Duration) -> Option<ResponseMessage> {
        let slot = self.slots.lock().in_flight.get(&id).cloned()?;

        let deadline = Instant::now() + timeout;
        let mut response = slot.response.lock();
        while response.is_none() {
            if slot.arrived.wait_until(&mut response, deadline).timed_out() {
                break;
            }
        }
        let result = response.take();
        drop(response);

        self.slots.lock().in_flight.remove(&id);
        if result.is_none() {
            log::debug!("[ResponseCorrelator::wait_for] timed out waiting on request {}", id);
        }
        result
    }

    /// Deliver a response to whoever is waiting on `id`.
    ///
    /// A response for an unknown id (already timed out, or never ours) is
    /// dropped with a warning.
    pub fn offer(&self, id: u16, response: ResponseMessage) {
        let slot = self.slots.lock().in_flight.get(&id).cloned();
        match slot {
            Some(slot) => {
                *slot.response.lock() = Some(response);
                slot.arrived.notify_all();
            }
            None => {
                log::warn!(
                    "[ResponseCorrelator::offer] no waiter for request {}; response dropped",
                    id
                );
            }
        }
    }

    /// Ids currently awaiting a response.
    pub fn outstanding(&self) -> usize {
        self.slots.lock().in_flight.len()
    }
}

impl Default for ResponseCorrelator {
    fn default() -> Self {
        Self::new()
    }
}

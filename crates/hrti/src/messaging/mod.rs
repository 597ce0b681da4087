// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hrti-team

//! Application-level messages and their dispatch.
//!
//! An [`RtiMessage`] is the unit everything above the wire layer works
//! with: routing fields shared by every message plus a typed
//! [`MessageBody`]. Bodies are a tagged enum with one encode/decode pair
//! per variant, and the [`sink::MessageSink`] dispatches on the tag.
//!
//! Messages are value objects: cheap to clone, compared in tests, and
//! treated as immutable once handed to a connection or queue.

mod body;
pub mod context;
pub mod sink;

pub use body::{MessageBody, MessageType};
pub use context::{MessageContext, ResponseMessage};
pub use sink::MessageSink;

use std::collections::BTreeSet;

use crate::model::{
    FederateHandle, FederationHandle, NULL_HANDLE, NULL_TIME, RTI_HANDLE, TARGET_ALL_HANDLE,
    TARGET_MANY_HANDLE,
};

/// One application-level message: common routing fields plus a typed body.
#[derive(Debug, Clone, PartialEq)]
pub struct RtiMessage {
    source: FederateHandle,
    target: FederateHandle,
    /// Only populated when `target == TARGET_MANY_HANDLE`.
    multiple_targets: Option<BTreeSet<FederateHandle>>,
    federation: FederationHandle,
    from_rti: bool,
    immediate: bool,
    timestamp: f64,
    body: MessageBody,
}

impl RtiMessage {
    /// New message with null routing fields and no timestamp.
    pub fn new(body: MessageBody) -> Self {
        Self {
            source: NULL_HANDLE,
            target: NULL_HANDLE,
            multiple_targets: None,
            federation: NULL_HANDLE,
            from_rti: false,
            immediate: false,
            timestamp: NULL_TIME,
            body,
        }
    }

    /// Probe message targeted at the RTI itself.
    pub fn probe() -> Self {
        let mut message = Self::new(MessageBody::RtiProbe);
        message.target = RTI_HANDLE;
        message
    }

    pub fn message_type(&self) -> MessageType {
        self.body.message_type()
    }

    pub fn body(&self) -> &MessageBody {
        &self.body
    }

    pub fn into_body(self) -> MessageBody {
        self.body
    }

    pub fn source_federate(&self) -> FederateHandle {
        self.source
    }

    /// Setting the RTI handle as source also marks the message as
    /// RTI-originated.
    pub fn set_source_federate(&mut self, handle: FederateHandle) {
        self.source = handle;
        if handle == RTI_HANDLE {
            self.from_rti = true;
        }
    }

    /// Fill in the source only if nothing has claimed it yet.
    pub fn set_source_federate_if_null(&mut self, handle: FederateHandle) {
        if self.source == NULL_HANDLE {
            self.source = handle;
        }
    }

    pub fn target_federate(&self) -> FederateHandle {
        self.target
    }

    pub fn set_target_federate(&mut self, handle: FederateHandle) {
        self.target = handle;
        self.multiple_targets = None;
    }

    /// Collapse a target set: empty means everyone, a singleton becomes a
    /// direct target, anything larger keeps the explicit set alongside
    /// [`TARGET_MANY_HANDLE`].
    pub fn set_target_federates(&mut self, targets: BTreeSet<FederateHandle>) {
        match targets.len() {
            0 => {
                self.target = TARGET_ALL_HANDLE;
                self.multiple_targets = None;
            }
            1 => {
                self.target = targets.into_iter().next().unwrap();
                self.multiple_targets = None;
            }
            _ => {
                self.target = TARGET_MANY_HANDLE;
                self.multiple_targets = Some(targets);
            }
        }
    }

    /// The effective target set, regardless of how it is stored.
    pub fn multiple_targets(&self) -> BTreeSet<FederateHandle> {
        match &self.multiple_targets {
            Some(targets) => targets.clone(),
            None => [self.target].into_iter().collect(),
        }
    }

    pub fn is_multi_target(&self) -> bool {
        self.target == TARGET_MANY_HANDLE
    }

    pub fn target_federation(&self) -> FederationHandle {
        self.federation
    }

    pub fn set_target_federation(&mut self, handle: FederationHandle) {
        self.federation = handle;
    }

    pub fn is_from_rti(&self) -> bool {
        self.from_rti
    }

    /// Marking a message as RTI-originated also claims the source handle
    /// if nothing else has.
    pub fn set_is_from_rti(&mut self, from_rti: bool) {
        self.from_rti = from_rti;
        if from_rti {
            self.set_source_federate_if_null(RTI_HANDLE);
        }
    }

    /// RTI-originated control requests need no reply.
    pub fn is_async(&self) -> bool {
        self.from_rti
    }

    pub fn is_immediate(&self) -> bool {
        self.immediate
    }

    pub fn set_immediate(&mut self, immediate: bool) {
        self.immediate = immediate;
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn set_timestamp(&mut self, timestamp: f64) {
        self.timestamp = timestamp;
    }

    pub fn is_timestamped(&self) -> bool {
        self.timestamp != NULL_TIME
    }

    /// A message with no explicit target goes to everyone.
    pub fn is_broadcast(&self) -> bool {
        self.target == NULL_HANDLE || self.target == TARGET_ALL_HANDLE
    }

    /// Hot-path messages opt into the manual marshalling fast path.
    pub fn supports_manual_marshal(&self) -> bool {
        self.body.message_type().supports_manual_marshal()
    }

    /// Crate-internal: restore routing fields while decoding (they travel
    /// in the header, not the payload).
    pub(crate) fn with_routing(
        mut self,
        source: FederateHandle,
        target: FederateHandle,
        federation: FederationHandle,
    ) -> Self {
        self.source = source;
        self.target = target;
        self.federation = federation;
        if source == RTI_HANDLE {
            self.from_rti = true;
        }
        self
    }
}

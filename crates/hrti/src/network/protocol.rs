// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hrti-team

//! The pluggable protocol stack.
//!
//! Every message a connection sends or receives flows through an ordered
//! chain of protocols. The head of the chain is the implicit application
//! connector (the [`crate::network::Connection`] itself) and the tail is
//! always the transport; the stack owns only what sits between them, as an
//! index-ordered arena rather than a doubly-linked list, so protocols can
//! never observe half-torn-down neighbours.
//!
//! ```text
//!   Connection (implicit head)
//!        | down                 ^ up
//!        v                      |
//!   [ protocol 0 ]  ->  [ protocol 1 ]  ->  ...
//!        |                      ^
//!        v                      |
//!   Transport (implicit tail)
//! ```
//!
//! A protocol forwards, rewrites or absorbs each message; absorbing is how
//! filtering protocols drop traffic. Protocols that need to synthesize
//! messages of their own hold a send handle onto the owning connection.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::wire::Message;
use crate::{Result, RtiError};

/// What a protocol did with a message.
pub enum Flow {
    /// Pass the (possibly rewritten) message to the next stage.
    Forward(Message),

    /// Swallow the message; nothing further sees it.
    Absorb,
}

/// One stage in the stack.
///
/// Methods take `&self`: a protocol synchronizes its own mutable state, the
/// same way transports and connections do, because up and down traffic hit
/// it from different threads.
pub trait Protocol: Send + Sync {
    /// Unique (case-insensitive) name within a stack.
    fn name(&self) -> &str;

    fn open(&self) -> Result<()>;

    fn close(&self) -> Result<()>;

    /// Handle a message headed for the wire.
    fn down(&self, message: Message) -> Flow;

    /// Handle a message headed for the application.
    fn up(&self, message: Message) -> Flow;
}

/// Ordered chain of protocols between a connection and its transport.
pub struct ProtocolStack {
    protocols: RwLock<Vec<Arc<dyn Protocol>>>,
}

impl ProtocolStack {
    pub fn new() -> Self {
        Self {
            protocols: RwLock::new(Vec::new()),
        }
    }

    /// Insert a protocol immediately before the transport (the end of the
    /// owned chain). Names must be unique within the stack.
    ///
    /// `transport_open` tells the stack whether traffic is already flowing;
    /// a protocol added to a live stack is opened on the spot.
    pub fn add_protocol(&self, protocol: Arc<dyn Protocol>, transport_open: bool) -> Result<()> {
        let mut protocols = self.protocols.write();
        if protocols
            .iter()
            .any(|existing| existing.name().eq_ignore_ascii_case(protocol.name()))
        {
            return Err(RtiError::AlreadyExists(format!(
                "protocol instance already in stack: {}",
                protocol.name()
            )));
        }
        if transport_open {
            protocol.open()?;
        }
        protocols.push(protocol);
        Ok(())
    }

    /// Open every protocol, head to tail. The transport is not part of the
    /// chain and is opened separately by the connection.
    pub fn open(&self) -> Result<()> {
        for protocol in self.protocols.read_recursive().iter() {
            protocol.open()?;
        }
        Ok(())
    }

    /// Close every protocol. Failures are logged and swallowed so every
    /// protocol gets its close.
    pub fn close(&self) {
        for protocol in self.protocols.read_recursive().iter() {
            if let Err(e) = protocol.close() {
                log::warn!(
                    "[ProtocolStack::close] exception while closing protocol {}: {}",
                    protocol.name(),
                    e
                );
            }
        }
    }

    /// Run a message down the chain. `None` means a protocol absorbed it.
    pub fn down(&self, message: Message) -> Option<Message> {
        let mut current = message;
        for protocol in self.protocols.read_recursive().iter() {
            match protocol.down(current) {
                Flow::Forward(next) => current = next,
                Flow::Absorb => return None,
            }
        }
        Some(current)
    }

    /// Run a message up the chain (tail to head). `None` means absorbed.
    pub fn up(&self, message: Message) -> Option<Message> {
        let mut current = message;
        for protocol in self.protocols.read_recursive().iter().rev() {
            match protocol.up(current) {
                Flow::Forward(next) => current = next,
                Flow::Absorb => return None,
            }
        }
        Some(current)
    }

    pub fn len(&self) -> usize {
        self.protocols.read_recursive().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ProtocolStack {
    fn default() -> Self {
        Self::new()
    }
}

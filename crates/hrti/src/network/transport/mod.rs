// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hrti-team

//! Transports: the tail of every protocol stack.
//!
//! A transport moves already-encoded frames between this process and one
//! remote endpoint. Downward traffic arrives through [`Transport::down`];
//! inbound frames are handed to the [`Uplink`] the transport was built
//! with, which feeds them back up the owning connection's stack.
//!
//! Two implementations ship with the core: the bundled-stream TCP
//! transport ([`tcp::TcpTransport`]) and an in-process pair
//! ([`inproc::InprocTransport`]) for loopback wiring and tests.

pub mod bundler;
pub mod inproc;
pub mod tcp;

pub use bundler::{Bundler, BUNDLE_MAGIC, BUNDLE_OVERHEAD};

use std::sync::Arc;

use crate::wire::Message;
use crate::Result;

/// Which transport implementation a connection is using.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Bundled TCP stream.
    TcpStream,
    /// In-process channel pair.
    Inproc,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TcpStream => write!(f, "tcp-stream"),
            Self::Inproc => write!(f, "inproc"),
        }
    }
}

/// Delivery handle from a transport's reader into its connection.
///
/// Cloneable and cheap; reader threads call [`Uplink::deliver`] for every
/// inbound frame they decode.
#[derive(Clone)]
pub struct Uplink {
    deliver: Arc<dyn Fn(Message) + Send + Sync>,
}

impl Uplink {
    pub fn new(deliver: impl Fn(Message) + Send + Sync + 'static) -> Self {
        Self {
            deliver: Arc::new(deliver),
        }
    }

    /// Uplink that drops everything; placeholder for tests.
    pub fn discard() -> Self {
        Self::new(|_| {})
    }

    pub fn deliver(&self, message: Message) {
        (self.deliver)(message);
    }
}

impl std::fmt::Debug for Uplink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Uplink")
    }
}

/// One endpoint-to-endpoint byte mover.
pub trait Transport: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// Open the transport and start its reader. Frames delivered to the
    /// uplink may start arriving before this returns.
    fn open(&self) -> Result<()>;

    /// Close the transport and stop the reader. Idempotent.
    fn close(&self);

    fn is_open(&self) -> bool;

    /// Queue one frame for the remote endpoint.
    fn down(&self, message: Message) -> Result<()>;
}

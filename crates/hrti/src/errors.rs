// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hrti-team

//! Error types for RTI operations.
//!
//! One domain-level taxonomy for the whole crate. Wire-format violations are
//! fatal for the connection that produced them; everything else is surfaced
//! to the caller (and, on the control path, converted into an error response
//! on the message context).

use std::fmt;

/// Result type for RTI operations.
pub type Result<T> = std::result::Result<T, RtiError>;

/// Errors that can occur across the RTI core.
#[derive(Debug)]
pub enum RtiError {
    /// Wire format violation. Fatal for the connection.
    Protocol(String),

    /// A class, attribute, region, sync point or federate is not defined.
    NotFound(String),

    /// Duplicate federation, federate name or sync point label.
    AlreadyExists(String),

    /// Federate is not published/subscribed as claimed.
    NotRegistered(String),

    /// Region's routing space disagrees with the FOM for the given
    /// attribute or interaction class.
    InvalidRegionContext(String),

    /// Response correlator exceeded its deadline.
    Timeout(String),

    /// Connection is not open (or was torn down under us).
    NotConnected(String),

    /// Anything else. Surfaced and logged at error level.
    Internal(String),
}

impl RtiError {
    /// Shorthand for an [`RtiError::Internal`] with a formatted message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// True if this error should tear down the connection it came from.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }
}

impl fmt::Display for RtiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Protocol(msg) => write!(f, "wire protocol error: {}", msg),
            Self::NotFound(msg) => write!(f, "not found: {}", msg),
            Self::AlreadyExists(msg) => write!(f, "already exists: {}", msg),
            Self::NotRegistered(msg) => write!(f, "not registered: {}", msg),
            Self::InvalidRegionContext(msg) => write!(f, "invalid region context: {}", msg),
            Self::Timeout(msg) => write!(f, "timed out: {}", msg),
            Self::NotConnected(msg) => write!(f, "not connected: {}", msg),
            Self::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for RtiError {}

impl From<std::io::Error> for RtiError {
    fn from(e: std::io::Error) -> Self {
        Self::Internal(format!("i/o error: {}", e))
    }
}

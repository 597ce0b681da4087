// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hrti-team

//! Wire-level message plumbing: the envelope, the fixed header and the
//! payload codecs.
//!
//! Every message on the wire is a 12-byte [`Header`] followed by
//! `payload_length` bytes of payload (and, when flagged, an auth token
//! and/or encryption nonce). [`Message`] wraps one such frame together
//! with its [`CallType`] and correlation id; the payload codecs in
//! [`codec`] translate between frames and [`crate::messaging::RtiMessage`].

pub mod codec;
mod header;
mod scribe;

pub use header::{
    write_header, Header, HeaderFields, AUTH_TOKEN_LENGTH, HEADER_LENGTH, NONCE_LENGTH,
};
pub use scribe::{WireReader, WireWriter};

use crate::messaging::{ResponseMessage, RtiMessage};
use crate::{Result, RtiError};

/// Wire-level classification of a frame.
///
/// Control requests carry a non-zero correlation id and expect a matching
/// response; data messages and notifications are fire-and-forget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallType {
    DataMessage,
    Notification,
    ControlRequest,
    ControlResponseOk,
    ControlResponseErr,
}

impl CallType {
    /// 4-bit wire id.
    pub fn id(self) -> u8 {
        match self {
            Self::DataMessage => 0,
            Self::Notification => 1,
            Self::ControlRequest => 2,
            Self::ControlResponseOk => 3,
            Self::ControlResponseErr => 4,
        }
    }

    pub fn from_id(id: u8) -> Result<Self> {
        match id {
            0 => Ok(Self::DataMessage),
            1 => Ok(Self::Notification),
            2 => Ok(Self::ControlRequest),
            3 => Ok(Self::ControlResponseOk),
            4 => Ok(Self::ControlResponseErr),
            other => Err(RtiError::Protocol(format!("CallType id not known: {}", other))),
        }
    }

    /// True for both response variants.
    pub fn is_response(self) -> bool {
        matches!(self, Self::ControlResponseOk | Self::ControlResponseErr)
    }
}

impl std::fmt::Display for CallType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::DataMessage => "DataMessage",
            Self::Notification => "Notification",
            Self::ControlRequest => "ControlRequest",
            Self::ControlResponseOk => "ControlResponseOK",
            Self::ControlResponseErr => "ControlResponseErr",
        };
        write!(f, "{}", s)
    }
}

// ============================================================================
// Message envelope
// ============================================================================

/// One encoded frame travelling through the protocol stack.
///
/// Owns the byte buffer; the header is re-read from the buffer on demand
/// so routing layers can inspect it without decoding the payload. After
/// encoding, the first [`HEADER_LENGTH`] bytes are always a valid header
/// and the buffer length equals the header's frame length.
#[derive(Debug, Clone)]
pub struct Message {
    call_type: CallType,
    request_id: u16,
    buffer: Vec<u8>,
}

impl Message {
    /// Encode an application message into a frame.
    ///
    /// `request_id` must be 0 for anything that is not a control request.
    pub fn from_request(
        request: &RtiMessage,
        call_type: CallType,
        request_id: u16,
    ) -> Result<Self> {
        let buffer = codec::encode(request, call_type, request_id)?;
        Ok(Self {
            call_type,
            request_id,
            buffer,
        })
    }

    /// Wrap an already-encoded frame received from a transport.
    pub fn from_buffer(buffer: Vec<u8>) -> Result<Self> {
        let header = Header::new(&buffer)?;
        let call_type = header.call_type()?;
        let request_id = header.request_id();
        if buffer.len() != header.frame_length() {
            return Err(RtiError::Protocol(format!(
                "frame is {} bytes but the header claims {}",
                buffer.len(),
                header.frame_length()
            )));
        }
        Ok(Self {
            call_type,
            request_id,
            buffer,
        })
    }

    pub fn call_type(&self) -> CallType {
        self.call_type
    }

    pub fn request_id(&self) -> u16 {
        self.request_id
    }

    /// Zero-copy header view over the current buffer.
    pub fn header(&self) -> Header<'_> {
        Header::new(&self.buffer).expect("message buffer always holds a header")
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_buffer(self) -> Vec<u8> {
        self.buffer
    }

    /// Decode the payload back into an application message.
    pub fn inflate(&self) -> Result<RtiMessage> {
        codec::decode(&self.buffer)
    }

    /// Decode the payload as a control response.
    pub fn inflate_response(&self) -> Result<ResponseMessage> {
        codec::decode_response(&self.buffer)
    }

    /// Replace this request frame with a response to it, in place.
    ///
    /// The response header flips source and target and keeps the request's
    /// message type and correlation id, so the caller can push the same
    /// `Message` back down the stack it arrived on.
    pub fn store_response(&mut self, response: &ResponseMessage) -> Result<()> {
        let header = self.header();
        let call_type = if response.is_success() {
            CallType::ControlResponseOk
        } else {
            CallType::ControlResponseErr
        };
        let buffer = codec::encode_response(
            response,
            self.request_id,
            header.message_type_id(),
            header.federation(),
            // flipped relative to the request
            header.target_federate(),
            header.source_federate(),
        )?;
        self.call_type = call_type;
        self.buffer = buffer;
        Ok(())
    }
}

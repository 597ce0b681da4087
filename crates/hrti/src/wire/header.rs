// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hrti-team

//! The fixed 12-byte message header and its codec.
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |     Flags     |                 Payload Length                |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! | CType | FedID |  MessageType  |     RequestId/FilteringId     |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |         Source Handle         |         Target Handle         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Flags, MSB first: bundle, encrypted, authenticated, manually-marshalled,
//! filtering, filtering-is-object-class, two spare bits. Payload length is
//! a 24-bit big-endian count that *excludes* the header and any trailers.
//! When the authenticated flag is set a 4-byte token follows the payload;
//! when the encrypted flag is set a 16-byte nonce follows that.
//!
//! [`Header`] is a borrowed view: accessors decode straight out of the
//! buffer on every call and nothing is cached, so wrapping a frame to peek
//! at one routing field costs nothing.

use crate::model::{FederateHandle, FederationHandle};
use crate::{Result, RtiError};

use super::CallType;

/// Size of the fixed header in bytes.
pub const HEADER_LENGTH: usize = 12;

/// Bytes of authentication token trailing the payload when flagged.
pub const AUTH_TOKEN_LENGTH: usize = 4;

/// Bytes of encryption nonce trailing the payload when flagged.
pub const NONCE_LENGTH: usize = 16;

const FLAG_BUNDLE: u8 = 0b1000_0000;
const FLAG_ENCRYPTED: u8 = 0b0100_0000;
const FLAG_AUTHENTICATED: u8 = 0b0010_0000;
const FLAG_MANUAL_MARSHAL: u8 = 0b0001_0000;
const FLAG_FILTERING: u8 = 0b0000_1000;
const FLAG_FILTERING_OBJECT_CLASS: u8 = 0b0000_0100;

/// Borrowed, zero-copy view over the first [`HEADER_LENGTH`] bytes of a
/// frame.
#[derive(Clone, Copy)]
pub struct Header<'a> {
    buffer: &'a [u8],
}

impl<'a> Header<'a> {
    /// Wrap a frame. Fails if the buffer cannot hold a header.
    pub fn new(buffer: &'a [u8]) -> Result<Self> {
        if buffer.len() < HEADER_LENGTH {
            return Err(RtiError::Protocol(format!(
                "header requires at least {} bytes; found {}",
                HEADER_LENGTH,
                buffer.len()
            )));
        }
        Ok(Self { buffer })
    }

    fn flag(&self, mask: u8) -> bool {
        self.buffer[0] & mask != 0
    }

    pub fn is_bundle(&self) -> bool {
        self.flag(FLAG_BUNDLE)
    }

    pub fn is_encrypted(&self) -> bool {
        self.flag(FLAG_ENCRYPTED)
    }

    pub fn is_authenticated(&self) -> bool {
        self.flag(FLAG_AUTHENTICATED)
    }

    pub fn is_manual_marshal(&self) -> bool {
        self.flag(FLAG_MANUAL_MARSHAL)
    }

    pub fn is_filtering(&self) -> bool {
        self.flag(FLAG_FILTERING)
    }

    pub fn is_filtering_object_class(&self) -> bool {
        self.flag(FLAG_FILTERING_OBJECT_CLASS)
    }

    /// Payload length, excluding the header and any trailers.
    pub fn payload_length(&self) -> usize {
        ((self.buffer[1] as usize) << 16)
            | ((self.buffer[2] as usize) << 8)
            | (self.buffer[3] as usize)
    }

    /// Bytes of auth token / nonce trailing the payload.
    pub fn trailer_length(&self) -> usize {
        let mut n = 0;
        if self.is_authenticated() {
            n += AUTH_TOKEN_LENGTH;
        }
        if self.is_encrypted() {
            n += NONCE_LENGTH;
        }
        n
    }

    /// Total on-wire size of the frame this header fronts.
    pub fn frame_length(&self) -> usize {
        HEADER_LENGTH + self.payload_length() + self.trailer_length()
    }

    pub fn call_type(&self) -> Result<CallType> {
        CallType::from_id(self.buffer[4] >> 4)
    }

    /// True without decoding the enum: data messages are id 0.
    pub fn is_data_message(&self) -> bool {
        self.buffer[4] >> 4 == 0
    }

    pub fn federation(&self) -> FederationHandle {
        FederationHandle::from(self.buffer[4] & 0x0F)
    }

    /// Raw message type id; the payload codec resolves it to a type.
    pub fn message_type_id(&self) -> u8 {
        self.buffer[5]
    }

    pub fn request_id(&self) -> u16 {
        u16::from_be_bytes([self.buffer[6], self.buffer[7]])
    }

    /// Same field as [`Self::request_id`]: data messages reuse it as the
    /// filtering id (object or interaction handle of the sender's class).
    pub fn filtering_id(&self) -> u16 {
        self.request_id()
    }

    pub fn source_federate(&self) -> FederateHandle {
        u16::from_be_bytes([self.buffer[8], self.buffer[9]])
    }

    pub fn target_federate(&self) -> FederateHandle {
        u16::from_be_bytes([self.buffer[10], self.buffer[11]])
    }
}

impl std::fmt::Debug for Header<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Header")
            .field("call_type", &(self.buffer[4] >> 4))
            .field("federation", &self.federation())
            .field("message_type", &self.message_type_id())
            .field("request_id", &self.request_id())
            .field("source", &self.source_federate())
            .field("target", &self.target_federate())
            .field("payload_length", &self.payload_length())
            .field("manual_marshal", &self.is_manual_marshal())
            .finish()
    }
}

// ============================================================================
// Header writing
// ============================================================================

/// Everything needed to fill in a request header.
#[derive(Debug, Clone, Copy)]
pub struct HeaderFields {
    pub call_type: CallType,
    pub federation: FederationHandle,
    pub message_type: u8,
    /// Request id for control traffic, filtering id for data messages.
    pub request_or_filtering_id: u16,
    pub source: FederateHandle,
    pub target: FederateHandle,
    pub manual_marshal: bool,
    /// `Some(true)` = filtering on an object class, `Some(false)` = on an
    /// interaction class, `None` = no filtering information.
    pub filtering_object_class: Option<bool>,
}

/// Write a header into the first [`HEADER_LENGTH`] bytes of `buffer`.
///
/// The payload (and any trailers) must already occupy the rest of the
/// buffer; `payload_length` is derived from the buffer size so the length
/// field can never disagree with reality.
pub fn write_header(buffer: &mut [u8], fields: HeaderFields) -> Result<()> {
    if buffer.len() < HEADER_LENGTH {
        return Err(RtiError::Protocol(
            "buffer too small for a message header".to_string(),
        ));
    }
    let payload_length = buffer.len() - HEADER_LENGTH;
    if payload_length > crate::model::MAX_PAYLOAD_SIZE {
        return Err(RtiError::Protocol(format!(
            "payload of {} bytes exceeds the 16 MB wire limit",
            payload_length
        )));
    }

    let mut flags = 0u8;
    if fields.manual_marshal {
        flags |= FLAG_MANUAL_MARSHAL;
    }
    if let Some(object_class) = fields.filtering_object_class {
        flags |= FLAG_FILTERING;
        if object_class {
            flags |= FLAG_FILTERING_OBJECT_CLASS;
        }
    }

    buffer[0] = flags;
    buffer[1] = ((payload_length >> 16) & 0xFF) as u8;
    buffer[2] = ((payload_length >> 8) & 0xFF) as u8;
    buffer[3] = (payload_length & 0xFF) as u8;
    buffer[4] = (fields.call_type.id() << 4) | ((fields.federation & 0x0F) as u8);
    buffer[5] = fields.message_type;
    buffer[6..8].copy_from_slice(&fields.request_or_filtering_id.to_be_bytes());
    buffer[8..10].copy_from_slice(&fields.source.to_be_bytes());
    buffer[10..12].copy_from_slice(&fields.target.to_be_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(fields: HeaderFields, payload: usize) -> Vec<u8> {
        let mut buffer = vec![0u8; HEADER_LENGTH + payload];
        write_header(&mut buffer, fields).unwrap();
        buffer
    }

    fn base_fields() -> HeaderFields {
        HeaderFields {
            call_type: CallType::ControlRequest,
            federation: 3,
            message_type: 17,
            request_or_filtering_id: 0xBEEF,
            source: 21,
            target: 0xFFFF,
            manual_marshal: false,
            filtering_object_class: None,
        }
    }

    #[test]
    fn test_roundtrip_all_fields() {
        let buffer = frame(base_fields(), 100);
        let header = Header::new(&buffer).unwrap();

        assert_eq!(header.call_type().unwrap(), CallType::ControlRequest);
        assert_eq!(header.federation(), 3);
        assert_eq!(header.message_type_id(), 17);
        assert_eq!(header.request_id(), 0xBEEF);
        assert_eq!(header.source_federate(), 21);
        assert_eq!(header.target_federate(), 0xFFFF);
        assert_eq!(header.payload_length(), 100);
        assert_eq!(header.frame_length(), 112);
        assert!(!header.is_manual_marshal());
        assert!(!header.is_filtering());
        assert!(!header.is_data_message());
    }

    #[test]
    fn test_roundtrip_exhaustive_small_fields() {
        // every calltype x federation nibble x a spread of ids and handles
        let call_types = [
            CallType::DataMessage,
            CallType::Notification,
            CallType::ControlRequest,
            CallType::ControlResponseOk,
            CallType::ControlResponseErr,
        ];
        let ids = [0u16, 1, 0x00FF, 0x0100, 0xFFFF];
        for call_type in call_types {
            for federation in 0..16u16 {
                for &id in &ids {
                    let fields = HeaderFields {
                        call_type,
                        federation,
                        message_type: 0xAB,
                        request_or_filtering_id: id,
                        source: id.wrapping_add(1),
                        target: id.wrapping_mul(3),
                        manual_marshal: id & 1 == 0,
                        filtering_object_class: None,
                    };
                    let buffer = frame(fields, 0);
                    let header = Header::new(&buffer).unwrap();
                    assert_eq!(header.call_type().unwrap(), call_type);
                    assert_eq!(header.federation(), federation);
                    assert_eq!(header.request_id(), id);
                    assert_eq!(header.source_federate(), id.wrapping_add(1));
                    assert_eq!(header.target_federate(), id.wrapping_mul(3));
                    assert_eq!(header.is_manual_marshal(), id & 1 == 0);
                }
            }
        }
    }

    #[test]
    fn test_payload_length_24_bits() {
        let buffer = frame(base_fields(), 0x00AB_CDEF);
        let header = Header::new(&buffer).unwrap();
        assert_eq!(header.payload_length(), 0x00AB_CDEF);
    }

    #[test]
    fn test_filtering_flags() {
        let mut fields = base_fields();
        fields.call_type = CallType::DataMessage;
        fields.filtering_object_class = Some(true);
        let buffer = frame(fields, 8);
        let header = Header::new(&buffer).unwrap();
        assert!(header.is_data_message());
        assert!(header.is_filtering());
        assert!(header.is_filtering_object_class());

        fields.filtering_object_class = Some(false);
        let buffer = frame(fields, 8);
        let header = Header::new(&buffer).unwrap();
        assert!(header.is_filtering());
        assert!(!header.is_filtering_object_class());
    }

    #[test]
    fn test_trailer_lengths_follow_flags() {
        let buffer = frame(base_fields(), 10);
        assert_eq!(Header::new(&buffer).unwrap().trailer_length(), 0);

        let mut authed = buffer.clone();
        authed[0] |= FLAG_AUTHENTICATED;
        assert_eq!(Header::new(&authed).unwrap().trailer_length(), AUTH_TOKEN_LENGTH);

        let mut both = authed.clone();
        both[0] |= FLAG_ENCRYPTED;
        assert_eq!(
            Header::new(&both).unwrap().trailer_length(),
            AUTH_TOKEN_LENGTH + NONCE_LENGTH
        );
        assert_eq!(
            Header::new(&both).unwrap().frame_length(),
            HEADER_LENGTH + 10 + AUTH_TOKEN_LENGTH + NONCE_LENGTH
        );
    }

    #[test]
    fn test_short_buffer_rejected() {
        assert!(Header::new(&[0u8; 11]).is_err());
        assert!(Header::new(&[0u8; 12]).is_ok());
    }

    #[test]
    fn test_unknown_call_type_is_an_error() {
        let mut buffer = frame(base_fields(), 0);
        buffer[4] = 0xF0; // calltype nibble 15
        let header = Header::new(&buffer).unwrap();
        assert!(header.call_type().is_err());
    }
}

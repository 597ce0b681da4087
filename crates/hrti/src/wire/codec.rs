// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hrti-team

//! Payload codec: frames <-> application messages.
//!
//! Two encodings share the wire:
//!
//! - **Manual marshal** for the volume-dominating data messages
//!   (`UpdateAttributes`, `SendInteraction`): `bool(true)`, `u16` type id,
//!   `i32` entity id, envelope fields, type-specific fields. The entity id
//!   sits at a fixed offset so receivers can route on it cheaply.
//! - **Generic** for everything else: `bool(false)`, `u16` type id,
//!   envelope fields, type-specific fields through the deterministic
//!   big-endian serializer.
//!
//! Routing fields (source, target, federation) live in the header only;
//! the envelope carries what the header cannot: the from-RTI flag, the
//! immediate-processing flag and the logical timestamp.
//!
//! Multi-target messages have no wire encoding: the explicit target set is
//! an in-process construct and encoding one is rejected here, at the
//! boundary.

use crate::messaging::{MessageBody, MessageType, ResponseMessage, RtiMessage};
use crate::model::{FederationHandle, MAX_PAYLOAD_SIZE};
use crate::{Result, RtiError};

use super::{write_header, CallType, Header, HeaderFields, WireReader, WireWriter, HEADER_LENGTH};

/// Encode an application message into a complete frame (header included).
pub fn encode(message: &RtiMessage, call_type: CallType, request_id: u16) -> Result<Vec<u8>> {
    if message.is_multi_target() {
        return Err(RtiError::Protocol(
            "multi-target messages have no wire encoding; expand the target set before sending"
                .to_string(),
        ));
    }

    let message_type = message.message_type();
    let manual = message.supports_manual_marshal();

    let mut writer = WireWriter::with_reserved(HEADER_LENGTH);
    writer.put_bool(manual);
    writer.put_u16(u16::from(message_type.id()));
    if manual {
        let entity_id = message
            .body()
            .manual_entity_id()
            .expect("manual-marshal body always has an entity id");
        writer.put_i32(entity_id as i32);
    }
    encode_envelope(&mut writer, message);
    message.body().encode_fields(&mut writer);

    let mut buffer = writer.finish();
    if buffer.len() - HEADER_LENGTH > MAX_PAYLOAD_SIZE {
        return Err(RtiError::Protocol(format!(
            "{} payload of {} bytes exceeds the 16 MB wire limit",
            message_type,
            buffer.len() - HEADER_LENGTH
        )));
    }

    // data messages reuse the request-id field as the filtering id
    let request_or_filtering_id = if call_type == CallType::DataMessage {
        message.body().filtering_id().unwrap_or(0)
    } else {
        request_id
    };

    let filtering_object_class = if call_type == CallType::DataMessage {
        match message.body() {
            MessageBody::UpdateAttributes { .. } => Some(true),
            MessageBody::SendInteraction { .. } => Some(false),
            _ => None,
        }
    } else {
        None
    };

    write_header(
        &mut buffer,
        HeaderFields {
            call_type,
            federation: message.target_federation(),
            message_type: message_type.id(),
            request_or_filtering_id,
            source: message.source_federate(),
            target: message.target_federate(),
            manual_marshal: manual,
            filtering_object_class,
        },
    )?;
    Ok(buffer)
}

fn encode_envelope(writer: &mut WireWriter, message: &RtiMessage) {
    writer.put_bool(message.is_from_rti());
    writer.put_bool(message.is_immediate());
    writer.put_f64(message.timestamp());
}

/// Decode a complete frame back into an application message.
pub fn decode(buffer: &[u8]) -> Result<RtiMessage> {
    let header = Header::new(buffer)?;
    if header.payload_length() > MAX_PAYLOAD_SIZE {
        return Err(RtiError::Protocol(format!(
            "header claims a {} byte payload, over the 16 MB wire limit",
            header.payload_length()
        )));
    }
    if buffer.len() < header.frame_length() {
        return Err(RtiError::Protocol(format!(
            "frame truncated: {} bytes for a {} byte frame",
            buffer.len(),
            header.frame_length()
        )));
    }

    let payload = &buffer[HEADER_LENGTH..HEADER_LENGTH + header.payload_length()];
    let mut reader = WireReader::new(payload);

    let manual = reader.get_bool()?;
    let type_tag = reader.get_u16()?;
    let type_id = u8::try_from(type_tag)
        .map_err(|_| RtiError::Protocol(format!("MessageType id not known: {}", type_tag)))?;
    let message_type = MessageType::from_id(type_id)?;

    if manual && !message_type.supports_manual_marshal() {
        return Err(RtiError::Protocol(format!(
            "message type {} does not support manual marshalling",
            message_type
        )));
    }

    let entity_id = if manual { reader.get_i32()? as u32 } else { 0 };

    let from_rti = reader.get_bool()?;
    let immediate = reader.get_bool()?;
    let timestamp = reader.get_f64()?;

    let body = MessageBody::decode_fields(message_type, entity_id, &mut reader)?;

    let mut message = RtiMessage::new(body).with_routing(
        header.source_federate(),
        header.target_federate(),
        header.federation(),
    );
    message.set_is_from_rti(from_rti);
    message.set_immediate(immediate);
    message.set_timestamp(timestamp);
    Ok(message)
}

// ============================================================================
// Responses
// ============================================================================

/// Encode a control response into a complete frame.
///
/// Responses keep the request's message type and correlation id; source and
/// target are the request's, flipped, supplied by the caller.
pub fn encode_response(
    response: &ResponseMessage,
    request_id: u16,
    request_type_id: u8,
    federation: FederationHandle,
    source: u16,
    target: u16,
) -> Result<Vec<u8>> {
    let mut writer = WireWriter::with_reserved(HEADER_LENGTH);
    response.encode_fields(&mut writer);
    let mut buffer = writer.finish();

    let call_type = if response.is_success() {
        CallType::ControlResponseOk
    } else {
        CallType::ControlResponseErr
    };
    write_header(
        &mut buffer,
        HeaderFields {
            call_type,
            federation,
            message_type: request_type_id,
            request_or_filtering_id: request_id,
            source,
            target,
            manual_marshal: false,
            filtering_object_class: None,
        },
    )?;
    Ok(buffer)
}

/// Decode a control response frame.
pub fn decode_response(buffer: &[u8]) -> Result<ResponseMessage> {
    let header = Header::new(buffer)?;
    if !header.call_type()?.is_response() {
        return Err(RtiError::Protocol(format!(
            "expected a control response frame, found {}",
            header.call_type()?
        )));
    }
    let payload = &buffer[HEADER_LENGTH..HEADER_LENGTH + header.payload_length()];
    ResponseMessage::decode_fields(&mut WireReader::new(payload))
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hrti-team

//! Request/response context for control messages.
//!
//! A [`MessageContext`] carries one request through the handler chain and
//! collects the [`ResponseMessage`] the handlers produce. On the RTI side
//! the populated response is encoded back onto the requesting connection;
//! on the federate side it is what `send_control_request` returns into.

use std::collections::BTreeMap;

use super::RtiMessage;
use crate::wire::{WireReader, WireWriter};
use crate::Result;

/// Outcome of a control request.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseMessage {
    /// Success, with an optional map of named result values.
    Success { results: BTreeMap<String, Vec<u8>> },

    /// Failure, with a human-readable reason.
    Error { message: String },
}

impl ResponseMessage {
    pub fn ok() -> Self {
        Self::Success {
            results: BTreeMap::new(),
        }
    }

    pub fn ok_with(key: &str, value: Vec<u8>) -> Self {
        let mut results = BTreeMap::new();
        results.insert(key.to_string(), value);
        Self::Success { results }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn is_error(&self) -> bool {
        !self.is_success()
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error { message } => Some(message),
            Self::Success { .. } => None,
        }
    }

    /// Named result value from a success response.
    pub fn result(&self, key: &str) -> Option<&[u8]> {
        match self {
            Self::Success { results } => results.get(key).map(Vec::as_slice),
            Self::Error { .. } => None,
        }
    }

    /// Convenience for the common case of a u16 handle result.
    pub fn result_u16(&self, key: &str) -> Option<u16> {
        let bytes = self.result(key)?;
        Some(u16::from_be_bytes(bytes.try_into().ok()?))
    }

    /// Payload encoding, shared with the wire codec.
    pub(crate) fn encode_fields(&self, writer: &mut WireWriter) {
        match self {
            Self::Success { results } => {
                writer.put_bool(true);
                writer.put_u16(results.len() as u16);
                for (key, value) in results {
                    writer.put_string(key);
                    writer.put_bytes(value);
                }
            }
            Self::Error { message } => {
                writer.put_bool(false);
                writer.put_string(message);
            }
        }
    }

    pub(crate) fn decode_fields(reader: &mut WireReader<'_>) -> Result<Self> {
        if reader.get_bool()? {
            let count = reader.get_u16()?;
            let mut results = BTreeMap::new();
            for _ in 0..count {
                let key = reader.get_string()?;
                results.insert(key, reader.get_bytes()?);
            }
            Ok(Self::Success { results })
        } else {
            Ok(Self::Error {
                message: reader.get_string()?,
            })
        }
    }
}

/// One request plus the response the handler chain fills in.
#[derive(Debug, Clone)]
pub struct MessageContext {
    request: RtiMessage,
    response: Option<ResponseMessage>,
}

impl MessageContext {
    pub fn new(request: RtiMessage) -> Self {
        Self {
            request,
            response: None,
        }
    }

    pub fn request(&self) -> &RtiMessage {
        &self.request
    }

    pub fn has_response(&self) -> bool {
        self.response.is_some()
    }

    pub fn response(&self) -> Option<&ResponseMessage> {
        self.response.as_ref()
    }

    pub fn take_response(&mut self) -> Option<ResponseMessage> {
        self.response.take()
    }

    pub fn set_response(&mut self, response: ResponseMessage) {
        self.response = Some(response);
    }

    /// Mark the request successful with no result values.
    pub fn success(&mut self) {
        self.response = Some(ResponseMessage::ok());
    }

    /// Mark the request successful with one named result.
    pub fn success_with(&mut self, key: &str, value: Vec<u8>) {
        self.response = Some(ResponseMessage::ok_with(key, value));
    }

    /// Mark the request failed.
    pub fn error(&mut self, message: impl Into<String>) {
        self.response = Some(ResponseMessage::error(message));
    }

    pub fn is_success_response(&self) -> bool {
        self.response.as_ref().is_some_and(ResponseMessage::is_success)
    }

    pub fn is_error_response(&self) -> bool {
        self.response.as_ref().is_some_and(ResponseMessage::is_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::MessageBody;

    #[test]
    fn test_context_lifecycle() {
        let mut context = MessageContext::new(RtiMessage::probe());
        assert!(!context.has_response());
        assert!(!context.is_success_response());

        context.success();
        assert!(context.is_success_response());

        context.error("nope");
        assert!(context.is_error_response());
        assert_eq!(context.response().unwrap().error_message(), Some("nope"));
    }

    #[test]
    fn test_response_fields_roundtrip() {
        let response = ResponseMessage::ok_with("federateHandle", 7u16.to_be_bytes().to_vec());
        let mut writer = WireWriter::new();
        response.encode_fields(&mut writer);
        let bytes = writer.finish();

        let decoded = ResponseMessage::decode_fields(&mut WireReader::new(&bytes)).unwrap();
        assert_eq!(decoded, response);
        assert_eq!(decoded.result_u16("federateHandle"), Some(7));
    }

    #[test]
    fn test_error_response_roundtrip() {
        let response = ResponseMessage::error("sync point already exists");
        let mut writer = WireWriter::new();
        response.encode_fields(&mut writer);
        let bytes = writer.finish();

        let decoded = ResponseMessage::decode_fields(&mut WireReader::new(&bytes)).unwrap();
        assert!(decoded.is_error());
        assert_eq!(decoded.error_message(), Some("sync point already exists"));
    }

    #[test]
    fn test_request_is_kept() {
        let context = MessageContext::new(RtiMessage::new(MessageBody::AchieveSyncPoint {
            label: "ready".to_string(),
        }));
        assert_eq!(
            context.request().message_type(),
            crate::messaging::MessageType::AchieveSyncPoint
        );
    }
}

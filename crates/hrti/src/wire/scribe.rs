// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hrti-team

//! The generic serializer: a deterministic big-endian byte stream.
//!
//! Every multi-byte value in this crate is written in network byte order,
//! matching the message header, so the same bytes round-trip on any
//! platform. Strings and byte blocks are length-prefixed (u16 / u32).
//!
//! [`WireWriter`] appends to a growable buffer; [`WireReader`] consumes a
//! borrowed slice and fails with a protocol error on underflow rather than
//! panicking — truncated payloads come from the network, not from bugs.

use crate::{Result, RtiError};

fn underflow(what: &str) -> RtiError {
    RtiError::Protocol(format!("payload underflow reading {}", what))
}

/// Append-only big-endian encoder.
#[derive(Debug, Default)]
pub struct WireWriter {
    buffer: Vec<u8>,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writer whose buffer starts with `reserve` zero bytes (room for a
    /// header to be written in afterwards).
    pub fn with_reserved(reserve: usize) -> Self {
        Self {
            buffer: vec![0u8; reserve],
        }
    }

    pub fn put_bool(&mut self, value: bool) {
        self.buffer.push(u8::from(value));
    }

    pub fn put_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    pub fn put_u16(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    pub fn put_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    pub fn put_i32(&mut self, value: i32) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    pub fn put_i64(&mut self, value: i64) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    pub fn put_f64(&mut self, value: f64) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    /// u16-length-prefixed UTF-8 string. Longer inputs are a caller bug.
    pub fn put_string(&mut self, value: &str) {
        debug_assert!(value.len() <= u16::MAX as usize);
        self.put_u16(value.len() as u16);
        self.buffer.extend_from_slice(value.as_bytes());
    }

    /// u32-length-prefixed raw byte block.
    pub fn put_bytes(&mut self, value: &[u8]) {
        self.put_u32(value.len() as u32);
        self.buffer.extend_from_slice(value);
    }

    /// Raw bytes with no length prefix. The reader must know the size.
    pub fn put_raw(&mut self, value: &[u8]) {
        self.buffer.extend_from_slice(value);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    pub fn finish(self) -> Vec<u8> {
        self.buffer
    }
}

/// Consuming big-endian decoder over a borrowed slice.
#[derive(Debug)]
pub struct WireReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, position: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.position
    }

    pub fn position(&self) -> usize {
        self.position
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(underflow(what));
        }
        let slice = &self.buffer[self.position..self.position + n];
        self.position += n;
        Ok(slice)
    }

    pub fn get_bool(&mut self) -> Result<bool> {
        Ok(self.take(1, "bool")?[0] != 0)
    }

    pub fn get_u8(&mut self) -> Result<u8> {
        Ok(self.take(1, "u8")?[0])
    }

    pub fn get_u16(&mut self) -> Result<u16> {
        let b = self.take(2, "u16")?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn get_u32(&mut self) -> Result<u32> {
        let b = self.take(4, "u32")?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn get_i32(&mut self) -> Result<i32> {
        let b = self.take(4, "i32")?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn get_i64(&mut self) -> Result<i64> {
        let b = self.take(8, "i64")?;
        Ok(i64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
    }

    pub fn get_f64(&mut self) -> Result<f64> {
        let b = self.take(8, "f64")?;
        Ok(f64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
    }

    pub fn get_string(&mut self) -> Result<String> {
        let len = self.get_u16()? as usize;
        let bytes = self.take(len, "string body")?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| RtiError::Protocol("string is not valid utf-8".to_string()))
    }

    pub fn get_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.get_u32()? as usize;
        Ok(self.take(len, "byte block")?.to_vec())
    }

    /// Raw bytes with no length prefix.
    pub fn get_raw(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take(n, "raw bytes")
    }
}

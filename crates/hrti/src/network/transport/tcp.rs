// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hrti-team

//! Bundled-stream TCP transport.
//!
//! Outgoing frames pass through the [`Bundler`], which coalesces them into
//! `0xCAFE`-framed bundles on the socket. A dedicated reader thread pulls
//! one bundle at a time off the stream and walks the packed frames inside
//! it, delivering each to the uplink:
//!
//! ```text
//!   socket ----> [magic][len][ frame | frame | frame ]
//!                              |       |       |
//!                              v       v       v
//!                        uplink.deliver(Message)
//! ```
//!
//! Frame boundaries inside a bundle come from each inner header's length
//! fields, so a bundle's byte count always equals the sum of its frames'
//! lengths. A magic mismatch means the stream has lost sync and is fatal
//! for the connection.

use std::io::Read;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use crate::config::BundlerConfig;
use crate::wire::{Header, Message};
use crate::{Result, RtiError};

use super::{Bundler, Transport, TransportKind, Uplink, BUNDLE_MAGIC};

/// Largest bundle a peer may send us (sanity bound against stream
/// desync/abuse). Matches the 16 MB single-message payload cap.
const MAX_BUNDLE_SIZE: usize = 16 * 1024 * 1024;

enum Peer {
    /// Dial this address on open.
    Address(SocketAddr),
    /// Use a stream somebody already accepted for us.
    Accepted(Mutex<Option<TcpStream>>),
}

/// TCP transport with outgoing bundling and a blocking reader thread.
pub struct TcpTransport {
    peer: Peer,
    bundler: Bundler,
    uplink: Uplink,
    stream: Mutex<Option<TcpStream>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    open: Arc<AtomicBool>,
}

impl TcpTransport {
    /// Transport that will connect to `address` when opened.
    pub fn connect_to(address: SocketAddr, config: BundlerConfig, uplink: Uplink) -> Self {
        Self {
            peer: Peer::Address(address),
            bundler: Bundler::new(config),
            uplink,
            stream: Mutex::new(None),
            reader: Mutex::new(None),
            open: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Transport over a stream an acceptor already established.
    pub fn from_stream(stream: TcpStream, config: BundlerConfig, uplink: Uplink) -> Self {
        Self {
            peer: Peer::Accepted(Mutex::new(Some(stream))),
            bundler: Bundler::new(config),
            uplink,
            stream: Mutex::new(None),
            reader: Mutex::new(None),
            open: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn bundler(&self) -> &Bundler {
        &self.bundler
    }

    fn take_or_dial(&self) -> Result<TcpStream> {
        match &self.peer {
            Peer::Address(address) => TcpStream::connect(address)
                .map_err(|e| RtiError::NotConnected(format!("connect to {}: {}", address, e))),
            Peer::Accepted(slot) => slot
                .lock()
                .take()
                .ok_or_else(|| RtiError::NotConnected("accepted stream already consumed".into())),
        }
    }
}

impl Transport for TcpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::TcpStream
    }

    fn open(&self) -> Result<()> {
        if self.open.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let stream = match self.take_or_dial() {
            Ok(stream) => stream,
            Err(e) => {
                self.open.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };
        // bundling already batches; a second delay in the kernel buys nothing
        let _ = stream.set_nodelay(true);

        let write_half = stream
            .try_clone()
            .map_err(|e| RtiError::internal(format!("could not clone tcp stream: {}", e)))?;
        self.bundler.start(Box::new(write_half))?;

        let read_half = stream
            .try_clone()
            .map_err(|e| RtiError::internal(format!("could not clone tcp stream: {}", e)))?;
        *self.stream.lock() = Some(stream);

        let uplink = self.uplink.clone();
        let open = Arc::clone(&self.open);
        let handle = thread::Builder::new()
            .name("tcp-transport-reader".to_string())
            .spawn(move || reader_loop(read_half, &uplink, &open))
            .map_err(|e| RtiError::internal(format!("could not spawn tcp reader: {}", e)))?;
        *self.reader.lock() = Some(handle);

        log::debug!("[TcpTransport::open] transport is now open");
        Ok(())
    }

    fn close(&self) {
        if !self.open.swap(false, Ordering::SeqCst) {
            return;
        }
        log::debug!("[TcpTransport::close] closing transport");

        // shutting the socket down unblocks the reader's blocking read
        if let Some(stream) = self.stream.lock().take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        self.bundler.stop();
        if let Some(handle) = self.reader.lock().take() {
            let _ = handle.join();
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn down(&self, message: Message) -> Result<()> {
        if !self.is_open() {
            return Err(RtiError::NotConnected(
                "tcp transport is not open".to_string(),
            ));
        }
        self.bundler.submit(message.buffer())
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// Reader thread: one bundle per iteration, one uplink call per frame.
fn reader_loop(mut stream: TcpStream, uplink: &Uplink, open: &AtomicBool) {
    let mut framing = [0u8; 8];
    while open.load(Ordering::SeqCst) {
        if let Err(e) = stream.read_exact(&mut framing) {
            if open.load(Ordering::SeqCst) {
                log::debug!("[TcpTransport] stream closed by peer: {}", e);
            }
            break;
        }

        let magic = u32::from_be_bytes(framing[..4].try_into().unwrap());
        if magic != BUNDLE_MAGIC {
            log::error!(
                "[TcpTransport] bad bundle magic 0x{:08X}; stream out of sync, closing",
                magic
            );
            break;
        }

        let bundle_len = u32::from_be_bytes(framing[4..8].try_into().unwrap()) as usize;
        if bundle_len > MAX_BUNDLE_SIZE {
            log::error!(
                "[TcpTransport] bundle of {} bytes exceeds the {} byte cap, closing",
                bundle_len,
                MAX_BUNDLE_SIZE
            );
            break;
        }

        let mut bundle = vec![0u8; bundle_len];
        if let Err(e) = stream.read_exact(&mut bundle) {
            log::error!("[TcpTransport] truncated bundle ({} bytes expected): {}", bundle_len, e);
            break;
        }

        if let Err(e) = deliver_bundle(&bundle, uplink) {
            log::error!("[TcpTransport] {}; closing connection", e);
            break;
        }
    }

    open.store(false, Ordering::SeqCst);
    let _ = stream.shutdown(Shutdown::Both);
    log::debug!("[TcpTransport] reader thread exiting");
}

/// Walk the frames packed inside one bundle.
fn deliver_bundle(bundle: &[u8], uplink: &Uplink) -> Result<()> {
    let mut offset = 0;
    while offset < bundle.len() {
        let header = Header::new(&bundle[offset..])?;
        let frame_len = header.frame_length();
        if offset + frame_len > bundle.len() {
            return Err(RtiError::Protocol(format!(
                "frame of {} bytes overruns its bundle ({} bytes left)",
                frame_len,
                bundle.len() - offset
            )));
        }
        let message = Message::from_buffer(bundle[offset..offset + frame_len].to_vec())?;
        uplink.deliver(message);
        offset += frame_len;
    }
    Ok(())
}

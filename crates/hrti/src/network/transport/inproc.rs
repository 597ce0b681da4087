// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hrti-team

//! In-process transport: a channel pair standing in for a socket.
//!
//! Connects two endpoints living in the same process, frame-for-frame
//! compatible with the stream transports but with no bundling and no I/O.
//! Used to wire a federate-side connection straight into an RTI-side
//! connection: loopback probes, single-process federations and the test
//! suites all run over it.
//!
//! Create a [`wire_pair`], then build one [`InprocTransport`] around each
//! end.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

use crate::wire::Message;
use crate::{Result, RtiError};

use super::{Transport, TransportKind, Uplink};

/// One end of an in-process connection.
pub struct InprocWire {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
}

/// Two wires whose sends arrive at each other's receiver.
pub fn wire_pair() -> (InprocWire, InprocWire) {
    let (a_tx, a_rx) = unbounded();
    let (b_tx, b_rx) = unbounded();
    (
        InprocWire { tx: a_tx, rx: b_rx },
        InprocWire { tx: b_tx, rx: a_rx },
    )
}

/// Channel-backed transport endpoint.
pub struct InprocTransport {
    tx: Sender<Vec<u8>>,
    rx: Mutex<Option<Receiver<Vec<u8>>>>,
    uplink: Uplink,
    reader: Mutex<Option<JoinHandle<()>>>,
    open: Arc<AtomicBool>,
}

impl InprocTransport {
    pub fn new(wire: InprocWire, uplink: Uplink) -> Self {
        Self {
            tx: wire.tx,
            rx: Mutex::new(Some(wire.rx)),
            uplink,
            reader: Mutex::new(None),
            open: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Transport for InprocTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Inproc
    }

    fn open(&self) -> Result<()> {
        if self.open.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let rx = self
            .rx
            .lock()
            .take()
            .ok_or_else(|| RtiError::internal("inproc transport reopened after close"))?;

        let uplink = self.uplink.clone();
        let open = Arc::clone(&self.open);
        let handle = thread::Builder::new()
            .name("inproc-transport-reader".to_string())
            .spawn(move || {
                // recv fails when the peer drops its sender; either way the
                // transport is done
                while let Ok(buffer) = rx.recv() {
                    match Message::from_buffer(buffer) {
                        Ok(message) => uplink.deliver(message),
                        Err(e) => {
                            log::error!("[InprocTransport] bad frame from peer: {}", e);
                            break;
                        }
                    }
                }
                open.store(false, Ordering::SeqCst);
                log::debug!("[InprocTransport] reader thread exiting");
            })
            .map_err(|e| RtiError::internal(format!("could not spawn inproc reader: {}", e)))?;
        *self.reader.lock() = Some(handle);
        Ok(())
    }

    fn close(&self) {
        if !self.open.swap(false, Ordering::SeqCst) {
            return;
        }
        // the reader blocks on the peer's sender, not ours; it exits when
        // the peer side drops, so detach rather than join here
        if let Some(handle) = self.reader.lock().take() {
            drop(handle);
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn down(&self, message: Message) -> Result<()> {
        if !self.is_open() {
            return Err(RtiError::NotConnected(
                "inproc transport is not open".to_string(),
            ));
        }
        self.tx
            .send(message.into_buffer())
            .map_err(|_| RtiError::NotConnected("inproc peer has gone away".to_string()))
    }
}

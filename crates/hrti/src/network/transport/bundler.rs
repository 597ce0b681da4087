// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hrti-team

//! Outgoing message bundler for stream transports.
//!
//! Small messages dominate RTI traffic, and writing each one to the socket
//! individually wastes syscalls. The bundler coalesces already-encoded
//! frames into a single buffer and releases them as one framed bundle:
//!
//! ```text
//! +------------------+------------------+----------------------------+
//! | 0xCAFE (u32 BE)  | N bytes (u32 BE) | N bytes of packed frames   |
//! +------------------+------------------+----------------------------+
//! ```
//!
//! A bundle is released when the buffer outgrows `size_limit`, when the
//! oldest queued frame outgrows `time_limit`, or immediately when a
//! latency-sensitive frame (anything that is not a data message) is
//! submitted. The receiver reads one bundle and then walks the packed
//! frames using each inner header's length fields; the packed byte count
//! always equals the sum of the inner frame lengths.
//!
//! One sender thread per bundler performs the timed flushes. Submitters
//! block only when the size trigger trips (until that flush drains) or
//! when their own frame forces an eager flush.

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError};
use parking_lot::{Condvar, Mutex};
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::config::{BundlerConfig, BUNDLER_SHUTDOWN_GRACE};
use crate::wire::Header;
use crate::{Result, RtiError};

/// Magic marker fronting every bundle on the wire.
pub const BUNDLE_MAGIC: u32 = 0xCAFE;

/// Bytes of framing per bundle (magic + byte count).
pub const BUNDLE_OVERHEAD: usize = 8;

struct BundleBuffer {
    /// Packed frames awaiting release.
    buffer: Vec<u8>,
    /// Frames currently queued.
    queued_messages: usize,
    /// When the first queued frame arrived; `None` while empty.
    oldest_message: Option<Instant>,
    /// Where flushed bundles go. `None` until the bundler starts.
    stream: Option<Box<dyn Write + Send>>,
}

struct Shared {
    config: BundlerConfig,
    state: Mutex<BundleBuffer>,
    /// Wakes the sender when the first frame of a bundle arrives.
    arm_condition: Condvar,
    /// Wakes the sender early when the size trigger trips.
    flush_condition: Condvar,
    /// Wakes submitters blocked on a size-triggered flush.
    return_condition: Condvar,
    running: AtomicBool,
    // metrics
    messages_sent: AtomicU64,
    bytes_sent: AtomicU64,
    bundles_sent: AtomicU64,
}

impl Shared {
    /// Write out everything queued. Caller holds the state lock.
    ///
    /// The buffer is cleared even when the write fails; an endlessly
    /// growing buffer on a dead stream is worse than dropped frames, and
    /// the transport notices the failure through its own read path.
    fn flush_locked(&self, state: &mut BundleBuffer) {
        if state.queued_messages == 0 {
            state.oldest_message = None;
            self.return_condition.notify_all();
            return;
        }

        let bytes = state.buffer.len();
        let queued = state.queued_messages;
        if let Some(stream) = state.stream.as_mut() {
            let result = stream
                .write_all(&BUNDLE_MAGIC.to_be_bytes())
                .and_then(|_| stream.write_all(&(bytes as u32).to_be_bytes()))
                .and_then(|_| stream.write_all(&state.buffer))
                .and_then(|_| stream.flush());
            match result {
                Ok(()) => {
                    self.messages_sent.fetch_add(queued as u64, Ordering::Relaxed);
                    self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
                    self.bundles_sent.fetch_add(1, Ordering::Relaxed);
                    log::trace!(
                        "[Bundler::flush] {} messages ({} bytes) flushed",
                        queued,
                        bytes
                    );
                }
                Err(e) => {
                    log::error!("[Bundler::flush] error while flushing bundler: {}", e);
                }
            }
        } else {
            log::error!("[Bundler::flush] no output stream; {} messages dropped", queued);
        }

        state.buffer.clear();
        state.queued_messages = 0;
        state.oldest_message = None;
        self.return_condition.notify_all();
    }
}

/// The running sender thread plus the channel it reports its exit on.
struct SenderThread {
    handle: JoinHandle<()>,
    exited: Receiver<()>,
}

/// Coalesces outgoing frames into `0xCAFE`-framed bundles.
pub struct Bundler {
    shared: Arc<Shared>,
    sender: Mutex<Option<SenderThread>>,
}

impl Bundler {
    pub fn new(config: BundlerConfig) -> Self {
        let capacity = config.size_limit + config.size_limit / 10;
        Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(BundleBuffer {
                    buffer: Vec::with_capacity(capacity),
                    queued_messages: 0,
                    oldest_message: None,
                    stream: None,
                }),
                arm_condition: Condvar::new(),
                flush_condition: Condvar::new(),
                return_condition: Condvar::new(),
                running: AtomicBool::new(false),
                messages_sent: AtomicU64::new(0),
                bytes_sent: AtomicU64::new(0),
                bundles_sent: AtomicU64::new(0),
            }),
            sender: Mutex::new(None),
        }
    }

    /// Connect the output stream and start the sender thread.
    pub fn start(&self, stream: Box<dyn Write + Send>) -> Result<()> {
        let mut sender = self.sender.lock();
        if sender.is_some() {
            return Err(RtiError::internal("bundler already started"));
        }
        log::debug!(
            "[Bundler::start] starting. max bundle size={} bytes, max bundle time={:?}",
            self.shared.config.size_limit,
            self.shared.config.time_limit
        );

        self.shared.state.lock().stream = Some(stream);
        self.shared.running.store(true, Ordering::SeqCst);

        let shared = Arc::clone(&self.shared);
        let (exit_tx, exited) = bounded(1);
        let handle = thread::Builder::new()
            .name("bundler-sender".to_string())
            .spawn(move || {
                sender_loop(&shared);
                let _ = exit_tx.send(());
            })
            .map_err(|e| RtiError::internal(format!("could not spawn bundler sender: {}", e)))?;
        *sender = Some(SenderThread { handle, exited });
        Ok(())
    }

    /// Queue one already-encoded frame.
    ///
    /// Control traffic and notifications are latency-sensitive and flush
    /// the whole buffer before this returns; so does every submit when
    /// bundling is disabled. Data messages are queued and only block when
    /// they trip the size trigger.
    pub fn submit(&self, frame: &[u8]) -> Result<()> {
        let header = Header::new(frame)?;
        let is_data = header.is_data_message();

        let shared = &self.shared;
        let mut state = shared.state.lock();
        state.buffer.extend_from_slice(frame);
        state.queued_messages += 1;

        if log::log_enabled!(log::Level::Trace) {
            log::trace!(
                "(outgoing) type={} (id={}), from={}, to={}, size={}",
                header.message_type_id(),
                header.request_id(),
                header.source_federate(),
                header.target_federate(),
                frame.len()
            );
        }

        // bundling off, or a time-critical frame: release everything now,
        // on this thread, before returning
        if !shared.config.enabled || !is_data {
            shared.flush_locked(&mut state);
            return Ok(());
        }

        // first frame of a new bundle arms the time trigger
        if state.oldest_message.is_none() {
            state.oldest_message = Some(Instant::now());
            shared.arm_condition.notify_all();
        }

        // size trigger: hand the flush to the sender and wait for it
        if state.buffer.len() > shared.config.size_limit {
            shared.flush_condition.notify_all();
            while state.queued_messages > 0 && shared.running.load(Ordering::SeqCst) {
                shared.return_condition.wait(&mut state);
            }
        }
        Ok(())
    }

    /// Stop the sender thread, dropping anything still queued.
    ///
    /// The sender gets [`BUNDLER_SHUTDOWN_GRACE`] to exit; a thread stuck
    /// in a dead stream write past that is abandoned rather than waited on.
    pub fn stop(&self) {
        let Some(sender) = self.sender.lock().take() else {
            return;
        };

        {
            let state = self.shared.state.lock();
            if state.queued_messages > 0 {
                log::warn!(
                    "[Bundler::stop] shutting down bundler with {} messages still queued",
                    state.queued_messages
                );
            }
        }

        log::trace!("[Bundler::stop] shutting down bundler sending thread");
        self.shared.running.store(false, Ordering::SeqCst);
        self.shared.arm_condition.notify_all();
        self.shared.flush_condition.notify_all();
        self.shared.return_condition.notify_all();

        match sender.exited.recv_timeout(BUNDLER_SHUTDOWN_GRACE) {
            Err(RecvTimeoutError::Timeout) => {
                // still running; detach it rather than block forever
                log::warn!(
                    "[Bundler::stop] bundler sending thread did not shut down cleanly ({:?} wait)",
                    BUNDLER_SHUTDOWN_GRACE
                );
                drop(sender.handle);
            }
            // exited (or died); reap it, the join returns immediately
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                let _ = sender.handle.join();
            }
        }
        log::debug!("[Bundler::stop] bundler has been shut down");
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.config.enabled
    }

    /// Frames flushed to the stream so far.
    pub fn messages_sent(&self) -> u64 {
        self.shared.messages_sent.load(Ordering::Relaxed)
    }

    /// Packed payload bytes flushed so far (bundle framing excluded).
    pub fn bytes_sent(&self) -> u64 {
        self.shared.bytes_sent.load(Ordering::Relaxed)
    }

    /// Bundles written to the stream so far.
    pub fn bundles_sent(&self) -> u64 {
        self.shared.bundles_sent.load(Ordering::Relaxed)
    }
}

impl Drop for Bundler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Sender thread: sleep until armed, give the bundle `time_limit` to fill
/// (a size trigger cuts the wait short), then flush.
fn sender_loop(shared: &Arc<Shared>) {
    log::debug!("[Bundler] sender thread has started up inside the bundler");
    let mut state = shared.state.lock();
    while shared.running.load(Ordering::SeqCst) {
        if state.oldest_message.is_none() {
            shared.arm_condition.wait(&mut state);
            continue;
        }

        // the size trigger may already have tripped while we were parked on
        // the arm condition; only wait out the time limit when it has not
        if state.buffer.len() <= shared.config.size_limit {
            shared
                .flush_condition
                .wait_for(&mut state, shared.config.time_limit);
        }
        if !shared.running.load(Ordering::SeqCst) {
            break;
        }
        shared.flush_locked(&mut state);
    }
    log::debug!("[Bundler] sender thread interrupted; shutting down");
}

// ============================================================================
// Tests
// ============================================================================

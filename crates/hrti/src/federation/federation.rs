// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hrti-team

//! The federation hub: members, managers and message routing.
//!
//! A [`Federation`] owns everything scoped to one running federation: the
//! FOM, the federate records, the distinct set of connections those
//! federates arrived through, the interest/sync/time managers, an incoming
//! message sink, and a bounded outgoing queue drained by a dedicated
//! processor thread.
//!
//! Outbound control traffic is queued with [`Federation::queue_control_message`]
//! and fanned out to every federate connection as a control request; data
//! traffic goes through [`Federation::queue_data_message`], which first
//! runs the federation's own sink (local side effects) and then forwards
//! to every connection except the sender's.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};

use crate::config::OUTGOING_PROCESSOR_SHUTDOWN_GRACE;
use crate::messaging::{MessageContext, MessageSink, RtiMessage};
use crate::model::{
    FederateHandle, FederationHandle, HlaVersion, ObjectModel, RegionStore, RTI_HANDLE,
};
use crate::network::Connection;
use crate::{Result, RtiError};

use super::handlers;
use super::interest::InterestManager;
use super::sync::SyncPointManager;
use super::time::TimeManager;
use super::Federate;

/// The running outgoing processor plus the channel it reports its exit on.
struct ProcessorThread {
    handle: JoinHandle<()>,
    exited: Receiver<()>,
}

/// One running federation.
pub struct Federation {
    handle: FederationHandle,
    name: String,
    hla_version: HlaVersion,
    fom: Arc<ObjectModel>,
    /// Raw FOM module designators contributed by the creator and joiners.
    fom_modules: Mutex<Vec<String>>,
    /// Shared-secret slot for the header's auth/encryption trailers. The
    /// algorithms are pluggable protocols; the federation only keeps the
    /// key material.
    federation_key: Mutex<Option<Vec<u8>>>,

    federate_handle_counter: AtomicU16,
    federates: RwLock<HashMap<FederateHandle, Federate>>,
    /// Distinct connections serving this federation's federates. A single
    /// connection can multiplex several federates, so membership is by
    /// pointer identity and a connection leaves only when its last
    /// federate does.
    connections: RwLock<Vec<Arc<Connection>>>,

    incoming_sink: RwLock<MessageSink>,

    outgoing: Sender<RtiMessage>,
    outgoing_rx: Mutex<Option<Receiver<RtiMessage>>>,
    processor: Mutex<Option<ProcessorThread>>,
    shutdown: Sender<()>,
    shutdown_rx: Mutex<Option<Receiver<()>>>,

    interest: InterestManager,
    sync_points: SyncPointManager,
    time: TimeManager,
    regions: Arc<RwLock<RegionStore>>,
}

impl Federation {
    /// Build a federation. The caller (the [`super::FederationManager`])
    /// assigns the handle; [`Federation::created_federation`] starts the
    /// outgoing processor.
    pub fn new(
        handle: FederationHandle,
        name: &str,
        fom: ObjectModel,
        outgoing_capacity: usize,
    ) -> Arc<Self> {
        let fom = Arc::new(fom);
        let regions = Arc::new(RwLock::new(RegionStore::new()));
        let (outgoing, outgoing_rx) = bounded(outgoing_capacity);
        let (shutdown, shutdown_rx) = bounded(1);

        let federation = Arc::new(Self {
            handle,
            name: name.to_string(),
            hla_version: HlaVersion::default(),
            fom: Arc::clone(&fom),
            fom_modules: Mutex::new(Vec::new()),
            federation_key: Mutex::new(None),
            federate_handle_counter: AtomicU16::new(0),
            federates: RwLock::new(HashMap::new()),
            connections: RwLock::new(Vec::new()),
            incoming_sink: RwLock::new(MessageSink::new(&format!("{}-incoming", name))),
            outgoing,
            outgoing_rx: Mutex::new(Some(outgoing_rx)),
            processor: Mutex::new(None),
            shutdown,
            shutdown_rx: Mutex::new(Some(shutdown_rx)),
            interest: InterestManager::new(fom, Arc::clone(&regions)),
            sync_points: SyncPointManager::new(),
            time: TimeManager::new(),
            regions,
        });

        handlers::register_handlers(&federation);
        federation
    }

    pub fn handle(&self) -> FederationHandle {
        self.handle
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hla_version(&self) -> HlaVersion {
        self.hla_version
    }

    pub fn fom(&self) -> &Arc<ObjectModel> {
        &self.fom
    }

    pub fn federation_key(&self) -> Option<Vec<u8>> {
        self.federation_key.lock().clone()
    }

    /// Install (or clear) the shared key used by auth/encryption protocols.
    pub fn set_federation_key(&self, key: Option<Vec<u8>>) {
        *self.federation_key.lock() = key;
    }

    /// Merge FOM module designators, skipping ones already present.
    pub fn add_raw_fom_modules(&self, modules: &[String]) {
        let mut existing = self.fom_modules.lock();
        for module in modules {
            if !existing.contains(module) {
                existing.push(module.clone());
            }
        }
    }

    pub fn raw_fom_modules(&self) -> Vec<String> {
        self.fom_modules.lock().clone()
    }

    pub fn interest_manager(&self) -> &InterestManager {
        &self.interest
    }

    pub fn sync_point_manager(&self) -> &SyncPointManager {
        &self.sync_points
    }

    pub fn time_manager(&self) -> &TimeManager {
        &self.time
    }

    pub fn region_store(&self) -> &Arc<RwLock<RegionStore>> {
        &self.regions
    }

    /// Run a context through the federation's incoming sink.
    pub fn process_incoming(&self, context: &mut MessageContext) -> Result<()> {
        self.incoming_sink.read().process(context)
    }

    /// Mutate the incoming sink (handler registration).
    pub fn with_incoming_sink<T>(&self, configure: impl FnOnce(&mut MessageSink) -> T) -> T {
        configure(&mut self.incoming_sink.write())
    }

    // ------------------------------------------------------------------
    // Membership
    // ------------------------------------------------------------------

    /// Join a federate, assigning its handle. Names are unique within the
    /// federation, case-insensitively.
    pub fn join_federate(&self, mut federate: Federate) -> Result<FederateHandle> {
        let mut federates = self.federates.write();
        if federates
            .values()
            .any(|existing| existing.name().eq_ignore_ascii_case(federate.name()))
        {
            return Err(RtiError::AlreadyExists(format!(
                "federate name already in use: {}",
                federate.name()
            )));
        }

        let handle = self.federate_handle_counter.fetch_add(1, Ordering::SeqCst) + 1;
        federate.set_handle(handle);
        self.add_raw_fom_modules(federate.fom_modules());

        let connection = Arc::clone(federate.connection());
        {
            let mut connections = self.connections.write();
            if !connections.iter().any(|c| Arc::ptr_eq(c, &connection)) {
                connections.push(connection);
            }
        }

        self.time.joined_federation(handle);
        federates.insert(handle, federate);
        log::info!(
            "[Federation::join_federate] federate {} joined federation [{}]",
            handle,
            self.name
        );
        Ok(handle)
    }

    /// Resign a federate. Its connection leaves the fan-out set only when
    /// no other federate still uses it, and federation-wide sync points
    /// are re-evaluated against the shrunken membership.
    pub fn resign_federate(&self, handle: FederateHandle) -> Result<()> {
        let mut federates = self.federates.write();
        let Some(federate) = federates.remove(&handle) else {
            return Err(RtiError::NotFound(format!(
                "federate [{}] not part of federation [{}]",
                handle, self.name
            )));
        };

        let connection = federate.connection();
        let still_used = federates
            .values()
            .any(|other| Arc::ptr_eq(other.connection(), connection));
        if !still_used {
            self.connections
                .write()
                .retain(|c| !Arc::ptr_eq(c, connection));
        }

        let members: BTreeSet<FederateHandle> = federates.keys().copied().collect();
        drop(federates);

        self.time.resigned_federation(handle);
        self.sync_points.federate_resigned(&members);
        log::info!(
            "[Federation::resign_federate] federate {} resigned from federation [{}]",
            handle,
            self.name
        );
        Ok(())
    }

    pub fn contains_federate(&self, handle: FederateHandle) -> bool {
        self.federates.read().contains_key(&handle)
    }

    pub fn contains_federate_named(&self, name: &str) -> bool {
        self.federates
            .read()
            .values()
            .any(|federate| federate.name().trim().eq_ignore_ascii_case(name))
    }

    pub fn federate(&self, handle: FederateHandle) -> Option<Federate> {
        self.federates.read().get(&handle).cloned()
    }

    pub fn federate_handles(&self) -> BTreeSet<FederateHandle> {
        self.federates.read().keys().copied().collect()
    }

    pub fn federate_count(&self) -> usize {
        self.federates.read().len()
    }

    /// Snapshot of the distinct connection set. Invariant: equals the set
    /// of connections of the current federates.
    pub fn federate_connections(&self) -> Vec<Arc<Connection>> {
        self.connections.read().clone()
    }

    // ------------------------------------------------------------------
    // Messaging
    // ------------------------------------------------------------------

    /// Queue an RTI-originated control message for every federate.
    ///
    /// Stamps the from-RTI flag, source and target federation, then offers
    /// to the bounded queue; a full queue drops the message with a warning
    /// rather than blocking the caller.
    pub fn queue_control_message(&self, mut message: RtiMessage) {
        message.set_is_from_rti(true);
        message.set_source_federate_if_null(RTI_HANDLE);
        message.set_target_federation(self.handle);
        if let Err(TrySendError::Full(message) | TrySendError::Disconnected(message)) =
            self.outgoing.try_send(message)
        {
            log::warn!(
                "[Federation::queue_control_message] message could not be added to outgoing \
                 queue (overflow): {}",
                message.message_type()
            );
        }
    }

    /// Route a data message: local side effects through the incoming sink,
    /// then fan out to every federate connection except the sender's. A
    /// connection multiplexing several federates fans out internally.
    pub fn queue_data_message(&self, message: &RtiMessage, sender: Option<&Arc<Connection>>) {
        let mut context = MessageContext::new(message.clone());
        if let Err(e) = self.process_incoming(&mut context) {
            log::error!(
                "[Federation::queue_data_message] incoming sink failed for {}: {}",
                message.message_type(),
                e
            );
        }

        for connection in self.connections.read().iter() {
            if sender.is_some_and(|sender| Arc::ptr_eq(sender, connection)) {
                continue;
            }
            if let Err(e) = connection.send_data_message(message) {
                log::warn!(
                    "[Federation::queue_data_message] error sending {} via connection [{}]: {}",
                    message.message_type(),
                    connection.name(),
                    e
                );
            }
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// The federation now exists: start the outgoing processor thread.
    pub fn created_federation(self: &Arc<Self>) {
        let Some(outgoing_rx) = self.outgoing_rx.lock().take() else {
            return; // already started once
        };
        let Some(shutdown_rx) = self.shutdown_rx.lock().take() else {
            return;
        };

        let federation = Arc::clone(self);
        let thread_name = format!("{}-outgoing", self.name);
        let (exit_tx, exited) = bounded(1);
        let handle = std::thread::Builder::new()
            .name(thread_name)
            .spawn(move || {
                outgoing_loop(&federation, &outgoing_rx, &shutdown_rx);
                let _ = exit_tx.send(());
            });
        match handle {
            Ok(handle) => {
                *self.processor.lock() = Some(ProcessorThread { handle, exited });
                log::debug!(
                    "[Federation::created_federation] outgoing message processor thread started"
                );
            }
            Err(e) => log::error!(
                "[Federation::created_federation] could not start outgoing processor: {}",
                e
            ),
        }
    }

    /// The federation is being destroyed: interrupt the processor and join
    /// it, giving up after [`OUTGOING_PROCESSOR_SHUTDOWN_GRACE`] if it is
    /// stuck mid-send.
    pub fn destroyed_federation(&self) {
        let Some(processor) = self.processor.lock().take() else {
            return;
        };
        log::debug!(
            "[Federation::destroyed_federation] interrupting the outgoing message processor"
        );
        let _ = self.shutdown.try_send(());

        match processor.exited.recv_timeout(OUTGOING_PROCESSOR_SHUTDOWN_GRACE) {
            Err(RecvTimeoutError::Timeout) => {
                // still draining a blocked control request; abandon it
                log::warn!(
                    "[Federation::destroyed_federation] outgoing processor did not stop \
                     within {:?}",
                    OUTGOING_PROCESSOR_SHUTDOWN_GRACE
                );
                drop(processor.handle);
            }
            // exited (or died); reap it, the join returns immediately
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                let _ = processor.handle.join();
            }
        }
    }
}

impl std::fmt::Debug for Federation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Federation")
            .field("handle", &self.handle)
            .field("name", &self.name)
            .field("federates", &self.federate_count())
            .finish()
    }
}

/// Outgoing processor: drain the control queue, sending each message to
/// every federate connection. Error responses are logged and processing
/// continues.
fn outgoing_loop(
    federation: &Arc<Federation>,
    outgoing: &Receiver<RtiMessage>,
    shutdown: &Receiver<()>,
) {
    loop {
        crossbeam::channel::select! {
            recv(outgoing) -> message => {
                let Ok(message) = message else { break };
                send_to_all(federation, &message);
            }
            recv(shutdown) -> _ => {
                log::debug!("[Federation] outgoing processor was interrupted, time to exit");
                break;
            }
        }
    }
}

fn send_to_all(federation: &Arc<Federation>, message: &RtiMessage) {
    // the explicit multi-target set has no wire encoding; expand it into
    // one directly-addressed copy per target before anything is encoded
    if message.is_multi_target() {
        for target in message.multiple_targets() {
            let mut copy = message.clone();
            copy.set_target_federate(target);
            send_to_all(federation, &copy);
        }
        return;
    }

    let mut context = MessageContext::new(message.clone());
    for connection in federation.federate_connections() {
        match connection.send_control_request(&mut context) {
            Ok(()) => {
                if context.is_error_response() {
                    log::warn!(
                        "[Federation] error response for [{}] via connection [{}]: {}",
                        message.message_type(),
                        connection.name(),
                        context
                            .response()
                            .and_then(|r| r.error_message())
                            .unwrap_or("unknown")
                    );
                } else {
                    log::trace!(
                        "[Federation] passed message [{}] to connection [{}]",
                        message.message_type(),
                        connection.name()
                    );
                }
            }
            Err(e) => {
                log::warn!(
                    "[Federation] error sending message [{}] via connection [{}]: {}",
                    message.message_type(),
                    connection.name(),
                    e
                );
            }
        }
    }
}

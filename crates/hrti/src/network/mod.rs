// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hrti-team

//! Connections: one endpoint relationship, end to end.
//!
//! A [`Connection`] owns a transport, the protocol stack above it and a
//! response correlator, and exposes the three sending primitives the rest
//! of the system uses:
//!
//! - [`Connection::send_data_message`] - fire-and-forget simulation data
//! - [`Connection::send_notification`] - fire-and-forget control traffic
//! - [`Connection::send_control_request`] - correlated request/response
//!
//! Inbound frames climb the stack and land in [`Connection::receive`],
//! which dispatches on call type: data and notifications go straight to
//! the application receiver, control requests run through it and get their
//! response re-encoded onto the same connection, and control responses
//! wake whoever is blocked on the correlator.

pub mod correlator;
pub mod protocol;
pub mod transport;

pub use correlator::ResponseCorrelator;
pub use protocol::{Flow, Protocol, ProtocolStack};
pub use transport::{Transport, TransportKind, Uplink};

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::Mutex;

use crate::messaging::{MessageContext, RtiMessage};
use crate::wire::{CallType, Header, Message};
use crate::Result;

/// Where the application plugs into a connection's inbound path.
pub trait ApplicationReceiver: Send + Sync {
    /// Cheap pre-filter on the header before a control request is decoded;
    /// return false to drop the request without a reply.
    fn is_receivable(&self, header: &Header<'_>) -> bool;

    /// Handle a control request, populating the context's response.
    fn receive_control_request(&self, context: &mut MessageContext) -> Result<()>;

    /// Handle a notification (control traffic with no reply).
    fn receive_notification(&self, message: RtiMessage) -> Result<()>;

    /// Handle a broadcast data message.
    fn receive_data_message(&self, message: RtiMessage) -> Result<()>;
}

/// Where a connection sits in its life, managed by the owning host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connected,
    Joined,
}

/// One endpoint relationship (federate<->RTI or RTI<->federate).
///
/// Shared freely across threads; per-call state lives in the correlator
/// and all the moving parts synchronize internally. A single connection
/// may serve several federates in one process.
pub struct Connection {
    name: String,
    correlator_timeout: Duration,
    stack: ProtocolStack,
    correlator: ResponseCorrelator,
    app: Arc<dyn ApplicationReceiver>,
    transport: OnceLock<Box<dyn Transport>>,
    status: Mutex<ConnectionStatus>,
}

impl Connection {
    /// Build a connection around a transport.
    ///
    /// The factory closure receives the [`Uplink`] inbound frames must be
    /// delivered to; it runs during construction, so the transport exists
    /// before the connection is ever visible to another thread.
    pub fn new<F>(
        name: &str,
        correlator_timeout: Duration,
        app: Arc<dyn ApplicationReceiver>,
        make_transport: F,
    ) -> Arc<Self>
    where
        F: FnOnce(Uplink) -> Box<dyn Transport>,
    {
        let connection = Arc::new(Self {
            name: name.to_string(),
            correlator_timeout,
            stack: ProtocolStack::new(),
            correlator: ResponseCorrelator::new(),
            app,
            transport: OnceLock::new(),
            status: Mutex::new(ConnectionStatus::Disconnected),
        });

        let weak = Arc::downgrade(&connection);
        let uplink = Uplink::new(move |message| {
            if let Some(connection) = weak.upgrade() {
                connection.deliver_up(message);
            }
        });
        let transport = make_transport(uplink);
        if connection.transport.set(transport).is_err() {
            unreachable!("transport installed exactly once during construction");
        }
        connection
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.lock()
    }

    /// Status is owned by the host (RTI or federate runtime), not derived.
    pub fn set_status(&self, status: ConnectionStatus) {
        *self.status.lock() = status;
    }

    fn transport(&self) -> &dyn Transport {
        self.transport
            .get()
            .expect("transport installed during construction")
            .as_ref()
    }

    /// Add a protocol just above the transport. Opens it immediately when
    /// traffic is already flowing.
    pub fn add_protocol(&self, protocol: Arc<dyn Protocol>) -> Result<()> {
        self.stack.add_protocol(protocol, self.transport().is_open())
    }

    /// Open the stack, then the transport, and let messages flow.
    pub fn connect(&self) -> Result<()> {
        log::debug!("[Connection::connect] opening connection [{}]", self.name);
        log::trace!("[Connection::connect] opening protocol stack");
        self.stack.open()?;
        log::trace!(
            "[Connection::connect] opening transport [{}/{}]",
            self.name,
            self.transport().kind()
        );
        self.transport().open()?;
        self.set_status(ConnectionStatus::Connected);
        log::trace!(
            "[Connection::connect] transport is now open [{}/{}]",
            self.name,
            self.transport().kind()
        );
        Ok(())
    }

    pub fn disconnect(&self) {
        log::debug!("[Connection::disconnect] disconnecting [{}]", self.name);
        self.transport().close();
        self.stack.close();
        self.set_status(ConnectionStatus::Disconnected);
    }

    pub fn is_connected(&self) -> bool {
        self.transport().is_open()
    }

    /// Probe for an RTI on the other end. True iff something answered
    /// successfully within the correlator timeout.
    pub fn find_rti(&self) -> bool {
        let mut context = MessageContext::new(RtiMessage::probe());
        if let Err(e) = self.send_control_request(&mut context) {
            log::debug!("[Connection::find_rti] probe failed: {}", e);
            return false;
        }
        context.is_success_response()
    }

    // ------------------------------------------------------------------
    // Sending
    // ------------------------------------------------------------------

    /// Send simulation data. Non-blocking apart from bundler backpressure.
    pub fn send_data_message(&self, message: &RtiMessage) -> Result<()> {
        let outgoing = Message::from_request(message, CallType::DataMessage, 0)?;
        self.push_down(outgoing)
    }

    /// Send control traffic that expects no reply.
    pub fn send_notification(&self, message: &RtiMessage) -> Result<()> {
        let outgoing = Message::from_request(message, CallType::Notification, 0)?;
        self.push_down(outgoing)
    }

    /// Send a control request and block until its response arrives, the
    /// deadline passes, or the connection drops.
    ///
    /// A timeout populates an error response on the context; it is not an
    /// `Err`. RTI-originated (async) requests get no reply on the wire, so
    /// they are sent and immediately marked successful.
    pub fn send_control_request(&self, context: &mut MessageContext) -> Result<()> {
        let request = context.request();
        let wants_reply = !request.is_async();

        // async requests need no correlation slot; id 0 marks them so
        let request_id = if wants_reply { self.correlator.register() } else { 0 };
        let outgoing = Message::from_request(request, CallType::ControlRequest, request_id)?;
        self.push_down(outgoing)?;

        if !wants_reply {
            context.success();
            return Ok(());
        }

        match self.correlator.wait_for(request_id, self.correlator_timeout) {
            Some(response) => context.set_response(response),
            None => context.error(format!(
                "no response received (request: {}) - RTI/federates still running?",
                context.request().message_type()
            )),
        }
        Ok(())
    }

    fn push_down(&self, message: Message) -> Result<()> {
        match self.stack.down(message) {
            Some(message) => self.transport().down(message),
            None => Ok(()), // absorbed by a protocol
        }
    }

    // ------------------------------------------------------------------
    // Receiving
    // ------------------------------------------------------------------

    /// Transport entry point: run the stack's up path, then dispatch.
    fn deliver_up(&self, message: Message) {
        if let Some(message) = self.stack.up(message) {
            self.receive(message);
        }
    }

    /// Dispatch one inbound frame. Errors are logged; the reader thread
    /// that called us has nowhere to propagate them.
    pub fn receive(&self, message: Message) {
        let result = match message.call_type() {
            CallType::DataMessage => message
                .inflate()
                .and_then(|inflated| self.app.receive_data_message(inflated)),
            CallType::Notification => message
                .inflate()
                .and_then(|inflated| self.app.receive_notification(inflated)),
            CallType::ControlRequest => self.receive_control_request(message),
            CallType::ControlResponseOk | CallType::ControlResponseErr => {
                let request_id = message.request_id();
                message
                    .inflate_response()
                    .map(|response| self.correlator.offer(request_id, response))
            }
        };
        if let Err(e) = result {
            log::error!(
                "[Connection::receive] [{}] error processing inbound message: {}",
                self.name,
                e
            );
        }
    }

    fn receive_control_request(&self, mut message: Message) -> Result<()> {
        // header-level pre-filter before paying for the decode
        if !self.app.is_receivable(&message.header()) {
            return Ok(());
        }

        let request = message.inflate()?;
        let wants_reply = !request.is_async();

        let mut context = MessageContext::new(request);
        self.app.receive_control_request(&mut context)?;

        let Some(response) = context.take_response() else {
            log::warn!(
                "[Connection::receive] no response received for control request {}",
                context.request().message_type()
            );
            return Ok(());
        };

        if wants_reply {
            message.store_response(&response)?;
            self.push_down(message)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("name", &self.name)
            .field("status", &self.status())
            .field("outstanding_requests", &self.correlator.outstanding())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::transport::inproc::{wire_pair, InprocTransport};
    use super::*;
    use crate::messaging::{MessageBody, ResponseMessage};
    use crossbeam::channel::{unbounded, Receiver, Sender};

    /// Scripted receiver: answers control requests, records everything else.
    struct ScriptedReceiver {
        accept: bool,
        respond: Option<fn(&MessageContext) -> ResponseMessage>,
        data: Sender<RtiMessage>,
        notifications: Sender<RtiMessage>,
    }

    impl ApplicationReceiver for ScriptedReceiver {
        fn is_receivable(&self, _header: &Header<'_>) -> bool {
            self.accept
        }
        fn receive_control_request(&self, context: &mut MessageContext) -> Result<()> {
            if let Some(respond) = self.respond {
                let response = respond(context);
                context.set_response(response);
            }
            Ok(())
        }
        fn receive_notification(&self, message: RtiMessage) -> Result<()> {
            let _ = self.notifications.send(message);
            Ok(())
        }
        fn receive_data_message(&self, message: RtiMessage) -> Result<()> {
            let _ = self.data.send(message);
            Ok(())
        }
    }

    struct Harness {
        local: Arc<Connection>,
        remote: Arc<Connection>,
        remote_data: Receiver<RtiMessage>,
        remote_notifications: Receiver<RtiMessage>,
    }

    fn harness(remote_accepts: bool, respond: Option<fn(&MessageContext) -> ResponseMessage>) -> Harness {
        let (local_wire, remote_wire) = wire_pair();
        let (data_tx, _data_rx) = unbounded();
        let (notify_tx, _notify_rx) = unbounded();
        let local = Connection::new(
            "local",
            Duration::from_millis(500),
            Arc::new(ScriptedReceiver {
                accept: true,
                respond: None,
                data: data_tx,
                notifications: notify_tx,
            }),
            move |uplink| Box::new(InprocTransport::new(local_wire, uplink)),
        );

        let (remote_data_tx, remote_data) = unbounded();
        let (remote_notify_tx, remote_notifications) = unbounded();
        let remote = Connection::new(
            "remote",
            Duration::from_millis(500),
            Arc::new(ScriptedReceiver {
                accept: remote_accepts,
                respond,
                data: remote_data_tx,
                notifications: remote_notify_tx,
            }),
            move |uplink| Box::new(InprocTransport::new(remote_wire, uplink)),
        );

        local.connect().unwrap();
        remote.connect().unwrap();
        Harness {
            local,
            remote,
            remote_data,
            remote_notifications,
        }
    }

    #[test]
    fn test_control_request_roundtrip() {
        let h = harness(true, Some(|_| ResponseMessage::ok_with("answer", vec![42])));

        let mut context = MessageContext::new(RtiMessage::probe());
        h.local.send_control_request(&mut context).unwrap();
        assert!(context.is_success_response());
        assert_eq!(context.response().unwrap().result("answer"), Some(&[42u8][..]));
    }

    #[test]
    fn test_find_rti_against_responder() {
        let h = harness(true, Some(|_| ResponseMessage::ok()));
        assert!(h.local.find_rti());
    }

    #[test]
    fn test_unanswered_request_times_out_with_error_response() {
        // remote accepts but its handler never populates a response
        let h = harness(true, None);
        let mut context = MessageContext::new(RtiMessage::probe());
        h.local.send_control_request(&mut context).unwrap();
        assert!(context.is_error_response());
        assert!(context
            .response()
            .unwrap()
            .error_message()
            .unwrap()
            .contains("no response received"));
    }

    #[test]
    fn test_prefiltered_request_gets_no_reply() {
        let h = harness(false, Some(|_| ResponseMessage::ok()));
        let mut context = MessageContext::new(RtiMessage::probe());
        h.local.send_control_request(&mut context).unwrap();
        // dropped by is_receivable, so the caller sees a timeout error
        assert!(context.is_error_response());
    }

    #[test]
    fn test_data_and_notifications_reach_the_receiver() {
        let h = harness(true, None);

        let mut update = RtiMessage::new(MessageBody::UpdateAttributes {
            object_id: 9,
            attributes: [(1u32, vec![1, 2, 3])].into_iter().collect(),
        });
        update.set_source_federate(4);
        h.local.send_data_message(&update).unwrap();
        let arrived = h.remote_data.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(arrived, update);

        h.local.send_notification(&RtiMessage::probe()).unwrap();
        assert!(h
            .remote_notifications
            .recv_timeout(Duration::from_secs(1))
            .is_ok());
    }

    #[test]
    fn test_async_request_is_fire_and_forget() {
        // no responder on the remote side at all
        let h = harness(true, None);
        let mut request = RtiMessage::new(MessageBody::AnnounceSyncPoint {
            label: "ready".to_string(),
            tag: vec![],
        });
        request.set_is_from_rti(true);

        let started = std::time::Instant::now();
        let mut context = MessageContext::new(request);
        h.remote.send_control_request(&mut context).unwrap();
        assert!(context.is_success_response());
        // must not have sat out the correlator timeout
        assert!(started.elapsed() < Duration::from_millis(400));
    }
}

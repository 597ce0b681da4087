// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hrti-team

//! Federation behavior driven over the wire.
//!
//! A federate-side connection talks to an RTI-side connection (in-process
//! pair); the RTI side routes control requests into a real [`Federation`]
//! through its incoming sink. This exercises the whole inbound path:
//! encode -> transport -> stack -> connection dispatch -> sink handlers ->
//! manager mutation -> response re-encode -> correlator wakeup.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use hrti::federation::{Federate, Federation, SyncPointStatus};
use hrti::messaging::{MessageBody, MessageContext, RtiMessage};
use hrti::model::ObjectModelBuilder;
use hrti::network::transport::inproc::{wire_pair, InprocTransport};
use hrti::network::{ApplicationReceiver, Connection};
use hrti::wire::Header;
use hrti::Result;

/// RTI side of one connection: every control request goes through the
/// federation's incoming sink.
struct RtiSide {
    federation: Arc<Federation>,
}

impl ApplicationReceiver for RtiSide {
    fn is_receivable(&self, _header: &Header<'_>) -> bool {
        true
    }
    fn receive_control_request(&self, context: &mut MessageContext) -> Result<()> {
        self.federation.process_incoming(context)
    }
    fn receive_notification(&self, _message: RtiMessage) -> Result<()> {
        Ok(())
    }
    fn receive_data_message(&self, _message: RtiMessage) -> Result<()> {
        Ok(())
    }
}

struct FederateSide;

impl ApplicationReceiver for FederateSide {
    fn is_receivable(&self, _header: &Header<'_>) -> bool {
        true
    }
    fn receive_control_request(&self, context: &mut MessageContext) -> Result<()> {
        context.success();
        Ok(())
    }
    fn receive_notification(&self, _message: RtiMessage) -> Result<()> {
        Ok(())
    }
    fn receive_data_message(&self, _message: RtiMessage) -> Result<()> {
        Ok(())
    }
}

struct Rig {
    federation: Arc<Federation>,
    federate_conn: Arc<Connection>,
    rti_conn: Arc<Connection>,
}

/// FOM: A(a1) <- B(a1, a2).
fn rig() -> Rig {
    let fom = ObjectModelBuilder::new()
        .object_class(1, "A", None)
        .attribute(1, 11, "a1", None)
        .object_class(2, "B", Some(1))
        .attribute(2, 12, "a2", None)
        .interaction_class(1, "I1", None, None)
        .build();
    let federation = Federation::new(1, "wire-test", fom, 64);

    let (federate_wire, rti_wire) = wire_pair();
    let federate_conn = Connection::new(
        "federate",
        Duration::from_secs(2),
        Arc::new(FederateSide),
        move |uplink| Box::new(InprocTransport::new(federate_wire, uplink)),
    );
    let rti_conn = Connection::new(
        "rti",
        Duration::from_secs(2),
        Arc::new(RtiSide {
            federation: Arc::clone(&federation),
        }),
        move |uplink| Box::new(InprocTransport::new(rti_wire, uplink)),
    );
    federate_conn.connect().unwrap();
    rti_conn.connect().unwrap();

    Rig {
        federation,
        federate_conn,
        rti_conn,
    }
}

/// Send a control request from a given federate and return the context.
fn control(rig: &Rig, federate: u16, body: MessageBody) -> MessageContext {
    let mut message = RtiMessage::new(body);
    message.set_source_federate(federate);
    message.set_target_federation(rig.federation.handle());
    let mut context = MessageContext::new(message);
    rig.federate_conn.send_control_request(&mut context).unwrap();
    context
}

fn attrs(handles: &[u32]) -> BTreeSet<u32> {
    handles.iter().copied().collect()
}

#[test]
fn test_publish_subscribe_discovery_over_the_wire() {
    let rig = rig();
    for (handle, name) in [(1u16, "pub"), (2u16, "sub")] {
        let federate = Federate::new(name, "test", Arc::clone(&rig.rti_conn));
        assert_eq!(rig.federation.join_federate(federate).unwrap(), handle);
    }

    // f1 publishes B{a1,a2}
    let context = control(
        &rig,
        1,
        MessageBody::PublishObjectClass {
            class: 2,
            attributes: attrs(&[11, 12]),
        },
    );
    assert!(context.is_success_response());

    // f2 subscribes A{a1}
    let context = control(
        &rig,
        2,
        MessageBody::SubscribeObjectClass {
            class: 1,
            attributes: attrs(&[11]),
            region: None,
        },
    );
    assert!(context.is_success_response());

    let interest = rig.federation.interest_manager();
    assert_eq!(
        interest.get_all_subscribers_with_types(2),
        [(2u16, 1u32)].into_iter().collect()
    );
    assert!(interest.is_attribute_class_subscribed(2, 1, 11));
    assert!(!interest.is_attribute_class_subscribed(2, 2, 12));
    assert_eq!(interest.get_discovery_type(2, 2), Some(1));
}

#[test]
fn test_restricted_sync_point_over_the_wire() {
    let rig = rig();
    for name in ["one", "two", "three"] {
        rig.federation
            .join_federate(Federate::new(name, "test", Arc::clone(&rig.rti_conn)))
            .unwrap();
    }

    // f1 registers "mid" restricted to {f1, f2}
    let context = control(
        &rig,
        1,
        MessageBody::RegisterSyncPoint {
            label: "mid".to_string(),
            tag: b"tag".to_vec(),
            federates: [1u16, 2u16].into_iter().collect(),
        },
    );
    assert!(context.is_success_response());
    let manager = rig.federation.sync_point_manager();
    assert_eq!(
        manager.get_point("mid").unwrap().status(),
        SyncPointStatus::Announced
    );

    // duplicate registration is refused
    let context = control(
        &rig,
        2,
        MessageBody::RegisterSyncPoint {
            label: "mid".to_string(),
            tag: vec![],
            federates: BTreeSet::new(),
        },
    );
    assert!(context.is_error_response());

    // f1 achieves: still announced; f2 achieves: synchronized
    let context = control(&rig, 1, MessageBody::AchieveSyncPoint { label: "mid".into() });
    assert!(context.is_success_response());
    assert!(!manager.is_synchronized("mid").unwrap());

    let context = control(&rig, 2, MessageBody::AchieveSyncPoint { label: "mid".into() });
    assert!(context.is_success_response());
    assert!(manager.is_synchronized("mid").unwrap());

    // f3 achieving afterwards is accepted, nothing regresses
    let context = control(&rig, 3, MessageBody::AchieveSyncPoint { label: "mid".into() });
    assert!(context.is_success_response());
    assert!(manager.is_synchronized("mid").unwrap());
}

#[test]
fn test_time_advance_over_the_wire() {
    let rig = rig();
    for name in ["reg", "con"] {
        rig.federation
            .join_federate(Federate::new(name, "test", Arc::clone(&rig.rti_conn)))
            .unwrap();
    }

    // f1 becomes regulating with lookahead 1.0 and requests advance to 5.0
    let context = control(
        &rig,
        1,
        MessageBody::SetTimeRegulating {
            enabled: true,
            lookahead: 1.0,
        },
    );
    assert!(context.is_success_response());
    let context = control(
        &rig,
        1,
        MessageBody::TimeAdvanceRequest {
            time: 5.0,
            available: false,
        },
    );
    assert!(context.is_success_response());
    assert_eq!(
        rig.federation.time_manager().status(1).unwrap().lbts(),
        6.0
    );

    // f2 becomes constrained and asks for 5.5 (< 6.0): granted
    let context = control(&rig, 2, MessageBody::SetTimeConstrained { enabled: true });
    assert!(context.is_success_response());
    let context = control(
        &rig,
        2,
        MessageBody::TimeAdvanceRequest {
            time: 5.5,
            available: false,
        },
    );
    assert!(context.is_success_response());

    let status = rig.federation.time_manager().status(2).unwrap();
    assert_eq!(status.current_time(), 5.5);
    assert_eq!(status.advancing(), hrti::federation::Tar::Provisional);
}

#[test]
fn test_resign_over_the_wire() {
    let rig = rig();
    rig.federation
        .join_federate(Federate::new("only", "test", Arc::clone(&rig.rti_conn)))
        .unwrap();
    assert_eq!(rig.federation.federate_count(), 1);

    let context = control(&rig, 1, MessageBody::ResignFederation);
    assert!(context.is_success_response());
    assert_eq!(rig.federation.federate_count(), 0);
    assert!(rig.federation.federate_connections().is_empty());
}

#[test]
fn test_data_fanout_skips_the_sender() {
    use crossbeam::channel::{unbounded, Receiver};

    struct RecordingFederate {
        data: crossbeam::channel::Sender<RtiMessage>,
    }

    impl ApplicationReceiver for RecordingFederate {
        fn is_receivable(&self, _header: &Header<'_>) -> bool {
            true
        }
        fn receive_control_request(&self, context: &mut MessageContext) -> Result<()> {
            context.success();
            Ok(())
        }
        fn receive_notification(&self, _message: RtiMessage) -> Result<()> {
            Ok(())
        }
        fn receive_data_message(&self, message: RtiMessage) -> Result<()> {
            let _ = self.data.send(message);
            Ok(())
        }
    }

    let fom = ObjectModelBuilder::new().object_class(1, "A", None).build();
    let federation = Federation::new(1, "fanout-test", fom, 64);

    // two federates, each over its own connection pair
    let mut rti_conns: Vec<Arc<Connection>> = Vec::new();
    let mut federate_rx: Vec<Receiver<RtiMessage>> = Vec::new();
    for name in ["one", "two"] {
        let (federate_wire, rti_wire) = wire_pair();
        let (tx, rx) = unbounded();
        let federate_conn = Connection::new(
            name,
            Duration::from_secs(2),
            Arc::new(RecordingFederate { data: tx }),
            move |uplink| Box::new(InprocTransport::new(federate_wire, uplink)),
        );
        let rti_conn = Connection::new(
            &format!("rti-{}", name),
            Duration::from_secs(2),
            Arc::new(FederateSide), // RTI side needs no federation here
            move |uplink| Box::new(InprocTransport::new(rti_wire, uplink)),
        );
        federate_conn.connect().unwrap();
        rti_conn.connect().unwrap();
        federation
            .join_federate(Federate::new(name, "test", Arc::clone(&rti_conn)))
            .unwrap();
        rti_conns.push(rti_conn);
        federate_rx.push(rx);
        // keep the federate connection alive for the test duration
        std::mem::forget(federate_conn);
    }

    let mut update = RtiMessage::new(MessageBody::UpdateAttributes {
        object_id: 7,
        attributes: [(1u32, vec![0x42])].into_iter().collect(),
    });
    update.set_source_federate(1);

    // federate one sent this; only federate two may see it
    federation.queue_data_message(&update, Some(&rti_conns[0]));

    let arrived = federate_rx[1].recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(arrived, update);
    assert!(
        federate_rx[0].recv_timeout(Duration::from_millis(200)).is_err(),
        "no loopback to the sender's connection"
    );
}

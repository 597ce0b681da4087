// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hrti-team

//! RTI-side handlers wired into each federation's incoming sink.
//!
//! Handlers translate inbound control requests into mutations of the
//! federation's managers and populate the response on the context. Domain
//! failures become error responses here; they are expected outcomes, not
//! handler errors.
//!
//! Handlers hold a weak reference to their federation: the federation owns
//! the sink which owns the handlers, and nobody needs that cycle strong.

use std::sync::{Arc, Weak};

use crate::messaging::sink::{Handling, MessageHandler};
use crate::messaging::{MessageBody, MessageContext, MessageType, RtiMessage};
use crate::model::FederateHandle;
use crate::{Result, RtiError};

use super::time::TriState;
use super::Federation;

/// Register the standard handler set on a freshly built federation.
pub(super) fn register_handlers(federation: &Arc<Federation>) {
    let weak = Arc::downgrade(federation);

    federation.with_incoming_sink(|sink| {
        let pubsub = Arc::new(PubSubHandler { federation: weak.clone() });
        for message_type in [
            MessageType::PublishObjectClass,
            MessageType::UnpublishObjectClass,
            MessageType::SubscribeObjectClass,
            MessageType::UnsubscribeObjectClass,
            MessageType::PublishInteractionClass,
            MessageType::UnpublishInteractionClass,
            MessageType::SubscribeInteractionClass,
            MessageType::UnsubscribeInteractionClass,
        ] {
            sink.register(message_type, pubsub.clone())
                .expect("fresh sink accepts the standard handlers");
        }

        let sync = Arc::new(SyncPointHandler { federation: weak.clone() });
        sink.register(MessageType::RegisterSyncPoint, sync.clone())
            .expect("fresh sink accepts the standard handlers");
        sink.register(MessageType::AchieveSyncPoint, sync)
            .expect("fresh sink accepts the standard handlers");

        let time = Arc::new(TimeHandler { federation: weak.clone() });
        for message_type in [
            MessageType::TimeAdvanceRequest,
            MessageType::SetTimeConstrained,
            MessageType::SetTimeRegulating,
            MessageType::ModifyLookahead,
        ] {
            sink.register(message_type, time.clone())
                .expect("fresh sink accepts the standard handlers");
        }

        let lifecycle = Arc::new(LifecycleHandler { federation: weak });
        sink.register(MessageType::ResignFederation, lifecycle)
            .expect("fresh sink accepts the standard handlers");

        sink.register(MessageType::RtiProbe, Arc::new(ProbeHandler))
            .expect("fresh sink accepts the standard handlers");
    });
}

/// Apply a manager operation, turning domain failures into an error
/// response on the context.
fn respond(context: &mut MessageContext, result: Result<()>) -> Result<Handling> {
    match result {
        Ok(()) => {
            if !context.has_response() {
                context.success();
            }
            Ok(Handling::Continue)
        }
        Err(e) => {
            context.error(e.to_string());
            Ok(Handling::Continue)
        }
    }
}

fn upgrade(federation: &Weak<Federation>) -> Result<Arc<Federation>> {
    federation
        .upgrade()
        .ok_or_else(|| RtiError::internal("federation has been destroyed"))
}

// ============================================================================
// Probe
// ============================================================================

/// Answers reachability probes. Receiving one at all means the fabric
/// works, so the reply is always success.
struct ProbeHandler;

impl MessageHandler for ProbeHandler {
    fn name(&self) -> &str {
        "RtiProbe"
    }

    fn process(&self, context: &mut MessageContext) -> Result<Handling> {
        context.success();
        Ok(Handling::Continue)
    }
}

// ============================================================================
// Publication / subscription
// ============================================================================

struct PubSubHandler {
    federation: Weak<Federation>,
}

impl MessageHandler for PubSubHandler {
    fn name(&self) -> &str {
        "PubSub"
    }

    fn process(&self, context: &mut MessageContext) -> Result<Handling> {
        let federation = upgrade(&self.federation)?;
        let interest = federation.interest_manager();
        let federate = context.request().source_federate();

        let result = match context.request().body() {
            MessageBody::PublishObjectClass { class, attributes } => {
                interest.publish_object_class(federate, *class, attributes.clone())
            }
            MessageBody::UnpublishObjectClass { class, attributes } => {
                interest.unpublish_object_class(federate, *class, attributes)
            }
            MessageBody::SubscribeObjectClass { class, attributes, region } => {
                interest.subscribe_object_class(federate, *class, attributes.clone(), *region)
            }
            MessageBody::UnsubscribeObjectClass { class, attributes } => {
                interest.unsubscribe_object_class(federate, *class, attributes)
            }
            MessageBody::PublishInteractionClass { class } => {
                interest.publish_interaction_class(federate, *class)
            }
            MessageBody::UnpublishInteractionClass { class } => {
                interest.unpublish_interaction_class(federate, *class)
            }
            MessageBody::SubscribeInteractionClass { class, region } => {
                interest.subscribe_interaction_class(federate, *class, *region)
            }
            MessageBody::UnsubscribeInteractionClass { class } => {
                interest.unsubscribe_interaction_class(federate, *class)
            }
            other => Err(RtiError::internal(format!(
                "PubSub handler got a {} message",
                other.message_type()
            ))),
        };
        respond(context, result)
    }
}

// ============================================================================
// Synchronization points
// ============================================================================

struct SyncPointHandler {
    federation: Weak<Federation>,
}

impl MessageHandler for SyncPointHandler {
    fn name(&self) -> &str {
        "SyncPoint"
    }

    fn process(&self, context: &mut MessageContext) -> Result<Handling> {
        let federation = upgrade(&self.federation)?;
        let manager = federation.sync_point_manager();
        let federate = context.request().source_federate();

        let result = match context.request().body() {
            MessageBody::RegisterSyncPoint { label, tag, federates } => {
                let registered =
                    manager.register(label, tag.clone(), federates.clone(), federate);
                if registered.is_ok() {
                    // announce to the audience: everyone, or the subset
                    let mut announcement = RtiMessage::new(MessageBody::AnnounceSyncPoint {
                        label: label.clone(),
                        tag: tag.clone(),
                    });
                    if !federates.is_empty() {
                        announcement.set_target_federates(federates.clone());
                    }
                    federation.queue_control_message(announcement);
                }
                registered
            }
            MessageBody::AchieveSyncPoint { label } => {
                let members = federation.federate_handles();
                manager.achieve(label, federate, &members).map(|status| {
                    if status == super::sync::SyncPointStatus::Synchronized {
                        federation.queue_control_message(RtiMessage::new(
                            MessageBody::FederationSynchronized { label: label.clone() },
                        ));
                    }
                })
            }
            other => Err(RtiError::internal(format!(
                "SyncPoint handler got a {} message",
                other.message_type()
            ))),
        };
        respond(context, result)
    }
}

// ============================================================================
// Time management
// ============================================================================

struct TimeHandler {
    federation: Weak<Federation>,
}

impl TimeHandler {
    /// Grant every federate whose outstanding request clears the current
    /// federation LBTS. Each grant may move the LBTS, so iterate until a
    /// full pass grants nothing.
    fn evaluate_grants(federation: &Arc<Federation>) {
        let time = federation.time_manager();
        loop {
            let federation_lbts = time.federation_lbts();
            let mut granted: Option<(FederateHandle, f64)> = None;
            for federate in federation.federate_handles() {
                let Some(status) = time.status(federate) else { continue };
                if status.can_advance(federation_lbts) {
                    let new_time = status.requested_time();
                    let _ = time.with_status(federate, |status| status.advance_federate(new_time));
                    granted = Some((federate, new_time));
                    break;
                }
            }
            match granted {
                Some((federate, new_time)) => {
                    let mut grant =
                        RtiMessage::new(MessageBody::TimeAdvanceGrant { time: new_time });
                    grant.set_target_federate(federate);
                    federation.queue_control_message(grant);
                }
                None => break,
            }
        }
    }
}

impl MessageHandler for TimeHandler {
    fn name(&self) -> &str {
        "Time"
    }

    fn process(&self, context: &mut MessageContext) -> Result<Handling> {
        let federation = upgrade(&self.federation)?;
        let time = federation.time_manager();
        let federate = context.request().source_federate();

        let result = match context.request().body() {
            MessageBody::TimeAdvanceRequest { time: requested, available } => {
                let (requested, available) = (*requested, *available);
                time.with_status(federate, |status| {
                    status.time_advance_requested(requested, available)
                })
                .and_then(|inner| inner)
                .map(|()| Self::evaluate_grants(&federation))
            }
            MessageBody::SetTimeConstrained { enabled } => {
                let enabled = *enabled;
                time.with_status(federate, |status| {
                    status.set_constrained(if enabled { TriState::On } else { TriState::Off });
                })
            }
            MessageBody::SetTimeRegulating { enabled, lookahead } => {
                let (enabled, lookahead) = (*enabled, *lookahead);
                time.with_status(federate, |status| {
                    status.set_regulating(if enabled { TriState::On } else { TriState::Off });
                    status.set_lookahead(lookahead);
                })
                .map(|()| Self::evaluate_grants(&federation))
            }
            MessageBody::ModifyLookahead { lookahead } => {
                let lookahead = *lookahead;
                time.with_status(federate, |status| status.set_lookahead(lookahead))
                    .map(|()| Self::evaluate_grants(&federation))
            }
            other => Err(RtiError::internal(format!(
                "Time handler got a {} message",
                other.message_type()
            ))),
        };
        respond(context, result)
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

struct LifecycleHandler {
    federation: Weak<Federation>,
}

impl MessageHandler for LifecycleHandler {
    fn name(&self) -> &str {
        "Lifecycle"
    }

    fn process(&self, context: &mut MessageContext) -> Result<Handling> {
        let federation = upgrade(&self.federation)?;
        let federate = context.request().source_federate();

        let result = match context.request().body() {
            MessageBody::ResignFederation => federation.resign_federate(federate),
            other => Err(RtiError::internal(format!(
                "Lifecycle handler got a {} message",
                other.message_type()
            ))),
        };
        respond(context, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::MessageContext;
    use crate::model::ObjectModelBuilder;
    use std::collections::{BTreeMap, BTreeSet};

    fn federation() -> Arc<Federation> {
        let fom = ObjectModelBuilder::new()
            .object_class(1, "A", None)
            .attribute(1, 11, "a1", None)
            .build();
        Federation::new(1, "handlers-test", fom, 64)
    }

    fn request_from(federate: FederateHandle, body: MessageBody) -> MessageContext {
        let mut message = RtiMessage::new(body);
        message.set_source_federate(federate);
        MessageContext::new(message)
    }

    #[test]
    fn test_probe_succeeds() {
        let federation = federation();
        let mut context = request_from(1, MessageBody::RtiProbe);
        federation.process_incoming(&mut context).unwrap();
        assert!(context.is_success_response());
    }

    #[test]
    fn test_subscribe_through_the_sink() {
        let federation = federation();
        let mut context = request_from(
            2,
            MessageBody::SubscribeObjectClass {
                class: 1,
                attributes: [11].into_iter().collect(),
                region: None,
            },
        );
        federation.process_incoming(&mut context).unwrap();
        assert!(context.is_success_response());
        assert!(federation
            .interest_manager()
            .is_object_class_subscribed_directly(2, 1));
    }

    #[test]
    fn test_domain_failure_becomes_error_response() {
        let federation = federation();
        let mut context = request_from(
            2,
            MessageBody::SubscribeObjectClass {
                class: 99,
                attributes: BTreeSet::new(),
                region: None,
            },
        );
        federation.process_incoming(&mut context).unwrap();
        assert!(context.is_error_response());
    }

    #[test]
    fn test_update_attributes_has_no_handler() {
        // data messages pass the sink for side effects only; none are
        // registered by default, and that must not be an error
        let federation = federation();
        let mut context = request_from(
            1,
            MessageBody::UpdateAttributes {
                object_id: 1,
                attributes: BTreeMap::new(),
            },
        );
        federation.process_incoming(&mut context).unwrap();
        assert!(!context.has_response());
    }

    #[test]
    fn test_time_advance_request_grants_unconstrained() {
        let federation = federation();
        let connection = crate::federation::tests_support::dummy_connection();
        federation
            .join_federate(crate::federation::Federate::new("one", "test", connection))
            .unwrap();

        let mut context = request_from(
            1,
            MessageBody::TimeAdvanceRequest {
                time: 4.0,
                available: false,
            },
        );
        federation.process_incoming(&mut context).unwrap();
        assert!(context.is_success_response());
        // unconstrained: granted immediately, grant callback still owed
        let status = federation.time_manager().status(1).unwrap();
        assert_eq!(status.advancing(), crate::federation::time::Tar::Provisional);
        assert_eq!(status.current_time(), 4.0);
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hrti-team

//! Typed message dispatch.
//!
//! A [`MessageSink`] maps [`MessageType`] to handlers. Three registration
//! modes exist: a single handler, a chain (handlers run in registration
//! order) and exclusive (no further registration for that type). A handler
//! may stop a chain by vetoing; a veto is an expected control-flow signal,
//! not an error, and is modelled as a return variant so hot paths never
//! unwind. Unknown types fall through to a default handler that logs and
//! drops.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::{MessageContext, MessageType};
use crate::{Result, RtiError};

/// What a handler decided about the message it was given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handling {
    /// Keep processing (next handler in the chain, if any).
    Continue,

    /// Stop the chain. If nothing has populated a response yet, the sink
    /// marks the context successful.
    Veto(String),
}

/// One message handler. Implementations are shared across threads, so any
/// mutable state is theirs to synchronize.
pub trait MessageHandler: Send + Sync {
    fn name(&self) -> &str;

    /// Process the request, optionally populating the context's response.
    ///
    /// Errors abort the chain and surface to the sink's caller.
    fn process(&self, context: &mut MessageContext) -> Result<Handling>;
}

enum Registration {
    Single(Arc<dyn MessageHandler>),
    Chain(Vec<Arc<dyn MessageHandler>>),
}

/// Registry and dispatcher for inbound messages.
pub struct MessageSink {
    name: String,
    handlers: HashMap<MessageType, Registration>,
    exclusive: HashSet<MessageType>,
}

impl MessageSink {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            handlers: HashMap::new(),
            exclusive: HashSet::new(),
        }
    }

    /// Register a handler for a type, chaining behind any existing ones.
    pub fn register(
        &mut self,
        message_type: MessageType,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<()> {
        if self.exclusive.contains(&message_type) {
            return Err(RtiError::Internal(format!(
                "cannot add handler [{}]: another handler has exclusive access to [{}]",
                handler.name(),
                message_type
            )));
        }
        match self.handlers.remove(&message_type) {
            None => {
                self.handlers.insert(message_type, Registration::Single(handler));
            }
            Some(Registration::Single(existing)) => {
                self.handlers
                    .insert(message_type, Registration::Chain(vec![existing, handler]));
            }
            Some(Registration::Chain(mut chain)) => {
                chain.push(handler);
                self.handlers.insert(message_type, Registration::Chain(chain));
            }
        }
        Ok(())
    }

    /// Register a handler that tolerates no others for its type.
    pub fn register_exclusive(
        &mut self,
        message_type: MessageType,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<()> {
        if self.handlers.contains_key(&message_type) {
            return Err(RtiError::Internal(format!(
                "cannot give exclusive access of [{}] to handler [{}]: already registered",
                message_type,
                handler.name()
            )));
        }
        self.handlers.insert(message_type, Registration::Single(handler));
        self.exclusive.insert(message_type);
        Ok(())
    }

    pub fn has_handler(&self, message_type: MessageType) -> bool {
        self.handlers.contains_key(&message_type)
    }

    /// Dispatch a request to its handler(s).
    ///
    /// Handler errors are wrapped with the sink's name and surfaced; a veto
    /// with no response set becomes success.
    pub fn process(&self, context: &mut MessageContext) -> Result<()> {
        let message_type = context.request().message_type();
        let Some(registration) = self.handlers.get(&message_type) else {
            log::warn!(
                "(sink: {}) IGNORE MESSAGE. No handler for type: {}",
                self.name,
                message_type
            );
            return Ok(());
        };

        let handlers: &[Arc<dyn MessageHandler>] = match registration {
            Registration::Single(handler) => std::slice::from_ref(handler),
            Registration::Chain(chain) => chain,
        };

        for handler in handlers {
            match handler.process(context) {
                Ok(Handling::Continue) => {}
                Ok(Handling::Veto(reason)) => {
                    log::trace!(
                        "(sink: {}) message [{}] veto'd by handler [{}]: {}",
                        self.name,
                        message_type,
                        handler.name(),
                        reason
                    );
                    if !context.has_response() {
                        context.success();
                    }
                    return Ok(());
                }
                Err(e) => {
                    return Err(RtiError::Internal(format!(
                        "(sink: {}) handler [{}] failed on [{}]: {}",
                        self.name,
                        handler.name(),
                        message_type,
                        e
                    )));
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for MessageSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageSink")
            .field("name", &self.name)
            .field("registered", &self.handlers.len())
            .finish()
    }
}

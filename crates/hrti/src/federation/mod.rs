// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hrti-team

//! Federation state: membership, interest, synchronization and time.
//!
//! One [`Federation`] per running exercise; the [`FederationManager`]
//! (inside an [`RtiContext`]) owns the set of them. Each federation in
//! turn owns its [`interest::InterestManager`], [`sync::SyncPointManager`]
//! and [`time::TimeManager`], the federate records, and the outgoing
//! message machinery.

mod federate;
#[allow(clippy::module_inception)]
mod federation;
mod handlers;
pub mod interest;
mod manager;
pub mod sync;
pub mod time;

pub use federate::Federate;
pub use federation::Federation;
pub use interest::InterestManager;
pub use manager::{FederationManager, RtiContext};
pub use sync::{SyncPoint, SyncPointManager, SyncPointStatus};
pub use time::{Tar, TimeManager, TimeStatus, TriState};

/// Shared helpers for federation-level tests.
#[cfg(test)]
pub(crate) mod tests_support {
    use std::sync::Arc;
    use std::time::Duration;

    use crate::messaging::{MessageContext, RtiMessage};
    use crate::network::transport::inproc::{wire_pair, InprocTransport};
    use crate::network::{ApplicationReceiver, Connection};
    use crate::wire::Header;
    use crate::Result;

    struct NullReceiver;

    impl ApplicationReceiver for NullReceiver {
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

    /// A connected inproc connection whose peer answers every control
    /// request with success.
    pub(crate) fn dummy_connection() -> Arc<Connection> {
        let (near_wire, far_wire) = wire_pair();
        let near = Connection::new(
            "test-near",
            Duration::from_millis(250),
            Arc::new(NullReceiver),
            move |uplink| Box::new(InprocTransport::new(near_wire, uplink)),
        );
        let far = Connection::new(
            "test-far",
            Duration::from_millis(250),
            Arc::new(NullReceiver),
            move |uplink| Box::new(InprocTransport::new(far_wire, uplink)),
        );
        near.connect().expect("inproc connect");
        far.connect().expect("inproc connect");
        // keep the far end alive for the duration of the process
        std::mem::forget(far);
        near
    }
}

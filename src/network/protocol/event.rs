//! Internal protocol-level events, distinct from the public [`CoreEvent`](crate::CoreEvent).
//!
//! [`UdpProtocol`](super::UdpProtocol) emits these to itself as it drives the
//! per-peer handshake and steady-state exchange; most are translated into a
//! `CoreEvent` by the owning session, and `Input` never escapes the protocol
//! layer at all.

use crate::frame_info::PlayerInput;
use crate::{Config, PlayerHandle};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Event<T>
where
    T: Config,
{
    /// The session is currently synchronizing with the remote client. It will continue until `count` reaches `total`.
    Synchronizing {
        /// Total sync roundtrips required.
        total: u32,
        /// Completed sync roundtrips so far.
        count: u32,
        /// Total sync requests sent (includes retries due to packet loss).
        total_requests_sent: u32,
        /// Milliseconds elapsed since sync started.
        elapsed_ms: u128,
    },
    /// The session is now synchronized with the remote client.
    Synchronized,
    /// The session has received an input from the remote client. This event will not be forwarded to the user.
    Input {
        /// The received input, tagged with the frame it belongs to.
        input: PlayerInput<T::Input>,
        /// Which player this input came from.
        player: PlayerHandle,
    },
    /// The remote client has disconnected.
    Disconnected,
    /// The session has not received packets from the remote client since `disconnect_timeout` ms.
    NetworkInterrupted {
        /// Milliseconds until this peer is considered disconnected.
        disconnect_timeout: u128,
    },
    /// Sent only after a `NetworkInterrupted` event, if communication has resumed.
    NetworkResumed,
    /// Synchronization has timed out. This is only emitted if a sync timeout was configured.
    /// The session will continue trying to sync, but the user may choose to abort.
    SyncTimeout {
        /// Milliseconds elapsed since sync started.
        elapsed_ms: u128,
    },
}

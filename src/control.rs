//! The peer control plane: pending/connected peer membership, authority
//! election, and `STATE_SYNC` delivery, layered above a
//! [`P2PSession`](crate::sessions::p2p_session::P2PSession).
//!
//! A [`P2PSession`](crate::sessions::p2p_session::P2PSession) knows how to
//! keep one player's input in lockstep with its peers; it does not know
//! which peer is allowed to push a full-state snapshot onto the others, or
//! what to do when a peer shows up mid-match. [`PeerControlPlane`] is the
//! layer above the session that answers those questions: it tracks which
//! peers are still joining versus fully connected, elects the lowest-slot
//! connected peer as the match's authority, and arbitrates `STATE_SYNC`
//! delivery so a stale or spoofed snapshot from a non-authority peer can
//! never overwrite a live game.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::Frame;

/// Opaque identifier for a peer assigned by the transport layer (e.g. a
/// WebRTC data channel label). The control plane never interprets the value;
/// it only orders and compares it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct PeerId(pub u64);

impl PeerId {
    /// Builds a `PeerId` from a raw transport identifier.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "peer#{}", self.0)
    }
}

/// The number of frames a `STATE_SYNC` snapshot may lag behind the receiver's
/// current frame before it is considered stale and rejected.
pub const STATE_SYNC_MAX_LAG_FRAMES: i32 = 120;

/// Minimum gap, in frames at 60Hz, between `STATE_SYNC` retransmissions to
/// the same peer (one second).
pub const STATE_SYNC_RETRANSMIT_FRAMES: i32 = 60;

/// Frames after which a `STATE_SYNC` still unacknowledged is considered lost
/// and is retransmitted again, at the slower cadence (three seconds).
pub const STATE_SYNC_RETRANSMIT_BACKOFF_FRAMES: i32 = 180;

/// How many `STATE_SYNC` messages from peers the control plane does not yet
/// recognize are held in the race-window buffer before the oldest is
/// silently dropped. Join and `STATE_SYNC` delivery race on an open
/// connection: a peer can legitimately receive a snapshot before its own
/// `PeerEvent::Joined` notification has been processed.
pub const DEFAULT_RACE_WINDOW_CAPACITY: usize = 4;

/// A message exchanged between control planes, separate from the lower-level
/// per-packet protocol in [`crate::network::messages`] (which already
/// handles input batching and periodic checksum exchange). These are
/// application-facing events: whole-state snapshots and membership changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ControlMessage {
    /// A full-state snapshot pushed by the sender, who believes itself to be
    /// the match authority.
    StateSync {
        /// The frame the snapshot was captured at.
        frame: Frame,
        /// Format version of the encoded `snapshot`, for cross-build rejection.
        format_version: u16,
        /// The encoded game state, opaque to the control plane itself.
        snapshot: Vec<u8>,
    },
    /// Notifies peers of a membership change.
    PeerEvent(PeerEventKind),
}

/// The kind of membership change carried by [`ControlMessage::PeerEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeerEventKind {
    /// `peer` has been assigned `slot` and is now fully connected.
    Joined {
        /// The peer that joined.
        peer: PeerId,
        /// The slot index it was assigned.
        slot: usize,
    },
    /// `peer` has disconnected (network interruption or explicit leave).
    Disconnected {
        /// The peer that disconnected.
        peer: PeerId,
    },
}

/// An event the control plane has observed and which the driver should act
/// on (log, surface to the UI, or feed into session reconfiguration).
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ControlEvent {
    /// `peer` was promoted from pending to connected at `slot`, and the
    /// current authority was recomputed.
    PeerConnected {
        /// The peer that connected.
        peer: PeerId,
        /// The slot it was assigned.
        slot: usize,
    },
    /// `peer` disconnected; its slot has been released.
    PeerDisconnected {
        /// The peer that disconnected.
        peer: PeerId,
    },
    /// The elected authority changed (a new peer, or none if the last
    /// connected peer left).
    AuthorityChanged {
        /// The new authority, or `None` if nobody is connected.
        authority: Option<PeerId>,
    },
    /// A `STATE_SYNC` from `sender` was accepted and should be applied.
    StateSyncAccepted {
        /// The peer whose snapshot was applied.
        sender: PeerId,
        /// The frame the snapshot was captured at.
        frame: Frame,
    },
    /// A `STATE_SYNC` from `sender` was rejected: the sender was not the
    /// authority and the local peer was already fully joined.
    StateSyncRejected {
        /// The peer whose snapshot was rejected.
        sender: PeerId,
    },
    /// A `STATE_SYNC` arrived more than [`STATE_SYNC_MAX_LAG_FRAMES`] behind
    /// the current frame and was discarded as stale.
    StateSyncStale {
        /// The peer whose snapshot was discarded.
        sender: PeerId,
        /// The frame the stale snapshot claimed.
        frame: Frame,
    },
    /// A `STATE_SYNC` from a peer the control plane does not yet recognize
    /// was held in the race-window buffer rather than rejected outright.
    StateSyncBuffered {
        /// The peer whose snapshot was buffered.
        sender: PeerId,
    },
}

/// Outcome of applying a received [`ControlMessage::StateSync`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateSyncOutcome {
    /// The caller should decode `snapshot` and load it into the session.
    Accept,
    /// The sender was not authorized to push a snapshot.
    Reject,
    /// The snapshot was older than [`STATE_SYNC_MAX_LAG_FRAMES`] and was
    /// dropped.
    Stale,
    /// The sender is not yet known; the message was buffered for later.
    Buffered,
}

#[derive(Debug, Clone)]
struct PendingPeer {
    joined_at_frame: Frame,
}

/// Tracks peer membership, authority, and `STATE_SYNC` arbitration for one
/// local peer's view of a match.
#[derive(Debug)]
pub struct PeerControlPlane {
    local_peer: PeerId,
    local_fully_joined: bool,
    pending: BTreeMap<PeerId, PendingPeer>,
    connected: BTreeMap<PeerId, usize>,
    authority: Option<PeerId>,
    race_window: VecDeque<(PeerId, Frame, u16, Vec<u8>)>,
    race_window_capacity: usize,
    pre_session_inputs: Vec<(Frame, PeerId, Vec<u8>)>,
    last_retransmit_frame: BTreeMap<PeerId, Frame>,
    events: VecDeque<ControlEvent>,
}

impl PeerControlPlane {
    /// Creates a new control plane for `local_peer`, which starts out not
    /// yet fully joined (so it may legitimately accept a `STATE_SYNC` from
    /// anyone until it has a slot of its own).
    #[must_use]
    pub fn new(local_peer: PeerId) -> Self {
        Self {
            local_peer,
            local_fully_joined: false,
            pending: BTreeMap::new(),
            connected: BTreeMap::new(),
            authority: None,
            race_window: VecDeque::new(),
            race_window_capacity: DEFAULT_RACE_WINDOW_CAPACITY,
            pre_session_inputs: Vec::new(),
            last_retransmit_frame: BTreeMap::new(),
            events: VecDeque::new(),
        }
    }

    /// Overrides the race-window buffer capacity (default
    /// [`DEFAULT_RACE_WINDOW_CAPACITY`]).
    pub fn set_race_window_capacity(&mut self, capacity: usize) {
        self.race_window_capacity = capacity.max(1);
        while self.race_window.len() > self.race_window_capacity {
            self.race_window.pop_front();
        }
    }

    /// The currently elected authority, or `None` if nobody is connected.
    #[must_use]
    pub const fn authority(&self) -> Option<PeerId> {
        self.authority
    }

    /// Whether `peer` is the current authority.
    #[must_use]
    pub fn is_authority(&self, peer: PeerId) -> bool {
        self.authority == Some(peer)
    }

    /// Whether the local peer has been assigned a slot yet.
    #[must_use]
    pub const fn local_fully_joined(&self) -> bool {
        self.local_fully_joined
    }

    /// Marks the local peer as fully joined at `slot`, tightening
    /// `STATE_SYNC` acceptance from "accept anyone" to "accept only the
    /// authority".
    pub fn mark_local_joined(&mut self, slot: usize) {
        self.connected.insert(self.local_peer, slot);
        self.local_fully_joined = true;
        self.recompute_authority();
    }

    /// Registers `peer` as pending (seen on the transport, not yet assigned
    /// a slot). A peer already connected or pending is left unchanged.
    pub fn peer_seen(&mut self, peer: PeerId, now: Frame) {
        if self.connected.contains_key(&peer) || self.pending.contains_key(&peer) {
            return;
        }
        self.pending
            .insert(peer, PendingPeer { joined_at_frame: now });
        self.drain_race_window_for(peer);
    }

    /// Confirms `peer` into `slot`, moving it from pending to connected and
    /// recomputing authority. Emits [`ControlEvent::PeerConnected`] and,
    /// when the election changes, [`ControlEvent::AuthorityChanged`].
    pub fn confirm_peer(&mut self, peer: PeerId, slot: usize) {
        self.pending.remove(&peer);
        self.connected.insert(peer, slot);
        self.events
            .push_back(ControlEvent::PeerConnected { peer, slot });
        self.recompute_authority();
        self.drain_race_window_for(peer);
    }

    /// Removes `peer` from both pending and connected, recomputing
    /// authority. A disconnected peer's queued `STATE_SYNC` retransmission
    /// timer is cleared: there is no point retransmitting to someone who
    /// just left. A later rejoin is treated as a fresh [`Self::peer_seen`].
    pub fn disconnect_peer(&mut self, peer: PeerId) {
        let was_known = self.pending.remove(&peer).is_some() || self.connected.remove(&peer).is_some();
        self.last_retransmit_frame.remove(&peer);
        if was_known {
            self.events
                .push_back(ControlEvent::PeerDisconnected { peer });
            self.recompute_authority();
        }
    }

    fn recompute_authority(&mut self) {
        let new_authority = self.connected.iter().min_by_key(|(_, &slot)| slot).map(|(&peer, _)| peer);
        if new_authority != self.authority {
            self.authority = new_authority;
            self.events.push_back(ControlEvent::AuthorityChanged {
                authority: new_authority,
            });
        }
    }

    /// Applies a received `STATE_SYNC`, per the acceptance rule: the sender
    /// must either be the current authority, or the local peer must still be
    /// joining (so it has no authority of its own to defer to yet). A
    /// snapshot older than [`STATE_SYNC_MAX_LAG_FRAMES`] relative to
    /// `local_frame` is rejected as stale regardless of sender.
    pub fn receive_state_sync(
        &mut self,
        sender: PeerId,
        frame: Frame,
        format_version: u16,
        snapshot: Vec<u8>,
        local_frame: Frame,
    ) -> StateSyncOutcome {
        if !self.connected.contains_key(&sender) && !self.pending.contains_key(&sender) {
            self.buffer_state_sync(sender, frame, format_version, snapshot);
            self.events
                .push_back(ControlEvent::StateSyncBuffered { sender });
            return StateSyncOutcome::Buffered;
        }

        let authorized = self.is_authority(sender) || !self.local_fully_joined;
        if !authorized {
            self.events
                .push_back(ControlEvent::StateSyncRejected { sender });
            return StateSyncOutcome::Reject;
        }

        if local_frame.is_valid() && (local_frame.as_i32() - frame.as_i32()) > STATE_SYNC_MAX_LAG_FRAMES {
            self.events
                .push_back(ControlEvent::StateSyncStale { sender, frame });
            return StateSyncOutcome::Stale;
        }

        self.events
            .push_back(ControlEvent::StateSyncAccepted { sender, frame });
        StateSyncOutcome::Accept
    }

    fn buffer_state_sync(&mut self, sender: PeerId, frame: Frame, format_version: u16, snapshot: Vec<u8>) {
        if self.race_window.len() >= self.race_window_capacity {
            self.race_window.pop_front();
        }
        self.race_window.push_back((sender, frame, format_version, snapshot));
    }

    /// Replays any `STATE_SYNC` messages buffered for `peer` before it was
    /// recognized, now that it is known. Returns the messages in arrival
    /// order; the caller is expected to feed each back through
    /// [`Self::receive_state_sync`].
    fn drain_race_window_for(&mut self, peer: PeerId) -> Vec<(Frame, u16, Vec<u8>)> {
        let mut replayed = Vec::new();
        let mut remaining = VecDeque::with_capacity(self.race_window.len());
        while let Some((sender, frame, version, snapshot)) = self.race_window.pop_front() {
            if sender == peer {
                replayed.push((frame, version, snapshot));
            } else {
                remaining.push_back((sender, frame, version, snapshot));
            }
        }
        self.race_window = remaining;
        replayed
    }

    /// Whether `authority` should retransmit its `STATE_SYNC` to `peer`
    /// again at `now`, per the 1s/3s backoff schedule. Returns `true` at
    /// most once per eligible interval; callers should call this once per
    /// frame per peer awaiting acknowledgment.
    pub fn should_retransmit_state_sync(&mut self, peer: PeerId, now: Frame) -> bool {
        let last = self.last_retransmit_frame.get(&peer).copied();
        let due = match last {
            None => true,
            Some(last) => {
                let elapsed = now.as_i32() - last.as_i32();
                elapsed >= STATE_SYNC_RETRANSMIT_FRAMES && elapsed % STATE_SYNC_RETRANSMIT_FRAMES == 0
                    || elapsed >= STATE_SYNC_RETRANSMIT_BACKOFF_FRAMES
            }
        };
        if due {
            self.last_retransmit_frame.insert(peer, now);
        }
        due
    }

    /// Marks `peer`'s `STATE_SYNC` as acknowledged, stopping retransmission.
    pub fn acknowledge_state_sync(&mut self, peer: PeerId) {
        self.last_retransmit_frame.remove(&peer);
    }

    /// Buffers a raw encoded input that arrived for `frame` before the
    /// session officially started (race between transport connect and
    /// session construction). Honored only if `frame >= start_frame` when
    /// later drained.
    pub fn buffer_pre_session_input(&mut self, frame: Frame, sender: PeerId, encoded_input: Vec<u8>) {
        self.pre_session_inputs.push((frame, sender, encoded_input));
    }

    /// Drains and returns every pre-session input at or after `start_frame`,
    /// in arrival order. Inputs strictly before `start_frame` are discarded:
    /// they predate the session and cannot be replayed into it.
    pub fn drain_pre_session_inputs(&mut self, start_frame: Frame) -> Vec<(Frame, PeerId, Vec<u8>)> {
        let (keep, drop): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pre_session_inputs)
            .into_iter()
            .partition(|(frame, _, _)| frame.as_i32() >= start_frame.as_i32());
        drop(drop);
        keep
    }

    /// Pops the next queued [`ControlEvent`], if any.
    pub fn poll_event(&mut self) -> Option<ControlEvent> {
        self.events.pop_front()
    }

    /// Number of peers currently connected (excludes pending and the local
    /// peer's own bookkeeping entry, if present).
    #[must_use]
    pub fn connected_count(&self) -> usize {
        self.connected.len()
    }
}

//! The flat, fixed-point game state and its serialization/checksum primitives.
//!
//! [`GameState`] is a single array of signed 32-bit words, laid out according
//! to [`crate::sim::layout`]. It contains no pointers, strings, or
//! variable-length records, so `serialize(deserialize(serialize(s))) ==
//! serialize(s)` holds for any reachable `s` — the buffer is reproducible by
//! construction.
//!
//! The state is owned exclusively by whichever driver is stepping it; rollback
//! makes shallow copies of the whole buffer (`Clone`), and there is never
//! aliasing between a saved snapshot and the live state.

use crate::sim::layout::{self, object_field, player_field, MAX_OBJECTS, STATE_WORDS};
use crate::sim::rng::GameRng;

/// Bumped whenever a section offset or section size changes. Snapshots are
/// only meaningfully comparable across peers running the same version.
pub const FORMAT_VERSION: u16 = 1;

/// An error produced when decoding a byte buffer into a [`GameState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The buffer length did not match `STATE_WORDS * 4` bytes.
    WrongLength {
        /// The length that was expected.
        expected: usize,
        /// The length actually supplied.
        actual: usize,
    },
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WrongLength { expected, actual } => write!(
                f,
                "game state buffer has wrong length: expected {expected} bytes, got {actual}"
            ),
        }
    }
}

impl std::error::Error for DecodeError {}

/// The full, flat simulation state: a fixed-length array of fixed-point and
/// tag words, per the section layout in [`crate::sim::layout`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameState {
    words: [i32; STATE_WORDS],
}

impl GameState {
    /// Constructs a zero-initialized state seeded with `seed`.
    ///
    /// All sections start zeroed (no active players, no spawns queued, no
    /// objects in flight); slots are activated on demand by join or spawn.
    ///
    /// Zero is a valid "not in use" sentinel for every section except object
    /// slots, whose `LIFE_STATE` word uses `0` for
    /// [`crate::sim::step::ObjectState::Falling`] — a genuinely in-flight
    /// object, not an empty slot. Every object slot is therefore explicitly
    /// stamped with [`layout::OBJECT_INACTIVE`] so a freshly seeded state has
    /// no "ghost" objects sitting at the origin.
    #[must_use]
    pub fn from_seed(seed: u32) -> Self {
        let mut state = Self {
            words: [0; STATE_WORDS],
        };
        state.set_rng(GameRng::new(seed));
        for i in 0..MAX_OBJECTS {
            state.set_word(
                layout::object_slot(i) + object_field::LIFE_STATE,
                layout::OBJECT_INACTIVE,
            );
        }
        state
    }

    /// Reads word `index` of the flat buffer. Out-of-range indices return `0`
    /// rather than panicking — the simulation step is total.
    #[must_use]
    #[inline]
    pub fn word(&self, index: usize) -> i32 {
        self.words.get(index).copied().unwrap_or(0)
    }

    /// Writes word `index` of the flat buffer. Out-of-range indices are
    /// silently ignored.
    #[inline]
    pub fn set_word(&mut self, index: usize, value: i32) {
        if let Some(slot) = self.words.get_mut(index) {
            *slot = value;
        }
    }

    /// The current frame number.
    #[must_use]
    pub fn frame(&self) -> i32 {
        self.word(layout::G_FRAME)
    }

    /// Sets the current frame number.
    pub fn set_frame(&mut self, frame: i32) {
        self.set_word(layout::G_FRAME, frame);
    }

    /// The gameplay RNG, reconstructed from its serialized word.
    #[must_use]
    pub fn rng(&self) -> GameRng {
        GameRng::from_word(self.word(layout::G_RNG) as u32)
    }

    /// Persists `rng`'s state back into the buffer.
    pub fn set_rng(&mut self, rng: GameRng) {
        self.set_word(layout::G_RNG, rng.to_word() as i32);
    }

    /// Whether player slot `index` is active (occupied).
    #[must_use]
    pub fn player_active(&self, index: usize) -> bool {
        self.word(layout::player_slot(index) + player_field::ACTIVE) != 0
    }

    /// Activates player slot `index` at the origin with a full life count.
    ///
    /// Used by join handling; all other fields are left at their current
    /// (zeroed, for a fresh slot) values so a rejoin into the same slot does
    /// not resurrect stale position data unless the caller wants it to.
    pub fn activate_player(&mut self, index: usize) {
        let base = layout::player_slot(index);
        self.set_word(base + player_field::ACTIVE, 1);
        self.set_word(base + player_field::FACING, 1);
        self.set_word(base + player_field::LIVES, 3);
    }

    /// Deactivates player slot `index`, preserving its score and lives so a
    /// spectating client can still display a final tally.
    pub fn deactivate_player(&mut self, index: usize) {
        self.set_word(layout::player_slot(index) + player_field::ACTIVE, 0);
    }

    /// Whether non-player slot `index` is active (spawned and in play).
    ///
    /// A non-player slot shares the player slot shape, so `ACTIVE` gates it
    /// exactly the way [`Self::player_active`] gates a player slot: a slot
    /// that has never been spawned into is zero-initialized and therefore
    /// already reads as inactive, with no separate sentinel needed.
    #[must_use]
    pub fn non_player_active(&self, index: usize) -> bool {
        self.word(layout::non_player_slot(index) + player_field::ACTIVE) != 0
    }

    /// Activates non-player slot `index` at the origin, materializing with
    /// `kind` tagged for the owning AI scratch slot. Mirrors
    /// [`Self::activate_player`]'s "leave everything else at its current
    /// value" contract.
    pub fn activate_non_player(&mut self, index: usize, kind: i32) {
        let base = layout::non_player_slot(index);
        self.set_word(base + player_field::ACTIVE, 1);
        self.set_word(base + layout::NON_PLAYER_KIND, kind);
    }

    /// Whether object slot `index` is in use (not [`layout::OBJECT_INACTIVE`]).
    #[must_use]
    pub fn object_active(&self, index: usize) -> bool {
        self.word(layout::object_slot(index) + object_field::LIFE_STATE)
            != layout::OBJECT_INACTIVE
    }

    /// Serializes the state to its canonical little-endian byte form. The
    /// length is always exactly `STATE_WORDS * 4`; there is no length prefix
    /// because the length is implicit in the layout constants.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(STATE_WORDS * 4);
        for word in &self.words {
            out.extend_from_slice(&word.to_le_bytes());
        }
        out
    }

    /// Deserializes a state previously produced by [`Self::to_bytes`].
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::WrongLength`] if `bytes` is not exactly
    /// `STATE_WORDS * 4` bytes long.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let expected = STATE_WORDS * 4;
        if bytes.len() != expected {
            return Err(DecodeError::WrongLength {
                expected,
                actual: bytes.len(),
            });
        }
        let mut words = [0i32; STATE_WORDS];
        for (i, word) in words.iter_mut().enumerate() {
            let start = i * 4;
            let mut buf = [0u8; 4];
            buf.copy_from_slice(&bytes[start..start + 4]);
            *word = i32::from_le_bytes(buf);
        }
        Ok(Self { words })
    }

    /// Computes the 32-bit FNV-1a digest of the serialized state.
    ///
    /// Two states with identical serialized bytes always produce the same
    /// checksum; this is the value exchanged between peers every `C` frames
    /// to detect desyncs (see [`crate::sessions::p2p_session::P2PSession`]
    /// and [`crate::control`]).
    #[must_use]
    pub fn checksum(&self) -> u32 {
        fnv1a_32(&self.to_bytes())
    }
}

const FNV32_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV32_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a over an arbitrary byte slice.
#[must_use]
pub fn fnv1a_32(bytes: &[u8]) -> u32 {
    let mut hash = FNV32_OFFSET_BASIS;
    for &byte in bytes {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(FNV32_PRIME);
    }
    hash
}

//! Compile-time layout of the flat game-state word array.
//!
//! The state is a single `[i32; STATE_WORDS]` buffer, never a struct of
//! pointers: every section and field lives at a fixed word offset so the
//! buffer can be serialized, checksummed, and diffed without knowing
//! anything about the types stored in it. Changing any offset or section
//! size here is a wire-format break — bump [`crate::sim::state::FORMAT_VERSION`]
//! if you do.

/// Maximum number of player slots.
pub const MAX_PLAYERS: usize = 4;
/// Maximum number of non-player slots (enemies, hazards-with-a-body, etc).
pub const MAX_NON_PLAYERS: usize = 8;
/// Maximum number of physics object slots (pickups, projectiles, debris).
pub const MAX_OBJECTS: usize = 8;
/// Maximum number of environmental hazard slots.
pub const MAX_HAZARDS: usize = 4;
/// Capacity of the bounded spawn queue held in the globals section.
pub const SPAWN_QUEUE_CAPACITY: usize = 8;

// ---------------------------------------------------------------------
// Globals section
// ---------------------------------------------------------------------

/// Word offset of the globals section (always `0`).
pub const GLOBALS_OFFSET: usize = 0;
/// Frame counter.
pub const G_FRAME: usize = GLOBALS_OFFSET;
/// Gameplay RNG seed word (see [`crate::sim::rng::GameRng`]).
pub const G_RNG: usize = GLOBALS_OFFSET + 1;
/// Current wave number.
pub const G_WAVE_NUMBER: usize = GLOBALS_OFFSET + 2;
/// Current wave state machine value.
pub const G_WAVE_STATE: usize = GLOBALS_OFFSET + 3;
/// Countdown timer for the current wave state.
pub const G_WAVE_TIMER: usize = GLOBALS_OFFSET + 4;
/// Game mode tag (free-play, survival, etc — opaque to the core).
pub const G_GAME_MODE: usize = GLOBALS_OFFSET + 5;
/// Nonzero once the match has ended.
pub const G_GAME_OVER: usize = GLOBALS_OFFSET + 6;
/// Number of valid entries at the front of the spawn queue.
pub const G_SPAWN_QUEUE_LEN: usize = GLOBALS_OFFSET + 7;
/// First word of the bounded spawn queue (`SPAWN_QUEUE_CAPACITY` words).
pub const G_SPAWN_QUEUE: usize = GLOBALS_OFFSET + 8;
/// Total words in the globals section.
pub const GLOBALS_WORDS: usize = 8 + SPAWN_QUEUE_CAPACITY;

// ---------------------------------------------------------------------
// Player slots
// ---------------------------------------------------------------------

/// Word offset of the player-slots section.
pub const PLAYERS_OFFSET: usize = GLOBALS_OFFSET + GLOBALS_WORDS;
/// Words occupied by a single player slot.
pub const PLAYER_WORDS: usize = 16;

/// Field offsets within one player slot, relative to the slot's base word.
pub mod player_field {
    /// Nonzero while the slot is occupied.
    pub const ACTIVE: usize = 0;
    /// Fixed-point X position.
    pub const POS_X: usize = 1;
    /// Fixed-point Y position.
    pub const POS_Y: usize = 2;
    /// Fixed-point X velocity.
    pub const VEL_X: usize = 3;
    /// Fixed-point Y velocity.
    pub const VEL_Y: usize = 4;
    /// Fixed-point X position as of the previous frame (for tunneling checks).
    pub const PREV_POS_X: usize = 5;
    /// Fixed-point Y position as of the previous frame.
    pub const PREV_POS_Y: usize = 6;
    /// Movement state machine value (see [`crate::sim::step::MovementState`]).
    pub const MOVEMENT_STATE: usize = 7;
    /// Facing direction: `-1` left, `1` right.
    pub const FACING: usize = 8;
    /// General-purpose countdown timer A (coyote time, hitstun, ...).
    pub const TIMER_A: usize = 9;
    /// General-purpose countdown timer B (invulnerability, grab duration, ...).
    pub const TIMER_B: usize = 10;
    /// Bitfield of miscellaneous one-bit flags.
    pub const FLAGS: usize = 11;
    /// Score accumulator.
    pub const SCORE: usize = 12;
    /// Remaining lives.
    pub const LIVES: usize = 13;
    /// Count of collected pickups.
    pub const COLLECTED: usize = 14;
    /// Cosmetic palette index (never read by the simulation step).
    pub const PALETTE: usize = 15;
}

/// Slot flag: the slot was killed this frame (lava, elimination, hazard).
pub const FLAG_KILLED: i32 = 1 << 0;

// ---------------------------------------------------------------------
// Non-player slots
// ---------------------------------------------------------------------

/// Word offset of the non-player-slots section.
pub const NON_PLAYERS_OFFSET: usize = PLAYERS_OFFSET + PLAYERS_OFFSET_LEN;
const PLAYERS_OFFSET_LEN: usize = MAX_PLAYERS * PLAYER_WORDS;
/// Words occupied by a single non-player slot (player shape plus a kind tag).
pub const NON_PLAYER_WORDS: usize = PLAYER_WORDS + 1;
/// Offset of the kind tag within a non-player slot, relative to its base word.
pub const NON_PLAYER_KIND: usize = PLAYER_WORDS;

// ---------------------------------------------------------------------
// AI scratch slots (parallel array to non-player slots)
// ---------------------------------------------------------------------

/// Word offset of the AI-scratch section.
pub const AI_OFFSET: usize = NON_PLAYERS_OFFSET + MAX_NON_PLAYERS * NON_PLAYER_WORDS;
/// Words occupied by a single AI-scratch slot.
pub const AI_WORDS: usize = 4;

/// Field offsets within one AI-scratch slot.
pub mod ai_field {
    /// Countdown until the next direction decision.
    pub const DIR_TIMER: usize = 0;
    /// Current horizontal direction: `-1`, `0`, or `1`.
    pub const CURRENT_DIR: usize = 1;
    /// Free-running accumulator available to a behaviour (e.g. patrol distance).
    pub const ACCUMULATOR: usize = 2;
    /// Behaviour kind tag, mirrors the owning non-player slot's kind.
    pub const KIND: usize = 3;
}

// ---------------------------------------------------------------------
// Object slots
// ---------------------------------------------------------------------

/// Word offset of the object-slots section.
pub const OBJECTS_OFFSET: usize = AI_OFFSET + MAX_NON_PLAYERS * AI_WORDS;
/// Words occupied by a single object slot.
pub const OBJECT_WORDS: usize = 9;

/// Field offsets within one object slot.
pub mod object_field {
    /// Fixed-point X position.
    pub const POS_X: usize = 0;
    /// Fixed-point Y position.
    pub const POS_Y: usize = 1;
    /// Fixed-point X velocity.
    pub const VEL_X: usize = 2;
    /// Fixed-point Y velocity.
    pub const VEL_Y: usize = 3;
    /// Kind of the slot (player index + 1) that spawned this object, `0` if environmental.
    pub const OWNER_KIND: usize = 4;
    /// Lifecycle state machine value (see [`crate::sim::step::ObjectState`]).
    pub const LIFE_STATE: usize = 5;
    /// General-purpose countdown timer.
    pub const TIMER: usize = 6;
    /// Fixed-point X position as of the previous frame.
    pub const PREV_POS_X: usize = 7;
    /// Fixed-point Y position as of the previous frame.
    pub const PREV_POS_Y: usize = 8;
}

/// Sentinel meaning "slot not in use" for an object's life state.
pub const OBJECT_INACTIVE: i32 = -1;

// ---------------------------------------------------------------------
// Hazard slots (extension section)
// ---------------------------------------------------------------------

/// Word offset of the environmental-hazard section.
pub const HAZARDS_OFFSET: usize = OBJECTS_OFFSET + MAX_OBJECTS * OBJECT_WORDS;
/// Words occupied by a single hazard slot.
pub const HAZARD_WORDS: usize = 6;

/// Field offsets within one hazard slot.
pub mod hazard_field {
    /// Nonzero while the hazard is present in the arena.
    pub const ACTIVE: usize = 0;
    /// Fixed-point X position (the hazard's anchor/origin).
    pub const POS_X: usize = 1;
    /// Fixed-point Y position.
    pub const POS_Y: usize = 2;
    /// State machine value (see [`crate::sim::step::HazardState`]).
    pub const STATE: usize = 3;
    /// Countdown timer for the current hazard state.
    pub const TIMER: usize = 4;
    /// Player/non-player slot index the hazard has targeted, or `-1`.
    pub const TARGET_SLOT: usize = 5;
}

/// Total length of the flat state word array.
pub const STATE_WORDS: usize = HAZARDS_OFFSET + MAX_HAZARDS * HAZARD_WORDS;

/// Word offset of player slot `index` (`index < MAX_PLAYERS`).
#[must_use]
pub const fn player_slot(index: usize) -> usize {
    PLAYERS_OFFSET + index * PLAYER_WORDS
}

/// Word offset of non-player slot `index` (`index < MAX_NON_PLAYERS`).
#[must_use]
pub const fn non_player_slot(index: usize) -> usize {
    NON_PLAYERS_OFFSET + index * NON_PLAYER_WORDS
}

/// Word offset of the AI-scratch slot parallel to non-player slot `index`.
#[must_use]
pub const fn ai_slot(index: usize) -> usize {
    AI_OFFSET + index * AI_WORDS
}

/// Word offset of object slot `index` (`index < MAX_OBJECTS`).
#[must_use]
pub const fn object_slot(index: usize) -> usize {
    OBJECTS_OFFSET + index * OBJECT_WORDS
}

/// Word offset of hazard slot `index` (`index < MAX_HAZARDS`).
#[must_use]
pub const fn hazard_slot(index: usize) -> usize {
    HAZARDS_OFFSET + index * HAZARD_WORDS
}

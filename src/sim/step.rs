//! The pure simulation step: advances a [`GameState`] by exactly one frame.
//!
//! `step` takes the current state and one input word per player slot and
//! produces the next state. It touches no wall clock, no file system, no
//! network, and no source of randomness other than the RNG carried inside the
//! state itself — calling it twice with the same state and inputs always
//! produces the same output, on any platform, which is the property rollback
//! depends on.
//!
//! Phases run in a fixed order every frame:
//!
//! 1. disconnect / meta-bit processing
//! 2. spawn queue and wave timer advance
//! 3. per-slot kinematics integration
//! 4. environment collision (ground, ceiling, side wrap, lava)
//! 5. slot-vs-slot contact resolution
//! 6. object pickup resolution
//! 7. AI scratch update
//! 8. hazard state machine advance
//! 9. global wave-state advance
//! 10. frame increment

use crate::sim::fixed::{fp_mul, idiv60, FP_ONE};
use crate::sim::layout::{
    self, ai_field, hazard_field, object_field, player_field, MAX_HAZARDS, MAX_NON_PLAYERS,
    MAX_OBJECTS, MAX_PLAYERS,
};
use crate::sim::state::GameState;

/// One player's input for a single frame: two directional bits, one action
/// bit, and a disconnect bit. Unknown/reserved bits are ignored, so future
/// bits can be added without breaking peers running an older build within the
/// same wire-compatible range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct InputWord(pub u8);

impl InputWord {
    /// Move left.
    pub const LEFT: u8 = 1 << 0;
    /// Move right.
    pub const RIGHT: u8 = 1 << 1;
    /// Action button (jump / grab / pickup).
    pub const ACTION: u8 = 1 << 2;
    /// Set by the local host when it has given up on this slot for the frame
    /// (e.g. auto-input for a disconnected peer).
    pub const DISCONNECTED: u8 = 1 << 3;

    #[must_use]
    fn has(self, bit: u8) -> bool {
        self.0 & bit != 0
    }
}

/// Movement state of a player or non-player slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum MovementState {
    /// Standing/running on a surface.
    Grounded = 0,
    /// In the air, under gravity.
    Airborne = 1,
    /// Held by a hazard's grab sub-state.
    Grabbed = 2,
    /// Spawning in, immune to contact resolution.
    Materializing = 3,
    /// Eliminated for the remainder of the match.
    Dead = 4,
}

impl MovementState {
    fn from_word(word: i32) -> Self {
        match word {
            1 => Self::Airborne,
            2 => Self::Grabbed,
            3 => Self::Materializing,
            4 => Self::Dead,
            _ => Self::Grounded,
        }
    }
}

/// Lifecycle state of a physics object slot (pickups, thrown debris).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ObjectState {
    /// In flight, under gravity.
    Falling = 0,
    /// Settled on the ground.
    Rested = 1,
    /// Rested but about to tip/despawn; cosmetic-adjacent bookkeeping only.
    Wobbling = 2,
}

impl ObjectState {
    fn from_word(word: i32) -> Self {
        match word {
            1 => Self::Rested,
            2 => Self::Wobbling,
            _ => Self::Falling,
        }
    }
}

/// State machine of an environmental hazard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum HazardState {
    /// Waiting for its next cycle.
    Idle = 0,
    /// Telegraphing before it reaches.
    Announce = 1,
    /// Extending toward a target slot.
    Reach = 2,
    /// Holding a grabbed slot.
    Grab = 3,
    /// Pulling a grabbed slot toward the hazard's anchor.
    Pull = 4,
    /// Withdrawing back to idle.
    Retreat = 5,
}

impl HazardState {
    fn from_word(word: i32) -> Self {
        match word {
            1 => Self::Announce,
            2 => Self::Reach,
            3 => Self::Grab,
            4 => Self::Pull,
            5 => Self::Retreat,
            _ => Self::Idle,
        }
    }
}

// Tunables, all fixed-point. Chosen to be legible in play, not physically
// accurate; the exact values are a design decision (see DESIGN.md) rather
// than anything handed down by contract.
const GRAVITY: i32 = FP_ONE / 5; // -0.2 units/frame^2 applied as velocity decay
const MOVE_ACCEL: i32 = FP_ONE / 4;
const MOVE_FRICTION: i32 = FP_ONE / 8;
const MAX_RUN_SPEED: i32 = FP_ONE * 4;
const JUMP_VELOCITY: i32 = FP_ONE * 6;
const TERMINAL_FALL_SPEED: i32 = -FP_ONE * 10;
const ARENA_WIDTH: i32 = FP_ONE * 40;
const GROUND_Y: i32 = 0;
const LAVA_Y: i32 = -FP_ONE * 20;
const CONTACT_RADIUS: i32 = FP_ONE; // treat slots as points within this radius
const MATERIALIZE_FRAMES: i32 = 30;
const HAZARD_ANNOUNCE_FRAMES: i32 = 45;
const HAZARD_REACH_FRAMES: i32 = 20;
const HAZARD_GRAB_FRAMES: i32 = 10;
const HAZARD_PULL_FRAMES: i32 = 40;
const HAZARD_RETREAT_FRAMES: i32 = 30;
const HAZARD_CYCLE_IDLE_FRAMES: i32 = 90;

/// Advances `state` by one frame using `inputs`, one word per player slot.
///
/// `inputs.len()` may be less than [`layout::MAX_PLAYERS`]; missing entries
/// are treated as all-zero (no buttons held, not disconnected).
pub fn step(state: &mut GameState, inputs: &[InputWord]) {
    if state.word(layout::G_GAME_OVER) != 0 {
        state.set_frame(state.frame() + 1);
        return;
    }

    process_disconnects(state, inputs);
    advance_spawn_queue(state);
    integrate_player_kinematics(state, inputs);
    integrate_non_player_kinematics(state);
    integrate_object_kinematics(state);
    resolve_environment_collisions(state);
    resolve_slot_contacts(state);
    resolve_object_pickups(state);
    update_ai_scratch(state);
    advance_hazards(state);
    advance_wave_state(state);

    state.set_frame(state.frame() + 1);
}

fn input_for(inputs: &[InputWord], index: usize) -> InputWord {
    inputs.get(index).copied().unwrap_or_default()
}

fn process_disconnects(state: &mut GameState, inputs: &[InputWord]) {
    for i in 0..MAX_PLAYERS {
        if !state.player_active(i) {
            continue;
        }
        if input_for(inputs, i).has(InputWord::DISCONNECTED) {
            let base = layout::player_slot(i);
            let flags = state.word(base + player_field::FLAGS);
            state.set_word(base + player_field::FLAGS, flags | layout::FLAG_KILLED);
            state.set_word(base + player_field::MOVEMENT_STATE, MovementState::Dead as i32);
        }
    }
}

/// Queues a spawn of a non-player with `kind`, dropping it silently if the
/// bounded spawn queue is already full (the queue never panics or blocks).
fn enqueue_spawn(state: &mut GameState, kind: i32) {
    let len = state.word(layout::G_SPAWN_QUEUE_LEN);
    if len as usize >= layout::SPAWN_QUEUE_CAPACITY {
        return;
    }
    state.set_word(layout::G_SPAWN_QUEUE + len as usize, kind);
    state.set_word(layout::G_SPAWN_QUEUE_LEN, len + 1);
}

/// Pops the front of the spawn queue into the first non-player slot that
/// isn't currently active. A slot frees up once its occupant is deactivated
/// (not merely [`MovementState::Dead`] — a dead non-player keeps its slot, as
/// a player does, until something explicitly releases it); if every slot is
/// occupied the entry stays at the front of the queue and is retried next
/// frame.
fn advance_spawn_queue(state: &mut GameState) {
    let len = state.word(layout::G_SPAWN_QUEUE_LEN);
    if len <= 0 {
        return;
    }
    let kind = state.word(layout::G_SPAWN_QUEUE);
    if let Some(slot) = (0..MAX_NON_PLAYERS).find(|&i| !state.non_player_active(i)) {
        state.activate_non_player(slot, kind);
        let base = layout::non_player_slot(slot);
        state.set_word(base + player_field::POS_X, 0);
        state.set_word(base + player_field::POS_Y, GROUND_Y);
        state.set_word(
            base + player_field::MOVEMENT_STATE,
            MovementState::Materializing as i32,
        );
        state.set_word(base + player_field::TIMER_A, MATERIALIZE_FRAMES);

        let ai_base = layout::ai_slot(slot);
        state.set_word(ai_base + ai_field::KIND, kind);
        state.set_word(ai_base + ai_field::CURRENT_DIR, 1);

        for slot_word in 0..(layout::SPAWN_QUEUE_CAPACITY - 1) {
            let next = state.word(layout::G_SPAWN_QUEUE + slot_word + 1);
            state.set_word(layout::G_SPAWN_QUEUE + slot_word, next);
        }
        state.set_word(layout::G_SPAWN_QUEUE_LEN, len - 1);
    }
}

fn integrate_player_kinematics(state: &mut GameState, inputs: &[InputWord]) {
    for i in 0..MAX_PLAYERS {
        if !state.player_active(i) {
            continue;
        }
        let base = layout::player_slot(i);
        let movement = MovementState::from_word(state.word(base + player_field::MOVEMENT_STATE));
        if matches!(movement, MovementState::Dead | MovementState::Grabbed) {
            continue;
        }

        if matches!(movement, MovementState::Materializing) {
            let timer = state.word(base + player_field::TIMER_A) - 1;
            state.set_word(base + player_field::TIMER_A, timer);
            if timer <= 0 {
                state.set_word(
                    base + player_field::MOVEMENT_STATE,
                    MovementState::Airborne as i32,
                );
            }
            continue;
        }

        let input = input_for(inputs, i);
        let mut vel_x = state.word(base + player_field::VEL_X);
        let mut vel_y = state.word(base + player_field::VEL_Y);

        let want_left = input.has(InputWord::LEFT);
        let want_right = input.has(InputWord::RIGHT);
        match (want_left, want_right) {
            (true, false) => {
                vel_x = (vel_x - MOVE_ACCEL).max(-MAX_RUN_SPEED);
                state.set_word(base + player_field::FACING, -1);
            }
            (false, true) => {
                vel_x = (vel_x + MOVE_ACCEL).min(MAX_RUN_SPEED);
                state.set_word(base + player_field::FACING, 1);
            }
            _ => {
                if vel_x > 0 {
                    vel_x = (vel_x - MOVE_FRICTION).max(0);
                } else if vel_x < 0 {
                    vel_x = (vel_x + MOVE_FRICTION).min(0);
                }
            }
        }

        if matches!(movement, MovementState::Grounded) {
            if input.has(InputWord::ACTION) {
                vel_y = JUMP_VELOCITY;
                state.set_word(
                    base + player_field::MOVEMENT_STATE,
                    MovementState::Airborne as i32,
                );
            }
        } else {
            vel_y = (vel_y - GRAVITY).max(TERMINAL_FALL_SPEED);
        }

        state.set_word(base + player_field::VEL_X, vel_x);
        state.set_word(base + player_field::VEL_Y, vel_y);

        let pos_x = state.word(base + player_field::POS_X);
        let pos_y = state.word(base + player_field::POS_Y);
        state.set_word(base + player_field::PREV_POS_X, pos_x);
        state.set_word(base + player_field::PREV_POS_Y, pos_y);
        state.set_word(base + player_field::POS_X, pos_x + idiv60(fp_mul(vel_x, FP_ONE)));
        state.set_word(base + player_field::POS_Y, pos_y + idiv60(fp_mul(vel_y, FP_ONE)));
    }
}

fn integrate_non_player_kinematics(state: &mut GameState) {
    for i in 0..MAX_NON_PLAYERS {
        if !state.non_player_active(i) {
            continue;
        }
        let base = layout::non_player_slot(i);
        let movement = MovementState::from_word(state.word(base + player_field::MOVEMENT_STATE));
        if matches!(movement, MovementState::Dead) {
            continue;
        }

        if matches!(movement, MovementState::Materializing) {
            let timer = state.word(base + player_field::TIMER_A) - 1;
            state.set_word(base + player_field::TIMER_A, timer);
            if timer <= 0 {
                state.set_word(
                    base + player_field::MOVEMENT_STATE,
                    MovementState::Grounded as i32,
                );
            }
            continue;
        }
        if matches!(movement, MovementState::Grabbed) {
            continue;
        }

        let ai_base = layout::ai_slot(i);
        let dir = state.word(ai_base + ai_field::CURRENT_DIR);
        let mut vel_x = state.word(base + player_field::VEL_X);
        vel_x = dir * (FP_ONE / 2);
        let mut vel_y = state.word(base + player_field::VEL_Y);
        if matches!(movement, MovementState::Airborne) {
            vel_y = (vel_y - GRAVITY).max(TERMINAL_FALL_SPEED);
        }

        state.set_word(base + player_field::VEL_X, vel_x);
        state.set_word(base + player_field::VEL_Y, vel_y);

        let pos_x = state.word(base + player_field::POS_X);
        let pos_y = state.word(base + player_field::POS_Y);
        state.set_word(base + player_field::PREV_POS_X, pos_x);
        state.set_word(base + player_field::PREV_POS_Y, pos_y);
        state.set_word(base + player_field::POS_X, pos_x + idiv60(fp_mul(vel_x, FP_ONE)));
        state.set_word(base + player_field::POS_Y, pos_y + idiv60(fp_mul(vel_y, FP_ONE)));
    }
}

fn integrate_object_kinematics(state: &mut GameState) {
    for i in 0..MAX_OBJECTS {
        if !state.object_active(i) {
            continue;
        }
        let base = layout::object_slot(i);
        let object_state = ObjectState::from_word(state.word(base + object_field::LIFE_STATE));
        if matches!(object_state, ObjectState::Rested | ObjectState::Wobbling) {
            continue;
        }

        let mut vel_y = state.word(base + object_field::VEL_Y);
        vel_y = (vel_y - GRAVITY).max(TERMINAL_FALL_SPEED);
        state.set_word(base + object_field::VEL_Y, vel_y);

        let vel_x = state.word(base + object_field::VEL_X);
        let pos_x = state.word(base + object_field::POS_X);
        let pos_y = state.word(base + object_field::POS_Y);
        state.set_word(base + object_field::PREV_POS_X, pos_x);
        state.set_word(base + object_field::PREV_POS_Y, pos_y);
        state.set_word(base + object_field::POS_X, pos_x + idiv60(fp_mul(vel_x, FP_ONE)));
        state.set_word(base + object_field::POS_Y, pos_y + idiv60(fp_mul(vel_y, FP_ONE)));
    }
}

fn resolve_environment_collisions(state: &mut GameState) {
    for i in 0..MAX_PLAYERS {
        if !state.player_active(i) {
            continue;
        }
        resolve_slot_environment(state, layout::player_slot(i));
    }
    for i in 0..MAX_NON_PLAYERS {
        if !state.non_player_active(i) {
            continue;
        }
        let base = layout::non_player_slot(i);
        if MovementState::from_word(state.word(base + player_field::MOVEMENT_STATE))
            == MovementState::Dead
        {
            continue;
        }
        resolve_slot_environment(state, base);
    }
    for i in 0..MAX_OBJECTS {
        if !state.object_active(i) {
            continue;
        }
        let base = layout::object_slot(i);
        let pos_y = state.word(base + object_field::POS_Y);
        if pos_y <= GROUND_Y {
            state.set_word(base + object_field::POS_Y, GROUND_Y);
            state.set_word(base + object_field::VEL_Y, 0);
            state.set_word(base + object_field::LIFE_STATE, ObjectState::Rested as i32);
        }
        wrap_horizontal(state, base + object_field::POS_X);
    }
}

fn resolve_slot_environment(state: &mut GameState, base: usize) {
    let movement = MovementState::from_word(state.word(base + player_field::MOVEMENT_STATE));
    if matches!(movement, MovementState::Materializing | MovementState::Grabbed) {
        return;
    }

    let pos_y = state.word(base + player_field::POS_Y);
    if pos_y < LAVA_Y {
        let flags = state.word(base + player_field::FLAGS);
        state.set_word(base + player_field::FLAGS, flags | layout::FLAG_KILLED);
        state.set_word(base + player_field::MOVEMENT_STATE, MovementState::Dead as i32);
        let lives = state.word(base + player_field::LIVES) - 1;
        state.set_word(base + player_field::LIVES, lives.max(0));
        return;
    }

    if pos_y <= GROUND_Y && matches!(movement, MovementState::Airborne) {
        state.set_word(base + player_field::POS_Y, GROUND_Y);
        state.set_word(base + player_field::VEL_Y, 0);
        state.set_word(
            base + player_field::MOVEMENT_STATE,
            MovementState::Grounded as i32,
        );
    } else if pos_y > GROUND_Y && matches!(movement, MovementState::Grounded) {
        state.set_word(
            base + player_field::MOVEMENT_STATE,
            MovementState::Airborne as i32,
        );
    }

    wrap_horizontal(state, base + player_field::POS_X);
}

fn wrap_horizontal(state: &mut GameState, pos_x_word: usize) {
    let mut pos_x = state.word(pos_x_word);
    let half_width = ARENA_WIDTH / 2;
    if pos_x > half_width {
        pos_x -= ARENA_WIDTH;
    } else if pos_x < -half_width {
        pos_x += ARENA_WIDTH;
    }
    state.set_word(pos_x_word, pos_x);
}

/// Small fixed-point push-apart margin added on top of half the AABB
/// overlap, so two bounced slots don't end the frame still touching.
const CONTACT_EPSILON: i32 = FP_ONE / 32;

/// Axis-aligned half-extent used for every slot's contact box. All slots
/// (player and non-player) share one size; only [`CONTACT_RADIUS`] itself is
/// a per-mechanic tuning knob.
const CONTACT_HALF_EXTENT: i32 = CONTACT_RADIUS / 2;

/// One side of a potential contact: which base word, whether it is occupied
/// by a player, and its combined contact-ordering index (players first, then
/// non-players) used to break elimination ties deterministically.
#[derive(Clone, Copy)]
struct ContactSlot {
    base: usize,
    combined_index: usize,
    is_player: bool,
}

/// Whether two slots are touching this frame: an overlapping AABB at the
/// sampled frame boundary, or a sign-flip on either axis indicating the pair
/// crossed through each other between the previous and current position
/// without ever overlapping at a sampled boundary (tunneling).
fn slots_in_contact(state: &GameState, a: &ContactSlot, b: &ContactSlot) -> bool {
    let ax = state.word(a.base + player_field::POS_X);
    let ay = state.word(a.base + player_field::POS_Y);
    let bx = state.word(b.base + player_field::POS_X);
    let by = state.word(b.base + player_field::POS_Y);
    let span = 2 * CONTACT_HALF_EXTENT;

    let dx = (ax - bx).abs();
    let dy = (ay - by).abs();
    if dx < span && dy < span {
        return true;
    }

    let prev_ax = state.word(a.base + player_field::PREV_POS_X);
    let prev_ay = state.word(a.base + player_field::PREV_POS_Y);
    let prev_bx = state.word(b.base + player_field::PREV_POS_X);
    let prev_by = state.word(b.base + player_field::PREV_POS_Y);

    let crossed_x = (prev_ax - prev_bx).signum() != 0
        && (ax - bx).signum() != 0
        && (prev_ax - prev_bx).signum() != (ax - bx).signum();
    if crossed_x && dy < span {
        return true;
    }

    let crossed_y = (prev_ay - prev_by).signum() != 0
        && (ay - by).signum() != 0
        && (prev_ay - prev_by).signum() != (ay - by).signum();
    crossed_y && dx < span
}

fn contact_slot_movement(state: &GameState, base: usize) -> MovementState {
    MovementState::from_word(state.word(base + player_field::MOVEMENT_STATE))
}

fn contact_eligible(state: &GameState, base: usize) -> bool {
    matches!(
        contact_slot_movement(state, base),
        MovementState::Grounded | MovementState::Airborne
    )
}

/// Resolves every pairwise contact between active players and non-players.
/// A contact dispatches to exactly one of three outcomes, decided purely by
/// what kind of slot is on each side:
///
/// - player vs player: mutual bounce.
/// - player vs non-player: elimination (the higher combined index survives).
/// - non-player vs non-player: neutral (same-team, no effect).
fn resolve_slot_contacts(state: &mut GameState) {
    let mut slots = Vec::with_capacity(MAX_PLAYERS + MAX_NON_PLAYERS);
    for i in 0..MAX_PLAYERS {
        if state.player_active(i) && contact_eligible(state, layout::player_slot(i)) {
            slots.push(ContactSlot {
                base: layout::player_slot(i),
                combined_index: i,
                is_player: true,
            });
        }
    }
    for i in 0..MAX_NON_PLAYERS {
        if !state.non_player_active(i) {
            continue;
        }
        let base = layout::non_player_slot(i);
        if contact_eligible(state, base) {
            slots.push(ContactSlot {
                base,
                combined_index: MAX_PLAYERS + i,
                is_player: false,
            });
        }
    }

    for a in 0..slots.len() {
        for b in (a + 1)..slots.len() {
            let (sa, sb) = (slots[a], slots[b]);
            if !slots_in_contact(state, &sa, &sb) {
                continue;
            }
            match (sa.is_player, sb.is_player) {
                (true, true) => bounce_apart(state, sa.base, sb.base),
                (false, false) => {} // neutral: same-team / both non-player
                _ => {
                    let (survivor, loser) = if sa.combined_index > sb.combined_index {
                        (sa, sb)
                    } else {
                        (sb, sa)
                    };
                    eliminate_with_recoil(state, survivor.base, loser.base);
                }
            }
        }
    }
}

/// Redistributes horizontal velocity away from each other and pushes both
/// slots apart by half their AABB overlap plus [`CONTACT_EPSILON`], so they
/// don't remain in contact next frame.
fn bounce_apart(state: &mut GameState, base_a: usize, base_b: usize) {
    let vel_a = state.word(base_a + player_field::VEL_X);
    let vel_b = state.word(base_b + player_field::VEL_X);
    state.set_word(base_a + player_field::VEL_X, -vel_a.abs().max(FP_ONE));
    state.set_word(base_b + player_field::VEL_X, vel_b.abs().max(FP_ONE));

    let ax = state.word(base_a + player_field::POS_X);
    let bx = state.word(base_b + player_field::POS_X);
    let span = 2 * CONTACT_HALF_EXTENT;
    let overlap = (span - (ax - bx).abs()).max(0);
    let push = overlap / 2 + CONTACT_EPSILON;
    if ax <= bx {
        state.set_word(base_a + player_field::POS_X, ax - push);
        state.set_word(base_b + player_field::POS_X, bx + push);
    } else {
        state.set_word(base_a + player_field::POS_X, ax + push);
        state.set_word(base_b + player_field::POS_X, bx - push);
    }
}

/// Marks `loser` killed and applies recoil to `survivor`, pushing it away
/// from where the loser was.
fn eliminate_with_recoil(state: &mut GameState, survivor: usize, loser: usize) {
    let flags = state.word(loser + player_field::FLAGS);
    state.set_word(loser + player_field::FLAGS, flags | layout::FLAG_KILLED);
    state.set_word(loser + player_field::MOVEMENT_STATE, MovementState::Dead as i32);
    let lives = state.word(loser + player_field::LIVES) - 1;
    state.set_word(loser + player_field::LIVES, lives.max(0));

    let survivor_x = state.word(survivor + player_field::POS_X);
    let loser_x = state.word(loser + player_field::POS_X);
    let recoil = if survivor_x >= loser_x { FP_ONE } else { -FP_ONE };
    state.set_word(survivor + player_field::VEL_X, recoil * 2);
}

/// Squared fixed-point distance below which two points are considered
/// touching. Used for object pickups, which need simple radius overlap
/// rather than the full contact dispatch in [`resolve_slot_contacts`].
fn within_contact_radius(ax: i32, ay: i32, bx: i32, by: i32) -> bool {
    let dx = i64::from(ax - bx);
    let dy = i64::from(ay - by);
    let radius = i64::from(CONTACT_RADIUS);
    dx * dx + dy * dy <= radius * radius
}

fn resolve_object_pickups(state: &mut GameState) {
    for i in 0..MAX_PLAYERS {
        if !state.player_active(i) {
            continue;
        }
        let player_base = layout::player_slot(i);
        if MovementState::from_word(state.word(player_base + player_field::MOVEMENT_STATE))
            == MovementState::Dead
        {
            continue;
        }
        let px = state.word(player_base + player_field::POS_X);
        let py = state.word(player_base + player_field::POS_Y);

        for o in 0..MAX_OBJECTS {
            if !state.object_active(o) {
                continue;
            }
            let object_base = layout::object_slot(o);
            let ox = state.word(object_base + object_field::POS_X);
            let oy = state.word(object_base + object_field::POS_Y);
            if within_contact_radius(px, py, ox, oy) {
                let collected = state.word(player_base + player_field::COLLECTED) + 1;
                state.set_word(player_base + player_field::COLLECTED, collected);
                let score = state.word(player_base + player_field::SCORE) + 100;
                state.set_word(player_base + player_field::SCORE, score);
                state.set_word(object_base + object_field::LIFE_STATE, layout::OBJECT_INACTIVE);
            }
        }
    }
}

fn update_ai_scratch(state: &mut GameState) {
    for i in 0..MAX_NON_PLAYERS {
        if !state.non_player_active(i) {
            continue;
        }
        let base = layout::non_player_slot(i);
        if MovementState::from_word(state.word(base + player_field::MOVEMENT_STATE))
            == MovementState::Dead
        {
            continue;
        }
        let ai_base = layout::ai_slot(i);
        let timer = state.word(ai_base + ai_field::DIR_TIMER) - 1;
        if timer <= 0 {
            let mut rng = state.rng();
            let dir = if rng.chance(1, 2) { 1 } else { -1 };
            state.set_rng(rng);
            state.set_word(ai_base + ai_field::CURRENT_DIR, dir);
            state.set_word(ai_base + ai_field::DIR_TIMER, 90);
        } else {
            state.set_word(ai_base + ai_field::DIR_TIMER, timer);
        }
    }
}

fn advance_hazards(state: &mut GameState) {
    for i in 0..MAX_HAZARDS {
        let base = layout::hazard_slot(i);
        if state.word(base + hazard_field::ACTIVE) == 0 {
            continue;
        }
        let hazard_state = HazardState::from_word(state.word(base + hazard_field::STATE));
        let timer = state.word(base + hazard_field::TIMER) - 1;
        if timer > 0 {
            state.set_word(base + hazard_field::TIMER, timer);
            continue;
        }

        let (next, next_timer, target) = match hazard_state {
            HazardState::Idle => (HazardState::Announce, HAZARD_ANNOUNCE_FRAMES, pick_target(state)),
            HazardState::Announce => (
                HazardState::Reach,
                HAZARD_REACH_FRAMES,
                state.word(base + hazard_field::TARGET_SLOT),
            ),
            HazardState::Reach => {
                let target_slot = state.word(base + hazard_field::TARGET_SLOT);
                if target_slot >= 0 {
                    grab_slot(state, target_slot);
                }
                (HazardState::Grab, HAZARD_GRAB_FRAMES, target_slot)
            }
            HazardState::Grab => (HazardState::Pull, HAZARD_PULL_FRAMES, -1),
            HazardState::Pull => {
                let target_slot = state.word(base + hazard_field::TARGET_SLOT);
                if target_slot >= 0 {
                    eliminate_slot(state, layout::player_slot(target_slot as usize));
                    release_slot(state, target_slot);
                }
                (HazardState::Retreat, HAZARD_RETREAT_FRAMES, -1)
            }
            HazardState::Retreat => (HazardState::Idle, HAZARD_CYCLE_IDLE_FRAMES, -1),
        };

        state.set_word(base + hazard_field::STATE, next as i32);
        state.set_word(base + hazard_field::TIMER, next_timer);
        if !matches!(next, HazardState::Grab | HazardState::Pull) {
            state.set_word(base + hazard_field::TARGET_SLOT, target);
        }
    }
}

/// Marks `base` killed outright, with no recoil side — used by hazard
/// elimination, where the other "side" is a hazard slot, not a contact slot.
fn eliminate_slot(state: &mut GameState, base: usize) {
    let flags = state.word(base + player_field::FLAGS);
    state.set_word(base + player_field::FLAGS, flags | layout::FLAG_KILLED);
    state.set_word(base + player_field::MOVEMENT_STATE, MovementState::Dead as i32);
    let lives = state.word(base + player_field::LIVES) - 1;
    state.set_word(base + player_field::LIVES, lives.max(0));
}

fn pick_target(state: &mut GameState) -> i32 {
    let active: Vec<i32> = (0..MAX_PLAYERS)
        .filter(|&i| {
            state.player_active(i)
                && MovementState::from_word(
                    state.word(layout::player_slot(i) + player_field::MOVEMENT_STATE),
                ) != MovementState::Dead
        })
        .map(|i| i as i32)
        .collect();
    if active.is_empty() {
        return -1;
    }
    let mut rng = state.rng();
    let choice = active[rng.next_int(active.len() as u32) as usize];
    state.set_rng(rng);
    choice
}

fn grab_slot(state: &mut GameState, player_index: i32) {
    if player_index < 0 {
        return;
    }
    let base = layout::player_slot(player_index as usize);
    state.set_word(base + player_field::MOVEMENT_STATE, MovementState::Grabbed as i32);
    state.set_word(base + player_field::VEL_X, 0);
    state.set_word(base + player_field::VEL_Y, 0);
}

fn release_slot(state: &mut GameState, player_index: i32) {
    if player_index < 0 {
        return;
    }
    let base = layout::player_slot(player_index as usize);
    if MovementState::from_word(state.word(base + player_field::MOVEMENT_STATE))
        == MovementState::Grabbed
    {
        state.set_word(base + player_field::MOVEMENT_STATE, MovementState::Airborne as i32);
    }
}

fn advance_wave_state(state: &mut GameState) {
    let timer = state.word(layout::G_WAVE_TIMER) - 1;
    if timer > 0 {
        state.set_word(layout::G_WAVE_TIMER, timer);
        return;
    }
    let wave = state.word(layout::G_WAVE_NUMBER) + 1;
    state.set_word(layout::G_WAVE_NUMBER, wave);
    state.set_word(layout::G_WAVE_TIMER, 600);

    let any_alive = (0..MAX_PLAYERS).any(|i| {
        state.player_active(i)
            && MovementState::from_word(
                state.word(layout::player_slot(i) + player_field::MOVEMENT_STATE),
            ) != MovementState::Dead
    });
    if !any_alive {
        state.set_word(layout::G_GAME_OVER, 1);
        return;
    }

    // Each new wave queues one non-player spawn; the kind tag is opaque to
    // the core and just cycles deterministically with the wave number.
    enqueue_spawn(state, wave % 4 + 1);
}

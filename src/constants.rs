//! Centralized tuning constants for the demolition core.
//!
//! Eliminates magic numbers duplicated across the hit state machine,
//! shatter scheduler and fragment spawner. Per-module defaults that only
//! one module reads (material fallback table, template library) remain in
//! their modules as the single source of truth.

// =====================================================
// Hit registration
// =====================================================

/// Debounce window between two accepted hits on the same entity. A single
/// physical contact can fan out into several collision callbacks in one
/// tick; anything inside this window counts as the same hit.
pub const HIT_COOLDOWN_SECS: f32 = 0.1;

/// Default minimum impact force for a hit to register
pub const DEFAULT_MIN_IMPACT_FORCE: f32 = 10.0;

/// Default number of registered hits before an object breaks
pub const DEFAULT_HITS_TO_DESTROY: u32 = 3;

/// Force-gate multiplier applied while an object is held
pub const HELD_FORCE_GATE_MULT: f32 = 2.0;

/// Single-impact force above which a fragile object breaks outright
pub const DEFAULT_BREAK_FORCE_THRESHOLD: f32 = 100.0;

// =====================================================
// Shatter scheduling
// =====================================================

/// Default authored cut budget per destruction
pub const DEFAULT_SHATTER_AMOUNT: u32 = 5;

/// Authoring clamp for the base cut budget
pub const SHATTER_AMOUNT_MIN: u32 = 1;
pub const SHATTER_AMOUNT_MAX: u32 = 20;

/// Hard cap on force-scaled effective cuts
pub const EFFECTIVE_CUTS_CAP: u32 = 30;

/// Default force → extra-cuts multiplier
pub const DEFAULT_IMPACT_FORCE_MULT: f32 = 0.1;

/// Cuts a shatter branch may perform before yielding to the next tick
pub const DEFAULT_CUTS_PER_TICK: u32 = 4;

/// Pieces with a mean bound size below this are kept whole rather than
/// cut further
pub const MIN_SHATTER_PIECE_SIZE: f32 = 0.05;

// =====================================================
// Cut-plane selection
// =====================================================

/// Cut planes pass within this fraction of the half-extents of the
/// bounds center, keeping fragments comparable in size.
pub const PLANE_OFFSET_FACTOR: f32 = 0.5;

/// Random variation on the two non-principal components of a biased
/// cut-plane normal.
pub const AXIS_BIAS_VARIATION: f32 = 0.3;

/// Below this absolute plane distance a vertex counts as on the plane
pub const PLANE_EPSILON: f32 = 1e-4;

// =====================================================
// Fragments
// =====================================================

/// Fragments despawn unconditionally after this many seconds
pub const FRAGMENT_LIFETIME_SECS: f32 = 3.0;

/// Fade window at the end of a fragment's life
pub const FRAGMENT_FADE_SECS: f32 = 0.5;

/// Default fragment scale relative to the source's mean bound size
pub const DEFAULT_FRAGMENT_SIZE_MULT: f32 = 0.25;

/// Default spawn spread as a fraction of the source half-extents
pub const DEFAULT_FRAGMENT_SPREAD: f32 = 0.5;

/// Default fragment mass as a fraction of the source mass
pub const DEFAULT_FRAGMENT_MASS_MULT: f32 = 0.1;

/// Default random torque impulse strength on spawned fragments
pub const DEFAULT_ROTATION_STRENGTH: f32 = 10.0;

/// Default outward explosion impulse magnitude
pub const DEFAULT_FRAGMENT_EXPLOSION_FORCE: f32 = 5.0;

/// Upward bias mixed into every explosion impulse direction
pub const UPWARD_IMPULSE_BIAS: f32 = 0.3;

// =====================================================
// Grab interaction
// =====================================================

/// Damping while an object is carried; release restores the stored
/// baseline.
pub const HELD_LINEAR_DAMPING: f32 = 6.0;
pub const HELD_ANGULAR_DAMPING: f32 = 4.0;

// =====================================================
// Last-resort fallback strategy
// =====================================================

/// Cube count range for the minimal fallback destruction path
pub const FALLBACK_FRAGMENTS_MIN: u32 = 5;
pub const FALLBACK_FRAGMENTS_MAX: u32 = 10;

/// Outward impulse for fallback cubes
pub const FALLBACK_IMPULSE: f32 = 3.0;

/// Mass for fallback cubes
pub const FALLBACK_MASS: f32 = 0.5;

/// Torque impulse strength for fallback cubes
pub const FALLBACK_TORQUE: f32 = 5.0;

/// Edge-length range for fallback cubes
pub const FALLBACK_SIZE_MIN: f32 = 0.1;
pub const FALLBACK_SIZE_MAX: f32 = 0.3;

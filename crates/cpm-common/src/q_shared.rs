// q_shared.rs — types and vector math shared by the solver, the client and the host
//
// Axis convention: y is up (gravity / jump axis), x and z span the ground plane.

pub type Vec3 = [f32; 3];

pub const VEC3_ORIGIN: Vec3 = [0.0, 0.0, 0.0];

pub const AXIS_X: usize = 0;
pub const AXIS_UP: usize = 1;
pub const AXIS_Z: usize = 2;

// ============================================================
// Cvar flags
// ============================================================

/// Written out by `write_variables`.
pub const CVAR_ARCHIVE: i32 = 1;
/// Only settable from the command line or by `force_set`.
pub const CVAR_NOSET: i32 = 8;
/// Changes made while a session is running wait for `get_latched_vars`.
pub const CVAR_LATCH: i32 = 16;

// ============================================================
// Movement settings
// ============================================================

/// Tuning tuple for one movement mode (ground, air or strafe).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementSettings {
    pub max_speed: f32,
    pub acceleration: f32,
    pub deceleration: f32,
}

impl MovementSettings {
    pub const fn new(max_speed: f32, acceleration: f32, deceleration: f32) -> Self {
        Self {
            max_speed,
            acceleration,
            deceleration,
        }
    }
}

pub const DEFAULT_GROUND_SETTINGS: MovementSettings = MovementSettings::new(7.0, 14.0, 10.0);
pub const DEFAULT_AIR_SETTINGS: MovementSettings = MovementSettings::new(7.0, 2.0, 2.0);
pub const DEFAULT_STRAFE_SETTINGS: MovementSettings = MovementSettings::new(1.0, 50.0, 50.0);

// ============================================================
// Button bits
// ============================================================

bitflags::bitflags! {
    /// Snapshot of a button for one tick.
    ///
    /// `HELD` is the level, the two impulse bits are edges that happened
    /// since the previous snapshot.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct ButtonState: u8 {
        const HELD         = 1;
        const IMPULSE_DOWN = 2;
        const IMPULSE_UP   = 4;
    }
}

impl ButtonState {
    #[inline]
    pub fn held(self) -> bool {
        self.contains(ButtonState::HELD)
    }

    #[inline]
    pub fn pressed(self) -> bool {
        self.contains(ButtonState::IMPULSE_DOWN)
    }

    #[inline]
    pub fn released(self) -> bool {
        self.contains(ButtonState::IMPULSE_UP)
    }
}

// ============================================================
// Movement command
// ============================================================

/// What the player asks of the character for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MoveCmd {
    /// Forward/back intent in [-1, 1].
    pub forward: f32,
    /// Right/left intent in [-1, 1].
    pub right: f32,
    pub jump: ButtonState,
}

// ============================================================
// MATHLIB — Vector operations
// ============================================================

#[inline]
pub fn dot_product(a: &Vec3, b: &Vec3) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub fn vector_add(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

pub fn vector_scale(v: &Vec3, scale: f32) -> Vec3 {
    [v[0] * scale, v[1] * scale, v[2] * scale]
}

pub fn vector_length(v: &Vec3) -> f32 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

/// Length of the ground-plane part of `v`.
pub fn horizontal_length(v: &Vec3) -> f32 {
    (v[AXIS_X] * v[AXIS_X] + v[AXIS_Z] * v[AXIS_Z]).sqrt()
}

/// Normalize in place, returns original length.
/// A zero vector is left untouched.
pub fn vector_normalize(v: &mut Vec3) -> f32 {
    let length = vector_length(v);
    if length != 0.0 {
        let ilength = 1.0 / length;
        v[0] *= ilength;
        v[1] *= ilength;
        v[2] *= ilength;
    }
    length
}

pub fn vector_is_finite(v: &Vec3) -> bool {
    v.iter().all(|c| c.is_finite())
}

// ============================================================
// Angle functions
// ============================================================

/// Ground-plane forward and right unit vectors for a yaw in degrees.
///
/// Yaw 0 looks down +z with +x to the right; positive yaw swings forward
/// from +z toward +x.
pub fn yaw_vectors(yaw: f32) -> (Vec3, Vec3) {
    let (sy, cy) = yaw.to_radians().sin_cos();
    let forward = [sy, 0.0, cy];
    let right = [cy, 0.0, -sy];
    (forward, right)
}

pub fn anglemod(a: f32) -> f32 {
    a.rem_euclid(360.0)
}

// ============================================================
// Parsing
// ============================================================

/// Parse one whitespace-delimited token from `data`, handling // comments
/// and "quoted strings". Returns `(token, remaining)` or `(token, None)`
/// if end of data.
pub fn com_parse(data: &str) -> (String, Option<&str>) {
    parse_token(data).unwrap_or((String::new(), None))
}

/// Like `com_parse`, but `None` once only whitespace and comments remain,
/// so that an empty quoted string can still be told apart from the end.
fn parse_token(data: &str) -> Option<(String, Option<&str>)> {
    let mut chars = data.as_bytes();
    let mut token = String::new();

    // skip whitespace
    loop {
        while !chars.is_empty() && chars[0] <= b' ' {
            chars = &chars[1..];
        }
        if chars.is_empty() {
            return None;
        }

        // skip // comments
        if chars.len() >= 2 && chars[0] == b'/' && chars[1] == b'/' {
            while !chars.is_empty() && chars[0] != b'\n' {
                chars = &chars[1..];
            }
            continue;
        }
        break;
    }

    if chars[0] == b'"' {
        chars = &chars[1..];
        let start = data.len() - chars.len();
        while !chars.is_empty() && chars[0] != b'"' {
            chars = &chars[1..];
        }
        let end = data.len() - chars.len();
        token.push_str(&data[start..end]);
        if !chars.is_empty() {
            chars = &chars[1..]; // closing quote
        }
    } else {
        let start = data.len() - chars.len();
        while !chars.is_empty() && chars[0] > b' ' {
            chars = &chars[1..];
        }
        let end = data.len() - chars.len();
        token.push_str(&data[start..end]);
    }

    let remaining = if chars.is_empty() {
        None
    } else {
        Some(&data[data.len() - chars.len()..])
    };
    Some((token, remaining))
}

/// Split a command line into tokens, honouring quotes and // comments.
pub fn com_tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut rest = Some(line);
    while let Some((token, remaining)) = rest.and_then(parse_token) {
        tokens.push(token);
        rest = remaining;
    }
    tokens
}

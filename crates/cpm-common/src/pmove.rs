// pmove.rs — CPM(A) style player movement
//
// Ground and air acceleration, friction, CPM air control and the jump queue.
// The solver never touches position: it produces a velocity and hands
// velocity * frametime to the host's Mover, which owns collision and the
// grounded flag.

use crate::common::com_dprintf;
use crate::cvar::CvarContext;
use crate::q_shared::{
    dot_product, horizontal_length, vector_is_finite, vector_length, vector_normalize,
    vector_scale, yaw_vectors, ButtonState, MoveCmd, MovementSettings, Vec3, AXIS_UP, AXIS_X,
    AXIS_Z, CVAR_ARCHIVE, CVAR_LATCH, DEFAULT_AIR_SETTINGS, DEFAULT_GROUND_SETTINGS,
    DEFAULT_STRAFE_SETTINGS, VEC3_ORIGIN,
};

// ============================================================
// Constants
// ============================================================

/// Below this, forward input or wish speed disables air control.
const AIR_CONTROL_EPSILON: f32 = 0.001;
/// Base steering gain of CPM air control.
const AIR_CONTROL_GAIN: f32 = 32.0;

const PM_FRICTION: f32 = 6.0;
const PM_GRAVITY: f32 = 20.0;
const PM_JUMPFORCE: f32 = 8.0;
const PM_AIRCONTROL: f32 = 0.3;

/// Movement cvars and their defaults.
pub const PM_CVARS: [(&str, &str); 14] = [
    ("pm_friction", "6"),
    ("pm_gravity", "20"),
    ("pm_jumpforce", "8"),
    ("pm_autohop", "0"),
    ("pm_aircontrol", "0.3"),
    ("pm_ground_maxspeed", "7"),
    ("pm_ground_accel", "14"),
    ("pm_ground_decel", "10"),
    ("pm_air_maxspeed", "7"),
    ("pm_air_accel", "2"),
    ("pm_air_decel", "2"),
    ("pm_strafe_maxspeed", "1"),
    ("pm_strafe_accel", "50"),
    ("pm_strafe_decel", "50"),
];

// ============================================================
// Collaborators
// ============================================================

/// Collision-aware character mover provided by the host.
pub trait Mover {
    /// Whether the character rests on walkable ground. Read once per tick,
    /// before the solver runs.
    fn is_grounded(&self) -> bool;

    /// Move by `displacement`, resolving collisions. Called once per tick
    /// after the solver; must refresh the grounded flag for the next tick.
    fn move_by(&mut self, displacement: &Vec3);
}

/// Facing of the character.
pub trait Orientation {
    /// Map a local `[right, up, forward]` direction into world space using
    /// the current yaw. Look pitch must not leak into the result.
    fn transform_direction(&self, local: &Vec3) -> Vec3;
}

/// Yaw-only facing, in degrees. See `yaw_vectors` for the convention.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct YawOrientation {
    pub yaw: f32,
}

impl YawOrientation {
    pub fn new(yaw: f32) -> Self {
        Self { yaw }
    }
}

impl Orientation for YawOrientation {
    fn transform_direction(&self, local: &Vec3) -> Vec3 {
        let (forward, right) = yaw_vectors(self.yaw);
        [
            right[AXIS_X] * local[AXIS_X] + forward[AXIS_X] * local[AXIS_Z],
            local[AXIS_UP],
            right[AXIS_Z] * local[AXIS_X] + forward[AXIS_Z] * local[AXIS_Z],
        ]
    }
}

// ============================================================
// Errors
// ============================================================

#[derive(Debug, Clone, PartialEq)]
pub enum PmoveError {
    /// No mover was wired up at initialization.
    MissingMover,
    /// No orientation provider was wired up at initialization.
    MissingOrientation,
    /// A tuning value is negative, non-finite, or a required max speed is zero.
    InvalidSetting { name: &'static str, value: f32 },
    /// The tick duration is negative or not finite.
    InvalidFrameTime(f32),
}

impl std::fmt::Display for PmoveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PmoveError::MissingMover => write!(f, "no mover attached to the player"),
            PmoveError::MissingOrientation => write!(f, "no orientation attached to the player"),
            PmoveError::InvalidSetting { name, value } => {
                write!(f, "invalid movement setting {} = {}", name, value)
            }
            PmoveError::InvalidFrameTime(dt) => write!(f, "invalid frame time {}", dt),
        }
    }
}

impl std::error::Error for PmoveError {}

// ============================================================
// Parameters
// ============================================================

/// Session-wide movement tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PmoveParams {
    pub ground: MovementSettings,
    pub air: MovementSettings,
    /// Used while airborne with side input only.
    pub strafe: MovementSettings,
    pub friction: f32,
    pub gravity: f32,
    pub jump_force: f32,
    /// Jump whenever the button is held instead of once per press.
    pub auto_bunny_hop: bool,
    pub air_control: f32,
}

impl Default for PmoveParams {
    fn default() -> Self {
        Self {
            ground: DEFAULT_GROUND_SETTINGS,
            air: DEFAULT_AIR_SETTINGS,
            strafe: DEFAULT_STRAFE_SETTINGS,
            friction: PM_FRICTION,
            gravity: PM_GRAVITY,
            jump_force: PM_JUMPFORCE,
            auto_bunny_hop: false,
            air_control: PM_AIRCONTROL,
        }
    }
}

fn check_setting(name: &'static str, value: f32, must_be_positive: bool) -> Result<(), PmoveError> {
    let ok = value.is_finite() && if must_be_positive { value > 0.0 } else { value >= 0.0 };
    if ok {
        Ok(())
    } else {
        Err(PmoveError::InvalidSetting { name, value })
    }
}

impl PmoveParams {
    /// Reject negative or non-finite tuning. Ground and air need a max
    /// speed above zero; a zero strafe max speed just disables side-stepping.
    pub fn validate(&self) -> Result<(), PmoveError> {
        check_setting("pm_ground_maxspeed", self.ground.max_speed, true)?;
        check_setting("pm_ground_accel", self.ground.acceleration, false)?;
        check_setting("pm_ground_decel", self.ground.deceleration, false)?;
        check_setting("pm_air_maxspeed", self.air.max_speed, true)?;
        check_setting("pm_air_accel", self.air.acceleration, false)?;
        check_setting("pm_air_decel", self.air.deceleration, false)?;
        check_setting("pm_strafe_maxspeed", self.strafe.max_speed, false)?;
        check_setting("pm_strafe_accel", self.strafe.acceleration, false)?;
        check_setting("pm_strafe_decel", self.strafe.deceleration, false)?;
        check_setting("pm_friction", self.friction, false)?;
        check_setting("pm_gravity", self.gravity, false)?;
        check_setting("pm_jumpforce", self.jump_force, false)?;
        check_setting("pm_aircontrol", self.air_control, false)?;
        Ok(())
    }

    /// Build and validate parameters from the movement cvars.
    pub fn from_cvars(ctx: &CvarContext) -> Result<Self, PmoveError> {
        let v = |name: &str| ctx.variable_value(name);
        let params = Self {
            ground: MovementSettings::new(
                v("pm_ground_maxspeed"),
                v("pm_ground_accel"),
                v("pm_ground_decel"),
            ),
            air: MovementSettings::new(
                v("pm_air_maxspeed"),
                v("pm_air_accel"),
                v("pm_air_decel"),
            ),
            strafe: MovementSettings::new(
                v("pm_strafe_maxspeed"),
                v("pm_strafe_accel"),
                v("pm_strafe_decel"),
            ),
            friction: v("pm_friction"),
            gravity: v("pm_gravity"),
            jump_force: v("pm_jumpforce"),
            auto_bunny_hop: v("pm_autohop") != 0.0,
            air_control: v("pm_aircontrol"),
        };
        params.validate()?;
        Ok(params)
    }
}

/// Register the movement cvars with their defaults. Existing values are kept.
pub fn pm_register_cvars(ctx: &mut CvarContext) {
    for (name, value) in PM_CVARS {
        ctx.get(name, Some(value), CVAR_ARCHIVE | CVAR_LATCH);
    }
}

// ============================================================
// Jump queue
// ============================================================

/// Latches the intent to jump until the next ground move consumes it, so
/// a jump pressed just before landing still happens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JumpQueue {
    pub wish_jump: bool,
}

impl JumpQueue {
    pub fn update(&mut self, button: ButtonState, auto_bunny_hop: bool) {
        if auto_bunny_hop {
            self.wish_jump = button.held();
            return;
        }

        if button.pressed() && !self.wish_jump {
            self.wish_jump = true;
        }

        if button.released() {
            self.wish_jump = false;
        }
    }
}

// ============================================================
// Primitives
// ============================================================

/// Add speed along `wishdir` until the projection of the velocity on it
/// reaches `wishspeed`. Only the projection is limited, never the total
/// speed, which is where strafe-jumping gains come from.
pub fn pm_accelerate(velocity: &mut Vec3, wishdir: &Vec3, wishspeed: f32, accel: f32, frametime: f32) {
    let currentspeed = dot_product(velocity, wishdir);
    let addspeed = wishspeed - currentspeed;
    if addspeed <= 0.0 {
        return;
    }
    let mut accelspeed = accel * frametime * wishspeed;
    if accelspeed > addspeed {
        accelspeed = addspeed;
    }
    velocity[AXIS_X] += accelspeed * wishdir[AXIS_X];
    velocity[AXIS_Z] += accelspeed * wishdir[AXIS_Z];
}

/// Ground friction on the horizontal velocity, scaled by `strength`.
///
/// Below the ground deceleration speed, the deceleration itself is used as
/// the control speed so slow movement stops quickly. Returns the speed left
/// after the drop, before clamping at zero.
pub fn pm_friction(
    velocity: &mut Vec3,
    grounded: bool,
    friction: f32,
    ground: &MovementSettings,
    frametime: f32,
    strength: f32,
) -> f32 {
    let speed = horizontal_length(velocity);
    let mut drop = 0.0;

    if grounded {
        let control = if speed < ground.deceleration {
            ground.deceleration
        } else {
            speed
        };
        drop = control * friction * frametime * strength;
    }

    let unclamped = speed - drop;
    let mut newspeed = unclamped.max(0.0);
    if speed > 0.0 {
        newspeed /= speed;
    }

    velocity[AXIS_X] *= newspeed;
    velocity[AXIS_Z] *= newspeed;
    unclamped
}

/// CPM air control: bend the horizontal velocity toward `wishdir` without
/// changing its length. Only active with forward/back input.
///
/// Returns the new horizontal direction when the velocity was bent.
pub fn pm_air_control(
    velocity: &mut Vec3,
    wishdir: &Vec3,
    wishspeed: f32,
    air_control: f32,
    forwardmove: f32,
    frametime: f32,
) -> Option<Vec3> {
    if forwardmove.abs() < AIR_CONTROL_EPSILON || wishspeed.abs() < AIR_CONTROL_EPSILON {
        return None;
    }

    let zspeed = velocity[AXIS_UP];
    velocity[AXIS_UP] = 0.0;
    let speed = vector_normalize(velocity);

    let dot = dot_product(velocity, wishdir);
    let k = AIR_CONTROL_GAIN * air_control * dot * dot * frametime;

    let mut steered = None;
    if dot > 0.0 {
        for i in 0..3 {
            velocity[i] = velocity[i] * speed + wishdir[i] * k;
        }
        vector_normalize(velocity);
        steered = Some(*velocity);
    }

    velocity[AXIS_X] *= speed;
    velocity[AXIS_UP] = zspeed; // vertical speed never goes through the rescale
    velocity[AXIS_Z] *= speed;
    steered
}

/// World-space wish vector for the input, before normalization. Its
/// length encodes how hard the player pushes.
pub fn pm_wish_velocity<O: Orientation + ?Sized>(cmd: &MoveCmd, orientation: &O) -> Vec3 {
    let local = [cmd.right, 0.0, cmd.forward];
    let mut wishvel = orientation.transform_direction(&local);
    wishvel[AXIS_UP] = 0.0;
    wishvel
}

// ============================================================
// Ground and air moves
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundMoveResult {
    pub wishdir: Vec3,
    pub jumped: bool,
    /// Speed after friction before clamping.
    pub friction: f32,
}

pub fn pm_ground_move(
    velocity: &mut Vec3,
    wishvel: &Vec3,
    wish_jump: &mut bool,
    params: &PmoveParams,
    frametime: f32,
    grounded: bool,
) -> GroundMoveResult {
    // no friction on the tick a jump is queued, the jump keeps its speed
    let strength = if *wish_jump { 0.0 } else { 1.0 };
    let friction = pm_friction(
        velocity,
        grounded,
        params.friction,
        &params.ground,
        frametime,
        strength,
    );

    let mut wishdir = *wishvel;
    vector_normalize(&mut wishdir);
    let wishspeed = vector_length(&wishdir) * params.ground.max_speed;

    pm_accelerate(velocity, &wishdir, wishspeed, params.ground.acceleration, frametime);

    // reset the gravity velocity
    velocity[AXIS_UP] = -params.gravity * frametime;

    let jumped = *wish_jump;
    if jumped {
        velocity[AXIS_UP] = params.jump_force;
        *wish_jump = false;
    }

    GroundMoveResult {
        wishdir,
        jumped,
        friction,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AirMoveResult {
    pub wishdir: Vec3,
    /// Wish speed handed to `pm_accelerate`, after any strafe clamp.
    pub wishspeed: f32,
    pub accel: f32,
    /// Direction chosen by air control, if it bent the velocity.
    pub steered: Option<Vec3>,
}

pub fn pm_air_move(
    velocity: &mut Vec3,
    wishvel: &Vec3,
    cmd: &MoveCmd,
    params: &PmoveParams,
    frametime: f32,
) -> AirMoveResult {
    let mut wishdir = *wishvel;
    let mut wishspeed = vector_normalize(&mut wishdir) * params.air.max_speed;
    let wishspeed2 = wishspeed;

    // turning against the current velocity uses the deceleration
    let mut accel = if dot_product(velocity, &wishdir) < 0.0 {
        params.air.deceleration
    } else {
        params.air.acceleration
    };

    // only strafing left or right
    if cmd.forward == 0.0 && cmd.right != 0.0 {
        if wishspeed > params.strafe.max_speed {
            wishspeed = params.strafe.max_speed;
        }
        accel = params.strafe.acceleration;
    }

    pm_accelerate(velocity, &wishdir, wishspeed, accel, frametime);

    let steered = if params.air_control > 0.0 {
        pm_air_control(
            velocity,
            &wishdir,
            wishspeed2,
            params.air_control,
            cmd.forward,
            frametime,
        )
    } else {
        None
    };

    velocity[AXIS_UP] -= params.gravity * frametime;

    AirMoveResult {
        wishdir,
        wishspeed,
        accel,
        steered,
    }
}

// ============================================================
// Per-tick state and entry point
// ============================================================

/// Everything the solver carries from one tick to the next.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PmoveState {
    pub velocity: Vec3,
    pub jump: JumpQueue,
    /// Grounded flag the previous tick ran under, `None` before the first.
    pub was_grounded: Option<bool>,
    /// Last wish direction, or the direction air control steered to.
    pub move_direction: Vec3,
    /// Ground speed left after the last friction pass, before clamping.
    pub last_friction: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroundTransition {
    None,
    Landed,
    TookOff,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PmoveOutput {
    pub velocity: Vec3,
    /// What was handed to `Mover::move_by`.
    pub displacement: Vec3,
    pub grounded: bool,
    pub jumped: bool,
    pub transition: GroundTransition,
    pub friction: f32,
    pub speed: f32,
}

/// Run one movement tick: queue the jump, move on the ground or in the
/// air depending on the mover, then hand the displacement to the mover.
///
/// Fails without touching `ps` if `frametime` is negative or not finite.
pub fn pmove<M, O>(
    ps: &mut PmoveState,
    cmd: &MoveCmd,
    params: &PmoveParams,
    frametime: f32,
    mover: &mut M,
    orientation: &O,
) -> Result<PmoveOutput, PmoveError>
where
    M: Mover + ?Sized,
    O: Orientation + ?Sized,
{
    if !frametime.is_finite() || frametime < 0.0 {
        return Err(PmoveError::InvalidFrameTime(frametime));
    }

    ps.jump.update(cmd.jump, params.auto_bunny_hop);

    let grounded = mover.is_grounded();
    let transition = match ps.was_grounded {
        Some(false) if grounded => GroundTransition::Landed,
        Some(true) if !grounded => GroundTransition::TookOff,
        _ => GroundTransition::None,
    };
    match transition {
        GroundTransition::Landed => com_dprintf(&format!(
            "pmove: landed at {:.2} ups, vertical {:.2}\n",
            horizontal_length(&ps.velocity),
            ps.velocity[AXIS_UP]
        )),
        GroundTransition::TookOff => com_dprintf(&format!(
            "pmove: airborne at {:.2} ups\n",
            horizontal_length(&ps.velocity)
        )),
        GroundTransition::None => {}
    }

    let wishvel = pm_wish_velocity(cmd, orientation);
    let mut jumped = false;

    if grounded {
        let result = pm_ground_move(
            &mut ps.velocity,
            &wishvel,
            &mut ps.jump.wish_jump,
            params,
            frametime,
            grounded,
        );
        ps.move_direction = result.wishdir;
        ps.last_friction = result.friction;
        jumped = result.jumped;
        if jumped {
            com_dprintf(&format!(
                "pmove: jump at {:.2} ups\n",
                horizontal_length(&ps.velocity)
            ));
        }
    } else {
        let result = pm_air_move(&mut ps.velocity, &wishvel, cmd, params, frametime);
        ps.move_direction = result.steered.unwrap_or(result.wishdir);
    }

    if !vector_is_finite(&ps.velocity) {
        // only reachable through non-finite input axes
        com_dprintf("pmove: non-finite velocity, stopping\n");
        ps.velocity = VEC3_ORIGIN;
    }

    ps.was_grounded = Some(grounded);

    let displacement = vector_scale(&ps.velocity, frametime);
    mover.move_by(&displacement);

    Ok(PmoveOutput {
        velocity: ps.velocity,
        displacement,
        grounded,
        jumped,
        transition,
        friction: ps.last_friction,
        speed: vector_length(&ps.velocity),
    })
}

// ============================================================
// Player
// ============================================================

/// A player's movement: tuning, carried state and the two collaborators.
pub struct PlayerMove<M: Mover, O: Orientation> {
    params: PmoveParams,
    state: PmoveState,
    mover: M,
    orientation: O,
}

impl<M: Mover, O: Orientation> PlayerMove<M, O> {
    /// Wire up a player. Missing collaborators and bad tuning are rejected
    /// here so that `tick` never has to deal with them.
    pub fn init(params: PmoveParams, mover: Option<M>, orientation: Option<O>) -> Result<Self, PmoveError> {
        let mover = mover.ok_or(PmoveError::MissingMover)?;
        let orientation = orientation.ok_or(PmoveError::MissingOrientation)?;
        params.validate()?;
        Ok(Self {
            params,
            state: PmoveState::default(),
            mover,
            orientation,
        })
    }

    pub fn tick(&mut self, cmd: &MoveCmd, frametime: f32) -> Result<PmoveOutput, PmoveError> {
        pmove(
            &mut self.state,
            cmd,
            &self.params,
            frametime,
            &mut self.mover,
            &self.orientation,
        )
    }

    /// Current speed, vertical included.
    pub fn speed(&self) -> f32 {
        vector_length(&self.state.velocity)
    }

    pub fn horizontal_speed(&self) -> f32 {
        horizontal_length(&self.state.velocity)
    }

    pub fn velocity(&self) -> Vec3 {
        self.state.velocity
    }

    pub fn state(&self) -> &PmoveState {
        &self.state
    }

    pub fn params(&self) -> &PmoveParams {
        &self.params
    }

    pub fn mover(&self) -> &M {
        &self.mover
    }

    pub fn mover_mut(&mut self) -> &mut M {
        &mut self.mover
    }

    pub fn orientation(&self) -> &O {
        &self.orientation
    }

    pub fn orientation_mut(&mut self) -> &mut O {
        &mut self.orientation
    }
}

// ============================================================
// Unit tests
// ============================================================

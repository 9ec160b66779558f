// sys_frame.rs — the simulator frame loop
//
// Each frame: advance the clock, let the bot issue button commands, turn,
// sample the buttons into a MoveCmd and run one movement tick.

use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use cpm_client::cl_input::{
    cl_adjust_yaw, cl_button_command, cl_create_cmd, InputButtons, InputCvars, InputTiming,
};
use cpm_common::cvar::CvarContext;
use cpm_common::pmove::{
    GroundTransition, Mover, PlayerMove, PmoveError, PmoveParams, YawOrientation,
};
use cpm_common::q_shared::{horizontal_length, VEC3_ORIGIN};

use crate::sv_bots::{bot_commands, Scenario};
use crate::sv_world::FloorMover;

/// Clock value at the first frame; 0 means "no timestamp" to the key code.
const SYS_START_TIME: u32 = 1000;

/// Upper bound for `sys_msec` and `sys_jitter`, the longest frame the
/// client input code accepts.
pub const MAX_SYS_MSEC: u32 = 200;

/// Host cvars and their defaults.
pub const SYS_CVARS: [(&str, &str); 6] = [
    ("sys_frames", "625"),
    ("sys_msec", "8"),
    ("sys_jitter", "0"),
    ("sys_seed", "1"),
    ("sys_writeconfig", ""),
    ("cl_yawspeed", "90"),
];

pub fn sys_register_cvars(ctx: &mut CvarContext) {
    for (name, value) in SYS_CVARS {
        ctx.get(name, Some(value), 0);
    }
}

/// Write the archived cvars to `path`, in a form `+exec` reads back.
pub fn sys_write_config(ctx: &CvarContext, path: &Path) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    ctx.write_variables(&mut file)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimConfig {
    pub frames: u32,
    /// Nominal frame length.
    pub frame_msec: u32,
    /// Up to this many msec are added to each frame at random.
    pub jitter_msec: u32,
    pub seed: u64,
    pub yawspeed: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            frames: 625,
            frame_msec: 8,
            jitter_msec: 0,
            seed: 1,
            yawspeed: 90.0,
        }
    }
}

impl SimConfig {
    pub fn from_cvars(ctx: &CvarContext) -> Self {
        Self {
            frames: ctx.variable_value("sys_frames").max(0.0) as u32,
            frame_msec: (ctx.variable_value("sys_msec").max(1.0) as u32).min(MAX_SYS_MSEC),
            jitter_msec: (ctx.variable_value("sys_jitter").max(0.0) as u32).min(MAX_SYS_MSEC),
            seed: ctx.variable_value("sys_seed").max(0.0) as u64,
            yawspeed: ctx.variable_value("cl_yawspeed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScenarioReport {
    pub scenario: Scenario,
    pub frames: u32,
    /// Highest horizontal speed seen after any tick.
    pub max_speed: f32,
    pub final_speed: f32,
    pub jumps: u32,
    pub landings: u32,
    pub distance: f32,
}

/// Length of the next frame in msec, never below 1.
pub fn sys_frame_msec(rng: &mut StdRng, frame_msec: u32, jitter_msec: u32) -> u32 {
    frame_msec.max(1).saturating_add(rng.gen_range(0..=jitter_msec))
}

pub fn run_scenario(
    scenario: Scenario,
    params: &PmoveParams,
    config: &SimConfig,
) -> Result<ScenarioReport, PmoveError> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut player = PlayerMove::init(
        *params,
        Some(FloorMover::new(VEC3_ORIGIN, 0.0)),
        Some(YawOrientation::default()),
    )?;

    let mut buttons = InputButtons::default();
    let mut timing = InputTiming {
        frame_msec: 0,
        old_sys_frame_time: SYS_START_TIME,
    };
    let cvars = InputCvars {
        cl_yawspeed: config.yawspeed,
    };

    let mut report = ScenarioReport {
        scenario,
        frames: config.frames,
        max_speed: 0.0,
        final_speed: 0.0,
        jumps: 0,
        landings: 0,
        distance: 0.0,
    };

    let mut sys_time = SYS_START_TIME;
    for frame in 0..config.frames {
        let frame_start = sys_time;
        let msec = sys_frame_msec(&mut rng, config.frame_msec, config.jitter_msec);
        sys_time = sys_time.wrapping_add(msec);

        let grounded = player.mover().is_grounded();
        for line in bot_commands(scenario, frame, frame_start, grounded, buttons.in_jump.state.held()) {
            cl_button_command(&mut buttons, &line, frame_start);
        }

        let frametime = msec as f32 / 1000.0;
        let mut yaw = player.orientation().yaw;
        cl_adjust_yaw(&mut yaw, &mut buttons, &cvars, frametime, sys_time, msec);
        player.orientation_mut().yaw = yaw;

        let cmd = cl_create_cmd(&mut buttons, &mut timing, sys_time);
        let out = player.tick(&cmd, frametime)?;

        if out.jumped {
            report.jumps += 1;
        }
        if out.transition == GroundTransition::Landed {
            report.landings += 1;
        }
        report.max_speed = report.max_speed.max(horizontal_length(&out.velocity));
    }

    report.final_speed = player.horizontal_speed();
    report.distance = player.mover().distance;
    Ok(report)
}

/// One sweep cell: the air control value and scenario it ran with.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepResult {
    pub air_control: f32,
    pub report: Result<ScenarioReport, PmoveError>,
}

/// Run every scenario for each air control value, in parallel. Results come
/// back grouped by air control, scenarios in `Scenario::ALL` order.
///
/// Each value goes through `pm_aircontrol` like a console change between
/// sessions: set (latched while a session is active), applied, and the
/// parameters rebuilt when a movement cvar changed. The original value is
/// restored afterwards.
pub fn sys_sweep(ctx: &mut CvarContext, config: &SimConfig, air_controls: &[f32]) -> Vec<SweepResult> {
    let original = ctx.variable_string("pm_aircontrol").to_string();
    let mut params = PmoveParams::from_cvars(ctx);
    ctx.take_modified("pm_");

    let mut jobs = Vec::new();
    for &air_control in air_controls {
        ctx.set_value("pm_aircontrol", air_control);
        ctx.get_latched_vars();
        if ctx.take_modified("pm_") {
            params = PmoveParams::from_cvars(ctx);
        }
        for scenario in Scenario::ALL {
            jobs.push((air_control, scenario, params.clone()));
        }
    }

    ctx.set("pm_aircontrol", &original);
    ctx.get_latched_vars();
    ctx.take_modified("pm_");

    jobs.into_par_iter()
        .map(|(air_control, scenario, params)| SweepResult {
            air_control,
            report: params.and_then(|p| run_scenario(scenario, &p, config)),
        })
        .collect()
}

pub fn format_report(report: &ScenarioReport) -> String {
    format!(
        "{:<11} frames {:>5}  max {:>6.2}  final {:>6.2}  jumps {:>3}  landings {:>3}  distance {:>8.2}\n",
        report.scenario.name(),
        report.frames,
        report.max_speed,
        report.final_speed,
        report.jumps,
        report.landings,
        report.distance
    )
}

// sv_bots.rs — scripted input for the simulator
//
// A bot only ever speaks through button commands, the same "+name key time"
// lines a keyboard would produce, so the whole input path gets exercised.

const KEY_FORWARD: i32 = 119;
const KEY_MOVERIGHT: i32 = 100;
const KEY_RIGHT: i32 = 132;
const KEY_JUMP: i32 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scenario {
    /// Stand still on the floor.
    Idle,
    /// Hold forward.
    Walk,
    /// Forward and right held, turning right, jumping on every landing.
    StrafeJump,
    /// Right only, turning right, jumping on every landing.
    AirStrafe,
}

impl Scenario {
    pub const ALL: [Scenario; 4] = [
        Scenario::Idle,
        Scenario::Walk,
        Scenario::StrafeJump,
        Scenario::AirStrafe,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Scenario::Idle => "idle",
            Scenario::Walk => "walk",
            Scenario::StrafeJump => "strafejump",
            Scenario::AirStrafe => "airstrafe",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }

    fn hops(self) -> bool {
        matches!(self, Scenario::StrafeJump | Scenario::AirStrafe)
    }
}

/// Button commands the bot issues at the start of `frame`.
///
/// `grounded` is where the last move left the player and `jump_held` the
/// current level of the jump button.
pub fn bot_commands(
    scenario: Scenario,
    frame: u32,
    time: u32,
    grounded: bool,
    jump_held: bool,
) -> Vec<String> {
    let mut lines = Vec::new();

    if frame == 0 {
        match scenario {
            Scenario::Idle => {}
            Scenario::Walk => lines.push(format!("+forward {} {}", KEY_FORWARD, time)),
            Scenario::StrafeJump => {
                lines.push(format!("+forward {} {}", KEY_FORWARD, time));
                lines.push(format!("+moveright {} {}", KEY_MOVERIGHT, time));
                lines.push(format!("+right {} {}", KEY_RIGHT, time));
            }
            Scenario::AirStrafe => {
                lines.push(format!("+moveright {} {}", KEY_MOVERIGHT, time));
                lines.push(format!("+right {} {}", KEY_RIGHT, time));
            }
        }
    }

    if scenario.hops() {
        if grounded && !jump_held {
            lines.push(format!("+jump {} {}", KEY_JUMP, time));
        } else if !grounded && jump_held {
            lines.push(format!("-jump {} {}", KEY_JUMP, time));
        }
    }

    lines
}

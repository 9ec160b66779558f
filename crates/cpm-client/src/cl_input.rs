// cl_input.rs -- builds the movement command for one tick from button state
//
// Buttons are fed by "+name"/"-name" commands carrying the key number and a
// millisecond timestamp. Movement axes are the fraction of the frame each
// button was held; jump keeps its press/release edges for the jump queue.

use cpm_common::common::com_printf;
use cpm_common::q_shared::{anglemod, com_tokenize, ButtonState, MoveCmd};

/// Frame length clamp for `cl_create_cmd`, in milliseconds.
const MIN_FRAME_MSEC: u32 = 1;
const MAX_FRAME_MSEC: u32 = 200;

// ===============================================================================
// KEY BUTTONS
//
// A button can be held by two keys at once. Pressing either sets HELD and
// IMPULSE_DOWN; releasing the last one clears HELD and sets IMPULSE_UP.
// Impulses stay set until the button is sampled for a command.
//
// ===============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct KButton {
    /// Key numbers holding it down, 0 for none.
    pub down: [i32; 2],
    /// msec timestamp of the last press.
    pub downtime: u32,
    /// msec held since the last sample.
    pub msec: u32,
    pub state: ButtonState,
}

/// All movement buttons.
#[derive(Debug, Clone, Default)]
pub struct InputButtons {
    pub in_left: KButton,
    pub in_right: KButton,
    pub in_forward: KButton,
    pub in_back: KButton,
    pub in_moveleft: KButton,
    pub in_moveright: KButton,
    pub in_jump: KButton,
}

impl InputButtons {
    /// Look up a button by its command name, without the +/- prefix.
    pub fn button_mut(&mut self, name: &str) -> Option<&mut KButton> {
        match name {
            "left" => Some(&mut self.in_left),
            "right" => Some(&mut self.in_right),
            "forward" => Some(&mut self.in_forward),
            "back" => Some(&mut self.in_back),
            "moveleft" => Some(&mut self.in_moveleft),
            "moveright" => Some(&mut self.in_moveright),
            "jump" => Some(&mut self.in_jump),
            _ => None,
        }
    }
}

/// Input timing state.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputTiming {
    pub frame_msec: u32,
    pub old_sys_frame_time: u32,
}

/// Input-related cvars.
#[derive(Debug, Clone, Copy)]
pub struct InputCvars {
    /// Degrees per second turned by +left/+right.
    pub cl_yawspeed: f32,
}

impl Default for InputCvars {
    fn default() -> Self {
        Self { cl_yawspeed: 140.0 }
    }
}

/// Process a key-down event for a button.
///
/// `k` is the key number (-1 if typed manually at console for continuous down).
/// `time` is the timestamp from the key event.
pub fn key_down(b: &mut KButton, k: i32, time: u32, sys_frame_time: u32) {
    if k == b.down[0] || k == b.down[1] {
        return; // repeating key
    }

    if b.down[0] == 0 {
        b.down[0] = k;
    } else if b.down[1] == 0 {
        b.down[1] = k;
    } else {
        com_printf("Three keys down for a button!\n");
        return;
    }

    if b.state.held() {
        return; // still down
    }

    b.downtime = if time != 0 {
        time
    } else {
        sys_frame_time.wrapping_sub(100)
    };

    b.state |= ButtonState::HELD | ButtonState::IMPULSE_DOWN;
}

/// Process a key-up event for a button.
///
/// `k` is the key number (-1 if typed manually, which clears all).
pub fn key_up(b: &mut KButton, k: i32, time: u32) {
    if k == -1 {
        // typed manually at the console, assume for unsticking, so clear all
        b.down = [0, 0];
        b.state = ButtonState::IMPULSE_UP;
        return;
    }

    if b.down[0] == k {
        b.down[0] = 0;
    } else if b.down[1] == k {
        b.down[1] = 0;
    } else {
        return; // key up without corresponding down
    }

    if b.down[0] != 0 || b.down[1] != 0 {
        return; // some other key is still holding it down
    }

    if !b.state.held() {
        return;
    }

    if time != 0 {
        b.msec += time.wrapping_sub(b.downtime);
    } else {
        b.msec += 10;
    }

    b.state.remove(ButtonState::HELD);
    b.state.insert(ButtonState::IMPULSE_UP);
}

/// Returns the fraction of the frame that the key was down, and clears
/// the impulses.
pub fn cl_key_state(key: &mut KButton, sys_frame_time: u32, frame_msec: u32) -> f32 {
    key.state &= ButtonState::HELD;

    let mut msec = key.msec as i32;
    key.msec = 0;

    if key.state.held() {
        // still down
        msec += sys_frame_time.wrapping_sub(key.downtime) as i32;
        key.downtime = sys_frame_time;
    }

    (msec as f32 / frame_msec.max(1) as f32).clamp(0.0, 1.0)
}

/// Snapshot a button for one command, then clear its impulses so each
/// edge is seen by exactly one tick.
pub fn cl_button_state(key: &mut KButton) -> ButtonState {
    let state = key.state;
    key.state &= ButtonState::HELD;
    state
}

/// Run a "+name [key] [time]" or "-name [key] [time]" button command.
/// Returns false if the line is not a button command.
pub fn cl_button_command(buttons: &mut InputButtons, line: &str, sys_frame_time: u32) -> bool {
    let argv = com_tokenize(line);
    let Some(cmd) = argv.first() else {
        return false;
    };

    let (down, name) = if let Some(name) = cmd.strip_prefix('+') {
        (true, name)
    } else if let Some(name) = cmd.strip_prefix('-') {
        (false, name)
    } else {
        return false;
    };

    let Some(button) = buttons.button_mut(name) else {
        return false;
    };

    let k: i32 = argv.get(1).and_then(|s| s.parse().ok()).unwrap_or(-1);
    let time: u32 = argv.get(2).and_then(|s| s.parse().ok()).unwrap_or(0);

    if down {
        key_down(button, k, time, sys_frame_time);
    } else {
        key_up(button, k, time);
    }
    true
}

// ==========================================================================

/// Turn the yaw with the +left/+right buttons. Positive yaw turns right.
pub fn cl_adjust_yaw(
    yaw: &mut f32,
    buttons: &mut InputButtons,
    cvars: &InputCvars,
    frametime: f32,
    sys_frame_time: u32,
    frame_msec: u32,
) {
    let speed = frametime * cvars.cl_yawspeed;
    *yaw += speed * cl_key_state(&mut buttons.in_right, sys_frame_time, frame_msec);
    *yaw -= speed * cl_key_state(&mut buttons.in_left, sys_frame_time, frame_msec);
    *yaw = anglemod(*yaw);
}

/// Build a command from raw axes, clamping each to [-1, 1]. Non-finite
/// axes count as no input.
pub fn cl_cmd_from_axes(forward: f32, right: f32, jump: ButtonState) -> MoveCmd {
    let clamp_axis = |v: f32| if v.is_finite() { v.clamp(-1.0, 1.0) } else { 0.0 };
    MoveCmd {
        forward: clamp_axis(forward),
        right: clamp_axis(right),
        jump,
    }
}

/// Build the movement command from keyboard state.
pub fn cl_base_move(buttons: &mut InputButtons, sys_frame_time: u32, frame_msec: u32) -> MoveCmd {
    let forward = cl_key_state(&mut buttons.in_forward, sys_frame_time, frame_msec)
        - cl_key_state(&mut buttons.in_back, sys_frame_time, frame_msec);
    let right = cl_key_state(&mut buttons.in_moveright, sys_frame_time, frame_msec)
        - cl_key_state(&mut buttons.in_moveleft, sys_frame_time, frame_msec);
    let jump = cl_button_state(&mut buttons.in_jump);

    cl_cmd_from_axes(forward, right, jump)
}

/// Create the command for this frame.
pub fn cl_create_cmd(
    buttons: &mut InputButtons,
    timing: &mut InputTiming,
    sys_frame_time: u32,
) -> MoveCmd {
    timing.frame_msec = sys_frame_time
        .wrapping_sub(timing.old_sys_frame_time)
        .clamp(MIN_FRAME_MSEC, MAX_FRAME_MSEC);
    timing.old_sys_frame_time = sys_frame_time;

    cl_base_move(buttons, sys_frame_time, timing.frame_msec)
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    // ========== key_down / key_up ==========

    #[test]
    fn key_down_basic() {
        let mut b = KButton::default();
        key_down(&mut b, 42, 1000, 1000);
        assert_eq!(b.down[0], 42);
        assert!(b.state.held());
        assert!(b.state.pressed());
        assert_eq!(b.downtime, 1000);
    }

    #[test]
    fn key_down_second_key_no_second_impulse() {
        let mut b = KButton::default();
        key_down(&mut b, 42, 1000, 1000);
        cl_button_state(&mut b);
        key_down(&mut b, 43, 1100, 1100);
        assert_eq!(b.down, [42, 43]);
        assert!(!b.state.pressed(), "already held, no new press edge");
    }

    #[test]
    fn key_down_repeating_ignored() {
        let mut b = KButton::default();
        key_down(&mut b, 42, 1000, 1000);
        let before = b.state;
        key_down(&mut b, 42, 1100, 1100);
        assert_eq!(b.state, before);
    }

    #[test]
    fn key_down_third_key_ignored() {
        let mut b = KButton::default();
        key_down(&mut b, 1, 1000, 1000);
        key_down(&mut b, 2, 1000, 1000);
        key_down(&mut b, 3, 1000, 1000);
        assert_eq!(b.down, [1, 2]);
    }

    #[test]
    fn key_up_basic() {
        let mut b = KButton::default();
        key_down(&mut b, 42, 1000, 1000);
        key_up(&mut b, 42, 1100);
        assert_eq!(b.down[0], 0);
        assert!(!b.state.held());
        assert!(b.state.released());
        assert_eq!(b.msec, 100);
    }

    #[test]
    fn key_up_negative_one_clears_all() {
        let mut b = KButton::default();
        key_down(&mut b, 42, 1000, 1000);
        key_down(&mut b, 43, 1100, 1100);
        key_up(&mut b, -1, 1200);
        assert_eq!(b.down, [0, 0]);
        assert_eq!(b.state, ButtonState::IMPULSE_UP);
    }

    #[test]
    fn key_up_one_key_other_holds() {
        let mut b = KButton::default();
        key_down(&mut b, 42, 1000, 1000);
        key_down(&mut b, 43, 1100, 1100);
        key_up(&mut b, 42, 1200);
        assert_eq!(b.down, [0, 43]);
        assert!(b.state.held());
        assert!(!b.state.released());
    }

    #[test]
    fn key_up_unknown_key_ignored() {
        let mut b = KButton::default();
        key_down(&mut b, 42, 1000, 1000);
        key_up(&mut b, 99, 1100);
        assert_eq!(b.down[0], 42);
        assert!(b.state.held());
    }

    // ========== sampling ==========

    #[test]
    fn cl_key_state_idle() {
        let mut b = KButton::default();
        assert_eq!(cl_key_state(&mut b, 5000, 16), 0.0);
    }

    #[test]
    fn cl_key_state_still_down_adds_remaining() {
        let mut b = KButton::default();
        key_down(&mut b, 42, 4992, 4992);
        let val = cl_key_state(&mut b, 5000, 16);
        assert!((val - 0.5).abs() < 0.01);
        assert_eq!(b.downtime, 5000);
        assert_eq!(b.state, ButtonState::HELD, "impulses cleared");
    }

    #[test]
    fn cl_key_state_clamps_to_one() {
        let mut b = KButton {
            msec: 100,
            ..KButton::default()
        };
        assert_eq!(cl_key_state(&mut b, 5000, 16), 1.0);
    }

    #[test]
    fn cl_button_state_reports_edges_once() {
        let mut b = KButton::default();
        key_down(&mut b, 42, 1000, 1000);
        let first = cl_button_state(&mut b);
        assert!(first.pressed() && first.held());
        let second = cl_button_state(&mut b);
        assert_eq!(second, ButtonState::HELD);
    }

    #[test]
    fn cl_button_state_tap_between_samples() {
        let mut b = KButton::default();
        key_down(&mut b, 42, 1000, 1000);
        key_up(&mut b, 42, 1005);
        let state = cl_button_state(&mut b);
        assert!(state.pressed());
        assert!(state.released());
        assert!(!state.held());
    }

    // ========== commands ==========

    #[test]
    fn cl_button_command_parses_key_and_time() {
        let mut buttons = InputButtons::default();
        assert!(cl_button_command(&mut buttons, "+jump 32 1500", 1500));
        assert_eq!(buttons.in_jump.down[0], 32);
        assert_eq!(buttons.in_jump.downtime, 1500);
        assert!(cl_button_command(&mut buttons, "-jump 32 1520", 1520));
        assert!(!buttons.in_jump.state.held());
    }

    #[test]
    fn cl_button_command_console_default_key() {
        let mut buttons = InputButtons::default();
        assert!(cl_button_command(&mut buttons, "+forward", 1000));
        assert_eq!(buttons.in_forward.down[0], -1);
        assert!(cl_button_command(&mut buttons, "-forward", 1100));
        assert_eq!(buttons.in_forward.state, ButtonState::IMPULSE_UP);
    }

    #[test]
    fn cl_button_command_rejects_unknown() {
        let mut buttons = InputButtons::default();
        assert!(!cl_button_command(&mut buttons, "+attack", 1000));
        assert!(!cl_button_command(&mut buttons, "set pm_gravity 20", 1000));
        assert!(!cl_button_command(&mut buttons, "", 1000));
    }

    // ========== movement commands ==========

    #[test]
    fn cl_cmd_from_axes_clamps() {
        let cmd = cl_cmd_from_axes(3.0, -2.0, ButtonState::empty());
        assert_eq!(cmd.forward, 1.0);
        assert_eq!(cmd.right, -1.0);
        let cmd = cl_cmd_from_axes(f32::NAN, 0.25, ButtonState::HELD);
        assert_eq!(cmd.forward, 0.0);
        assert_eq!(cmd.right, 0.25);
        assert!(cmd.jump.held());
    }

    #[test]
    fn cl_base_move_no_input_produces_zero_cmd() {
        let mut buttons = InputButtons::default();
        let cmd = cl_base_move(&mut buttons, 5000, 16);
        assert_eq!(cmd, MoveCmd::default());
    }

    #[test]
    fn cl_base_move_opposite_keys_cancel() {
        let mut buttons = InputButtons::default();
        key_down(&mut buttons.in_forward, 1, 4984, 4984);
        key_down(&mut buttons.in_back, 2, 4984, 4984);
        let cmd = cl_base_move(&mut buttons, 5000, 16);
        assert_eq!(cmd.forward, 0.0);
    }

    #[test]
    fn cl_base_move_strafe_left() {
        let mut buttons = InputButtons::default();
        key_down(&mut buttons.in_moveleft, 1, 4984, 4984);
        let cmd = cl_base_move(&mut buttons, 5000, 16);
        assert_eq!(cmd.right, -1.0);
    }

    #[test]
    fn cl_create_cmd_clamps_frame_msec() {
        let mut buttons = InputButtons::default();
        let mut timing = InputTiming::default();
        cl_create_cmd(&mut buttons, &mut timing, 5000);
        assert_eq!(timing.frame_msec, MAX_FRAME_MSEC);
        cl_create_cmd(&mut buttons, &mut timing, 5000);
        assert_eq!(timing.frame_msec, MIN_FRAME_MSEC);
        assert_eq!(timing.old_sys_frame_time, 5000);
    }

    #[test]
    fn cl_create_cmd_carries_jump_edge() {
        let mut buttons = InputButtons::default();
        let mut timing = InputTiming {
            frame_msec: 0,
            old_sys_frame_time: 1000,
        };
        cl_button_command(&mut buttons, "+jump 32 1005", 1005);
        let cmd = cl_create_cmd(&mut buttons, &mut timing, 1016);
        assert!(cmd.jump.pressed());
        let cmd = cl_create_cmd(&mut buttons, &mut timing, 1032);
        assert!(!cmd.jump.pressed());
        assert!(cmd.jump.held());
    }

    #[test]
    fn cl_adjust_yaw_turns_and_wraps() {
        let mut buttons = InputButtons::default();
        key_down(&mut buttons.in_left, 1, 900, 900);
        let mut yaw = 0.0;
        cl_adjust_yaw(&mut yaw, &mut buttons, &InputCvars::default(), 0.1, 1000, 100);
        assert!((yaw - (360.0 - 14.0)).abs() < 1e-3, "yaw={}", yaw);
    }
}

// sv_world.rs — flat test floor the simulator moves players on

use cpm_common::pmove::Mover;
use cpm_common::q_shared::{horizontal_length, vector_add, Vec3, AXIS_UP};

/// Infinite flat floor at `floor_height`. Anything at or below it is
/// pushed back up and counts as grounded.
#[derive(Debug, Clone)]
pub struct FloorMover {
    pub origin: Vec3,
    pub floor_height: f32,
    grounded: bool,
    /// Horizontal distance travelled so far.
    pub distance: f32,
}

impl FloorMover {
    pub fn new(origin: Vec3, floor_height: f32) -> Self {
        let mut mover = Self {
            origin,
            floor_height,
            grounded: false,
            distance: 0.0,
        };
        mover.clip_to_floor();
        mover
    }

    fn clip_to_floor(&mut self) {
        if self.origin[AXIS_UP] <= self.floor_height {
            self.origin[AXIS_UP] = self.floor_height;
            self.grounded = true;
        } else {
            self.grounded = false;
        }
    }
}

impl Mover for FloorMover {
    fn is_grounded(&self) -> bool {
        self.grounded
    }

    fn move_by(&mut self, displacement: &Vec3) {
        self.origin = vector_add(&self.origin, displacement);
        self.distance += horizontal_length(displacement);
        self.clip_to_floor();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpm_common::q_shared::{AXIS_X, VEC3_ORIGIN};

    #[test]
    fn test_spawn_on_floor_is_grounded() {
        let mover = FloorMover::new(VEC3_ORIGIN, 0.0);
        assert!(mover.is_grounded());
    }

    #[test]
    fn test_spawn_below_floor_is_pushed_up() {
        let mover = FloorMover::new([0.0, -3.0, 0.0], 1.0);
        assert_eq!(mover.origin[AXIS_UP], 1.0);
        assert!(mover.is_grounded());
    }

    #[test]
    fn test_move_up_leaves_ground_and_falls_back() {
        let mut mover = FloorMover::new(VEC3_ORIGIN, 0.0);
        mover.move_by(&[1.0, 0.5, 0.0]);
        assert!(!mover.is_grounded());
        assert_eq!(mover.origin[AXIS_X], 1.0);

        mover.move_by(&[0.0, -2.0, 0.0]);
        assert!(mover.is_grounded());
        assert_eq!(mover.origin[AXIS_UP], 0.0);
    }

    #[test]
    fn test_distance_ignores_vertical() {
        let mut mover = FloorMover::new(VEC3_ORIGIN, 0.0);
        mover.move_by(&[3.0, 10.0, 4.0]);
        mover.move_by(&[0.0, -20.0, 0.0]);
        assert!((mover.distance - 5.0).abs() < 1e-6);
    }
}

// Headless host: a flat test world, scripted input and the frame loop.

pub mod sv_world;
pub mod sv_bots;
pub mod sys_frame;

#![allow(clippy::float_cmp)]

pub mod cl_input;

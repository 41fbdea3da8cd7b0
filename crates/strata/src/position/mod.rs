//! Coordinate assignment.

pub mod bk;
mod x_coords;

pub use bk::{assign_y_coords, balance, candidate_layouts};
pub use x_coords::assign_x_coords;

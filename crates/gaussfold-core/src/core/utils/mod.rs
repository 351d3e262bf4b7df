pub mod geometry;
pub mod minimize;

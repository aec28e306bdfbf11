//! One-dimensional grid along the flame-normal coordinate.

pub mod grid1d;

pub use grid1d::{Geometry, OneDimGrid};

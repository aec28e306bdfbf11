//! Velocity carriers: the time-keyed profile series published by the UTW
//! phase, and the bilinear (x, t) lookup used on the quasi-2D path.

pub mod bilinear;
pub mod time_series;

pub use bilinear::BilinearInterpolator;
pub use time_series::VelocityTimeSeries;

//! Horizon geometry: sidereal time, fixed-body crossings and dark-sky
//! periods (the latter from siderust).

pub mod night;
pub mod rise_set;
pub mod sidereal;

pub use night::{is_dark, night_periods};
pub use rise_set::{fixed_body_rise_set, RiseSet};
pub use sidereal::{altitude, greenwich_mean_sidereal_time, local_sidereal_time};

//! Semantic value types crossing every component boundary: rationals with the
//! vendor's invalid sentinel, tagged mode values with total wire conversions,
//! sensitivity settings and the derived exposure-value/battery conversions.

pub use ev::*;
pub use iso::*;
pub use modes::*;
pub use rational::*;

mod ev;
mod iso;
mod modes;
mod rational;

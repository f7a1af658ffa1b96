//! Destination roulette: random featured destinations with live prices.

pub mod geo;
pub mod selector;

pub use selector::{SpinCandidate, SpinPreferences, SpinRequest, SpinResult, WheelConfig, WheelSelector};

//! Time handling: the clock abstraction the engine reads "now" from.

pub mod source;

pub use source::{ManualClock, RealClock, TimeSource};

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Shared wire model + cache policies for the washboard daemon and display agents.

pub mod api;
pub mod fingerprint;
pub mod hysteresis;
pub mod jitter;
pub mod model;
pub mod snapshot;
pub mod staleness;
pub mod time;

pub use fingerprint::*;
pub use hysteresis::*;
pub use jitter::*;
pub use model::*;
pub use snapshot::*;
pub use staleness::*;
pub use time::*;

//! Coordination primitives shared by both pipelines
//!
//! # Components
//!
//! - `Limiter`: caps concurrent requests per resource class
//! - `Barrier`: detects when no work is left anywhere
//! - `Supervisor`: runs tasks in isolation and escalates their failures

mod barrier;
mod limiter;
mod supervisor;

pub use barrier::{Barrier, Registration};
pub use limiter::{Limiter, LimiterPermit};
pub use supervisor::{FatalReceiver, Supervisor};

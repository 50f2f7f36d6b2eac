//! Synchronisation planning and orchestration
//!
//! - [`planner`]: detections plus pre-roll to trim instructions
//! - [`session`]: decode, detect, plan, trim and burst one pair of streams

pub mod planner;
pub mod session;

//! Utility Module
//!
//! - [`Clock`]: frame clock with optional XR session ownership
//! - [`FlyController`]: first-person camera controller

pub mod fly_control;
pub mod time;

pub use fly_control::FlyController;
pub use time::{Clock, FramePacing};

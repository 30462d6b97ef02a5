//! # hmdtrack - user-space driver for the Oculus Rift DK2
//!
//! Talks to the headset over hidraw using hidapi. Provides:
//! - Feature report codecs for configuration, calibration and LED control
//! - LED model and IMU position loading from the headset's calibration tables
//! - Sensor message decoding into IMU samples with timing checks
//! - A device registry that pairs the headset with its tracking camera
//!
//! ## Quick Start
//! ```no_run
//! use hmdtrack::{hotplug, DriverConfig, LogTracker, Registry, Tracker};
//! use std::sync::Arc;
//!
//! let mut registry = Registry::new(
//!     DriverConfig::from_env(),
//!     Box::new(|| Arc::new(LogTracker::new("hmd")) as Arc<dyn Tracker>),
//! );
//! for event in hotplug::enumerate_hidraw().unwrap() {
//!     registry.handle_event(&event);
//! }
//! registry.shutdown();
//! ```

pub mod error;
pub mod types;
pub mod protocol;
pub mod reports;
pub mod hid;
pub mod calibration;
pub mod sensor;
pub mod tracker;
pub mod config;
pub mod device;
pub mod rift;
pub mod camera;
pub mod registry;
pub mod hotplug;

#[cfg(test)]
mod testing;

pub use config::DriverConfig;
pub use device::{Device, DeviceControls};
pub use error::{ErrorKind, HmdError};
pub use hotplug::{HotplugAction, HotplugEvent};
pub use registry::Registry;
pub use tracker::{LogTracker, Tracker, TrackerLink};
pub use types::*;

/// Result type alias for hmdtrack operations.
pub type Result<T> = std::result::Result<T, HmdError>;

use crate::camera::CameraDk2;
use crate::config::DriverConfig;
use crate::rift::RiftDk2;
use crate::tracker::{Tracker, TrackerFactory, TrackerLink};
use crate::types::{DeviceKind, DeviceState};
use crate::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How long a device loop waits for input before doing housekeeping.
pub const POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// Flags shared between the control thread and a device thread.
#[derive(Debug)]
pub struct DeviceControls {
    active: AtomicBool,
    blink: AtomicBool,
    blink_changed: AtomicBool,
}

impl DeviceControls {
    pub fn new(blink: bool) -> Self {
        Self {
            active: AtomicBool::new(false),
            blink: AtomicBool::new(blink),
            blink_changed: AtomicBool::new(false),
        }
    }

    /// Whether the device loop should keep running.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Relaxed);
    }

    pub fn blink(&self) -> bool {
        self.blink.load(Ordering::Relaxed)
    }

    /// Select blinking or steady tracking LEDs. A running device picks the
    /// change up on its next loop iteration.
    pub fn set_blink(&self, blink: bool) {
        if self.blink.swap(blink, Ordering::Relaxed) != blink {
            self.blink_changed.store(true, Ordering::Release);
        }
    }

    /// The new blink mode, if it changed since the last call.
    pub(crate) fn take_blink_change(&self) -> Option<bool> {
        if self.blink_changed.swap(false, Ordering::Acquire) {
            Some(self.blink())
        } else {
            None
        }
    }
}

/// Builds a device for a matched device node.
pub type DeviceConstructor = fn(&str, &DriverConfig, &TrackerFactory) -> Device;

/// Every supported piece of hardware.
pub enum Device {
    RiftDk2(RiftDk2),
    CameraDk2(CameraDk2),
}

impl Device {
    pub fn new_rift_dk2(devnode: &str, config: &DriverConfig, trackers: &TrackerFactory) -> Device {
        Device::RiftDk2(RiftDk2::new(devnode, trackers(), config.clone()))
    }

    pub fn new_camera_dk2(
        devnode: &str,
        _config: &DriverConfig,
        _trackers: &TrackerFactory,
    ) -> Device {
        Device::CameraDk2(CameraDk2::new(devnode))
    }

    pub fn kind(&self) -> DeviceKind {
        match self {
            Device::RiftDk2(_) => DeviceKind::Hmd,
            Device::CameraDk2(_) => DeviceKind::Camera,
        }
    }

    pub fn devnode(&self) -> &str {
        match self {
            Device::RiftDk2(d) => d.devnode(),
            Device::CameraDk2(d) => d.devnode(),
        }
    }

    pub fn state(&self) -> DeviceState {
        match self {
            Device::RiftDk2(d) => d.state(),
            Device::CameraDk2(d) => d.state(),
        }
    }

    pub fn controls(&self) -> &Arc<DeviceControls> {
        match self {
            Device::RiftDk2(d) => d.controls(),
            Device::CameraDk2(d) => d.controls(),
        }
    }

    /// The tracking context this device feeds, for HMDs.
    pub fn tracker(&self) -> Option<Arc<dyn Tracker>> {
        match self {
            Device::RiftDk2(d) => d.tracker().cloned(),
            Device::CameraDk2(_) => None,
        }
    }

    /// The slot through which a camera borrows an HMD's tracking context.
    pub fn tracker_link(&self) -> Option<TrackerLink> {
        match self {
            Device::RiftDk2(_) => None,
            Device::CameraDk2(d) => Some(d.tracker_link().clone()),
        }
    }

    /// Open and configure the device.
    pub fn start(&mut self) -> Result<()> {
        match self {
            Device::RiftDk2(d) => d.start(),
            Device::CameraDk2(d) => d.start(),
        }
    }

    /// Service the device until it is deactivated or goes away.
    pub fn run(&mut self) -> Result<()> {
        match self {
            Device::RiftDk2(d) => d.run(),
            Device::CameraDk2(d) => d.run(),
        }
    }

    /// Undo the streaming configuration and leave the device idle.
    pub fn stop(&mut self) {
        match self {
            Device::RiftDk2(d) => d.stop(),
            Device::CameraDk2(d) => d.stop(),
        }
    }
}

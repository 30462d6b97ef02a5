use crate::config::DriverConfig;
use crate::device::{Device, DeviceConstructor, DeviceControls};
use crate::hotplug::{HotplugAction, HotplugEvent};
use crate::protocol::{PID_CAMERA_DK2, PID_RIFT_DK2, VID_OCULUSVR};
use crate::tracker::{Tracker, TrackerFactory, TrackerLink};
use crate::types::DeviceKind;
use crate::{HmdError, Result};
use std::sync::Arc;
use std::thread::JoinHandle;

/// A known piece of hardware.
pub struct DeviceMatchEntry {
    pub vendor_id: u16,
    pub product_id: u16,
    /// Kernel subsystem of the device node.
    pub subsystem: &'static str,
    /// USB interface the node must belong to.
    pub interface: i32,
    pub name: &'static str,
    pub kind: DeviceKind,
    pub new: DeviceConstructor,
}

pub static DEVICE_MATCHES: &[DeviceMatchEntry] = &[
    DeviceMatchEntry {
        vendor_id: VID_OCULUSVR,
        product_id: PID_RIFT_DK2,
        subsystem: "hidraw",
        interface: 0,
        name: "Rift DK2",
        kind: DeviceKind::Hmd,
        new: Device::new_rift_dk2,
    },
    DeviceMatchEntry {
        vendor_id: VID_OCULUSVR,
        product_id: PID_CAMERA_DK2,
        subsystem: "video4linux",
        interface: 0,
        name: "Camera DK2",
        kind: DeviceKind::Camera,
        new: Device::new_camera_dk2,
    },
];

/// Look up the table entry for a device node. Every field must match.
pub fn match_device(
    vendor_id: u16,
    product_id: u16,
    subsystem: &str,
    interface: i32,
) -> Option<&'static DeviceMatchEntry> {
    DEVICE_MATCHES.iter().find(|m| {
        m.vendor_id == vendor_id
            && m.product_id == product_id
            && m.subsystem == subsystem
            && m.interface == interface
    })
}

/// One active device as seen by the registry.
pub struct DeviceRecord {
    pub devnode: String,
    pub name: String,
    pub kind: DeviceKind,
    pub serial: Option<String>,
    controls: Arc<DeviceControls>,
    /// Tracking context fed by this device, for HMDs.
    tracker: Option<Arc<dyn Tracker>>,
    /// Borrowed tracking context, for cameras.
    link: Option<TrackerLink>,
    thread: Option<JoinHandle<Device>>,
}

impl DeviceRecord {
    pub fn new(device: &Device, name: &str, serial: Option<String>) -> Self {
        Self {
            devnode: device.devnode().to_string(),
            name: name.to_string(),
            kind: device.kind(),
            serial,
            controls: device.controls().clone(),
            tracker: device.tracker(),
            link: device.tracker_link(),
            thread: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.controls.is_active()
    }

    pub fn controls(&self) -> &Arc<DeviceControls> {
        &self.controls
    }

    pub fn tracker(&self) -> Option<&Arc<dyn Tracker>> {
        self.tracker.as_ref()
    }

    pub fn tracker_link(&self) -> Option<&TrackerLink> {
        self.link.as_ref()
    }

    /// Deactivate the device, wait for its thread and stop it.
    fn shutdown(&mut self) {
        self.controls.set_active(false);
        if let Some(thread) = self.thread.take() {
            match thread.join() {
                Ok(mut device) => device.stop(),
                Err(_) => log::error!("{}: Device thread panicked", self.devnode),
            }
        }
    }
}

/// Links `camera` to the tracking context of `hmd`.
fn associate(camera: &DeviceRecord, hmd: &DeviceRecord) {
    if let (Some(link), Some(tracker)) = (camera.link.as_ref(), hmd.tracker.as_ref()) {
        if link.install(tracker) {
            log::info!("Associate {} and {}", camera.devnode, hmd.devnode);
        }
    }
}

/// Owner of every active device.
pub struct Registry {
    config: DriverConfig,
    trackers: Box<TrackerFactory>,
    records: Vec<DeviceRecord>,
}

impl Registry {
    pub fn new(config: DriverConfig, trackers: Box<TrackerFactory>) -> Self {
        Self {
            config,
            trackers,
            records: Vec::new(),
        }
    }

    pub fn records(&self) -> &[DeviceRecord] {
        &self.records
    }

    pub fn get(&self, devnode: &str) -> Option<&DeviceRecord> {
        self.records.iter().find(|r| r.devnode == devnode)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Dispatch one hotplug event.
    pub fn handle_event(&mut self, event: &HotplugEvent) {
        match event.action {
            HotplugAction::Add => {
                if let Err(e) = self.add_device(event) {
                    log::warn!("{}: Not started: {}", event.devnode, e);
                }
            }
            HotplugAction::Remove => self.unregister(&event.devnode),
        }
    }

    /// Instantiate, start and register the driver for a new device node.
    ///
    /// Returns `Ok(false)` if the node is not known hardware.
    pub fn add_device(&mut self, event: &HotplugEvent) -> Result<bool> {
        let Some(entry) = match_device(
            event.vendor_id,
            event.product_id,
            &event.subsystem,
            event.interface,
        ) else {
            return Ok(false);
        };

        if self.get(&event.devnode).is_some() {
            log::debug!("{}: Already registered", event.devnode);
            return Ok(true);
        }

        log::info!("Found {}: {}", entry.name, event.devnode);
        if let Some(serial) = &event.serial {
            log::info!("{}: Serial {}", entry.name, serial);
        }

        let mut device = (entry.new)(&event.devnode, &self.config, &*self.trackers);
        device.start()?;

        let mut record = DeviceRecord::new(&device, entry.name, event.serial.clone());
        record.controls.set_active(true);
        let thread = std::thread::Builder::new()
            .name(format!("hmdtrack-{}", entry.name.to_ascii_lowercase().replace(' ', "-")))
            .spawn(move || {
                if let Err(e) = device.run() {
                    log::warn!("{}: {}", device.devnode(), e);
                }
                device
            })
            .map_err(|e| HmdError::Transport(format!("Failed to spawn device thread: {}", e)))?;
        record.thread = Some(thread);

        self.register(record);
        Ok(true)
    }

    /// Take ownership of a record. If it shares its serial with exactly one
    /// HMD and one camera, the camera is linked to the HMD.
    pub fn register(&mut self, record: DeviceRecord) {
        let serial = record.serial.clone();
        self.records.push(record);

        let Some(serial) = serial else {
            return;
        };
        let siblings: Vec<&DeviceRecord> = self
            .records
            .iter()
            .filter(|r| r.serial.as_deref() == Some(serial.as_str()))
            .collect();
        let hmds: Vec<_> = siblings.iter().filter(|r| r.kind == DeviceKind::Hmd).collect();
        let cameras: Vec<_> = siblings
            .iter()
            .filter(|r| r.kind == DeviceKind::Camera)
            .collect();

        if let ([hmd], [camera]) = (hmds.as_slice(), cameras.as_slice()) {
            associate(camera, hmd);
        } else if hmds.len() > 1 || cameras.len() > 1 {
            log::warn!("Serial {} is ambiguous, not associating", serial);
        }
    }

    /// Select blinking or steady tracking LEDs on the device at `devnode`.
    pub fn set_blink(&self, devnode: &str, blink: bool) -> bool {
        match self.get(devnode) {
            Some(record) => {
                record.controls.set_blink(blink);
                true
            }
            None => false,
        }
    }

    /// Stop and drop the device at `devnode`. Unknown nodes are ignored.
    pub fn unregister(&mut self, devnode: &str) {
        let Some(pos) = self.records.iter().position(|r| r.devnode == devnode) else {
            return;
        };

        log::info!("Removing device: {}", devnode);
        let mut record = self.records.remove(pos);
        record.shutdown();
    }

    /// Stop every device and wait for their threads.
    pub fn shutdown(&mut self) {
        if !self.records.is_empty() {
            log::info!("Stopping all devices");
        }
        for mut record in self.records.drain(..) {
            record.shutdown();
        }
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

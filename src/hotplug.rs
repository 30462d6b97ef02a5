use crate::registry::Registry;
use crate::{HmdError, Result};
use crossbeam_channel::{Receiver, Sender};
use hidapi::{DeviceInfo, HidApi};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotplugAction {
    Add,
    Remove,
}

/// A device node appearing or going away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotplugEvent {
    pub action: HotplugAction,
    pub devnode: String,
    pub subsystem: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub interface: i32,
    pub serial: Option<String>,
}

impl HotplugEvent {
    fn from_hid(info: &DeviceInfo) -> Self {
        Self {
            action: HotplugAction::Add,
            devnode: info.path().to_string_lossy().into_owned(),
            subsystem: "hidraw".to_string(),
            vendor_id: info.vendor_id(),
            product_id: info.product_id(),
            interface: info.interface_number(),
            serial: info
                .serial_number()
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        }
    }

    /// The same device with a different action.
    pub fn with_action(&self, action: HotplugAction) -> Self {
        Self {
            action,
            ..self.clone()
        }
    }
}

/// Synthetic add events for every hidraw node currently present.
pub fn enumerate_hidraw() -> Result<Vec<HotplugEvent>> {
    let api = HidApi::new()?;
    let mut events: Vec<HotplugEvent> = api.device_list().map(HotplugEvent::from_hid).collect();
    events.sort_by(|a, b| a.devnode.cmp(&b.devnode));
    events.dedup_by(|a, b| a.devnode == b.devnode);
    Ok(events)
}

/// Events turning the `previous` device set into `current`.
pub fn diff(previous: &[HotplugEvent], current: &[HotplugEvent]) -> Vec<HotplugEvent> {
    let removed = previous
        .iter()
        .filter(|p| !current.iter().any(|c| c.devnode == p.devnode))
        .map(|p| p.with_action(HotplugAction::Remove));
    let added = current
        .iter()
        .filter(|c| !previous.iter().any(|p| p.devnode == c.devnode))
        .map(|c| c.with_action(HotplugAction::Add));
    removed.chain(added).collect()
}

/// Background thread that re-enumerates hidraw devices and reports changes.
pub struct HotplugMonitor {
    receiver: Receiver<HotplugEvent>,
    stop_flag: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl HotplugMonitor {
    /// Start polling. Devices already present are reported as added first.
    pub fn start(interval: Duration) -> Result<HotplugMonitor> {
        let (sender, receiver) = crossbeam_channel::bounded(64);
        let stop_flag = Arc::new(AtomicBool::new(false));
        let stop_clone = stop_flag.clone();

        let thread = std::thread::Builder::new()
            .name("hmdtrack-hotplug".into())
            .spawn(move || monitor_loop(interval, sender, stop_clone))
            .map_err(|e| HmdError::Transport(format!("Failed to spawn hotplug thread: {}", e)))?;

        Ok(HotplugMonitor {
            receiver,
            stop_flag,
            thread: Some(thread),
        })
    }

    pub fn events(&self) -> &Receiver<HotplugEvent> {
        &self.receiver
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for HotplugMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn monitor_loop(interval: Duration, sender: Sender<HotplugEvent>, stop_flag: Arc<AtomicBool>) {
    let mut present = Vec::new();
    let tick = Duration::from_millis(100).min(interval);

    while !stop_flag.load(Ordering::Relaxed) {
        match enumerate_hidraw() {
            Ok(current) => {
                for event in diff(&present, &current) {
                    if sender.send(event).is_err() {
                        log::info!("Hotplug channel disconnected, stopping monitor");
                        return;
                    }
                }
                present = current;
            }
            Err(e) => log::warn!("Enumeration failed: {}", e),
        }

        let mut waited = Duration::ZERO;
        while waited < interval && !stop_flag.load(Ordering::Relaxed) {
            std::thread::sleep(tick);
            waited += tick;
        }
    }
}

/// Dispatch hotplug events to the registry until `shutdown` fires, then stop
/// every device.
pub fn run_control_loop(
    registry: &mut Registry,
    events: &Receiver<HotplugEvent>,
    shutdown: &Receiver<()>,
) {
    loop {
        crossbeam_channel::select! {
            recv(events) -> event => match event {
                Ok(event) => registry.handle_event(&event),
                Err(_) => {
                    log::debug!("Hotplug source closed");
                    let _ = shutdown.recv();
                    break;
                }
            },
            recv(shutdown) -> _ => break,
        }
    }

    registry.shutdown();
}

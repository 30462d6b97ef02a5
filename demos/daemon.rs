//! Drive every connected Rift DK2 until Enter is pressed.
//!
//! Usage: cargo run --example daemon [camera-devnode [camera-serial]]
//!
//! Headsets are found by polling hidapi. The DK2 camera is a video node, so
//! it is only picked up when named on the command line.

use hmdtrack::hotplug::{self, HotplugMonitor};
use hmdtrack::protocol::{PID_CAMERA_DK2, VID_OCULUSVR};
use hmdtrack::{DriverConfig, HotplugAction, HotplugEvent, LogTracker, Registry, Tracker};
use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;

fn main() {
    env_logger::init();

    let config = DriverConfig::from_env();
    println!("Config: {:?}", config);

    let mut registry = Registry::new(
        config,
        Box::new(|| Arc::new(LogTracker::new("rift-dk2")) as Arc<dyn Tracker>),
    );

    let mut args = std::env::args().skip(1);
    if let Some(devnode) = args.next() {
        registry.handle_event(&HotplugEvent {
            action: HotplugAction::Add,
            devnode,
            subsystem: "video4linux".to_string(),
            vendor_id: VID_OCULUSVR,
            product_id: PID_CAMERA_DK2,
            interface: 0,
            serial: args.next(),
        });
    }

    let monitor = match HotplugMonitor::start(Duration::from_secs(2)) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
    std::thread::spawn(move || {
        let mut line = String::new();
        let _ = std::io::stdin().lock().read_line(&mut line);
        let _ = shutdown_tx.send(());
    });

    println!("Running, press Enter to stop");
    hotplug::run_control_loop(&mut registry, monitor.events(), &shutdown_rx);
    monitor.stop();
    println!("Stopped");
}

use crate::types::{ImuSample, LedModel, SensorMetadata};
use std::sync::{Arc, Mutex, Weak};

/// Consumer of LED models and IMU telemetry.
///
/// Implemented by the pose tracker. All calls are fire-and-forget and may
/// arrive from any device thread.
pub trait Tracker: Send + Sync {
    /// Publish the LED constellation of a started HMD.
    fn register_leds(&self, leds: Weak<LedModel>);

    /// Withdraw a model previously passed to `register_leds`.
    fn unregister_leds(&self, leds: &Weak<LedModel>);

    /// Feed one IMU sample, in arrival order.
    fn push_imu_sample(&self, sample: &ImuSample);

    /// Frame and exposure bookkeeping of one sensor message.
    fn push_sensor_metadata(&self, _metadata: &SensorMetadata) {}
}

/// Creates a fresh tracking context for a newly discovered HMD.
pub type TrackerFactory = dyn Fn() -> Arc<dyn Tracker> + Send + Sync;

/// Non-owning reference from a camera to the tracking context of the HMD
/// it belongs to.
///
/// Cloned handles share the same slot, so the registry can fill it in
/// while the camera thread is already running.
#[derive(Clone, Default)]
pub struct TrackerLink {
    slot: Arc<Mutex<Option<Weak<dyn Tracker>>>>,
}

impl TrackerLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point the link at `tracker`. Returns false if it already did.
    pub fn install(&self, tracker: &Arc<dyn Tracker>) -> bool {
        let mut slot = match self.slot.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(current) = slot.as_ref().and_then(Weak::upgrade) {
            if Arc::ptr_eq(&current, tracker) {
                return false;
            }
        }
        *slot = Some(Arc::downgrade(tracker));
        true
    }

    pub fn clear(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
    }

    /// The linked tracking context, if it is still alive.
    pub fn get(&self) -> Option<Arc<dyn Tracker>> {
        self.slot.lock().ok()?.as_ref().and_then(Weak::upgrade)
    }

    pub fn is_linked(&self) -> bool {
        self.get().is_some()
    }
}

impl std::fmt::Debug for TrackerLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerLink")
            .field("linked", &self.is_linked())
            .finish()
    }
}

/// Tracker that only logs what it is given.
#[derive(Debug, Default)]
pub struct LogTracker {
    name: String,
}

impl LogTracker {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Tracker for LogTracker {
    fn register_leds(&self, leds: Weak<LedModel>) {
        if let Some(model) = leds.upgrade() {
            log::info!("{}: registered {} LEDs", self.name, model.len());
        }
    }

    fn unregister_leds(&self, _leds: &Weak<LedModel>) {
        log::info!("{}: unregistered LEDs", self.name);
    }

    fn push_imu_sample(&self, sample: &ImuSample) {
        log::trace!(
            "{}: t={:.6} accel={:?} gyro={:?}",
            self.name,
            sample.time,
            sample.acceleration,
            sample.angular_velocity
        );
    }
}

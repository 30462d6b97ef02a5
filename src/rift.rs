use crate::calibration::load_led_model;
use crate::config::DriverConfig;
use crate::device::{DeviceControls, POLL_TIMEOUT};
use crate::hid::{get_feature_report, set_feature_report, HidTransport, ReadEvent, Transport};
use crate::protocol::{MIN_REPORT_RATE, SENSOR_MESSAGE_SIZE};
use crate::reports::{
    ConfigReport, DisplayReport, KeepaliveReport, TrackingFlags, TrackingReport,
};
use crate::sensor::decode_sensor_message;
use crate::tracker::Tracker;
use crate::types::{DeviceConfig, DeviceState, ImuCalibrationPosition, LedModel};
use crate::{HmdError, Result};
use std::sync::Arc;

/// Sensor messages allowed per report-rate Hz before the keepalive is
/// refreshed. The device stops streaming ~10 s after the last one.
const KEEPALIVE_BUDGET_SECS: u32 = 9;

/// Counters kept by the poll loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub messages: u64,
    pub samples: u64,
    pub keepalives: u64,
    pub short_reads: u64,
    pub decode_errors: u64,
    pub timing_anomalies: u64,
}

/// Whether the poll loop should go on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Exit,
}

/// Rift DK2 head-mounted display.
///
/// Reads the LED constellation at start, streams IMU samples into its
/// tracking context while running, and leaves the LEDs off and the report
/// rate low when stopped.
pub struct RiftDk2 {
    devnode: String,
    transport: Option<Box<dyn Transport>>,
    tracker: Option<Arc<dyn Tracker>>,
    controls: Arc<DeviceControls>,
    config: DriverConfig,
    state: DeviceState,
    rates: DeviceConfig,
    leds: Arc<LedModel>,
    imu_position: ImuCalibrationPosition,
    last_sample_timestamp: Option<u32>,
    messages_since_keepalive: u32,
    stats: StreamStats,
}

impl RiftDk2 {
    pub fn new(devnode: &str, tracker: Arc<dyn Tracker>, config: DriverConfig) -> Self {
        Self {
            devnode: devnode.to_string(),
            transport: None,
            tracker: Some(tracker),
            controls: Arc::new(DeviceControls::new(config.blink)),
            config,
            state: DeviceState::Closed,
            rates: DeviceConfig::default(),
            leds: Arc::new(LedModel::default()),
            imu_position: ImuCalibrationPosition::default(),
            last_sample_timestamp: None,
            messages_since_keepalive: 0,
            stats: StreamStats::default(),
        }
    }

    /// Use an already opened transport instead of opening `devnode`.
    pub fn with_transport(mut self, transport: Box<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn devnode(&self) -> &str {
        &self.devnode
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn controls(&self) -> &Arc<DeviceControls> {
        &self.controls
    }

    pub fn tracker(&self) -> Option<&Arc<dyn Tracker>> {
        self.tracker.as_ref()
    }

    pub fn leds(&self) -> &Arc<LedModel> {
        &self.leds
    }

    pub fn imu_position(&self) -> ImuCalibrationPosition {
        self.imu_position
    }

    /// Currently negotiated sample and report rates.
    pub fn rates(&self) -> DeviceConfig {
        self.rates
    }

    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    fn transport(&self) -> Result<&dyn Transport> {
        self.transport.as_deref().ok_or(HmdError::NotOpen)
    }

    /// Read back the current sensor configuration.
    pub fn read_config(&mut self) -> Result<DeviceConfig> {
        let report: ConfigReport = get_feature_report(self.transport()?)?;
        self.rates = DeviceConfig::from_packet_interval(report.sample_rate, report.packet_interval)
            .with_flags(report.flags);
        log::info!(
            "{}: Got sample rate {} Hz, report rate {} Hz, flags: {:?}",
            self.devnode,
            self.rates.sample_rate,
            self.rates.report_rate,
            report.flags
        );
        Ok(self.rates)
    }

    /// Set the sensor report rate, clamped to `[5, sample_rate]` Hz.
    pub fn set_report_rate(&mut self, report_rate: u16) -> Result<DeviceConfig> {
        let transport = self.transport()?;
        let mut report: ConfigReport = get_feature_report(transport)?;

        let sample_rate = report.sample_rate;
        let report_rate = report_rate.min(sample_rate).max(MIN_REPORT_RATE);
        report.packet_interval = (sample_rate / report_rate)
            .saturating_sub(1)
            .min(u8::MAX as u16) as u8;

        log::info!(
            "{}: Set sample rate {} Hz, report rate {} Hz",
            self.devnode,
            sample_rate,
            report.report_rate()
        );
        set_feature_report(transport, &report)?;

        self.rates = DeviceConfig::from_packet_interval(sample_rate, report.packet_interval)
            .with_flags(report.flags);
        Ok(self.rates)
    }

    /// Keep the sensor streaming for another 10 seconds.
    pub fn send_keepalive(&mut self) -> Result<()> {
        self.messages_since_keepalive = 0;
        self.stats.keepalives += 1;
        set_feature_report(self.transport()?, &KeepaliveReport::default())
    }

    /// Enable the IR tracking LEDs, blinking or steady.
    pub fn send_tracking(&self, blink: bool) -> Result<()> {
        set_feature_report(self.transport()?, &TrackingReport::enabled(blink))
    }

    /// Configure display persistence and frame id pixel readback.
    pub fn send_display(&self, low_persistence: bool, pixel_readback: bool) -> Result<()> {
        let transport = self.transport()?;
        let mut report: DisplayReport = get_feature_report(transport)?;
        report.configure(low_persistence, pixel_readback);
        set_feature_report(transport, &report)
    }

    fn disable_tracking(&self) -> Result<()> {
        let transport = self.transport()?;
        let mut report: TrackingReport = get_feature_report(transport)?;
        report.flags.remove(TrackingFlags::ENABLE);
        set_feature_report(transport, &report)
    }

    /// Open the device if needed, read calibration, configure streaming and
    /// register the LED model with the tracker.
    ///
    /// A failure leaves whatever was already configured in place; the next
    /// `start` re-applies everything.
    pub fn start(&mut self) -> Result<()> {
        self.state = DeviceState::Configuring;

        if self.transport.is_none() {
            let transport = HidTransport::open(&self.devnode).inspect_err(|e| {
                log::warn!("{}: Failed to open: {}", self.devnode, e);
            })?;
            self.transport = Some(Box::new(transport));
        }

        let (leds, imu_position) = load_led_model(self.transport()?)?;
        self.leds = Arc::new(leds);
        self.imu_position = imu_position;

        self.read_config()?;
        self.set_report_rate(self.config.report_rate)?;
        self.send_tracking(self.controls.blink())?;
        self.send_display(self.config.low_persistence, self.config.pixel_readback)?;
        // Pending blink changes are covered by the tracking report above.
        let _ = self.controls.take_blink_change();

        match &self.tracker {
            Some(tracker) => tracker.register_leds(Arc::downgrade(&self.leds)),
            None => log::debug!("{}: No tracker to register LEDs with", self.devnode),
        }

        self.last_sample_timestamp = None;
        self.messages_since_keepalive = 0;
        self.state = DeviceState::Streaming;
        Ok(())
    }

    /// Poll for sensor messages until deactivated or the device hangs up.
    pub fn run(&mut self) -> Result<()> {
        if self.state != DeviceState::Streaming {
            return Err(HmdError::NotStarted);
        }

        log::info!("{}: Sending keepalive", self.devnode);
        self.keepalive();

        let mut buf = [0u8; SENSOR_MESSAGE_SIZE];
        while self.controls.is_active() {
            if self.step(&mut buf) == LoopControl::Exit {
                break;
            }
        }

        log::info!("{}: Poll loop finished: {:?}", self.devnode, self.stats);
        Ok(())
    }

    /// One iteration of the poll loop.
    pub fn step(&mut self, buf: &mut [u8; SENSOR_MESSAGE_SIZE]) -> LoopControl {
        if let Some(blink) = self.controls.take_blink_change() {
            if let Err(e) = self.send_tracking(blink) {
                log::warn!("{}: Failed to update tracking LEDs: {}", self.devnode, e);
            }
        }

        let event = match self.transport.as_deref() {
            Some(transport) => transport.read_timeout(buf, POLL_TIMEOUT),
            None => return LoopControl::Exit,
        };

        let len = match event {
            Ok(ReadEvent::Data(len)) => len,
            Ok(ReadEvent::Hangup) => {
                log::info!("{}: Device hung up", self.devnode);
                self.hangup();
                return LoopControl::Exit;
            }
            Ok(ReadEvent::Timeout) => {
                log::info!("{}: Resending keepalive", self.devnode);
                self.keepalive();
                return LoopControl::Continue;
            }
            Err(e) => {
                log::warn!("{}: Read error: {}", self.devnode, e);
                self.keepalive();
                return LoopControl::Continue;
            }
        };

        if self.messages_since_keepalive > KEEPALIVE_BUDGET_SECS * self.rates.report_rate as u32 {
            self.keepalive();
        }

        if len < SENSOR_MESSAGE_SIZE {
            log::warn!(
                "{}: Error, invalid {}-byte report 0x{:02x}",
                self.devnode,
                len,
                buf[0]
            );
            self.stats.short_reads += 1;
            return LoopControl::Continue;
        }

        self.handle_sensor_message(&buf[..len]);
        LoopControl::Continue
    }

    /// The node is gone: nothing more can be sent to it.
    fn hangup(&mut self) {
        self.controls.set_active(false);
        self.transport = None;
        self.state = DeviceState::Stopped;
    }

    fn keepalive(&mut self) {
        if let Err(e) = self.send_keepalive() {
            log::warn!("{}: Failed to send keepalive: {}", self.devnode, e);
        }
    }

    fn handle_sensor_message(&mut self, buf: &[u8]) {
        let message = match decode_sensor_message(buf, self.last_sample_timestamp, &self.rates) {
            Ok(message) => message,
            Err(e) => {
                log::warn!("{}: Dropping sensor message: {}", self.devnode, e);
                self.stats.decode_errors += 1;
                return;
            }
        };

        self.last_sample_timestamp = Some(message.timestamp_us);
        self.messages_since_keepalive += 1;
        self.stats.messages += 1;
        self.stats.samples += message.samples.len() as u64;
        if message.timing.is_some() {
            self.stats.timing_anomalies += 1;
        }

        if let Some(tracker) = &self.tracker {
            for sample in &message.samples {
                tracker.push_imu_sample(sample);
            }
            tracker.push_sensor_metadata(&message.metadata);
        }
    }

    /// Unregister the LED model, turn the tracking LEDs off and drop to the
    /// idle report rate. Failures are logged; the device always ends up
    /// `Stopped`.
    pub fn stop(&mut self) {
        if let Some(tracker) = self.tracker.take() {
            tracker.unregister_leds(&Arc::downgrade(&self.leds));
        }

        if self.transport.is_some() {
            if let Err(e) = self.disable_tracking() {
                log::warn!("{}: Failed to disable tracking LEDs: {}", self.devnode, e);
            }
            if let Err(e) = self.set_report_rate(self.config.idle_report_rate) {
                log::warn!("{}: Failed to lower report rate: {}", self.devnode, e);
            }
        }

        self.state = DeviceState::Stopped;
    }
}

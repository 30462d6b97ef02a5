use crate::device::{DeviceControls, POLL_TIMEOUT};
use crate::tracker::TrackerLink;
use crate::types::DeviceState;
use crate::{HmdError, Result};
use std::fs::{File, OpenOptions};
use std::sync::Arc;

/// DK2 positional tracking camera.
///
/// Frames are consumed elsewhere; this side keeps the video node open and
/// holds the link to the tracking context of the HMD it belongs to.
pub struct CameraDk2 {
    devnode: String,
    file: Option<File>,
    link: TrackerLink,
    controls: Arc<DeviceControls>,
    state: DeviceState,
}

impl CameraDk2 {
    pub fn new(devnode: &str) -> Self {
        Self {
            devnode: devnode.to_string(),
            file: None,
            link: TrackerLink::new(),
            controls: Arc::new(DeviceControls::new(false)),
            state: DeviceState::Closed,
        }
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

    pub fn tracker_link(&self) -> &TrackerLink {
        &self.link
    }

    pub fn start(&mut self) -> Result<()> {
        self.state = DeviceState::Configuring;

        if self.file.is_none() {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(&self.devnode)
                .map_err(|source| HmdError::Open {
                    devnode: self.devnode.clone(),
                    source,
                })?;
            self.file = Some(file);
        }

        if self.link.is_linked() {
            log::info!("{}: Using HMD tracking context", self.devnode);
        } else {
            log::info!("{}: No associated HMD yet", self.devnode);
        }

        self.state = DeviceState::Streaming;
        Ok(())
    }

    pub fn run(&mut self) -> Result<()> {
        if self.state != DeviceState::Streaming {
            return Err(HmdError::NotStarted);
        }

        let mut linked = self.link.is_linked();
        while self.controls.is_active() {
            std::thread::sleep(POLL_TIMEOUT);

            let now_linked = self.link.is_linked();
            if now_linked != linked {
                if now_linked {
                    log::info!("{}: Associated with HMD tracking context", self.devnode);
                } else {
                    log::info!("{}: HMD tracking context went away", self.devnode);
                }
                linked = now_linked;
            }
        }
        Ok(())
    }

    pub fn stop(&mut self) {
        self.link.clear();
        self.file = None;
        self.state = DeviceState::Stopped;
    }
}

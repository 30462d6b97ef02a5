//! Scripted transport and recording tracker for unit tests.

use crate::hid::{ReadEvent, Transport};
use crate::tracker::Tracker;
use crate::types::{ImuSample, LedModel, SensorMetadata};
use crate::{HmdError, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

/// One scripted result of `read_timeout`.
#[derive(Debug, Clone)]
pub enum ReadStep {
    Timeout,
    Data(Vec<u8>),
    Error,
    Hangup,
}

#[derive(Default)]
struct MockState {
    features: HashMap<u8, VecDeque<Vec<u8>>>,
    feature_requests: Vec<u8>,
    sent: Vec<Vec<u8>>,
    reads: VecDeque<ReadStep>,
}

/// Transport answering feature reads from per-id queues and input reads
/// from a script. Clones share state.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a feature report response. Byte 0 selects the queue.
    pub fn push_feature(&self, buf: Vec<u8>) {
        self.push_feature_for(buf[0], buf);
    }

    /// Queue `buf` as the answer to the next read of report `id`, whatever
    /// its own first byte says.
    pub fn push_feature_for(&self, id: u8, buf: Vec<u8>) {
        let mut state = self.state.lock().unwrap();
        state.features.entry(id).or_default().push_back(buf);
    }

    pub fn push_read(&self, step: ReadStep) {
        self.state.lock().unwrap().reads.push_back(step);
    }

    /// Report ids of every feature read, in order.
    pub fn feature_requests(&self) -> Vec<u8> {
        self.state.lock().unwrap().feature_requests.clone()
    }

    /// Every feature report written, in order.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn sent_with_id(&self, id: u8) -> Vec<Vec<u8>> {
        self.sent().into_iter().filter(|r| r[0] == id).collect()
    }
}

impl Transport for MockTransport {
    fn get_feature_report(&self, buf: &mut [u8]) -> Result<usize> {
        let mut state = self.state.lock().unwrap();
        let id = buf[0];
        state.feature_requests.push(id);
        let response = state
            .features
            .get_mut(&id)
            .and_then(|q| q.pop_front())
            .ok_or_else(|| HmdError::Transport(format!("no scripted report 0x{:02x}", id)))?;
        let len = response.len().min(buf.len());
        buf[..len].copy_from_slice(&response[..len]);
        Ok(response.len())
    }

    fn send_feature_report(&self, buf: &[u8]) -> Result<()> {
        self.state.lock().unwrap().sent.push(buf.to_vec());
        Ok(())
    }

    fn read_timeout(&self, buf: &mut [u8], _timeout: Duration) -> Result<ReadEvent> {
        let step = self.state.lock().unwrap().reads.pop_front();
        match step {
            Some(ReadStep::Timeout) => Ok(ReadEvent::Timeout),
            Some(ReadStep::Data(data)) => {
                let len = data.len().min(buf.len());
                buf[..len].copy_from_slice(&data[..len]);
                Ok(ReadEvent::Data(len))
            }
            Some(ReadStep::Error) => Err(HmdError::Transport("scripted read error".into())),
            Some(ReadStep::Hangup) | None => Ok(ReadEvent::Hangup),
        }
    }
}

/// Tracker that remembers everything it was given.
#[derive(Default)]
pub struct RecordingTracker {
    pub models: Mutex<Vec<Weak<LedModel>>>,
    pub samples: Mutex<Vec<ImuSample>>,
    pub metadata: Mutex<Vec<SensorMetadata>>,
}

impl RecordingTracker {
    pub fn registered(&self) -> usize {
        self.models.lock().unwrap().len()
    }

    pub fn samples(&self) -> Vec<ImuSample> {
        self.samples.lock().unwrap().clone()
    }
}

impl Tracker for RecordingTracker {
    fn register_leds(&self, leds: Weak<LedModel>) {
        self.models.lock().unwrap().push(leds);
    }

    fn unregister_leds(&self, leds: &Weak<LedModel>) {
        self.models.lock().unwrap().retain(|m| !m.ptr_eq(leds));
    }

    fn push_imu_sample(&self, sample: &ImuSample) {
        self.samples.lock().unwrap().push(*sample);
    }

    fn push_sensor_metadata(&self, metadata: &SensorMetadata) {
        self.metadata.lock().unwrap().push(*metadata);
    }
}

/// Build a sensor message with `num_samples` declared and the given
/// timestamp. Sample `i` carries accel `[i+1, -(i+1), 2]` and gyro `[0, 0, i]`.
pub fn sensor_message(num_samples: u8, timestamp: u32) -> Vec<u8> {
    let mut buf = vec![0u8; crate::protocol::SENSOR_MESSAGE_SIZE];
    buf[0] = crate::protocol::SENSOR_MESSAGE_ID;
    buf[3] = num_samples;
    buf[4..6].copy_from_slice(&7u16.to_le_bytes());
    buf[6..8].copy_from_slice(&3125i16.to_le_bytes());
    buf[8..12].copy_from_slice(&timestamp.to_le_bytes());
    for i in 0..2 {
        let n = i as i32 + 1;
        buf[12 + 16 * i..20 + 16 * i].copy_from_slice(&pack_3x21bit([n, -n, 2]));
        buf[20 + 16 * i..28 + 16 * i].copy_from_slice(&pack_3x21bit([0, 0, i as i32]));
    }
    buf[44..46].copy_from_slice(&(-2500i16).to_le_bytes());
    buf[46..48].copy_from_slice(&1200i16.to_le_bytes());
    buf[48..50].copy_from_slice(&300i16.to_le_bytes());
    buf[50..52].copy_from_slice(&42u16.to_le_bytes());
    buf[56] = 9;
    buf[57] = 4;
    buf
}

pub fn pack_3x21bit(v: [i32; 3]) -> [u8; 8] {
    let mask = (1u64 << 21) - 1;
    let packed =
        ((v[0] as u64 & mask) << 43) | ((v[1] as u64 & mask) << 22) | ((v[2] as u64 & mask) << 1);
    packed.to_be_bytes()
}

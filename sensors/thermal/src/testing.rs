//! In-memory controller and host used by the unit tests.

use crate::protocol::{
    FourCc, BYTES_OFFSET, CMD_READ_BYTES, CMD_READ_KEY_INFO, DATA_SIZE_OFFSET, DATA_TYPE_OFFSET,
    KEY_OFFSET, MAX_VALUE_BYTES, RESULT_OFFSET, SELECTOR_OFFSET,
};
use hostpulse_core::{
    ControllerBuffer, ControllerConnection, CoreTicks, HostTelemetry, MemoryStats, SensorError,
    CONTROLLER_BUFFER_LEN,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const KEY_NOT_FOUND: u8 = 0x84;

/// Answers key-info and read-bytes calls from a key table.
#[derive(Clone, Default)]
pub struct FakeController {
    keys: HashMap<u32, (u32, Vec<u8>)>,
    value_result: u8,
    failing: bool,
    calls: Arc<Mutex<Vec<(String, u8, u32)>>>,
    closed: Arc<AtomicUsize>,
}

fn word(buf: &ControllerBuffer, offset: usize) -> u32 {
    u32::from_ne_bytes(buf[offset..offset + 4].try_into().unwrap())
}

impl FakeController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, key: &str, data_type: &str, value: &[u8]) -> Self {
        let key: FourCc = key.parse().unwrap();
        let data_type: FourCc = data_type.parse().unwrap();
        self.keys.insert(key.code(), (data_type.code(), value.to_vec()));
        self
    }

    /// Result code placed in every read-bytes reply.
    pub fn with_value_result(mut self, result: u8) -> Self {
        self.value_result = result;
        self
    }

    /// Fail every call at the transport level.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// `(key, selector, requested size)` for every call so far.
    pub fn calls(&self) -> Vec<(String, u8, u32)> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of connections dropped.
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

impl ControllerConnection for FakeController {
    fn call(&mut self, request: &ControllerBuffer) -> Result<ControllerBuffer, SensorError> {
        let code = word(request, KEY_OFFSET);
        let selector = request[SELECTOR_OFFSET];
        let requested = word(request, DATA_SIZE_OFFSET);
        self.calls
            .lock()
            .unwrap()
            .push((FourCc::from_code(code).to_string(), selector, requested));

        if self.failing {
            return Err(SensorError::platform("IOConnectCallStructMethod", -536_870_206));
        }

        let mut reply = [0u8; CONTROLLER_BUFFER_LEN];
        reply[..4].copy_from_slice(&code.to_ne_bytes());
        reply[SELECTOR_OFFSET] = selector;

        match (selector, self.keys.get(&code)) {
            (CMD_READ_KEY_INFO, Some((data_type, value))) => {
                reply[DATA_SIZE_OFFSET..DATA_SIZE_OFFSET + 4]
                    .copy_from_slice(&(value.len() as u32).to_ne_bytes());
                reply[DATA_TYPE_OFFSET..DATA_TYPE_OFFSET + 4].copy_from_slice(&data_type.to_ne_bytes());
            }
            (CMD_READ_BYTES, Some((_, value))) => {
                let n = value.len().min(requested as usize).min(MAX_VALUE_BYTES);
                reply[BYTES_OFFSET..BYTES_OFFSET + n].copy_from_slice(&value[..n]);
                reply[RESULT_OFFSET] = self.value_result;
            }
            _ => reply[RESULT_OFFSET] = KEY_NOT_FOUND,
        }

        Ok(reply)
    }
}

impl Drop for FakeController {
    fn drop(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Host whose only capability is opening copies of a [`FakeController`].
pub struct FakeHost {
    pub controller: Option<FakeController>,
    pub opened: AtomicUsize,
}

impl FakeHost {
    pub fn new(controller: FakeController) -> Self {
        Self {
            controller: Some(controller),
            opened: AtomicUsize::new(0),
        }
    }

    pub fn without_controller() -> Self {
        Self {
            controller: None,
            opened: AtomicUsize::new(0),
        }
    }
}

impl HostTelemetry for FakeHost {
    fn tick_counters(&self) -> Result<Vec<CoreTicks>, SensorError> {
        Err(SensorError::unavailable("not scripted"))
    }

    fn memory_stats(&self) -> Result<MemoryStats, SensorError> {
        Err(SensorError::unavailable("not scripted"))
    }

    fn open_controller(&self) -> Result<Box<dyn ControllerConnection>, SensorError> {
        match &self.controller {
            Some(controller) => {
                self.opened.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(controller.clone()))
            }
            None => Err(SensorError::unavailable("AppleSMC service not found")),
        }
    }

    fn uptime(&self) -> Result<Duration, SensorError> {
        Err(SensorError::unavailable("not scripted"))
    }
}

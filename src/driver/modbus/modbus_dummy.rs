//! in-memory modbus device, used by dummy mode and by tests
//! every coil write is recorded so the transmitted history can be inspected

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::prelude::*;
use super::traits::{ModbusConnector, ModbusLink};
use crate::common::error::PanelError;
use crate::entity::bo::target_bo::ConnectionTarget;
use crate::{debug, trace};

const LOG_TAG: &str = "modbus_dummy";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoilWrite {
    pub target: ConnectionTarget,
    pub address: ModbusAddrSize,
    pub values: Vec<bool>,
}

#[derive(Debug, Default)]
struct DummyDeviceState {
    discrete_inputs: Vec<bool>,
    unreachable: HashSet<ConnectionTarget>,
    fail_reads: bool,
    fail_writes: bool,
    connect_attempts: Vec<ConnectionTarget>,
    writes: Vec<CoilWrite>,
    open_links: usize,
    next_link_id: u64,
    // links with an id below this fail every request with `broken_reason`
    broken_below: u64,
    broken_reason: String,
}

/// handle to the simulated device, clones share the same device
#[derive(Debug, Clone, Default)]
pub struct DummyDevice {
    inner: Arc<Mutex<DummyDeviceState>>,
}

// the knobs below are driven by tests, dummy mode only needs a quiet device
#[cfg_attr(not(test), allow(dead_code))]
impl DummyDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_discrete_inputs(values: &[bool]) -> Self {
        let device = Self::new();
        device.state().discrete_inputs = values.to_vec();
        device
    }

    fn state(&self) -> MutexGuard<'_, DummyDeviceState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_unreachable(&self, target: &ConnectionTarget) {
        self.state().unreachable.insert(target.clone());
    }

    pub fn set_reachable(&self, target: &ConnectionTarget) {
        self.state().unreachable.remove(target);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.state().fail_reads = fail;
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.state().fail_writes = fail;
    }

    /// every link opened so far fails from now on, links opened later work again
    pub fn break_open_links(&self, reason: &str) {
        let mut state = self.state();
        state.broken_below = state.next_link_id;
        state.broken_reason = reason.to_string();
    }

    pub fn connect_attempts(&self) -> Vec<ConnectionTarget> {
        self.state().connect_attempts.clone()
    }

    pub fn writes(&self) -> Vec<CoilWrite> {
        self.state().writes.clone()
    }

    pub fn last_write(&self) -> Option<CoilWrite> {
        self.state().writes.last().cloned()
    }

    pub fn open_links(&self) -> usize {
        self.state().open_links
    }
}

pub struct DummyConnector {
    device: DummyDevice,
}

impl DummyConnector {
    pub fn new(device: DummyDevice) -> Self {
        DummyConnector { device }
    }
}

#[async_trait]
impl ModbusConnector for DummyConnector {
    async fn connect(&self, target: &ConnectionTarget) -> Result<Box<dyn ModbusLink>, PanelError> {
        let mut state = self.device.state();
        state.connect_attempts.push(target.clone());
        target.socket_addr()?;
        if state.unreachable.contains(target) {
            return Err(PanelError::connect(format!(
                "cannot connect to modbus device {}, exception: connection refused", target
            )));
        }
        state.open_links += 1;
        let id = state.next_link_id;
        state.next_link_id += 1;
        debug!(LOG_TAG, "simulated link {} opened to {}, open links: {}", id, target, state.open_links);
        Ok(Box::new(DummyLink {
            id,
            target: target.clone(),
            device: self.device.clone(),
            closed: false,
        }))
    }
}

pub struct DummyLink {
    id: u64,
    target: ConnectionTarget,
    device: DummyDevice,
    closed: bool,
}

impl DummyLink {
    fn check_open(&self) -> Result<(), PanelError> {
        if self.closed {
            return Err(PanelError::protocol(format!("link to {} is already closed", self.target)));
        }
        let state = self.device.state();
        if self.id < state.broken_below {
            return Err(PanelError::protocol(format!(
                "request to {} failed, exception: {}", self.target, state.broken_reason
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ModbusLink for DummyLink {
    fn target(&self) -> &ConnectionTarget {
        &self.target
    }

    async fn read_discrete_inputs(
        &mut self,
        address: ModbusAddrSize,
        count: ModbusAddrSize,
    ) -> Result<Vec<bool>, PanelError> {
        self.check_open()?;
        let state = self.device.state();
        if state.fail_reads {
            return Err(PanelError::protocol(format!(
                "read discrete inputs from {} failed, exception: simulated failure", self.target
            )));
        }
        let start = address as usize;
        let ret: Vec<bool> = (start..start + count as usize)
            .map(|i| state.discrete_inputs.get(i).copied().unwrap_or(false))
            .collect();
        trace!(LOG_TAG, "simulated read, address: {}, count: {}, values: {:?}", address, count, ret);
        Ok(ret)
    }

    async fn write_multiple_coils(
        &mut self,
        address: ModbusAddrSize,
        values: &[bool],
    ) -> Result<(), PanelError> {
        self.check_open()?;
        let mut state = self.device.state();
        if state.fail_writes {
            return Err(PanelError::protocol(format!(
                "write coils to {} failed, exception: simulated failure", self.target
            )));
        }
        trace!(LOG_TAG, "simulated write, target: {}, address: {}, values: {:?}", self.target, address, values);
        state.writes.push(CoilWrite {
            target: self.target.clone(),
            address,
            values: values.to_vec(),
        });
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), PanelError> {
        if !self.closed {
            self.closed = true;
            let mut state = self.device.state();
            state.open_links = state.open_links.saturating_sub(1);
        }
        Ok(())
    }
}

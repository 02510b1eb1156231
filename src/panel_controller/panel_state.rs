//! shared panel state
//! the target, the output vector and the live link sit behind one lock, so a
//! vector mutation, a link swap and a write-back tick can never interleave

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::common::error::PanelError;
use crate::driver::modbus::prelude::*;
use crate::driver::modbus::traits::ModbusLink;
use crate::entity::bo::output_vector_bo::OutputVector;
use crate::entity::bo::target_bo::ConnectionTarget;
use crate::entity::po::panel_state_po::PanelStatePo;

pub type SharedPanelState = Arc<Mutex<PanelState>>;

/// write-back results since the current link was attached
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkHealth {
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub successful_writes: u64,
}

impl LinkHealth {
    /// returns the length of the failure streak that just ended, if any
    pub fn record_success(&mut self) -> Option<u32> {
        self.successful_writes += 1;
        self.last_error = None;
        let streak = self.consecutive_failures;
        self.consecutive_failures = 0;
        if streak > 0 { Some(streak) } else { None }
    }

    /// returns the current streak length
    pub fn record_failure(&mut self, msg: &str) -> u32 {
        self.consecutive_failures += 1;
        self.last_error = Some(msg.to_string());
        self.consecutive_failures
    }
}

pub struct PanelState {
    pub target: ConnectionTarget,
    pub outputs: OutputVector,
    pub health: LinkHealth,
    link: Option<Box<dyn ModbusLink>>,
}

/// copy of the state for display and persistence, taken under the lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelSnapshot {
    pub target: ConnectionTarget,
    pub outputs: OutputVector,
    pub connected: bool,
    pub health: LinkHealth,
}

impl PanelSnapshot {
    pub fn to_po(&self) -> PanelStatePo {
        PanelStatePo::from_bo(&self.target, &self.outputs)
    }
}

impl PanelState {
    pub fn new(target: ConnectionTarget, outputs: OutputVector) -> Self {
        PanelState {
            target,
            outputs,
            health: LinkHealth::default(),
            link: None,
        }
    }

    pub fn into_shared(self) -> SharedPanelState {
        Arc::new(Mutex::new(self))
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    pub fn snapshot(&self) -> PanelSnapshot {
        PanelSnapshot {
            target: self.target.clone(),
            outputs: self.outputs,
            connected: self.is_connected(),
            health: self.health.clone(),
        }
    }

    /// install a freshly opened link, health starts over
    pub fn attach_link(&mut self, link: Box<dyn ModbusLink>) {
        self.link = Some(link);
        self.health = LinkHealth::default();
    }

    /// put back a reopened link to the same target, the failure streak carries on
    pub fn restore_link(&mut self, link: Box<dyn ModbusLink>) {
        self.link = Some(link);
    }

    pub fn detach_link(&mut self) -> Option<Box<dyn ModbusLink>> {
        self.link.take()
    }

    pub async fn read_discrete_inputs(
        &mut self,
        address: ModbusAddrSize,
        count: ModbusAddrSize,
    ) -> Result<Vec<bool>, PanelError> {
        let target = self.target.clone();
        let link = self.link.as_mut().ok_or_else(|| {
            PanelError::protocol(format!("read discrete inputs from {} failed, not connected", target))
        })?;
        link.read_discrete_inputs(address, count).await
    }

    /// transmit the current output vector, `None` when there is no link to write through
    pub async fn write_outputs(&mut self, address: ModbusAddrSize) -> Option<Result<(), PanelError>> {
        let outputs = self.outputs;
        let link = self.link.as_mut()?;
        Some(link.write_multiple_coils(address, outputs.as_coils()).await)
    }
}

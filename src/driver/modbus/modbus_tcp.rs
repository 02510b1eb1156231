//! modbus tcp link backed by tokio-modbus

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;
use tokio_modbus::{client::Context, prelude::*, Slave};

use super::prelude::*;
use super::traits::{ModbusConnector, ModbusLink};
use crate::common::error::PanelError;
use crate::entity::bo::target_bo::ConnectionTarget;
use crate::{debug, info};

const LOG_TAG: &str = "modbus_tcp";

/// opens tcp links to a single unit id
pub struct TcpConnector {
    unit: ModbusUnitSize,
    request_timeout: Duration,
}

impl TcpConnector {
    pub fn new(unit: ModbusUnitSize, request_timeout: Duration) -> Self {
        TcpConnector { unit, request_timeout }
    }
}

#[async_trait]
impl ModbusConnector for TcpConnector {
    async fn connect(&self, target: &ConnectionTarget) -> Result<Box<dyn ModbusLink>, PanelError> {
        let socket_addr = target.socket_addr()?;
        let ctx = tcp::connect_slave(socket_addr, Slave(self.unit)).await.map_err(|e| {
            PanelError::connect(format!("cannot connect to modbus device {}, exception: {}", target, e))
        })?;
        info!(LOG_TAG, "connected to modbus device {}, unit: {}", target, self.unit);
        Ok(Box::new(TcpLink {
            target: target.clone(),
            ctx,
            request_timeout: self.request_timeout,
        }))
    }
}

pub struct TcpLink {
    target: ConnectionTarget,
    ctx: Context,
    request_timeout: Duration,
}

#[async_trait]
impl ModbusLink for TcpLink {
    fn target(&self) -> &ConnectionTarget {
        &self.target
    }

    async fn read_discrete_inputs(
        &mut self,
        address: ModbusAddrSize,
        count: ModbusAddrSize,
    ) -> Result<Vec<bool>, PanelError> {
        let ret = timeout(self.request_timeout, self.ctx.read_discrete_inputs(address, count))
            .await
            .map_err(|_| {
                PanelError::protocol(format!(
                    "read discrete inputs from {} timed out after {:?}", self.target, self.request_timeout
                ))
            })?
            .map_err(|e| {
                PanelError::protocol(format!(
                    "read discrete inputs from {} failed, address: {}, count: {}, exception: {}",
                    self.target, address, count, e
                ))
            })?;
        Ok(ret)
    }

    async fn write_multiple_coils(
        &mut self,
        address: ModbusAddrSize,
        values: &[bool],
    ) -> Result<(), PanelError> {
        timeout(self.request_timeout, self.ctx.write_multiple_coils(address, values))
            .await
            .map_err(|_| {
                PanelError::protocol(format!(
                    "write coils to {} timed out after {:?}", self.target, self.request_timeout
                ))
            })?
            .map_err(|e| {
                PanelError::protocol(format!(
                    "write coils to {} failed, address: {}, values: {:?}, exception: {}",
                    self.target, address, values, e
                ))
            })?;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), PanelError> {
        debug!(LOG_TAG, "closing link to {}", self.target);
        self.ctx.disconnect().await.map_err(|e| {
            PanelError::protocol(format!("close link to {} failed, exception: {}", self.target, e))
        })
    }
}

use async_trait::async_trait;

use super::prelude::*;
use crate::common::error::PanelError;
use crate::entity::bo::target_bo::ConnectionTarget;

/// an open connection to one modbus device
#[async_trait]
pub trait ModbusLink: Send {
    /// the target this link was opened against
    fn target(&self) -> &ConnectionTarget;

    async fn read_discrete_inputs(
        &mut self,
        address: ModbusAddrSize,
        count: ModbusAddrSize,
    ) -> Result<Vec<bool>, PanelError>;

    async fn write_multiple_coils(
        &mut self,
        address: ModbusAddrSize,
        values: &[bool],
    ) -> Result<(), PanelError>;

    /// close the link, the link must not be used afterwards
    async fn disconnect(&mut self) -> Result<(), PanelError>;
}

/// opens links, errors are always `ConnectError`
#[async_trait]
pub trait ModbusConnector: Send + Sync {
    async fn connect(&self, target: &ConnectionTarget) -> Result<Box<dyn ModbusLink>, PanelError>;
}

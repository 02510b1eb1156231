//! persisted panel state, one record, last write wins
use serde_derive::{Deserialize, Serialize};

use crate::common::error::PanelError;
use crate::entity::bo::output_vector_bo::OutputVector;
use crate::entity::bo::target_bo::ConnectionTarget;

/// stored object: connection target plus output vector
/// key names stay readable by state files written by the earlier python panel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelStatePo {
    #[serde(rename = "ip", alias = "address")]
    pub address: String,
    pub port: u16,
    #[serde(rename = "inputs", alias = "output_vector")]
    pub outputs: Vec<u8>,
}

impl PanelStatePo {
    pub fn from_bo(target: &ConnectionTarget, outputs: &OutputVector) -> Self {
        PanelStatePo {
            address: target.address.clone(),
            port: target.port,
            outputs: outputs.to_persisted(),
        }
    }

    /// validate the stored record before it is allowed to replace live state
    pub fn to_bo(&self) -> Result<(ConnectionTarget, OutputVector), PanelError> {
        let address = ConnectionTarget::parse_address(self.address.as_str())
            .map_err(|e| PanelError::state_store(format!("stored address rejected: {}", e.msg)))?;
        let outputs = OutputVector::from_persisted(&self.outputs)?;
        Ok((ConnectionTarget::new(address.as_str(), self.port), outputs))
    }
}

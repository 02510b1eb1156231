//! startup sequence
//! 1. load the last state if there is one
//! 2. connect, falling back to the default target once
//! 3. seed the output vector from the device when nothing was persisted

use std::io::Write;

use tokio::io::AsyncBufRead;

use super::connection_manager::{ConnectOutcome, ConnectionManager};
use super::console::Console;
use super::panel_state::PanelState;
use crate::common::error::PanelError;
use crate::entity::bo::output_vector_bo::{OutputVector, OUTPUT_LEN};
use crate::entity::bo::target_bo::ConnectionTarget;
use crate::store::state_dao::StateDao;
use crate::{info, warn};

const LOG_TAG: &str = "startup";

/// the persisted record, if it exists and is valid
async fn restore(dao: &dyn StateDao) -> Option<(ConnectionTarget, OutputVector)> {
    let record = match dao.load().await {
        Ok(record) => record?,
        Err(e) => {
            warn!(LOG_TAG, "stored state unusable, starting from defaults: {}", e);
            return None;
        }
    };
    match record.to_bo() {
        Ok(restored) => Some(restored),
        Err(e) => {
            warn!(LOG_TAG, "stored state rejected, starting from defaults: {}", e);
            None
        }
    }
}

/// build the initial panel state, any error returned here is fatal to startup
pub async fn bootstrap<R, W>(
    manager: &ConnectionManager,
    dao: &dyn StateDao,
    console: &mut Console<R, W>,
) -> Result<PanelState, PanelError>
where
    R: AsyncBufRead + Unpin + Send,
    W: Write + Send,
{
    let restored = restore(dao).await;
    let (target, persisted_outputs) = match restored {
        Some((target, outputs)) => {
            console.show_settings("Last Status", &target, &outputs)?;
            (target, Some(outputs))
        }
        None => (manager.fallback_target().clone(), None),
    };

    let mut state = PanelState::new(target.clone(), persisted_outputs.unwrap_or_default());
    match manager.replace_or_fallback(&mut state, &target).await? {
        ConnectOutcome::Connected => console.say("Connected to Modbus server.")?,
        ConnectOutcome::FellBack { failed, reason } => {
            console.say(format!("Could not connect to {} ({}).", failed, reason).as_str())?;
            console.say("Using default IP address and port.")?;
        }
    }

    if persisted_outputs.is_none() {
        let values = state.read_discrete_inputs(0, OUTPUT_LEN as u16).await?;
        if values.len() < OUTPUT_LEN {
            return Err(PanelError::protocol(format!(
                "read discrete inputs from {} returned {} values, expected {}",
                state.target, values.len(), OUTPUT_LEN
            )));
        }
        state.outputs = OutputVector::from_discrete_inputs(&values);
        info!(LOG_TAG, "output vector seeded from device inputs: {}", state.outputs);
    }

    console.show_status("Startup Status", &state.snapshot())?;
    Ok(state)
}

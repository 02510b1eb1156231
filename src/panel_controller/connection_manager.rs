//! connection manager
//! owns opening, swapping and closing the single device link held in `PanelState`.
//! callers pass the locked state in, so a swap is atomic with respect to the
//! write-back worker: it either sees the old open link or the new one, never a closed one

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use super::panel_state::PanelState;
use crate::common::error::{ErrorCode, PanelError};
use crate::driver::modbus::traits::{ModbusConnector, ModbusLink};
use crate::entity::bo::target_bo::ConnectionTarget;
use crate::{debug, info, warn};

const LOG_TAG: &str = "connection_manager";

/// how a reconnect ended when it did not fail outright
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected,
    /// the requested target was unreachable, the fallback target is in use instead
    FellBack { failed: ConnectionTarget, reason: String },
}

pub struct ConnectionManager {
    connector: Arc<dyn ModbusConnector>,
    fallback: ConnectionTarget,
    connect_timeout: Duration,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn ModbusConnector>, fallback: ConnectionTarget, connect_timeout: Duration) -> Self {
        ConnectionManager {
            connector,
            fallback,
            connect_timeout,
        }
    }

    pub fn fallback_target(&self) -> &ConnectionTarget {
        &self.fallback
    }

    /// open a new link, every failure comes back as `ConnectError`
    pub async fn connect(&self, target: &ConnectionTarget) -> Result<Box<dyn ModbusLink>, PanelError> {
        debug!(LOG_TAG, "connecting to {}", target);
        match timeout(self.connect_timeout, self.connector.connect(target)).await {
            Ok(Ok(link)) => Ok(link),
            Ok(Err(e)) if e.is(ErrorCode::ConnectError) => Err(e),
            Ok(Err(e)) => Err(PanelError::connect(e.msg)),
            Err(_) => Err(PanelError::connect(format!(
                "connect to {} timed out after {:?}", target, self.connect_timeout
            ))),
        }
    }

    /// close the current link if there is one, close errors are ignored
    pub async fn close(&self, state: &mut PanelState) {
        if let Some(link) = state.detach_link() {
            self.discard(link).await;
        }
    }

    /// close a link that is not installed in any state
    pub async fn discard(&self, mut link: Box<dyn ModbusLink>) {
        if let Err(e) = link.disconnect().await {
            debug!(LOG_TAG, "ignoring close error for {}: {}", link.target(), e);
        }
    }

    /// close the current link, switch to `new_target` and connect to it
    /// on failure the state keeps `new_target` with no link
    pub async fn replace(&self, state: &mut PanelState, new_target: &ConnectionTarget) -> Result<(), PanelError> {
        self.close(state).await;
        state.target = new_target.clone();
        let link = self.connect(new_target).await?;
        state.attach_link(link);
        info!(LOG_TAG, "link replaced, now connected to {}", new_target);
        Ok(())
    }

    /// `replace`, and if that fails, switch to the fallback target and connect once more.
    /// when the fallback fails too the state is left without a link and `ConnectionLost` is returned
    pub async fn replace_or_fallback(
        &self,
        state: &mut PanelState,
        new_target: &ConnectionTarget,
    ) -> Result<ConnectOutcome, PanelError> {
        let first = match self.replace(state, new_target).await {
            Ok(()) => return Ok(ConnectOutcome::Connected),
            Err(e) => e,
        };
        warn!(LOG_TAG, "{}, falling back to {}", first.msg, self.fallback);

        state.target = self.fallback.clone();
        match self.connect(&self.fallback).await {
            Ok(link) => {
                state.attach_link(link);
                info!(LOG_TAG, "connected to fallback target {}", self.fallback);
                Ok(ConnectOutcome::FellBack {
                    failed: new_target.clone(),
                    reason: first.msg,
                })
            }
            Err(second) => Err(PanelError::connection_lost(format!(
                "no usable device connection: {} ({}); fallback {} also failed ({})",
                new_target, first.msg, self.fallback, second.msg
            ))),
        }
    }
}

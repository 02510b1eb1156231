//! write-back worker
//! re-asserts the output vector on the device once per tick for the whole process lifetime.
//! a failed write drops the link, the next tick reopens it to the current target and writes again.
//! the worker only stops on cancel

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::common::setting::Settings;
use crate::driver::modbus::prelude::*;
use crate::panel_controller::connection_manager::ConnectionManager;
use crate::panel_controller::panel_state::{PanelState, SharedPanelState};
use crate::{debug, error, info, warn};

const LOG_TAG: &str = "write_back_thread";

#[derive(Debug, Clone)]
pub struct WriteBackConfig {
    pub interval: Duration,
    pub start_address: ModbusAddrSize,
    pub failure_report_threshold: u32,
}

impl WriteBackConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        WriteBackConfig {
            interval: Duration::from_millis(settings.write_back.interval_ms),
            start_address: 0,
            failure_report_threshold: settings.write_back.failure_report_threshold,
        }
    }
}

impl Default for WriteBackConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// what a single tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickResult {
    Written,
    /// the write or the reopen failed, the next tick tries again
    Failed(String),
    /// the operator swapped the target while the link was being reopened and left no link behind
    NoLink,
}

pub fn spawn_write_back(
    state: SharedPanelState,
    manager: Arc<ConnectionManager>,
    config: WriteBackConfig,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(run_write_back(state, manager, config, cancel))
}

pub async fn run_write_back(
    state: SharedPanelState,
    manager: Arc<ConnectionManager>,
    config: WriteBackConfig,
    cancel: CancellationToken,
) {
    info!(LOG_TAG, "write-back worker starting, interval: {:?}", config.interval);
    loop {
        write_tick(&state, &manager, &config).await;

        tokio::select! {
            _ = cancel.cancelled() => {
                info!(LOG_TAG, "write-back worker stop requested, quitting");
                return;
            }
            _ = tokio::time::sleep(config.interval) => {}
        }
    }
}

/// one tick: reopen the link if it was dropped, then transmit the vector while holding the state lock
pub async fn write_tick(state: &SharedPanelState, manager: &ConnectionManager, config: &WriteBackConfig) -> TickResult {
    let target = {
        let mut guard = state.lock().await;
        if guard.is_connected() {
            return write_locked(&mut guard, manager, config).await;
        }
        guard.target.clone()
    };

    // connect without the lock, a slow connect must not stall the operator
    let opened = manager.connect(&target).await;
    let mut guard = state.lock().await;
    if guard.target != target || guard.is_connected() {
        if let Ok(link) = opened {
            manager.discard(link).await;
        }
        debug!(LOG_TAG, "link was swapped while reopening {}", target);
        if !guard.is_connected() {
            return TickResult::NoLink;
        }
        return write_locked(&mut guard, manager, config).await;
    }

    match opened {
        Ok(link) => {
            guard.restore_link(link);
            info!(LOG_TAG, "link to {} reopened", target);
            write_locked(&mut guard, manager, config).await
        }
        Err(e) => {
            record_failure(&mut guard, config, e.msg.as_str());
            TickResult::Failed(e.msg)
        }
    }
}

async fn write_locked(state: &mut PanelState, manager: &ConnectionManager, config: &WriteBackConfig) -> TickResult {
    let result = match state.write_outputs(config.start_address).await {
        None => return TickResult::NoLink,
        Some(result) => result,
    };

    match result {
        Ok(()) => {
            if let Some(streak) = state.health.record_success() {
                info!(LOG_TAG, "write-back to {} recovered after {} failed ticks", state.target, streak);
            }
            debug!(LOG_TAG, "wrote {} to {}", state.outputs, state.target);
            TickResult::Written
        }
        Err(e) => {
            // a reset socket or a timed out request leaves the stream unusable
            manager.close(state).await;
            record_failure(state, config, e.msg.as_str());
            TickResult::Failed(e.msg)
        }
    }
}

fn record_failure(state: &mut PanelState, config: &WriteBackConfig, msg: &str) {
    let streak = state.health.record_failure(msg);
    if streak < config.failure_report_threshold {
        warn!(LOG_TAG, "write-back to {} failed, link will be reopened next tick: {}", state.target, msg);
    } else if streak == config.failure_report_threshold {
        error!(LOG_TAG, "write-back to {} failed {} ticks in a row, last error: {}", state.target, streak, msg);
    } else {
        debug!(LOG_TAG, "write-back to {} still failing, streak: {}, last error: {}", state.target, streak, msg);
    }
}

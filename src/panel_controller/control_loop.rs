//! control loop: read a command, run it, persist, show status, repeat

use std::io::Write;
use std::sync::Arc;

use tokio::io::AsyncBufRead;

use super::command::{parse_flag, parse_program_selection, PanelCommand};
use super::connection_manager::{ConnectOutcome, ConnectionManager};
use super::console::Console;
use super::panel_state::{PanelSnapshot, SharedPanelState};
use crate::common::error::{ErrorCode, PanelError};
use crate::entity::bo::output_vector_bo::OutputVector;
use crate::entity::bo::target_bo::ConnectionTarget;
use crate::store::state_dao::StateDao;
use crate::{error, info, warn};

const LOG_TAG: &str = "control_loop";

pub struct PanelController<R, W> {
    state: SharedPanelState,
    manager: Arc<ConnectionManager>,
    dao: Arc<dyn StateDao>,
    console: Console<R, W>,
}

impl<R, W> PanelController<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: Write + Send,
{
    pub fn new(
        state: SharedPanelState,
        manager: Arc<ConnectionManager>,
        dao: Arc<dyn StateDao>,
        console: Console<R, W>,
    ) -> Self {
        PanelController {
            state,
            manager,
            dao,
            console,
        }
    }

    #[cfg(test)]
    pub fn into_console(self) -> Console<R, W> {
        self.console
    }

    /// runs until the operator console closes, which is the only error returned
    pub async fn run(&mut self) -> Result<(), PanelError> {
        loop {
            self.console.show_menu()?;
            let raw = self.console.prompt("Enter command number:").await?;
            let command = match PanelCommand::from_menu_choice(raw.as_str()) {
                Ok(command) => command,
                Err(e) => {
                    self.console.report("select command", &e)?;
                    continue;
                }
            };

            match self.execute(command).await {
                Ok(()) => {
                    let snapshot = self.snapshot().await;
                    self.persist(&snapshot).await;
                    self.console.show_status("Current Status", &snapshot)?;
                }
                Err(e) if e.is(ErrorCode::ConsoleClosed) => return Err(e),
                Err(e) => {
                    error!(LOG_TAG, "command {} failed: {}", command.name(), e);
                    self.console.report(command.name(), &e)?;
                    if e.is(ErrorCode::ConnectionLost) {
                        let snapshot = self.snapshot().await;
                        self.console.show_status("Current Status", &snapshot)?;
                    }
                }
            }
        }
    }

    /// run one command against the shared state
    pub async fn execute(&mut self, command: PanelCommand) -> Result<(), PanelError> {
        info!(LOG_TAG, "executing command {}", command.name());
        match command {
            PanelCommand::LoadLastState => self.load_last_state().await,
            PanelCommand::ChangeAddress => {
                let address = self
                    .console
                    .prompt_valid("Enter new IP address:", ConnectionTarget::parse_address)
                    .await?;
                let current = self.state.lock().await.target.clone();
                self.reconnect(current.with_address(address.as_str())).await
            }
            PanelCommand::ChangePort => {
                let port = self
                    .console
                    .prompt_valid("Enter new port:", ConnectionTarget::parse_port)
                    .await?;
                let current = self.state.lock().await.target.clone();
                self.reconnect(current.with_port(port)).await
            }
            PanelCommand::SetEnable => {
                let value = self.console.prompt_valid("Enter 1 to enable or 0 to not:", parse_flag).await?;
                self.state.lock().await.outputs.set_enable(value);
                Ok(())
            }
            PanelCommand::ChangeProgramSelection => {
                let selection = self
                    .console
                    .prompt_valid("Enter new program selection (0-15):", parse_program_selection)
                    .await?;
                self.state.lock().await.outputs.set_program_selection(selection)
            }
            PanelCommand::SetClockwise => {
                let value = self.console.prompt_valid("Enter 1 to set clockwise or 0 to not:", parse_flag).await?;
                self.state.lock().await.outputs.set_clockwise(value);
                Ok(())
            }
            PanelCommand::SetCounterClockwise => {
                let value = self
                    .console
                    .prompt_valid("Enter 1 to counterclockwise or 0 to not:", parse_flag)
                    .await?;
                self.state.lock().await.outputs.set_counter_clockwise(value);
                Ok(())
            }
            PanelCommand::SetBits => {
                let bits = self
                    .console
                    .prompt_valid("Enter up to 8 bits (0s and 1s):", check_bit_string)
                    .await?;
                self.state.lock().await.outputs.set_from_bit_string(bits.as_str())
            }
        }
    }

    async fn reconnect(&mut self, target: ConnectionTarget) -> Result<(), PanelError> {
        let outcome = {
            let mut guard = self.state.lock().await;
            self.manager.replace_or_fallback(&mut guard, &target).await?
        };
        self.report_outcome(&outcome)
    }

    async fn load_last_state(&mut self) -> Result<(), PanelError> {
        let record = match self.dao.load().await {
            Ok(record) => record,
            Err(e) => {
                warn!(LOG_TAG, "stored state unusable, treating as absent: {}", e);
                None
            }
        };
        let restored = match record.map(|po| po.to_bo()) {
            Some(Ok(restored)) => restored,
            Some(Err(e)) => {
                warn!(LOG_TAG, "stored state rejected, treating as absent: {}", e);
                return self.console.say("No previous state found.");
            }
            None => return self.console.say("No previous state found."),
        };

        let (target, outputs) = restored;
        // the stored vector only applies once a link is up, a lost connection leaves it untouched
        let outcome = {
            let mut guard = self.state.lock().await;
            let outcome = self.manager.replace_or_fallback(&mut guard, &target).await?;
            guard.outputs = outputs;
            outcome
        };
        self.report_outcome(&outcome)?;
        self.console.say("State loaded successfully.")
    }

    fn report_outcome(&mut self, outcome: &ConnectOutcome) -> Result<(), PanelError> {
        match outcome {
            ConnectOutcome::Connected => Ok(()),
            ConnectOutcome::FellBack { failed, reason } => {
                let fallback = self.manager.fallback_target().clone();
                self.console.say(
                    format!(
                        "Could not connect to {} ({}). Using default IP address and port {}.",
                        failed, reason, fallback
                    )
                    .as_str(),
                )
            }
        }
    }

    async fn snapshot(&self) -> PanelSnapshot {
        self.state.lock().await.snapshot()
    }

    /// save failures are reported but never stop the loop
    async fn persist(&mut self, snapshot: &PanelSnapshot) {
        if let Err(e) = self.dao.save(&snapshot.to_po()).await {
            warn!(LOG_TAG, "cannot persist state: {}", e);
            let _ = self.console.report("save state", &e);
        }
    }
}

/// validation only, the write happens under the state lock
fn check_bit_string(raw: &str) -> Result<String, PanelError> {
    let mut probe = OutputVector::default();
    probe.set_from_bit_string(raw)?;
    Ok(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crate::driver::modbus::modbus_dummy::{DummyConnector, DummyDevice};
    use crate::entity::po::panel_state_po::PanelStatePo;
    use crate::panel_controller::panel_state::PanelState;
    use crate::store::state_dao::memory::MemoryStateDao;

    const FALLBACK: (&str, u16) = ("192.168.88.254", 502);

    struct Fixture {
        device: DummyDevice,
        state: SharedPanelState,
        dao: Arc<MemoryStateDao>,
    }

    async fn fixture(dao: MemoryStateDao, input: &'static str) -> (Fixture, PanelController<&'static [u8], Vec<u8>>) {
        let device = DummyDevice::new();
        let manager = Arc::new(ConnectionManager::new(
            Arc::new(DummyConnector::new(device.clone())),
            ConnectionTarget::new(FALLBACK.0, FALLBACK.1),
            Duration::from_millis(200),
        ));
        let target = ConnectionTarget::new("10.0.0.1", 502);
        let mut state = PanelState::new(target.clone(), OutputVector::default());
        manager.replace(&mut state, &target).await.unwrap();
        let state = state.into_shared();
        let dao = Arc::new(dao);
        let controller = PanelController::new(
            state.clone(),
            manager,
            dao.clone(),
            Console::new(input.as_bytes(), Vec::new()),
        );
        (Fixture { device, state, dao }, controller)
    }

    fn output(controller: PanelController<&'static [u8], Vec<u8>>) -> String {
        String::from_utf8(controller.into_console().into_writer()).unwrap()
    }

    #[tokio::test]
    async fn test_set_enable_changes_only_index_zero() {
        let (fx, mut controller) = fixture(MemoryStateDao::default(), "1\n").await;
        fx.state.lock().await.outputs.set_from_bit_string("00101101").unwrap();

        controller.execute(PanelCommand::SetEnable).await.unwrap();
        let outputs = fx.state.lock().await.outputs;
        assert_eq!(outputs.to_persisted(), vec![1, 0, 1, 0, 1, 1, 0, 1]);
    }

    #[tokio::test]
    async fn test_direction_and_program_commands() {
        let (fx, mut controller) = fixture(MemoryStateDao::default(), "1\n1\n12\n").await;
        controller.execute(PanelCommand::SetClockwise).await.unwrap();
        controller.execute(PanelCommand::SetCounterClockwise).await.unwrap();
        controller.execute(PanelCommand::ChangeProgramSelection).await.unwrap();
        assert_eq!(fx.state.lock().await.outputs.to_persisted(), vec![0, 1, 1, 0, 1, 1, 0, 0]);
    }

    #[tokio::test]
    async fn test_bits_command_rejects_then_accepts() {
        let (fx, mut controller) = fixture(MemoryStateDao::default(), "123\n101\n").await;
        fx.state.lock().await.outputs.set_from_bit_string("11111111").unwrap();
        controller.execute(PanelCommand::SetBits).await.unwrap();
        assert_eq!(fx.state.lock().await.outputs.to_persisted(), vec![1, 0, 1, 0, 0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn test_invalid_input_leaves_state() {
        let (fx, mut controller) = fixture(MemoryStateDao::default(), "16\n99\nx\n").await;
        fx.state.lock().await.outputs.set_from_bit_string("1").unwrap();
        let err = controller.execute(PanelCommand::ChangeProgramSelection).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidArgument);
        assert_eq!(fx.state.lock().await.outputs.to_persisted(), vec![1, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn test_change_address_reconnects() {
        let (fx, mut controller) = fixture(MemoryStateDao::default(), "10.0.0.7\n").await;
        controller.execute(PanelCommand::ChangeAddress).await.unwrap();
        let guard = fx.state.lock().await;
        assert_eq!(guard.target, ConnectionTarget::new("10.0.0.7", 502));
        assert!(guard.is_connected());
        assert_eq!(fx.device.open_links(), 1);
    }

    #[tokio::test]
    async fn test_change_address_falls_back_to_default() {
        let (fx, mut controller) = fixture(MemoryStateDao::default(), "bad\n10.9.9.9\n").await;
        fx.device.set_unreachable(&ConnectionTarget::new("10.9.9.9", 502));

        controller.execute(PanelCommand::ChangeAddress).await.unwrap();
        let fallback = ConnectionTarget::new(FALLBACK.0, FALLBACK.1);
        assert_eq!(fx.state.lock().await.target, fallback);
        assert!(fx.state.lock().await.is_connected());
        assert_eq!(fx.device.connect_attempts().last(), Some(&fallback));
        assert!(output(controller).contains("Using default IP address and port"));
    }

    #[tokio::test]
    async fn test_change_port_fallback_failure_is_reported() {
        let (fx, mut controller) = fixture(MemoryStateDao::default(), "3\n1502\n").await;
        fx.device.set_unreachable(&ConnectionTarget::new("10.0.0.1", 1502));
        fx.device.set_unreachable(&ConnectionTarget::new(FALLBACK.0, FALLBACK.1));

        assert_eq!(controller.run().await.unwrap_err().code, ErrorCode::ConsoleClosed);
        assert!(!fx.state.lock().await.is_connected());
        // nothing persisted for a failed reconnect
        assert_eq!(fx.dao.record(), None);
        let text = output(controller);
        assert!(text.contains("change_port failed"));
        assert!(text.contains("DISCONNECTED"));
    }

    #[tokio::test]
    async fn test_load_last_state_scenario() {
        let record = PanelStatePo {
            address: "192.168.1.50".to_string(),
            port: 502,
            outputs: vec![1, 0, 0, 0, 0, 0, 0, 1],
        };
        let (fx, mut controller) = fixture(MemoryStateDao::with_record(record.clone()), "").await;

        controller.execute(PanelCommand::LoadLastState).await.unwrap();
        let snapshot = fx.state.lock().await.snapshot();
        assert_eq!(snapshot.to_po(), record);
        assert!(snapshot.connected);
        assert_eq!(fx.device.connect_attempts().last(), Some(&ConnectionTarget::new("192.168.1.50", 502)));
        assert_eq!(fx.device.open_links(), 1);
    }

    #[tokio::test]
    async fn test_failed_load_leaves_vector_and_record() {
        let record = PanelStatePo {
            address: "192.168.1.50".to_string(),
            port: 502,
            outputs: vec![1, 0, 0, 0, 0, 0, 0, 1],
        };
        let (fx, mut controller) = fixture(MemoryStateDao::with_record(record.clone()), "1\n").await;
        fx.device.set_unreachable(&ConnectionTarget::new("192.168.1.50", 502));
        fx.device.set_unreachable(&ConnectionTarget::new(FALLBACK.0, FALLBACK.1));
        fx.state.lock().await.outputs.set_from_bit_string("0110").unwrap();

        assert!(controller.run().await.unwrap_err().is(ErrorCode::ConsoleClosed));
        let guard = fx.state.lock().await;
        assert_eq!(guard.outputs.to_persisted(), vec![0, 1, 1, 0, 0, 0, 0, 0]);
        assert!(!guard.is_connected());
        assert_eq!(fx.dao.record(), Some(record));
        drop(guard);
        assert!(output(controller).contains("load_last_state failed"));
    }

    #[tokio::test]
    async fn test_load_without_state_is_noop() {
        let (fx, mut controller) = fixture(MemoryStateDao::default(), "").await;
        fx.state.lock().await.outputs.set_enable(true);
        let before = fx.state.lock().await.snapshot();

        controller.execute(PanelCommand::LoadLastState).await.unwrap();
        assert_eq!(fx.state.lock().await.snapshot(), before);
        assert!(output(controller).contains("No previous state found."));
    }

    #[tokio::test]
    async fn test_run_persists_after_each_command() {
        let (fx, mut controller) = fixture(MemoryStateDao::default(), "4\n1\n8\n0011\n").await;
        let err = controller.run().await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ConsoleClosed);

        let record = fx.dao.record().unwrap();
        assert_eq!(record.address, "10.0.0.1");
        assert_eq!(record.outputs, vec![0, 0, 1, 1, 0, 0, 0, 0]);
        let text = output(controller);
        assert_eq!(text.matches("Current Status:").count(), 2);
        assert!(text.contains("Bit States: [1, 0, 0, 0, 0, 0, 0, 0]"));
    }

    #[tokio::test]
    async fn test_run_rejects_bad_menu_choice() {
        let (fx, mut controller) = fixture(MemoryStateDao::default(), "9\nabc\n").await;
        assert!(controller.run().await.is_err());
        assert_eq!(fx.dao.record(), None);
        let text = output(controller);
        assert_eq!(text.matches("select command failed").count(), 2);
        assert_eq!(text.matches("Available commands:").count(), 3);
    }

    #[tokio::test]
    async fn test_save_failure_does_not_stop_loop() {
        let dao = MemoryStateDao::failing();
        let (fx, mut controller) = fixture(dao, "4\n1\n6\n1\n").await;
        assert!(controller.run().await.unwrap_err().is(ErrorCode::ConsoleClosed));
        assert_eq!(fx.state.lock().await.outputs.to_persisted(), vec![1, 1, 0, 0, 0, 0, 0, 0]);
        assert_eq!(output(controller).matches("save state failed").count(), 2);
    }
}

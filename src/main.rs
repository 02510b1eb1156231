mod common;
mod driver;
mod entity;
mod panel_controller;
mod store;

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use dotenv::dotenv;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;

use common::error::ErrorCode;
use common::logger::init_logger;
use common::setting::Settings;
use driver::modbus::modbus_dummy::{DummyConnector, DummyDevice};
use driver::modbus::modbus_tcp::TcpConnector;
use driver::modbus::traits::ModbusConnector;
use panel_controller::connection_manager::ConnectionManager;
use panel_controller::console::Console;
use panel_controller::control_loop::PanelController;
use panel_controller::startup::bootstrap;
use panel_controller::workers::write_back_thread::{spawn_write_back, WriteBackConfig};
use store::state_dao::{JsonFileStateDao, StateDao};

const LOG_TAG: &str = "main";

fn main() -> Result<(), Box<dyn Error>> {
    // check env file
    dotenv().ok();

    // load config
    let settings = Settings::get();

    // set up logger
    init_logger()?;
    info!(LOG_TAG, "settings loaded, env: {}, mode: {}", settings.env.env, settings.env.mode);
    debug!(LOG_TAG, "settings: {:?}", settings);

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(run(settings));
    // the stdin reader may still be parked on a blocking read
    rt.shutdown_timeout(Duration::from_millis(500));
    result
}

async fn run(settings: &Settings) -> Result<(), Box<dyn Error>> {
    let connector: Arc<dyn ModbusConnector> = match settings.env.mode.as_str() {
        "dummy" => {
            info!(LOG_TAG, "dummy mode, no modbus device will be contacted");
            Arc::new(DummyConnector::new(DummyDevice::new()))
        }
        _ => Arc::new(TcpConnector::new(settings.device.unit_id, settings.device.request_timeout())),
    };
    let manager = Arc::new(ConnectionManager::new(
        connector,
        settings.device.default_target(),
        settings.device.connect_timeout(),
    ));
    let dao: Arc<dyn StateDao> = Arc::new(JsonFileStateDao::new(settings.state.file_path.as_str()));
    let mut console = Console::new(BufReader::new(tokio::io::stdin()), std::io::stdout());

    let state = match bootstrap(&manager, dao.as_ref(), &mut console).await {
        Ok(state) => state.into_shared(),
        Err(e) => {
            error!(LOG_TAG, "startup failed: {}", e);
            let _ = console.report("startup", &e);
            return Err(e.into());
        }
    };

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    ctrlc::set_handler(move || interrupt.cancel())?;

    let write_back = spawn_write_back(
        state.clone(),
        manager.clone(),
        WriteBackConfig::from_settings(settings),
        cancel.clone(),
    );

    let mut controller = PanelController::new(state.clone(), manager.clone(), dao, console);
    tokio::select! {
        result = controller.run() => match result {
            Err(e) if e.is(ErrorCode::ConsoleClosed) => info!(LOG_TAG, "operator console closed, shutting down"),
            Err(e) => error!(LOG_TAG, "control loop stopped: {}", e),
            Ok(()) => {}
        },
        _ = cancel.cancelled() => info!(LOG_TAG, "interrupt received, shutting down"),
    }

    cancel.cancel();
    if let Err(e) = write_back.await {
        error!(LOG_TAG, "write-back worker ended abnormally: {}", e);
    }
    manager.close(&mut *state.lock().await).await;
    info!(LOG_TAG, "link closed, bye");
    Ok(())
}

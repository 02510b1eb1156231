pub mod panel_state;
pub mod connection_manager;
pub mod command;
pub mod console;
pub mod control_loop;
pub mod startup;
pub mod workers;

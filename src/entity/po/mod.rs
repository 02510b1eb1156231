pub mod panel_state_po;

//! modbus link layer
//! only the two function codes the panel needs: read discrete inputs and write multiple coils

pub mod prelude;
pub mod traits;
pub mod modbus_tcp;
pub mod modbus_dummy;

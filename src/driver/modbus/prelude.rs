// modbus unit (slave) id type
pub type ModbusUnitSize = u8;
// modbus coil / input address type
pub type ModbusAddrSize = u16;

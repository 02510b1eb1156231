//! the 8 coil command state written back to the device
//! layout: [enable, clockwise, counter clockwise, reserved, program select (4 bits, msb first)]

use std::fmt::{self, Display, Formatter};

use crate::common::error::PanelError;

pub const OUTPUT_LEN: usize = 8;
pub const ENABLE_INDEX: usize = 0;
pub const CLOCKWISE_INDEX: usize = 1;
pub const COUNTER_CLOCKWISE_INDEX: usize = 2;
// index 3 is reserved
pub const PROGRAM_START_INDEX: usize = 4;
pub const PROGRAM_BITS: usize = 4;
pub const PROGRAM_MAX: u8 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutputVector([bool; OUTPUT_LEN]);

impl OutputVector {
    pub fn bits(&self) -> [bool; OUTPUT_LEN] {
        self.0
    }

    /// coil values in wire order, address 0 first
    pub fn as_coils(&self) -> &[bool] {
        &self.0
    }

    pub fn set_enable(&mut self, value: bool) {
        self.0[ENABLE_INDEX] = value;
    }

    pub fn set_clockwise(&mut self, value: bool) {
        self.0[CLOCKWISE_INDEX] = value;
    }

    pub fn set_counter_clockwise(&mut self, value: bool) {
        self.0[COUNTER_CLOCKWISE_INDEX] = value;
    }

    /// write `selection` into the program bits, most significant bit first
    pub fn set_program_selection(&mut self, selection: u8) -> Result<(), PanelError> {
        if selection > PROGRAM_MAX {
            return Err(PanelError::invalid_argument(format!(
                "program selection {} out of range 0-{}", selection, PROGRAM_MAX
            )));
        }
        for i in 0..PROGRAM_BITS {
            let shift = PROGRAM_BITS - 1 - i;
            self.0[PROGRAM_START_INDEX + i] = (selection >> shift) & 1 == 1;
        }
        Ok(())
    }

    pub fn program_selection(&self) -> u8 {
        self.0[PROGRAM_START_INDEX..]
            .iter()
            .fold(0u8, |acc, bit| (acc << 1) | *bit as u8)
    }

    /// overwrite from a string of up to 8 '0'/'1' characters, positions past the end become 0
    /// the vector is untouched when the string is rejected
    pub fn set_from_bit_string(&mut self, bits: &str) -> Result<(), PanelError> {
        if bits.chars().count() > OUTPUT_LEN {
            return Err(PanelError::invalid_argument(format!(
                "bit string '{}' is longer than {} bits", bits, OUTPUT_LEN
            )));
        }
        let mut next = [false; OUTPUT_LEN];
        for (i, c) in bits.chars().enumerate() {
            next[i] = match c {
                '0' => false,
                '1' => true,
                other => {
                    return Err(PanelError::invalid_argument(format!(
                        "bit string '{}' contains '{}', only 0 and 1 are allowed", bits, other
                    )))
                }
            };
        }
        self.0 = next;
        Ok(())
    }

    /// seed from a discrete input read, extra values are ignored and missing ones are 0
    pub fn from_discrete_inputs(values: &[bool]) -> Self {
        let mut bits = [false; OUTPUT_LEN];
        for (slot, value) in bits.iter_mut().zip(values.iter()) {
            *slot = *value;
        }
        OutputVector(bits)
    }

    /// restore from the stored integer list, which must be exactly 8 entries of 0 or 1
    pub fn from_persisted(values: &[u8]) -> Result<Self, PanelError> {
        if values.len() != OUTPUT_LEN {
            return Err(PanelError::state_store(format!(
                "stored output vector has {} entries, expected {}", values.len(), OUTPUT_LEN
            )));
        }
        let mut bits = [false; OUTPUT_LEN];
        for (i, value) in values.iter().enumerate() {
            bits[i] = match value {
                0 => false,
                1 => true,
                other => {
                    return Err(PanelError::state_store(format!(
                        "stored output vector entry {} is {}, expected 0 or 1", i, other
                    )))
                }
            };
        }
        Ok(OutputVector(bits))
    }

    pub fn to_persisted(&self) -> Vec<u8> {
        self.0.iter().map(|bit| *bit as u8).collect()
    }
}

impl Display for OutputVector {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let items: Vec<&str> = self.0.iter().map(|bit| if *bit { "1" } else { "0" }).collect();
        write!(f, "[{}]", items.join(", "))
    }
}

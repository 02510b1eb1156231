//! operator commands, shown as a numbered menu

use crate::common::error::PanelError;
use crate::entity::bo::output_vector_bo::PROGRAM_MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelCommand {
    LoadLastState,
    ChangeAddress,
    ChangePort,
    SetEnable,
    ChangeProgramSelection,
    SetClockwise,
    SetCounterClockwise,
    SetBits,
}

impl PanelCommand {
    /// menu order, entry `i` is selected with number `i + 1`
    pub const ALL: [PanelCommand; 8] = [
        PanelCommand::LoadLastState,
        PanelCommand::ChangeAddress,
        PanelCommand::ChangePort,
        PanelCommand::SetEnable,
        PanelCommand::ChangeProgramSelection,
        PanelCommand::SetClockwise,
        PanelCommand::SetCounterClockwise,
        PanelCommand::SetBits,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PanelCommand::LoadLastState => "load_last_state",
            PanelCommand::ChangeAddress => "change_ip",
            PanelCommand::ChangePort => "change_port",
            PanelCommand::SetEnable => "set_enable",
            PanelCommand::ChangeProgramSelection => "change_program_selection",
            PanelCommand::SetClockwise => "set_cw",
            PanelCommand::SetCounterClockwise => "set_ccw",
            PanelCommand::SetBits => "bits_input",
        }
    }

    pub fn from_menu_choice(raw: &str) -> Result<Self, PanelError> {
        let raw = raw.trim();
        let choice: usize = raw
            .parse()
            .map_err(|_| PanelError::invalid_argument(format!("'{}' is not a command number", raw)))?;
        choice
            .checked_sub(1)
            .and_then(|index| Self::ALL.get(index).copied())
            .ok_or_else(|| {
                PanelError::invalid_argument(format!(
                    "command number {} out of range 1-{}", choice, Self::ALL.len()
                ))
            })
    }
}

/// "1" / "0" answer to a yes-no prompt
pub fn parse_flag(raw: &str) -> Result<bool, PanelError> {
    match raw.trim() {
        "1" => Ok(true),
        "0" => Ok(false),
        other => Err(PanelError::invalid_argument(format!("expected 1 or 0, got '{}'", other))),
    }
}

pub fn parse_program_selection(raw: &str) -> Result<u8, PanelError> {
    let raw = raw.trim();
    let selection: u8 = raw
        .parse()
        .map_err(|_| PanelError::invalid_argument(format!("'{}' is not a program number", raw)))?;
    if selection > PROGRAM_MAX {
        return Err(PanelError::invalid_argument(format!(
            "program selection {} out of range 0-{}", selection, PROGRAM_MAX
        )));
    }
    Ok(selection)
}

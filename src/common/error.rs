use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    // malformed operator input
    InvalidArgument = 1001,
    // device unreachable or connection refused
    ConnectError = 1002,
    // connect failed and the fallback target failed too, no usable link
    ConnectionLost = 1003,
    // read or write failure on an open link
    ProtocolError = 1004,
    // persisted state missing, unreadable or not writable
    StateStoreError = 1005,
    // operator console closed or broken
    ConsoleClosed = 1006,
}

#[derive(Debug, Clone)]
pub struct PanelError {
    pub code: ErrorCode,
    pub msg: String,
}

impl PanelError {
    pub fn new(code: ErrorCode, msg: impl Into<String>) -> Self {
        PanelError { code, msg: msg.into() }
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArgument, msg)
    }

    pub fn connect(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConnectError, msg)
    }

    pub fn connection_lost(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConnectionLost, msg)
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ProtocolError, msg)
    }

    pub fn state_store(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::StateStoreError, msg)
    }

    pub fn console_closed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConsoleClosed, msg)
    }

    pub fn is(&self, code: ErrorCode) -> bool {
        self.code == code
    }
}

impl Display for PanelError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "panel error code: {}, msg: {}", self.code as u16, self.msg)
    }
}

impl Error for PanelError {}

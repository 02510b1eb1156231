//! logger setup
//! log lines go to stderr so they do not tear up the operator menu on stdout

use std::io::Error;
use pretty_env_logger;
use super::setting::Settings;

/// initialise the logger once, level comes from settings
pub fn init_logger() -> Result<(), Error> {
    // already initialised
    if log::max_level() != log::LevelFilter::Off {
        return Ok(())
    }

    pretty_env_logger::formatted_builder()
        .target(pretty_env_logger::env_logger::Target::Stderr)
        .filter_level(parse_level(Settings::get().env.log_level.as_str()))
        .try_init()
        .map_err(|e| Error::new(std::io::ErrorKind::Other, e))?;
    Ok(())
}

fn parse_level(level: &str) -> log::LevelFilter {
    match level {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "info" => log::LevelFilter::Info,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        "off" => log::LevelFilter::Off,
        _ => log::LevelFilter::Info
    }
}


/// logging macros with a TAG prefix, supports trace debug info warn error
#[macro_export]
macro_rules! warn {
    ($tag:expr, $($arg:tt)*) => ({
        log::warn!("[{}] {}", $tag, format_args!($($arg)*));
    })
}

#[macro_export]
macro_rules! error {
    ($tag:expr, $($arg:tt)*) => ({
        log::error!("[{}] {}", $tag, format_args!($($arg)*));
    })
}

#[macro_export]
macro_rules! info {
    ($tag:expr, $($arg:tt)*) => ({
        log::info!("[{}] {}", $tag, format_args!($($arg)*));
    })
}

#[macro_export]
macro_rules! debug {
    ($tag:expr, $($arg:tt)*) => ({
        log::debug!("[{}] {}", $tag, format_args!($($arg)*));
    })
}

#[macro_export]
macro_rules! trace {
    ($tag:expr, $($arg:tt)*) => ({
        log::trace!("[{}] {}", $tag, format_args!($($arg)*));
    })
}

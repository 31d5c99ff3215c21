/// Console + file logging for host processes, with log file rotation.
pub mod logger_setup;

pub use logger_setup::{parse_level, setup_logging};

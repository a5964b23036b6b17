//! Command implementations.

pub mod config;
pub mod replay;
pub mod scan;

pub use self::config::execute_config;
pub use self::replay::execute_replay;
pub use self::scan::execute_scan;

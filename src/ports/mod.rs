//! Port traits the domain depends on; adapters implement them.

pub mod config_port;
pub mod data_port;
pub mod intent_port;
pub mod report_port;

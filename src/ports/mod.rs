//! Port traits decoupling the engine from data and configuration sources.

pub mod config_port;
pub mod data_port;

//! Concrete adapters behind the port traits.

pub mod csv_source;
pub mod ini_config;

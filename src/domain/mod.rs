//! Core domain types and the incremental computation engine.

pub mod bar;
pub mod series;
pub mod signal;
pub mod forecast;
pub mod weights;
pub mod env;
pub mod error;

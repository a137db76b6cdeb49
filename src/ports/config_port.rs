//! Configuration access port.

/// Read access to sectioned configuration. `keys` exists so callers can
/// reject unrecognized options instead of silently ignoring them.
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;

    fn keys(&self, section: &str) -> Vec<String>;

    fn has_section(&self, section: &str) -> bool;
}

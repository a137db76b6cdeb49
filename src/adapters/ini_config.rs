//! INI file configuration adapter.

use std::path::Path;

use configparser::ini::Ini;

use crate::domain::error::TreefolioError;
use crate::ports::config_port::ConfigPort;

/// Sectioned configuration backed by `configparser`. Section and key lookups
/// are case-insensitive, matching the parser's own normalization.
#[derive(Debug)]
pub struct IniConfig {
    ini: Ini,
}

impl IniConfig {
    pub fn from_file(path: &Path) -> Result<Self, TreefolioError> {
        let mut ini = Ini::new();
        ini.load(path).map_err(|reason| TreefolioError::ConfigParse {
            file: path.display().to_string(),
            reason,
        })?;
        Ok(IniConfig { ini })
    }

    pub fn from_string(content: &str) -> Result<Self, TreefolioError> {
        let mut ini = Ini::new();
        ini.read(content.to_string())
            .map_err(|reason| TreefolioError::ConfigParse {
                file: "<inline>".to_string(),
                reason,
            })?;
        Ok(IniConfig { ini })
    }
}

impl ConfigPort for IniConfig {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.ini.get(section, key)
    }

    fn keys(&self, section: &str) -> Vec<String> {
        let section = section.to_lowercase();
        self.ini
            .get_map_ref()
            .get(&section)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn has_section(&self, section: &str) -> bool {
        let section = section.to_lowercase();
        self.ini.sections().iter().any(|s| *s == section)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const SAMPLE: &str = "\
[portfolio]
name = test-env
optimizer = equal

[model]
kind = arima
window = 20
";

    #[test]
    fn reads_values_from_string() {
        let config = IniConfig::from_string(SAMPLE).unwrap();
        assert_eq!(
            config.get_string("portfolio", "name"),
            Some("test-env".to_string())
        );
        assert_eq!(config.get_string("model", "window"), Some("20".to_string()));
        assert_eq!(config.get_string("model", "absent"), None);
    }

    #[test]
    fn reads_values_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("backtest.ini");
        fs::write(&path, SAMPLE).unwrap();
        let config = IniConfig::from_file(&path).unwrap();
        assert_eq!(config.get_string("model", "kind"), Some("arima".to_string()));
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let config = IniConfig::from_string(SAMPLE).unwrap();
        assert_eq!(
            config.get_string("Portfolio", "Name"),
            Some("test-env".to_string())
        );
        assert!(config.has_section("PORTFOLIO"));
    }

    #[test]
    fn keys_lists_section_options() {
        let config = IniConfig::from_string(SAMPLE).unwrap();
        let mut keys = config.keys("model");
        keys.sort();
        assert_eq!(keys, vec!["kind", "window"]);
        assert!(config.keys("missing").is_empty());
    }

    #[test]
    fn missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let err = IniConfig::from_file(&dir.path().join("nope.ini")).unwrap_err();
        assert!(matches!(err, TreefolioError::ConfigParse { .. }));
    }
}

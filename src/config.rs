//! Generator configuration.

use std::path::PathBuf;

use crate::errors::{BridgeError, Result};

/// Recognized options for one generator invocation.
///
/// [`GenerateConfig::resolved`] applies the output-directory prefix and
/// validates the module name; components downstream assume a resolved
/// configuration.
#[derive(Debug, Clone)]
pub struct GenerateConfig {
    /// Output path of the C bridge source.
    pub c_source: PathBuf,
    /// Output path of the C header.
    pub c_header: PathBuf,
    /// Output path of the Rust bridge source.
    pub rust_source: PathBuf,
    /// Declared name of the Python extension module.
    pub module_name: String,
    /// Apply the snake_case identifier transform.
    pub snake_case: bool,
    /// Export every eligible public function, marker or not.
    pub export_all: bool,
    /// Cargo features gating the generated Rust code.
    pub tags: Vec<String>,
    /// Directory prefix applied to all three artifact paths.
    pub output_dir: Option<PathBuf>,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            c_source: PathBuf::from("pyexports.c"),
            c_header: PathBuf::from("pyexports.h"),
            rust_source: PathBuf::from("pyexports.rs"),
            module_name: "rsmodule".to_string(),
            snake_case: true,
            export_all: false,
            tags: Vec::new(),
            output_dir: None,
        }
    }
}

impl GenerateConfig {
    /// Apply the output-directory prefix and validate the configuration.
    pub fn resolved(mut self) -> Result<Self> {
        if self.module_name.is_empty() {
            return Err(BridgeError::Config("module name must not be empty".into()));
        }
        if !is_identifier(&self.module_name) {
            return Err(BridgeError::Config(format!(
                "module name '{}' is not a valid identifier",
                self.module_name
            )));
        }
        for tag in &self.tags {
            if !is_feature_name(tag) {
                return Err(BridgeError::Config(format!(
                    "build tag '{tag}' is not a valid feature name"
                )));
            }
        }
        if let Some(dir) = self.output_dir.take() {
            self.c_source = dir.join(&self.c_source);
            self.c_header = dir.join(&self.c_header);
            self.rust_source = dir.join(&self.rust_source);
        }
        Ok(self)
    }

    /// The three artifact paths in write order.
    pub fn artifact_paths(&self) -> [&PathBuf; 3] {
        [&self.rust_source, &self.c_source, &self.c_header]
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_feature_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_dir_prefixes_all_artifacts() {
        let config = GenerateConfig {
            output_dir: Some(PathBuf::from("build/py")),
            ..GenerateConfig::default()
        };
        let resolved = config.resolved().unwrap();
        assert_eq!(resolved.c_source, PathBuf::from("build/py/pyexports.c"));
        assert_eq!(resolved.c_header, PathBuf::from("build/py/pyexports.h"));
        assert_eq!(resolved.rust_source, PathBuf::from("build/py/pyexports.rs"));
        assert!(resolved.output_dir.is_none());
    }

    #[test]
    fn test_empty_module_name_is_a_config_error() {
        let config = GenerateConfig {
            module_name: String::new(),
            ..GenerateConfig::default()
        };
        assert!(matches!(
            config.resolved(),
            Err(BridgeError::Config(_))
        ));
    }

    #[test]
    fn test_module_name_must_be_identifier() {
        let config = GenerateConfig {
            module_name: "my module".to_string(),
            ..GenerateConfig::default()
        };
        assert!(config.resolved().is_err());
    }

    #[test]
    fn test_default_paths() {
        let config = GenerateConfig::default().resolved().unwrap();
        assert_eq!(config.c_source, PathBuf::from("pyexports.c"));
        assert_eq!(config.module_name, "rsmodule");
        assert!(config.snake_case);
    }
}

use crate::error::Error;
use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Worker pool size for hashing and copying. Defaults to available parallelism.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    pub source: SourceConfig,
    pub destination: DestinationConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    pub root: String,
    #[serde(default = "default_commit")]
    pub commit: String,
    /// Unreal Engine checkout: run GitDependencies and include `.uedependencies` files.
    #[serde(default, alias = "dependency_manifest")]
    pub is_unreal: bool,
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DestinationConfig {
    pub p4port: String,
    pub p4user: String,
    pub p4client: String,
    pub root: String,
    pub stream: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Overrides the server's reported `clientCase`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_sensitive: Option<bool>,
    /// `p4` executable to run; found on PATH when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p4_program: Option<String>,
}

fn default_commit() -> String {
    "HEAD".to_string()
}

/// Load a TOML config file, then layer `P4H__SECTION__KEY` environment overrides on top.
pub fn load_configuration(path: &Path) -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::from(path))
        .add_source(Environment::with_prefix("P4H").separator("__"))
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), Error> {
        let required = [
            ("source.root", &self.source.root),
            ("destination.p4port", &self.destination.p4port),
            ("destination.p4user", &self.destination.p4user),
            ("destination.p4client", &self.destination.p4client),
            ("destination.root", &self.destination.root),
            ("destination.stream", &self.destination.stream),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(Error::Validation(format!("'{}' must not be empty", name)));
            }
        }

        if !self.destination.stream.starts_with("//") {
            return Err(Error::Validation(format!(
                "Destination stream must be a depot path like //Depot/Main, got '{}'",
                self.destination.stream
            )));
        }

        if roots_overlap(&self.source.root, &self.destination.root) {
            return Err(Error::Validation(format!(
                "Source root '{}' and destination root '{}' must not contain each other",
                self.source.root, self.destination.root
            )));
        }

        if self.workers == Some(0) {
            return Err(Error::Validation("'workers' must be at least 1".to_string()));
        }

        Ok(())
    }

    /// Stream path without a trailing slash, e.g. `//UE5/Release`.
    pub fn stream(&self) -> &str {
        self.destination.stream.trim_end_matches('/')
    }
}

/// True when either directory is the other or one of its subdirectories.
pub fn roots_overlap(a: &str, b: &str) -> bool {
    let a_path = Path::new(a);
    let b_path = Path::new(b);
    a_path.starts_with(b_path) || b_path.starts_with(a_path)
}

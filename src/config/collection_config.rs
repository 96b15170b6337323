use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_COMPRESSION_FORMAT, DEFAULT_HASH_ALGORITHMS, DEFAULT_PACKAGE_NAMING};

/// Free-form per-module options, e.g. `capture_seconds: "10"`.
pub type ModuleSettings = BTreeMap<String, String>;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct HashingConfig {
    pub algorithms: Vec<String>,
    /// Re-hash the inventory once all modules finished
    pub verify_after_collection: bool,
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            algorithms: DEFAULT_HASH_ALGORITHMS.iter().map(|s| s.to_string()).collect(),
            verify_after_collection: true,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct CompressionConfig {
    pub enabled: bool,
    pub format: String,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            format: DEFAULT_COMPRESSION_FORMAT.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ReportConfig {
    pub enabled: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Configuration bundle handed to a collection run.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct CollectionConfig {
    pub output_directory: PathBuf,
    /// Name of the per-run folder; `{timestamp}` expands to `YYYYmmdd_HHMMSS`
    pub package_naming: String,
    pub hashing: HashingConfig,
    pub compression: CompressionConfig,
    pub report: ReportConfig,
    pub modules: HashMap<String, ModuleSettings>,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        let mut modules = HashMap::new();

        let mut network = ModuleSettings::new();
        network.insert("capture_seconds".to_string(), "0".to_string());
        modules.insert("network".to_string(), network);

        let mut filesystem = ModuleSettings::new();
        filesystem.insert("max_entries".to_string(), "5000".to_string());
        modules.insert("filesystem".to_string(), filesystem);

        Self {
            output_directory: PathBuf::from("./Evidence_Collections"),
            package_naming: DEFAULT_PACKAGE_NAMING.to_string(),
            hashing: HashingConfig::default(),
            compression: CompressionConfig::default(),
            report: ReportConfig::default(),
            modules,
        }
    }
}

impl CollectionConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        let config: CollectionConfig =
            serde_yaml::from_str(&content).context("Failed to parse YAML config")?;

        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save_to_yaml_file(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .context(format!("Failed to create config directory {}", parent.display()))?;
        }

        fs::write(path, yaml).context(format!("Failed to write config to {}", path.display()))?;

        info!("Saved configuration to {}", path.display());
        Ok(())
    }

    pub fn algorithms(&self) -> &[String] {
        &self.hashing.algorithms
    }

    /// Options for one module; empty when the config names none.
    pub fn module_settings(&self, module_id: &str) -> ModuleSettings {
        self.modules.get(module_id).cloned().unwrap_or_default()
    }

    /// Per-run folder name with `{timestamp}` expanded.
    pub fn package_name(&self) -> String {
        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        self.package_naming.replace("{timestamp}", &stamp)
    }

    /// Output root for a new run: `<output_directory>/<package name>`.
    pub fn run_directory(&self) -> PathBuf {
        self.output_directory.join(self.package_name())
    }
}

/// Load a configuration file or create a default one.
///
/// * `Some(path)` that exists: parsed from YAML.
/// * `Some(path)` that does not exist: defaults are written there and returned.
/// * `None`: defaults.
pub fn load_or_create_config(config_path: Option<&Path>) -> Result<CollectionConfig> {
    match config_path {
        Some(path) if path.exists() => CollectionConfig::from_yaml_file(path),
        Some(path) => {
            info!("Creating default config at {}", path.display());
            let config = CollectionConfig::default();
            config.save_to_yaml_file(path)?;
            Ok(config)
        }
        None => Ok(CollectionConfig::default()),
    }
}

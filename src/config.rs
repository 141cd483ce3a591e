//! Panel configuration: defaults, an optional JSON file, then CLI overrides.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

pub const DEFAULT_WS_URL: &str = "ws://127.0.0.1:9002";
pub const DEFAULT_START_HOOK: &str = "run_main";

/// Where the compute module comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModuleSource {
    /// The native module compiled into the crate.
    Builtin,
    /// An ES module on disk.
    Path(PathBuf),
    /// An ES module served over http(s).
    Url(String),
}

impl From<&str> for ModuleSource {
    fn from(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() || s == "builtin" {
            ModuleSource::Builtin
        } else if s.starts_with("http://") || s.starts_with("https://") {
            ModuleSource::Url(s.to_string())
        } else {
            ModuleSource::Path(PathBuf::from(s))
        }
    }
}

impl FromStr for ModuleSource {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl fmt::Display for ModuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleSource::Builtin => write!(f, "builtin"),
            ModuleSource::Path(path) => write!(f, "{}", path.display()),
            ModuleSource::Url(url) => write!(f, "{}", url),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct PanelConfig {
    pub ws_url: String,
    pub module: ModuleSource,
    pub start_hook: String,
    /// Element ids left off the page.
    pub missing_elements: Vec<String>,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
            module: ModuleSource::Builtin,
            start_hook: DEFAULT_START_HOOK.to_string(),
            missing_elements: Vec::new(),
        }
    }
}

/// On-disk shape; every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    ws_url: Option<String>,
    module: Option<String>,
    start_hook: Option<String>,
    #[serde(default)]
    missing_elements: Vec<String>,
}

impl PanelConfig {
    pub fn with_ws_url(mut self, ws_url: impl Into<String>) -> Self {
        self.ws_url = ws_url.into();
        self
    }

    pub fn with_module(mut self, module: ModuleSource) -> Self {
        self.module = module;
        self
    }

    pub fn with_start_hook(mut self, start_hook: impl Into<String>) -> Self {
        self.start_hook = start_hook.into();
        self
    }

    pub fn without_element(mut self, id: impl Into<String>) -> Self {
        self.missing_elements.push(id.into());
        self
    }

    /// Defaults overlaid with the fields present in a JSON config file.
    ///
    /// A relative module path is taken relative to the config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_json(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if let (ModuleSource::Path(module), Some(dir)) = (&mut config.module, path.parent()) {
            if module.is_relative() {
                *module = dir.join(&*module);
            }
        }
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let file: ConfigFile = serde_json::from_str(text)?;
        let mut config = Self::default();
        if let Some(ws_url) = file.ws_url {
            config.ws_url = ws_url;
        }
        if let Some(module) = file.module {
            config.module = ModuleSource::from(module.as_str());
        }
        if let Some(start_hook) = file.start_hook {
            config.start_hook = start_hook;
        }
        config.missing_elements = file.missing_elements;
        Ok(config)
    }
}

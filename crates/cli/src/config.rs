//! Host configuration.
//!
//! Read from `gantry.toml` when present, with defaults for everything and a
//! `GANTRY_MODULE_PATH` environment override for the guest binary.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

pub const CONFIG_FILE: &str = "gantry.toml";
pub const MODULE_PATH_ENV: &str = "GANTRY_MODULE_PATH";

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Guest binary to load.
    pub module: PathBuf,
    /// Class marking elements the visibility trigger observes.
    pub marker_class: String,
    pub threshold: f64,
    pub margin: f64,
    pub viewport: Viewport,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            module: PathBuf::from("guest.wasm"),
            marker_class: observer::DEFAULT_MARKER_CLASS.to_string(),
            threshold: 0.1,
            margin: 10.0,
            viewport: Viewport::default(),
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 800.0,
        }
    }
}

impl Config {
    pub fn load(dir: &Path) -> anyhow::Result<Self> {
        let path = dir.join(CONFIG_FILE);
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str(&raw).with_context(|| format!("invalid config {}", path.display()))?
        } else {
            Self::default()
        };
        if let Ok(module) = std::env::var(MODULE_PATH_ENV) {
            config.module = PathBuf::from(module);
        }
        Ok(config)
    }

    pub fn observer_options(&self) -> observer::ObserverOptions {
        observer::ObserverOptions {
            marker_class: self.marker_class.clone(),
            threshold: self.threshold,
            margin: self.margin,
        }
    }

    pub fn viewport_rect(&self) -> observer::Rect {
        observer::Rect::new(0.0, 0.0, self.viewport.width, self.viewport.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_page_contract() {
        let config = Config::default();
        assert_eq!(config.marker_class, "base-card");
        assert_eq!(config.threshold, 0.1);
        assert_eq!(config.margin, 10.0);
    }

    #[test]
    fn parses_partial_config() {
        let config: Config = toml::from_str(
            r#"
module = "target/guest.wasm"
threshold = 0.25

[viewport]
width = 640.0
"#,
        )
        .unwrap();
        assert_eq!(config.module, PathBuf::from("target/guest.wasm"));
        assert_eq!(config.threshold, 0.25);
        assert_eq!(config.viewport.width, 640.0);
        assert_eq!(config.viewport.height, 800.0);
        assert_eq!(config.marker_class, "base-card");
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(toml::from_str::<Config>("modul = \"typo.wasm\"").is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.module, PathBuf::from("guest.wasm"));
    }
}

//! Runtime configuration.

use crate::color::Color;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{fs, io};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("could not read configuration: {0}")]
    Io(#[from] io::Error),
}

/// Settings for a [`Ui`](crate::host::Ui).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct UiConfig {
    /// Whether descriptor nodes’ real type overrides are honored.
    pub use_type_overrides: bool,
    /// Longest time [`Ui::run_once`](crate::host::Ui::run_once) waits for work.
    pub timer_period_ms: u64,
    /// Border shown on a drop target while an acceptable drag hovers over it.
    pub drop_highlight: Color,
    pub drop_highlight_width: f64,
    /// Directory images are loaded from. Without one, resources live in memory.
    pub resource_root: Option<PathBuf>,
}

impl Default for UiConfig {
    fn default() -> UiConfig {
        UiConfig {
            use_type_overrides: true,
            timer_period_ms: 16,
            drop_highlight: Color::from_rgba8(0x3d, 0x7e, 0xff, 0xff),
            drop_highlight_width: 2.,
            resource_root: None,
        }
    }
}

impl UiConfig {
    pub fn from_toml_str(s: &str) -> Result<UiConfig, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<UiConfig, ConfigError> {
        UiConfig::from_toml_str(&fs::read_to_string(path)?)
    }

    pub fn timer_period(&self) -> Duration {
        Duration::from_millis(self.timer_period_ms)
    }
}

#[test]
fn test_partial_config() {
    let config = UiConfig::from_toml_str(
        r##"
use-type-overrides = false
drop-highlight = "#ff0000"
"##,
    )
    .unwrap();
    assert!(!config.use_type_overrides);
    assert_eq!(config.drop_highlight, Color::rgb(1., 0., 0.));
    assert_eq!(config.timer_period(), Duration::from_millis(16));
    assert_eq!(config.drop_highlight_width, 2.);
    assert_eq!(config.resource_root, None);
}

#[test]
fn test_bad_config() {
    assert!(matches!(
        UiConfig::from_toml_str("drop-highlight = \"mauve\""),
        Err(ConfigError::Toml(_))
    ));
    assert!(matches!(
        UiConfig::load("/nonexistent/roost.toml"),
        Err(ConfigError::Io(_))
    ));
}

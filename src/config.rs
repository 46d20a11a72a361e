use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_DELAY_SECS: u64 = 5;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub site: Site,
    pub import: Import,
    pub export: Export,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Site {
    pub url: Option<String>,
    pub username: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Import {
    pub folder: Option<PathBuf>,
    pub delay_secs: u64,
}

impl Default for Import {
    fn default() -> Import {
        Import {
            folder: None,
            delay_secs: DEFAULT_DELAY_SECS,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Export {
    pub folder: Option<PathBuf>,
}

impl Import {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }
}

impl Config {
    /// Loads the config from `explicit` if given, else from the XDG config
    /// directory. A missing XDG config is not an error.
    pub fn load(explicit: Option<&Path>) -> Result<Config> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => {
                let xdg_dirs = xdg::BaseDirectories::with_prefix("md2wp")
                    .context("could not locate XDG directories")?;
                match xdg_dirs.find_config_file("config.toml") {
                    Some(p) => p,
                    None => return Ok(Config::default()),
                }
            }
        };

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("could not open config file {}", path.display()))?;
        Config::from_toml(&contents)
            .with_context(|| format!("could not parse {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Config> {
        Ok(toml::from_str(contents)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn empty_config_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert!(config.site.url.is_none());
        assert_eq!(config.import.delay(), Duration::from_secs(5));
    }

    #[test]
    fn reads_all_sections() {
        let config = Config::from_toml(indoc! {r#"
            [site]
            url = "https://example.com"
            username = "admin"

            [import]
            folder = "/srv/jekyll/_posts"
            delay_secs = 1

            [export]
            folder = "out"
        "#})
        .unwrap();

        assert_eq!(config.site.url.as_deref(), Some("https://example.com"));
        assert_eq!(config.site.username.as_deref(), Some("admin"));
        assert_eq!(config.import.folder, Some(PathBuf::from("/srv/jekyll/_posts")));
        assert_eq!(config.import.delay_secs, 1);
        assert_eq!(config.export.folder, Some(PathBuf::from("out")));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(Config::load(Some(missing.as_path())).is_err());
    }
}

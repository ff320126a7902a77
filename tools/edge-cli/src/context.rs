//! CLI execution context.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context as _, Result};
use url::Url;

use crate::config::CliConfig;
use crate::output::Output;

/// File names searched for, in order, in each directory.
pub const CONFIG_NAMES: [&str; 3] = ["edge.toml", ".edge.toml", "edge.json"];

/// Execution context for CLI commands.
pub struct Context {
    /// CLI configuration.
    pub config: CliConfig,
    /// Where `config` was read from, if anywhere.
    pub config_path: Option<PathBuf>,
    /// Output handler.
    pub output: Output,
    /// Working directory.
    pub cwd: PathBuf,
}

impl Context {
    /// Load context from config file.
    pub fn load(config_path: Option<&str>, output: Output) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;

        let (config, config_path) = match config_path {
            Some(path) => (CliConfig::load(path)?, Some(PathBuf::from(path))),
            None => match Self::find_config(&cwd) {
                Some((path, config)) => (config, Some(path)),
                None => (CliConfig::default(), None),
            },
        };

        Ok(Self {
            config,
            config_path,
            output,
            cwd,
        })
    }

    /// Find config file in directory tree.
    fn find_config(start: &Path) -> Option<(PathBuf, CliConfig)> {
        let mut current = start.to_path_buf();
        loop {
            for name in &CONFIG_NAMES {
                let config_path = current.join(name);
                if config_path.exists() {
                    if let Ok(config) = CliConfig::load(config_path.to_str()?) {
                        return Some((config_path, config));
                    }
                }
            }

            if !current.pop() {
                break;
            }
        }

        None
    }

    /// The origin relative request URLs resolve against.
    ///
    /// `override_origin` wins over the configured one.
    pub fn origin(&self, override_origin: Option<&str>) -> Result<Url> {
        let raw = override_origin
            .or(self.config.origin.as_deref())
            .ok_or_else(|| anyhow!("No origin configured. Pass --origin or set `origin` in edge.toml."))?;

        Url::parse(raw).with_context(|| format!("Invalid origin: {}", raw))
    }

    /// Resolve a path relative to the working directory.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        if Path::new(path).is_absolute() {
            PathBuf::from(path)
        } else {
            self.cwd.join(path)
        }
    }
}

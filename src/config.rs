use crate::{semant::CheckOptions, strings::CONFIG_FILE_NAME};
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

/// Search for lrcheck.toml starting from the current directory and moving up
/// the directory tree.
pub fn find_config_file() -> Result<PathBuf, ConfigError> {
    let current_dir =
        env::current_dir().map_err(|e| ConfigError::IoError(PathBuf::from("."), e))?;

    let start_dir = current_dir
        .canonicalize()
        .map_err(|e| ConfigError::IoError(current_dir.to_path_buf(), e))?;

    find_config_file_from(&start_dir)
}

fn find_config_file_from(start_dir: &Path) -> Result<PathBuf, ConfigError> {
    let mut current = start_dir;

    loop {
        let candidate = current.join(CONFIG_FILE_NAME);
        if candidate.exists() {
            return Ok(candidate);
        }

        current = match current.parent() {
            Some(parent) => parent,
            None => return Err(ConfigError::NotFound),
        };
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LrConfig {
    checker: CheckOptions,
    color: bool,
}

impl Default for LrConfig {
    fn default() -> Self {
        Self {
            checker: CheckOptions::default(),
            color: true,
        }
    }
}

impl LrConfig {
    /// Loads the config at `path`, or the nearest lrcheck.toml when no path
    /// is given. Without either the defaults apply.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => match find_config_file() {
                Ok(found) => Self::from_file(&found),
                Err(ConfigError::NotFound) => Ok(Self::default()),
                Err(e) => Err(e),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            fs::read_to_string(path).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        Self::from_toml(&contents).map_err(|e| ConfigError::ParseError(path.to_path_buf(), e))
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        let file: LrConfigFile = toml::from_str(contents)?;
        let defaults = CheckOptions::default();
        let checker = file.checker.unwrap_or_default();

        Ok(Self {
            checker: CheckOptions {
                strict_line_order: checker
                    .strict_line_order
                    .unwrap_or(defaults.strict_line_order),
                exact_formulas: checker.exact_formulas.unwrap_or(defaults.exact_formulas),
            },
            color: file.output.and_then(|o| o.color).unwrap_or(true),
        })
    }

    pub fn checker(&self) -> &CheckOptions {
        &self.checker
    }

    pub fn color(&self) -> bool {
        self.color
    }
}

#[derive(Debug, Deserialize)]
struct LrConfigFile {
    checker: Option<CheckerConfig>,
    output: Option<OutputConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct CheckerConfig {
    strict_line_order: Option<bool>,
    exact_formulas: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct OutputConfig {
    color: Option<bool>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no `{name}` found", name = CONFIG_FILE_NAME)]
    NotFound,
    #[error("could not read `{path}`: {1}", path = .0.display())]
    IoError(PathBuf, #[source] std::io::Error),
    #[error("invalid config `{path}`: {1}", path = .0.display())]
    ParseError(PathBuf, #[source] toml::de::Error),
}

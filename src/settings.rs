//! Runtime settings
//!
//! Settings are merged from, lowest priority first: built-in defaults, a
//! TOML file (`viktorina.toml` in the working directory, or an explicit
//! path), and `VIKTORINA_`-prefixed environment variables, where `__`
//! separates nesting levels (`VIKTORINA_JUDGE__API_KEY`,
//! `VIKTORINA_GAME__WIN_THRESHOLD`). The merged result is validated before
//! use.

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use garde::Validate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::{game::Options, judge::JudgeSettings};

/// File looked up in the working directory when no path is given
pub const DEFAULT_FILE: &str = "viktorina.toml";

/// Prefix of the environment variables read as settings
pub const ENV_PREFIX: &str = "VIKTORINA_";

/// Where custom questions are kept
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Directory of the file store
    pub dir: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".viktorina"),
        }
    }
}

/// Errors raised while loading settings
#[derive(Error, Debug)]
pub enum Error {
    /// A source could not be read or did not match the expected shape
    #[error("failed to load settings: {0}")]
    Load(#[from] Box<figment::Error>),
    /// The merged settings are out of bounds
    #[error("invalid settings: {0}")]
    Invalid(#[from] garde::Report),
    /// The explicitly named file does not exist
    #[error("settings file {} does not exist", .0.display())]
    MissingFile(PathBuf),
}

/// Everything the game reads at startup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Settings {
    /// Engine options
    #[garde(dive)]
    pub game: Options,
    /// Remote judge
    #[garde(dive)]
    pub judge: JudgeSettings,
    /// Custom question storage
    #[garde(skip)]
    pub storage: StorageSettings,
}

impl Settings {
    /// The layered sources for `path`, without the environment
    fn files(path: Option<&Path>) -> Result<Figment, Error> {
        let figment = Figment::new().merge(Serialized::defaults(Settings::default()));

        match path {
            Some(path) if !path.exists() => Err(Error::MissingFile(path.to_owned())),
            Some(path) => {
                debug!(path = %path.display(), "reading settings file");
                Ok(figment.merge(Toml::file(path)))
            }
            None if Path::new(DEFAULT_FILE).exists() => {
                debug!(path = DEFAULT_FILE, "reading settings file");
                Ok(figment.merge(Toml::file(DEFAULT_FILE)))
            }
            None => Ok(figment),
        }
    }

    /// Extracts and validates settings from `figment`
    ///
    /// # Errors
    ///
    /// Fails if the sources do not deserialize or the result is invalid.
    pub fn from_figment(figment: &Figment) -> Result<Self, Error> {
        let settings: Settings = figment.extract().map_err(Box::new)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads settings from defaults, the settings file and the environment
    ///
    /// # Errors
    ///
    /// Fails if an explicit `path` is missing, a source is malformed, or
    /// the merged settings are invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let figment = Self::files(path)?.merge(Env::prefixed(ENV_PREFIX).split("__"));
        Self::from_figment(&figment)
    }
}

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::str::FromStr;

/// Errors raised while loading or interpreting a config file.
#[derive(Debug)]
pub enum ConfigError {
    /// The file could not be read.
    Read { path: String, reason: String },
    /// A key is present but its value does not parse.
    Invalid {
        section: String,
        key: String,
        value: String,
    },
    /// A key that has no default is absent.
    Missing { section: String, key: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read { path, reason } => write!(f, "error reading config {path}: {reason}"),
            Self::Invalid {
                section,
                key,
                value,
            } => write!(f, "invalid value for [{section}] {key}: {value:?}"),
            Self::Missing { section, key } => write!(f, "missing [{section}] {key}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// INI-style key/value file: `[Section]` headers, `key = value` lines,
/// `#` comments. Keys before the first header are globals.
#[derive(Debug, Default, Clone)]
pub struct Config {
    pub globals: HashMap<String, String>,
    pub sections: HashMap<String, HashMap<String, String>>,
}

impl Config {
    /// # Errors
    /// [`ConfigError::Read`] when the file cannot be read.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_owned(),
            reason: e.to_string(),
        })?;
        Ok(Self::parse(&content))
    }

    /// Parses config text. Malformed lines are skipped.
    #[must_use]
    pub fn parse(content: &str) -> Self {
        let mut cfg = Self::default();
        let mut current: Option<String> = None;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                current = Some(name.trim().to_owned());
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim().to_owned();
            let value = value.trim().trim_matches('"').to_owned();
            match &current {
                None => {
                    cfg.globals.insert(key, value);
                }
                Some(sec) => {
                    cfg.sections
                        .entry(sec.clone())
                        .or_default()
                        .insert(key, value);
                }
            }
        }
        cfg
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|sec| sec.get(key))
            .map(String::as_str)
    }

    /// Like [`get`](Self::get) but treats an empty value as absent.
    #[must_use]
    pub fn get_non_empty(&self, section: &str, key: &str) -> Option<&str> {
        self.get(section, key).filter(|s| !s.is_empty())
    }

    #[must_use]
    pub fn get_global(&self, key: &str) -> Option<&str> {
        self.globals.get(key).map(String::as_str)
    }

    /// Section value, then global value, then `default`.
    #[must_use]
    pub fn get_or_default<'a>(&'a self, section: &str, key: &str, default: &'a str) -> &'a str {
        self.get_non_empty(section, key)
            .or_else(|| self.get_global(key).filter(|s| !s.is_empty()))
            .unwrap_or(default)
    }

    /// Parses `[section] key` into `T`, or `None` when the key is absent.
    ///
    /// # Errors
    /// [`ConfigError::Invalid`] when the value is present but does not parse.
    pub fn get_parsed<T: FromStr>(&self, section: &str, key: &str) -> Result<Option<T>, ConfigError> {
        match self.get_non_empty(section, key) {
            None => Ok(None),
            Some(raw) => raw.parse::<T>().map(Some).map_err(|_| ConfigError::Invalid {
                section: section.to_owned(),
                key: key.to_owned(),
                value: raw.to_owned(),
            }),
        }
    }

    /// Like [`get_parsed`](Self::get_parsed) with a fallback for absent keys.
    ///
    /// # Errors
    /// [`ConfigError::Invalid`] when the value is present but does not parse.
    pub fn get_parsed_or<T: FromStr>(
        &self,
        section: &str,
        key: &str,
        default: T,
    ) -> Result<T, ConfigError> {
        Ok(self.get_parsed(section, key)?.unwrap_or(default))
    }
}

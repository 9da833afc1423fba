//! API token resolution.
//!
//! A token can be given in one of three places, checked in this order:
//!
//! 1. **Inline** in the config file (`"token": "..."`), handy for local runs
//! 2. **File** (`"token_file": "/run/secrets/atelier_token"`), for mounted secrets
//! 3. **Environment variable** (`"token_env_var": "ATELIER_API_TOKEN"`)
//!
//! The first non-empty source wins. A source that is named but unreadable is an
//! error rather than a silent fall-through to the next one.

use std::fs;

use secrecy::SecretString;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No token source configured (need one of: token, token_file, token_env_var)")]
    NoSourceProvided,

    #[error("Failed to read token from file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Token file '{path}' is empty")]
    EmptyFile { path: String },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// The configured places a secret may come from. Empty strings count as unset.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretSources<'a> {
    pub direct: Option<&'a str>,
    pub file: Option<&'a str>,
    pub env_var: Option<&'a str>,
}

impl<'a> SecretSources<'a> {
    pub fn new(direct: Option<&'a str>, file: Option<&'a str>, env_var: Option<&'a str>) -> Self {
        Self {
            direct: non_empty(direct),
            file: non_empty(file),
            env_var: non_empty(env_var),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.direct.is_some() || self.file.is_some() || self.env_var.is_some()
    }

    /// Resolves the highest-priority source.
    pub fn resolve(&self) -> Result<SecretString> {
        if let Some(value) = self.direct {
            return Ok(SecretString::from(value.to_string()));
        }
        if let Some(path) = self.file {
            return read_secret_file(path);
        }
        if let Some(name) = self.env_var {
            return read_secret_env(name);
        }
        Err(SecretError::NoSourceProvided)
    }

    /// Like [`resolve`](Self::resolve), but an unconfigured secret is `None`.
    pub fn resolve_optional(&self) -> Result<Option<SecretString>> {
        if !self.is_configured() {
            return Ok(None);
        }
        self.resolve().map(Some)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn read_secret_file(path: &str) -> Result<SecretString> {
    let expanded = expand_home(path);
    let content = fs::read_to_string(&expanded).map_err(|source| SecretError::FileReadError {
        path: expanded.clone(),
        source,
    })?;
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(SecretError::EmptyFile { path: expanded });
    }
    Ok(SecretString::from(trimmed.to_string()))
}

fn read_secret_env(name: &str) -> Result<SecretString> {
    match std::env::var(name) {
        // Trailing newlines are common when the value was piped in.
        Ok(value) => Ok(SecretString::from(value.trim().to_string())),
        Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
            name: name.to_string(),
        }),
        Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
            name: name.to_string(),
        }),
    }
}

/// Expands a leading `~` or `~/` to the current user's home directory.
/// `~user/` forms are left untouched.
pub(crate) fn expand_home(path: &str) -> String {
    if path != "~" && !path.starts_with("~/") {
        return path.to_string();
    }
    match dirs::home_dir() {
        Some(home) => {
            let home = home.to_string_lossy();
            if path == "~" {
                home.into_owned()
            } else {
                format!("{}{}", home, &path[1..])
            }
        }
        None => path.to_string(),
    }
}

use std::env;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Failed to read the API key from the terminal")]
    Prompt(#[source] io::Error),
    #[error("Failed to {operation} {}", path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// API secret. Kept out of `Debug` output so it never lands in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Source of a manually entered key.
pub trait KeyPrompt {
    fn read_key(&mut self, key_var: &str) -> io::Result<String>;
}

/// Reads the key from the controlling terminal without echoing it.
pub struct TerminalPrompt;

impl KeyPrompt for TerminalPrompt {
    fn read_key(&mut self, _key_var: &str) -> io::Result<String> {
        rpassword::prompt_password("Enter your OpenAI API key: ")
    }
}

impl<F> KeyPrompt for F
where
    F: FnMut(&str) -> io::Result<String>,
{
    fn read_key(&mut self, key_var: &str) -> io::Result<String> {
        self(key_var)
    }
}

/// Loads an existing env file into the process environment without
/// overriding variables that are already set. A missing file is fine and
/// lines that do not parse are skipped with a warning.
pub fn load_env_file(path: &Path) {
    apply_env_file(path, false);
}

fn apply_env_file(path: &Path, override_existing: bool) {
    let entries = match dotenvy::from_path_iter(path) {
        Ok(entries) => entries,
        Err(err) if err.not_found() => return,
        Err(err) => {
            warn!(path = %path.display(), %err, "failed to read env file");
            return;
        }
    };

    for entry in entries {
        match entry {
            Ok((key, value)) => {
                if override_existing || env::var_os(&key).is_none() {
                    env::set_var(key, value);
                }
            }
            Err(err) => warn!(path = %path.display(), %err, "skipping env file line"),
        }
    }
    debug!(path = %path.display(), "loaded env file");
}

/// Returns the credential from the environment, or asks for it once,
/// stores it in the env file and reloads the environment from there.
pub fn resolve_credential(
    config: &Config,
    prompt: &mut dyn KeyPrompt,
) -> Result<Credential, CredentialError> {
    if let Some(secret) = env_value(&config.key_var) {
        debug!(key_var = %config.key_var, "credential found in environment");
        return Ok(Credential::new(secret));
    }

    let entered = prompt
        .read_key(&config.key_var)
        .map_err(CredentialError::Prompt)?;
    let entered = entered.trim();
    if entered.is_empty() {
        return Err(CredentialError::Configuration(format!(
            "no value entered for {}",
            config.key_var
        )));
    }

    save_key(&config.env_file, &config.key_var, entered)?;
    println!(".env file created with the API key.");

    // `$`, ` #` and `'` do not survive the env file parser; the typed value wins.
    apply_env_file(&config.env_file, true);
    env::set_var(&config.key_var, entered);

    Ok(Credential::new(entered))
}

/// Replaces the env file with a single `KEY=VALUE` line.
fn save_key(path: &Path, key_var: &str, secret: &str) -> Result<(), CredentialError> {
    fs::write(path, format!("{key_var}={secret}\n")).map_err(|source| CredentialError::Io {
        operation: "write",
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), key_var, "stored API key");
    Ok(())
}

fn env_value(key_var: &str) -> Option<String> {
    env::var(key_var)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

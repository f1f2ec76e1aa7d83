//! Configuration loading and schema definitions for railpost.
//!
//! Configuration comes from a TOML file; credentials can be supplied or
//! overridden through the environment so they stay out of the repository.

pub mod schema;

pub use schema::*;

use std::path::Path;

use anyhow::{Context, Result, bail};

/// Loads railpost configuration from a TOML file.
///
/// Environment overrides are not applied here; call [`Config::apply_env`]
/// afterwards.
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not match the schema.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    Ok(config)
}

/// Loads railpost configuration from a TOML string.
pub fn load_config_str(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).context("Failed to parse config")?;

    Ok(config)
}

impl Config {
    /// Applies `RAILPOST_HOST`, `RAILPOST_USER` and `RAILPOST_PASSWORD`.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(host) = lookup(ENV_HOST) {
            self.testrail.host = host;
        }
        if let Some(user) = lookup(ENV_USER) {
            self.testrail.user = user;
        }
        if let Some(password) = lookup(ENV_PASSWORD) {
            self.testrail.password = Some(password);
        }
    }

    /// Checks that the configuration is complete enough to publish.
    pub fn validate(&self) -> Result<()> {
        let host = self.testrail.host.trim();
        if host.is_empty() {
            bail!("testrail.host is not set (or set {})", ENV_HOST);
        }
        if !host.starts_with("http://") && !host.starts_with("https://") {
            bail!("testrail.host must start with http:// or https://, got '{}'", host);
        }
        if self.testrail.user.trim().is_empty() {
            bail!("testrail.user is not set (or set {})", ENV_USER);
        }
        if self
            .testrail
            .password
            .as_deref()
            .is_none_or(|p| p.is_empty())
        {
            bail!("testrail.password is not set (or set {})", ENV_PASSWORD);
        }
        if !self.target.project_selector().is_requested() {
            bail!("target.project or target.project_id must be set");
        }
        if self.run.close_after_days == Some(0) {
            bail!("run.close_after_days must be at least 1 (omit it to keep stale runs open)");
        }
        Ok(())
    }
}

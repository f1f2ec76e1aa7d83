//! Configuration schema definitions for railpost.
//!
//! # Schema Overview
//!
//! ```text
//! Config (root)
//! ├── TestRailConfig     - Service host and credentials
//! ├── TargetConfig       - Project / plan / suite selectors
//! ├── RunConfig          - Run naming, description, stale-run closure
//! └── AttachmentConfig   - Screenshot upload toggle
//! ```

use serde::{Deserialize, Serialize};

use crate::resolve::Selector;

/// Environment variable overriding `testrail.host`.
pub const ENV_HOST: &str = "RAILPOST_HOST";
/// Environment variable overriding `testrail.user`.
pub const ENV_USER: &str = "RAILPOST_USER";
/// Environment variable overriding `testrail.password`.
pub const ENV_PASSWORD: &str = "RAILPOST_PASSWORD";

/// Root configuration structure for railpost.
///
/// # Example
///
/// ```
/// use railpost::config::Config;
///
/// let config: Config = toml::from_str(r#"
///     [testrail]
///     host = "https://example.testrail.io"
///     user = "ci@example.com"
///     password = "api-key"
///
///     [target]
///     project = "Website QA"
/// "#).unwrap();
///
/// assert!(!config.attachments.enabled);
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Connection settings.
    pub testrail: TestRailConfig,

    /// Where results are published.
    pub target: TargetConfig,

    /// Run creation settings (optional, has defaults).
    #[serde(default)]
    pub run: RunConfig,

    /// Attachment upload settings (optional, has defaults).
    #[serde(default)]
    pub attachments: AttachmentConfig,
}

/// Service host and credentials.
///
/// ```toml
/// [testrail]
/// host = "https://example.testrail.io"
/// user = "ci@example.com"
/// password = "api-key"
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TestRailConfig {
    /// Base URL of the service, including the scheme.
    #[serde(default)]
    pub host: String,

    /// Account email used for Basic authentication.
    #[serde(default)]
    pub user: String,

    /// Account password or API key.
    ///
    /// Prefer `RAILPOST_PASSWORD` over committing this to a file.
    pub password: Option<String>,
}

/// Project, plan and suite selectors.
///
/// Each entity can be selected by name or by prefixed id (`P12`, `R7`,
/// `S3`). When both are given, the id wins. Plan and suite are optional.
///
/// ```toml
/// [target]
/// project_id = "P12"
/// plan = "Release 4.2"
/// suite = "Smoke"
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TargetConfig {
    pub project: Option<String>,
    pub project_id: Option<String>,
    pub plan: Option<String>,
    pub plan_id: Option<String>,
    pub suite: Option<String>,
    pub suite_id: Option<String>,
}

impl TargetConfig {
    pub fn project_selector(&self) -> Selector {
        Selector::new(self.project.clone(), self.project_id.clone())
    }

    pub fn plan_selector(&self) -> Selector {
        Selector::new(self.plan.clone(), self.plan_id.clone())
    }

    pub fn suite_selector(&self) -> Selector {
        Selector::new(self.suite.clone(), self.suite_id.clone())
    }
}

/// Run creation settings.
///
/// # Defaults
///
/// | Field | Default |
/// |-------|---------|
/// | `name` | None (`"<timestamp> (<agents>)"`) |
/// | `description` | None |
/// | `close_after_days` | None (no stale-run closure) |
/// | `close_wait_secs` | 30 |
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunConfig {
    /// Run name template. `%DATE%` and `%AGENTS%` are substituted.
    pub name: Option<String>,

    /// Description attached to the created run or plan entry.
    pub description: Option<String>,

    /// Open runs older than this many days are closed before a new run is
    /// created. Ignored when publishing into a plan. Must be at least 1.
    pub close_after_days: Option<u32>,

    /// How long to wait for stale-run closures before creating the new run.
    #[serde(default = "default_close_wait")]
    pub close_wait_secs: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            name: None,
            description: None,
            close_after_days: None,
            close_wait_secs: default_close_wait(),
        }
    }
}

fn default_close_wait() -> u64 {
    30
}

/// Attachment upload settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AttachmentConfig {
    /// Upload outcome screenshots to their results.
    ///
    /// Default: false
    #[serde(default)]
    pub enabled: bool,
}

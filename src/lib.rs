//! railpost: publish automated test outcomes to a TestRail-compatible service.
//!
//! A publish takes a batch of test outcomes (from a JSON outcome file or a
//! JUnit report), maps each one to a test case, and records the results in a
//! run on the service, attaching screenshots as evidence.
//!
//! # Architecture
//!
//! The main components are:
//!
//! - **Gateway**: Typed operations over the service's HTTP API ([`gateway`])
//! - **Resolver**: Turns project / plan / suite names or ids into numeric ids ([`resolve`])
//! - **Run manager**: Creates the target run and closes stale ones ([`run`])
//! - **Publisher**: Builds submissions, submits them, uploads evidence ([`publish`])
//! - **Report**: Operator-facing progress and warnings ([`report`])
//!
//! # Example
//!
//! ```no_run
//! use railpost::config::load_config;
//! use railpost::gateway::HttpGateway;
//! use railpost::outcome::{OutcomeFormat, load_outcomes};
//! use railpost::publish::Publisher;
//! use railpost::report::ConsoleReporter;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut config = load_config(std::path::Path::new("railpost.toml"))?;
//!     config.apply_env();
//!     config.validate()?;
//!
//!     let set = load_outcomes(std::path::Path::new("results.json"), OutcomeFormat::Auto)?;
//!     let gateway = HttpGateway::from_config(&config.testrail)?;
//!     let reporter = ConsoleReporter::new(false);
//!
//!     Publisher::new(&gateway, &reporter, &config)
//!         .run(&set.outcomes, &set.agents)
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod gateway;
pub mod outcome;
pub mod publish;
pub mod report;
pub mod resolve;
pub mod run;
pub mod text;

// Re-export commonly used types
pub use config::{Config, load_config};
pub use error::{PublishError, PublishResult};
pub use gateway::{GatewayError, HttpGateway, TestRailApi};
pub use outcome::{Outcome, OutcomeSet, Status};
pub use publish::{PublishReport, PublishSummary, Publisher};
pub use report::{ConsoleReporter, Reporter, Warning};

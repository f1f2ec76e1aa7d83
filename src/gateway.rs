//! Remote entity gateway.
//!
//! [`TestRailApi`] is the seam between the publishing pipeline and the
//! network: the resolver, the run manager and the publisher only ever talk
//! to this trait. [`HttpGateway`] is the production implementation.
//!
//! The gateway does not retry, time out or throttle. A failed call is
//! returned to the caller as a [`GatewayError`].

pub mod http;
pub mod models;

#[cfg(test)]
pub(crate) mod fake;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

pub use http::HttpGateway;
pub use models::{
    Attachment, AttachmentId, Named, Plan, PlanEntry, Project, ResultRecord, ResultSubmission,
    Run, RunPayload, Suite, Test, User,
};

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors that can occur while talking to the service.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("request to {operation} failed: {source}")]
    Transport {
        operation: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{operation} returned HTTP {status}: {message}")]
    Api {
        operation: String,
        status: u16,
        message: String,
    },

    #[error("invalid response from {operation}: {message}")]
    Decode { operation: String, message: String },

    #[error("failed to read attachment {}: {source}", path.display())]
    Attachment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid host URL '{0}'")]
    InvalidHost(String),

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),
}

/// Typed operations the publishing pipeline needs from the service.
#[async_trait]
pub trait TestRailApi: Send + Sync {
    /// Looks up the account used for authentication.
    async fn get_user_by_email(&self, email: &str) -> GatewayResult<User>;

    async fn get_projects(&self) -> GatewayResult<Vec<Project>>;

    async fn get_plans(&self, project_id: u64) -> GatewayResult<Vec<Plan>>;

    async fn get_suites(&self, project_id: u64) -> GatewayResult<Vec<Suite>>;

    async fn get_runs(&self, project_id: u64) -> GatewayResult<Vec<Run>>;

    async fn add_run(&self, project_id: u64, payload: &RunPayload) -> GatewayResult<Run>;

    async fn add_plan_entry(&self, plan_id: u64, payload: &RunPayload)
    -> GatewayResult<PlanEntry>;

    async fn close_run(&self, run_id: u64) -> GatewayResult<Run>;

    /// Submits all results in one request; returns the stored results.
    async fn add_results_for_cases(
        &self,
        run_id: u64,
        results: &[ResultSubmission],
    ) -> GatewayResult<Vec<ResultRecord>>;

    async fn get_tests(&self, run_id: u64) -> GatewayResult<Vec<Test>>;

    /// Uploads a file and attaches it to an existing result.
    async fn add_attachment_to_result(
        &self,
        result_id: u64,
        path: &Path,
    ) -> GatewayResult<Attachment>;
}

//! Fatal errors of the publishing pipeline.
//!
//! Anything that stops a publish is a [`PublishError`]. Non-fatal problems
//! are [`crate::report::Warning`]s and go to the reporter instead.

use std::fmt;

use crate::gateway::GatewayError;
use crate::resolve::EntityKind;

/// Result type for pipeline operations.
pub type PublishResult<T> = Result<T, PublishError>;

/// Step of the publish flow, used to say where a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Connecting,
    Resolving(EntityKind),
    PreparingRun,
    Submitting,
    AttachingEvidence,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Connecting => f.write_str("connecting"),
            Stage::Resolving(kind) => write!(f, "resolving {}", kind),
            Stage::PreparingRun => f.write_str("preparing run"),
            Stage::Submitting => f.write_str("submitting results"),
            Stage::AttachingEvidence => f.write_str("attaching evidence"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// A requested project, plan or suite does not exist.
    #[error("{kind} not found: {identifier}")]
    Resolution {
        kind: EntityKind,
        identifier: String,
    },

    /// The service could not be reached or rejected the credentials.
    #[error("cannot connect to {host}: {source}")]
    Connectivity {
        host: String,
        #[source]
        source: GatewayError,
    },

    /// A remote call failed while resolving targets or preparing the run.
    #[error("{stage} failed: {source}")]
    Remote {
        stage: Stage,
        #[source]
        source: GatewayError,
    },

    /// Submitting results (or looking them up afterwards) failed.
    #[error("failed to publish results: {message}")]
    Publish { message: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PublishError {
    pub(crate) fn remote(stage: Stage) -> impl FnOnce(GatewayError) -> PublishError {
        move |source| PublishError::Remote { stage, source }
    }

    /// Exit code for the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 1,
            Self::Resolution { .. } => 2,
            Self::Connectivity { .. } => 3,
            Self::Remote { .. } | Self::Publish { .. } => 4,
        }
    }
}

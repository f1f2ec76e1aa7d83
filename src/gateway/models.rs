//! Wire types exchanged with the service.
//!
//! Each type models a subset of what the service returns, enough to publish
//! and to log what happened; everything else in a response is ignored by
//! serde.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An entity that can be looked up by numeric id or by name.
pub trait Named {
    fn id(&self) -> u64;
    fn name(&self) -> &str;
}

macro_rules! impl_named {
    ($($ty:ty),*) => {
        $(impl Named for $ty {
            fn id(&self) -> u64 {
                self.id
            }

            fn name(&self) -> &str {
                &self.name
            }
        })*
    };
}

impl_named!(Project, Plan, Suite);

/// Account returned by the connectivity check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub is_completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub is_completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suite {
    pub id: u64,
    pub name: String,
}

/// A test run, either standalone or part of a plan entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub is_completed: bool,
    /// Creation time as unix seconds.
    pub created_on: i64,
    #[serde(default)]
    pub suite_id: Option<u64>,
    #[serde(default)]
    pub plan_id: Option<u64>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Entry added to a plan. The service creates one run per configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub id: String,
    #[serde(default)]
    pub runs: Vec<Run>,
}

/// A case instantiated inside a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Test {
    pub id: u64,
    pub case_id: u64,
    #[serde(default)]
    pub title: Option<String>,
}

/// A result stored by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub id: u64,
    pub test_id: u64,
    #[serde(default)]
    pub status_id: Option<u32>,
}

/// Identifier of an uploaded attachment.
///
/// Older servers return an integer, newer ones a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttachmentId {
    Numeric(u64),
    Text(String),
}

impl fmt::Display for AttachmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttachmentId::Numeric(id) => write!(f, "{}", id),
            AttachmentId::Text(id) => f.write_str(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub attachment_id: AttachmentId,
}

/// One result to submit for a case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSubmission {
    pub case_id: u64,
    pub status_id: u32,
    pub comment: String,
}

/// Body of `add_run` and `add_plan_entry`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suite_id: Option<u64>,
    pub include_all: bool,
    pub case_ids: Vec<u64>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Error body returned by the service on 4xx/5xx.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub error: String,
}

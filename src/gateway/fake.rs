//! In-memory gateway used by unit tests.
//!
//! Serves canned entities and records every call, so tests can assert both
//! on what the pipeline returned and on which requests it made.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{
    Attachment, AttachmentId, GatewayError, GatewayResult, Plan, PlanEntry, Project,
    ResultRecord, ResultSubmission, Run, RunPayload, Suite, Test, TestRailApi, User,
};

#[derive(Default)]
pub(crate) struct FakeApi {
    pub projects: Vec<Project>,
    pub plans: Vec<Plan>,
    pub suites: Vec<Suite>,
    pub runs: Vec<Run>,
    pub tests: Vec<Test>,
    /// Results returned by `add_results_for_cases`; derived from `tests` when unset.
    pub results: Option<Vec<ResultRecord>>,
    /// Operations (by name) that fail with HTTP 500.
    pub failing: Vec<&'static str>,
    /// Runs whose closure fails.
    pub failing_closures: Vec<u64>,
    /// Attachment paths whose upload fails.
    pub failing_uploads: Vec<PathBuf>,
    /// How long each `close_run` takes before answering.
    pub close_delay: Option<Duration>,
    /// Plan entries come back without runs.
    pub empty_plan_entry: bool,

    pub calls: Mutex<Vec<String>>,
    pub added_runs: Mutex<Vec<(u64, RunPayload)>>,
    pub plan_entries: Mutex<Vec<(u64, RunPayload)>>,
    pub closed: Mutex<Vec<u64>>,
    pub submitted: Mutex<Vec<ResultSubmission>>,
    pub uploads: Mutex<Vec<(u64, PathBuf)>>,
}

pub(crate) fn project(id: u64, name: &str) -> Project {
    Project {
        id,
        name: name.to_string(),
        is_completed: false,
    }
}

pub(crate) fn plan(id: u64, name: &str) -> Plan {
    Plan {
        id,
        name: name.to_string(),
        is_completed: false,
    }
}

pub(crate) fn suite(id: u64, name: &str) -> Suite {
    Suite {
        id,
        name: name.to_string(),
    }
}

pub(crate) fn run(id: u64, created_on: i64, is_completed: bool) -> Run {
    Run {
        id,
        name: format!("run {}", id),
        is_completed,
        created_on,
        suite_id: None,
        plan_id: None,
        url: None,
    }
}

pub(crate) fn test(id: u64, case_id: u64) -> Test {
    Test {
        id,
        case_id,
        title: None,
    }
}

impl FakeApi {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == operation)
            .count()
    }

    pub fn uploads(&self) -> Vec<(u64, PathBuf)> {
        self.uploads.lock().unwrap().clone()
    }

    fn record(&self, operation: &'static str) -> GatewayResult<()> {
        self.calls.lock().unwrap().push(operation.to_string());
        if self.failing.contains(&operation) {
            return Err(server_error(operation));
        }
        Ok(())
    }
}

fn server_error(operation: &str) -> GatewayError {
    GatewayError::Api {
        operation: operation.to_string(),
        status: 500,
        message: "internal error".to_string(),
    }
}

#[async_trait]
impl TestRailApi for FakeApi {
    async fn get_user_by_email(&self, email: &str) -> GatewayResult<User> {
        self.record("get_user_by_email")?;
        Ok(User {
            id: 1,
            name: "CI Bot".to_string(),
            email: email.to_string(),
        })
    }

    async fn get_projects(&self) -> GatewayResult<Vec<Project>> {
        self.record("get_projects")?;
        Ok(self.projects.clone())
    }

    async fn get_plans(&self, _project_id: u64) -> GatewayResult<Vec<Plan>> {
        self.record("get_plans")?;
        Ok(self.plans.clone())
    }

    async fn get_suites(&self, _project_id: u64) -> GatewayResult<Vec<Suite>> {
        self.record("get_suites")?;
        Ok(self.suites.clone())
    }

    async fn get_runs(&self, _project_id: u64) -> GatewayResult<Vec<Run>> {
        self.record("get_runs")?;
        Ok(self.runs.clone())
    }

    async fn add_run(&self, project_id: u64, payload: &RunPayload) -> GatewayResult<Run> {
        self.record("add_run")?;
        self.added_runs
            .lock()
            .unwrap()
            .push((project_id, payload.clone()));
        let mut created = run(500, 1_700_000_000, false);
        created.name = payload.name.clone();
        created.suite_id = payload.suite_id;
        Ok(created)
    }

    async fn add_plan_entry(
        &self,
        plan_id: u64,
        payload: &RunPayload,
    ) -> GatewayResult<PlanEntry> {
        self.record("add_plan_entry")?;
        self.plan_entries
            .lock()
            .unwrap()
            .push((plan_id, payload.clone()));
        let mut created = run(600, 1_700_000_000, false);
        created.name = payload.name.clone();
        created.plan_id = Some(plan_id);
        let runs = if self.empty_plan_entry {
            Vec::new()
        } else {
            vec![created]
        };
        Ok(PlanEntry {
            id: "entry-1".to_string(),
            runs,
        })
    }

    async fn close_run(&self, run_id: u64) -> GatewayResult<Run> {
        self.record("close_run")?;
        if let Some(delay) = self.close_delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_closures.contains(&run_id) {
            return Err(server_error("close_run"));
        }
        self.closed.lock().unwrap().push(run_id);
        Ok(run(run_id, 0, true))
    }

    async fn add_results_for_cases(
        &self,
        _run_id: u64,
        results: &[ResultSubmission],
    ) -> GatewayResult<Vec<ResultRecord>> {
        self.record("add_results_for_cases")?;
        self.submitted.lock().unwrap().extend_from_slice(results);
        if let Some(canned) = &self.results {
            return Ok(canned.clone());
        }
        Ok(results
            .iter()
            .enumerate()
            .filter_map(|(idx, submission)| {
                self.tests
                    .iter()
                    .find(|t| t.case_id == submission.case_id)
                    .map(|t| ResultRecord {
                        id: 1000 + idx as u64,
                        test_id: t.id,
                        status_id: Some(submission.status_id),
                    })
            })
            .collect())
    }

    async fn get_tests(&self, _run_id: u64) -> GatewayResult<Vec<Test>> {
        self.record("get_tests")?;
        Ok(self.tests.clone())
    }

    async fn add_attachment_to_result(
        &self,
        result_id: u64,
        path: &Path,
    ) -> GatewayResult<Attachment> {
        self.record("add_attachment_to_result")?;
        if self.failing_uploads.iter().any(|p| p == path) {
            return Err(GatewayError::Attachment {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
            });
        }
        self.uploads
            .lock()
            .unwrap()
            .push((result_id, path.to_path_buf()));
        Ok(Attachment {
            attachment_id: AttachmentId::Numeric(result_id),
        })
    }
}

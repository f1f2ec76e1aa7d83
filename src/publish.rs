//! Publishing pipeline: from outcomes to results on the service.
//!
//! # Flow
//!
//! ```text
//!   Vec<Outcome>
//!       │
//!       │ build_submissions()       unmapped outcomes ──► Warning::MissingCaseId
//!       ▼
//!   Submissions ── empty ──► PublishReport::NothingToPublish
//!       │
//!       │ get_user_by_email()       connectivity check
//!       ▼
//!   Resolver ── project / plan / suite ids
//!       │
//!       ▼
//!   RunManager::prepare_run() ──► Run
//!       │
//!       │ add_results_for_cases()   one batch
//!       ▼
//!   Vec<ResultRecord> + get_tests()
//!       │
//!       │ add_attachment_to_result() per screenshot, sequential
//!       ▼
//!   PublishSummary ──► Reporter::on_published
//! ```
//!
//! Every stage before attaching evidence can fail the publish. Nothing is
//! rolled back: a run created before a failed submission stays on the
//! service.

use chrono::{DateTime, Local};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{PublishError, PublishResult, Stage};
use crate::gateway::{ResultRecord, ResultSubmission, Run, Test, TestRailApi, User};
use crate::outcome::Outcome;
use crate::report::{Reporter, Warning};
use crate::resolve::{EntityKind, Resolver};
use crate::run::RunManager;
use crate::text::strip_ansi;

/// Submissions built from one batch of outcomes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Submissions {
    pub results: Vec<ResultSubmission>,
    /// Case ids in submission order, used to scope the run.
    pub case_ids: Vec<u64>,
}

impl Submissions {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }
}

/// Counts reported at the end of a publish.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishSummary {
    pub run_id: u64,
    /// Submissions sent in the batch.
    pub submitted: usize,
    /// Results the service returned for the batch.
    pub returned: usize,
    /// Outcomes left out for lack of a case id.
    pub skipped: usize,
    pub attachments_uploaded: usize,
    pub attachments_failed: usize,
}

/// How a publish ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishReport {
    /// No outcome could be mapped; the service was never contacted.
    NothingToPublish,
    Published(PublishSummary),
}

/// Ids the configured target resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Targets {
    pub project_id: u64,
    pub plan_id: Option<u64>,
    pub suite_id: Option<u64>,
}

/// Composes the result comment: the status label, then the errors with
/// terminal escapes removed, one per line.
pub fn compose_comment(outcome: &Outcome) -> String {
    if outcome.errors.is_empty() {
        return outcome.status.label.clone();
    }

    let errors: Vec<String> = outcome.errors.iter().map(|e| strip_ansi(e)).collect();
    format!("{}\n{}", outcome.status.label, errors.join("\n"))
}

/// Builds one submission per mapped outcome, preserving order.
///
/// Each unmapped outcome produces one [`Warning::MissingCaseId`]; when
/// nothing could be mapped a [`Warning::NothingToPublish`] follows.
pub fn build_submissions<R: Reporter + ?Sized>(outcomes: &[Outcome], reporter: &R) -> Submissions {
    let mut submissions = Submissions::default();

    for outcome in outcomes {
        let Some(case_id) = outcome.mapped_case() else {
            reporter.on_warning(&Warning::MissingCaseId {
                test: outcome.name.clone(),
            });
            continue;
        };

        submissions.results.push(ResultSubmission {
            case_id,
            status_id: outcome.status.id,
            comment: compose_comment(outcome),
        });
        submissions.case_ids.push(case_id);
    }

    if submissions.is_empty() {
        reporter.on_warning(&Warning::NothingToPublish);
    }

    submissions
}

/// Finds the result created for an outcome's case in this run.
fn result_for_case<'r>(
    case_id: u64,
    tests: &[Test],
    results: &'r [ResultRecord],
) -> Option<&'r ResultRecord> {
    let test = tests.iter().find(|t| t.case_id == case_id)?;
    results.iter().find(|r| r.test_id == test.id)
}

/// Drives a whole publish against one service.
pub struct Publisher<'a, A: ?Sized, R: ?Sized> {
    api: &'a A,
    reporter: &'a R,
    config: &'a Config,
    now: DateTime<Local>,
}

impl<'a, A, R> Publisher<'a, A, R>
where
    A: TestRailApi + ?Sized,
    R: Reporter + ?Sized,
{
    pub fn new(api: &'a A, reporter: &'a R, config: &'a Config) -> Self {
        Self {
            api,
            reporter,
            config,
            now: Local::now(),
        }
    }

    /// Pins the clock used for run names and stale-run closure.
    pub fn at(mut self, now: DateTime<Local>) -> Self {
        self.now = now;
        self
    }

    /// Publishes a batch of outcomes end to end.
    pub async fn run(
        &self,
        outcomes: &[Outcome],
        agents: &[String],
    ) -> PublishResult<PublishReport> {
        let submissions = build_submissions(outcomes, self.reporter);
        if submissions.is_empty() {
            return Ok(PublishReport::NothingToPublish);
        }

        self.check_connection().await?;
        let targets = self.resolve_targets().await?;

        enter(Stage::PreparingRun);
        let runs = RunManager::new(self.api, self.reporter, &self.config.run).at(self.now);
        let payload = runs.payload(targets.suite_id, submissions.case_ids.clone(), agents);
        let run = runs
            .prepare_run(targets.project_id, targets.plan_id, &payload)
            .await?;

        let summary = self.publish(&run, &submissions, outcomes).await?;
        Ok(PublishReport::Published(summary))
    }

    /// Confirms the service is reachable with the configured credentials.
    pub async fn check_connection(&self) -> PublishResult<User> {
        enter(Stage::Connecting);
        let host = &self.config.testrail.host;
        let user = self
            .api
            .get_user_by_email(&self.config.testrail.user)
            .await
            .map_err(|source| PublishError::Connectivity {
                host: host.clone(),
                source,
            })?;

        self.reporter.on_connected(host, &user);
        Ok(user)
    }

    /// Resolves the configured project, plan and suite.
    pub async fn resolve_targets(&self) -> PublishResult<Targets> {
        let resolver = Resolver::new(self.api, self.reporter);
        let target = &self.config.target;

        enter(Stage::Resolving(EntityKind::Project));
        let project_id = resolver.resolve_project(&target.project_selector()).await?;
        enter(Stage::Resolving(EntityKind::Plan));
        let plan_id = resolver
            .resolve_plan(project_id, &target.plan_selector())
            .await?;
        enter(Stage::Resolving(EntityKind::Suite));
        let suite_id = resolver
            .resolve_suite(project_id, &target.suite_selector())
            .await?;

        Ok(Targets {
            project_id,
            plan_id,
            suite_id,
        })
    }

    /// Submits results into `run` and attaches screenshots.
    ///
    /// `outcomes` is the full batch the submissions were built from; it
    /// supplies screenshots and the skipped count.
    pub async fn publish(
        &self,
        run: &Run,
        submissions: &Submissions,
        outcomes: &[Outcome],
    ) -> PublishResult<PublishSummary> {
        let mut summary = PublishSummary {
            run_id: run.id,
            submitted: submissions.len(),
            skipped: outcomes.len().saturating_sub(submissions.len()),
            ..Default::default()
        };
        if submissions.is_empty() {
            return Ok(summary);
        }

        enter(Stage::Submitting);
        let results = self
            .api
            .add_results_for_cases(run.id, &submissions.results)
            .await
            .map_err(|e| PublishError::Publish {
                message: e.to_string(),
            })?;
        summary.returned = results.len();
        info!(run_id = run.id, returned = results.len(), "submitted results");

        let tests = self
            .api
            .get_tests(run.id)
            .await
            .map_err(|e| PublishError::Publish {
                message: e.to_string(),
            })?;

        if self.config.attachments.enabled {
            enter(Stage::AttachingEvidence);
            self.attach_evidence(outcomes, &tests, &results, &mut summary)
                .await;
        }

        if summary.returned == 0 {
            self.reporter.on_warning(&Warning::NoResultsReturned {
                submitted: summary.submitted,
            });
        } else {
            self.reporter.on_published(&summary);
        }

        Ok(summary)
    }

    async fn attach_evidence(
        &self,
        outcomes: &[Outcome],
        tests: &[Test],
        results: &[ResultRecord],
        summary: &mut PublishSummary,
    ) {
        for outcome in outcomes.iter().filter(|o| !o.screenshots.is_empty()) {
            let Some(case_id) = outcome.mapped_case() else {
                continue;
            };
            let Some(result) = result_for_case(case_id, tests, results) else {
                debug!(test = %outcome.name, case_id, "no result to attach screenshots to");
                continue;
            };

            for path in &outcome.screenshots {
                match self.api.add_attachment_to_result(result.id, path).await {
                    Ok(attachment) => {
                        debug!(
                            result_id = result.id,
                            attachment = %attachment.attachment_id,
                            path = %path.display(),
                            "attached screenshot"
                        );
                        summary.attachments_uploaded += 1;
                    }
                    Err(e) => {
                        summary.attachments_failed += 1;
                        self.reporter.on_warning(&Warning::AttachmentFailed {
                            test: outcome.name.clone(),
                            path: path.clone(),
                            message: e.to_string(),
                        });
                    }
                }
            }
        }
    }
}

fn enter(stage: Stage) {
    debug!(%stage, "stage");
}

//! Run lifecycle: picking the run that receives the results.
//!
//! When a plan is targeted, results go to a fresh plan entry and the run is
//! the first one inside it. Otherwise a standalone run is created in the
//! project, after optionally closing runs that have been left open for too
//! long.
//!
//! # Stale-run closure
//!
//! Closures are best-effort cleanup, not a precondition for the new run.
//! They are issued concurrently and joined with a bounded wait
//! (`run.close_wait_secs`); failures are reported as warnings. Closures
//! still in flight when the wait expires are cancelled, reported as one
//! warning, and the new run is created anyway. A cancelled closure may or
//! may not have reached the service.

use std::fmt::Display;
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tracing::{debug, info};

use crate::config::RunConfig;
use crate::error::{PublishError, PublishResult, Stage};
use crate::gateway::{PlanEntry, Run, RunPayload, TestRailApi};
use crate::report::{Reporter, Warning};

/// Marker replaced by the run timestamp in a run name template.
pub const DATE_MARKER: &str = "%DATE%";
/// Marker replaced by the comma-separated agent list in a run name template.
pub const AGENTS_MARKER: &str = "%AGENTS%";

const SECONDS_PER_DAY: i64 = 86_400;

/// How the target run came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOrigin {
    /// Created directly under the project.
    Created,
    /// First run of a new plan entry.
    PlanEntry,
}

/// Formats a time the way run names show it: `YYYY-MM-DD HH:mm:ss`.
pub fn format_timestamp<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Derives the run name from an optional template.
///
/// Without a template the name is `"<timestamp> (<agent1, agent2, ...>)"`,
/// or just the timestamp when there are no agents.
pub fn run_name(template: Option<&str>, timestamp: &str, agents: &[String]) -> String {
    let agents = agents.join(", ");
    match template {
        Some(template) => template
            .replace(DATE_MARKER, timestamp)
            .replace(AGENTS_MARKER, &agents),
        None if agents.is_empty() => timestamp.to_string(),
        None => format!("{} ({})", timestamp, agents),
    }
}

/// Whether `run` is open and was created more than `days` days before `now`.
pub fn is_stale(run: &Run, now: i64, days: u32) -> bool {
    !run.is_completed && run.created_on < now - i64::from(days) * SECONDS_PER_DAY
}

/// Creates or reuses the run that results are published into.
pub struct RunManager<'a, A: ?Sized, R: ?Sized> {
    api: &'a A,
    reporter: &'a R,
    config: &'a RunConfig,
    now: DateTime<Local>,
}

impl<'a, A, R> RunManager<'a, A, R>
where
    A: TestRailApi + ?Sized,
    R: Reporter + ?Sized,
{
    pub fn new(api: &'a A, reporter: &'a R, config: &'a RunConfig) -> Self {
        Self {
            api,
            reporter,
            config,
            now: Local::now(),
        }
    }

    /// Pins the clock used for run names and staleness.
    pub fn at(mut self, now: DateTime<Local>) -> Self {
        self.now = now;
        self
    }

    /// Builds the run payload for the given cases.
    pub fn payload(
        &self,
        suite_id: Option<u64>,
        case_ids: Vec<u64>,
        agents: &[String],
    ) -> RunPayload {
        RunPayload {
            suite_id,
            include_all: false,
            case_ids,
            name: run_name(
                self.config.name.as_deref(),
                &format_timestamp(&self.now),
                agents,
            ),
            description: self.config.description.clone(),
        }
    }

    /// Returns the run that receives this publish's results.
    pub async fn prepare_run(
        &self,
        project_id: u64,
        plan_id: Option<u64>,
        payload: &RunPayload,
    ) -> PublishResult<Run> {
        if let Some(plan_id) = plan_id {
            let PlanEntry { id, runs } = self
                .api
                .add_plan_entry(plan_id, payload)
                .await
                .map_err(PublishError::remote(Stage::PreparingRun))?;

            let run = runs
                .into_iter()
                .next()
                .ok_or_else(|| PublishError::Publish {
                    message: format!("plan entry {} in plan R{} has no runs", id, plan_id),
                })?;

            info!(run_id = run.id, plan_id, "added plan entry");
            self.reporter.on_run_ready(&run, RunOrigin::PlanEntry);
            return Ok(run);
        }

        self.close_stale_runs(project_id).await;

        let run = self
            .api
            .add_run(project_id, payload)
            .await
            .map_err(PublishError::remote(Stage::PreparingRun))?;

        info!(run_id = run.id, project_id, "created run");
        self.reporter.on_run_ready(&run, RunOrigin::Created);
        Ok(run)
    }

    /// Closes open runs older than the configured threshold.
    ///
    /// Returns how many runs were closed. Never fails.
    pub async fn close_stale_runs(&self, project_id: u64) -> usize {
        let Some(days) = self.config.close_after_days else {
            return 0;
        };

        let runs = match self.api.get_runs(project_id).await {
            Ok(runs) => runs,
            Err(e) => {
                self.reporter.on_warning(&Warning::StaleRunsUnavailable {
                    message: e.to_string(),
                });
                return 0;
            }
        };

        let now = self.now.timestamp();
        let mut pending: FuturesUnordered<_> = runs
            .iter()
            .filter(|run| is_stale(run, now, days))
            .map(|run| async move { (run, self.api.close_run(run.id).await) })
            .collect();

        if pending.is_empty() {
            debug!(days, "no stale runs");
            return 0;
        }
        info!(count = pending.len(), days, "closing stale runs");

        let deadline = tokio::time::sleep(Duration::from_secs(self.config.close_wait_secs));
        tokio::pin!(deadline);

        let mut closed = 0;
        loop {
            tokio::select! {
                next = pending.next() => match next {
                    Some((run, Ok(_))) => {
                        closed += 1;
                        self.reporter.on_stale_run_closed(run);
                    }
                    Some((run, Err(e))) => {
                        self.reporter.on_warning(&Warning::StaleRunNotClosed {
                            run_id: run.id,
                            message: e.to_string(),
                        });
                    }
                    None => break,
                },
                _ = &mut deadline => {
                    self.reporter.on_warning(&Warning::StaleRunCloseTimedOut {
                        pending: pending.len(),
                        wait_secs: self.config.close_wait_secs,
                    });
                    break;
                }
            }
        }

        closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::fake::{FakeApi, run};
    use crate::report::recording::RecordingReporter;

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 20, 12, 0, 0).unwrap()
    }

    fn days_ago(days: i64) -> i64 {
        now().timestamp() - days * SECONDS_PER_DAY
    }

    fn agents(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn config(close_after_days: Option<u32>) -> RunConfig {
        RunConfig {
            close_after_days,
            ..Default::default()
        }
    }

    #[test]
    fn test_run_name_template() {
        let name = run_name(
            Some("%DATE% run (%AGENTS%)"),
            "2024-01-01 00:00:00",
            &agents(&["chrome", "firefox"]),
        );
        assert_eq!(name, "2024-01-01 00:00:00 run (chrome, firefox)");
    }

    #[test]
    fn test_run_name_default() {
        let ts = "2024-01-01 00:00:00";
        assert_eq!(
            run_name(None, ts, &agents(&["chrome", "firefox"])),
            "2024-01-01 00:00:00 (chrome, firefox)"
        );
        assert_eq!(run_name(None, ts, &[]), "2024-01-01 00:00:00");
    }

    #[test]
    fn test_run_name_template_without_markers() {
        assert_eq!(
            run_name(Some("Nightly"), "2024-01-01 00:00:00", &agents(&["a"])),
            "Nightly"
        );
    }

    #[test]
    fn test_format_timestamp() {
        let at = Local.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(format_timestamp(&at), "2024-01-01 00:00:00");
    }

    #[test]
    fn test_is_stale() {
        let now = now().timestamp();
        assert!(is_stale(&run(1, days_ago(10), false), now, 5));
        assert!(!is_stale(&run(2, days_ago(2), false), now, 5));
        assert!(!is_stale(&run(3, days_ago(400), true), now, 5));
    }

    #[test]
    fn test_payload() {
        let api = FakeApi::default();
        let reporter = RecordingReporter::default();
        let config = RunConfig {
            name: Some("%DATE% / %AGENTS%".to_string()),
            description: Some("nightly".to_string()),
            ..Default::default()
        };
        let manager = RunManager::new(&api, &reporter, &config).at(now());

        let payload = manager.payload(Some(3), vec![10, 11], &agents(&["chrome"]));
        assert_eq!(payload.suite_id, Some(3));
        assert!(!payload.include_all);
        assert_eq!(payload.case_ids, vec![10, 11]);
        assert_eq!(payload.name, "2024-03-20 12:00:00 / chrome");
        assert_eq!(payload.description.as_deref(), Some("nightly"));
    }

    #[tokio::test]
    async fn test_plan_entry_skips_run_creation_and_closure() {
        let api = FakeApi {
            runs: vec![run(1, days_ago(30), false)],
            ..Default::default()
        };
        let reporter = RecordingReporter::default();
        let config = config(Some(5));
        let manager = RunManager::new(&api, &reporter, &config).at(now());
        let payload = manager.payload(None, vec![1], &[]);

        let run = manager.prepare_run(42, Some(9), &payload).await.unwrap();

        assert_eq!(run.id, 600);
        assert_eq!(run.plan_id, Some(9));
        assert_eq!(api.calls(), vec!["add_plan_entry"]);
        assert_eq!(api.plan_entries.lock().unwrap()[0].0, 9);
        assert_eq!(reporter.lines(), vec!["run 600 PlanEntry"]);
    }

    #[tokio::test]
    async fn test_stale_runs_closed_before_creation() {
        let api = FakeApi {
            runs: vec![
                run(1, days_ago(10), false),
                run(2, days_ago(2), false),
                run(3, days_ago(90), true),
                run(4, days_ago(6), false),
            ],
            ..Default::default()
        };
        let reporter = RecordingReporter::default();
        let config = config(Some(5));
        let manager = RunManager::new(&api, &reporter, &config).at(now());
        let payload = manager.payload(Some(1), vec![5], &[]);

        let run = manager.prepare_run(42, None, &payload).await.unwrap();

        assert_eq!(run.id, 500);
        let mut closed = api.closed.lock().unwrap().clone();
        closed.sort();
        assert_eq!(closed, vec![1, 4]);

        let calls = api.calls();
        assert_eq!(calls.first().map(String::as_str), Some("get_runs"));
        assert_eq!(calls.last().map(String::as_str), Some("add_run"));
        assert_eq!(api.added_runs.lock().unwrap()[0].0, 42);
        assert!(reporter.warnings().is_empty());
    }

    #[tokio::test]
    async fn test_no_threshold_skips_closure() {
        let api = FakeApi {
            runs: vec![run(1, days_ago(100), false)],
            ..Default::default()
        };
        let reporter = RecordingReporter::default();
        let config = config(None);
        let manager = RunManager::new(&api, &reporter, &config).at(now());
        let payload = manager.payload(None, vec![5], &[]);

        manager.prepare_run(42, None, &payload).await.unwrap();

        assert_eq!(api.calls(), vec!["add_run"]);
    }

    #[tokio::test]
    async fn test_failed_closure_is_warning() {
        let api = FakeApi {
            runs: vec![run(1, days_ago(10), false), run(2, days_ago(11), false)],
            failing_closures: vec![1],
            ..Default::default()
        };
        let reporter = RecordingReporter::default();
        let config = config(Some(5));
        let manager = RunManager::new(&api, &reporter, &config).at(now());
        let payload = manager.payload(None, vec![5], &[]);

        let run = manager.prepare_run(42, None, &payload).await.unwrap();

        assert_eq!(run.id, 500);
        assert_eq!(*api.closed.lock().unwrap(), vec![2]);
        assert!(matches!(
            reporter.warnings().as_slice(),
            [Warning::StaleRunNotClosed { run_id: 1, .. }]
        ));
    }

    #[tokio::test]
    async fn test_listing_failure_still_creates_run() {
        let api = FakeApi {
            failing: vec!["get_runs"],
            ..Default::default()
        };
        let reporter = RecordingReporter::default();
        let config = config(Some(5));
        let manager = RunManager::new(&api, &reporter, &config).at(now());
        let payload = manager.payload(None, vec![5], &[]);

        manager.prepare_run(42, None, &payload).await.unwrap();

        assert_eq!(api.call_count("add_run"), 1);
        assert!(matches!(
            reporter.warnings().as_slice(),
            [Warning::StaleRunsUnavailable { .. }]
        ));
    }

    #[tokio::test]
    async fn test_run_creation_failure_is_fatal() {
        let api = FakeApi {
            failing: vec!["add_run"],
            ..Default::default()
        };
        let reporter = RecordingReporter::default();
        let config = config(None);
        let manager = RunManager::new(&api, &reporter, &config).at(now());
        let payload = manager.payload(None, vec![5], &[]);

        let err = manager.prepare_run(42, None, &payload).await.unwrap_err();
        assert!(matches!(
            err,
            PublishError::Remote {
                stage: Stage::PreparingRun,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_closure_wait_expiry_is_warning() {
        let api = FakeApi {
            runs: vec![run(1, days_ago(10), false)],
            close_delay: Some(Duration::from_secs(5)),
            ..Default::default()
        };
        let reporter = RecordingReporter::default();
        let config = RunConfig {
            close_after_days: Some(5),
            close_wait_secs: 1,
            ..Default::default()
        };
        let manager = RunManager::new(&api, &reporter, &config).at(now());
        let payload = manager.payload(None, vec![5], &[]);

        let run = manager.prepare_run(42, None, &payload).await.unwrap();

        assert_eq!(run.id, 500);
        assert_eq!(api.call_count("add_run"), 1);
        assert!(api.closed.lock().unwrap().is_empty());
        assert!(matches!(
            reporter.warnings().as_slice(),
            [Warning::StaleRunCloseTimedOut {
                pending: 1,
                wait_secs: 1
            }]
        ));
    }

    #[tokio::test]
    async fn test_plan_entry_without_runs_is_publish_error() {
        let api = FakeApi {
            empty_plan_entry: true,
            ..Default::default()
        };
        let reporter = RecordingReporter::default();
        let config = config(None);
        let manager = RunManager::new(&api, &reporter, &config).at(now());
        let payload = manager.payload(None, vec![5], &[]);

        let err = manager.prepare_run(42, Some(9), &payload).await.unwrap_err();

        assert!(matches!(err, PublishError::Publish { .. }));
        assert_eq!(
            err.to_string(),
            "failed to publish results: plan entry entry-1 in plan R9 has no runs"
        );
        assert!(reporter.lines().is_empty());
    }
}

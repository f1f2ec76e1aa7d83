//! Operator-facing progress reporting.
//!
//! The pipeline never prints directly. It hands progress lines, warnings and
//! the final summary to a [`Reporter`]; fatal errors are returned instead and
//! printed by the caller.

use std::fmt;
use std::path::PathBuf;

use crate::gateway::{Run, User};
use crate::publish::PublishSummary;
use crate::resolve::EntityKind;
use crate::run::RunOrigin;

/// A non-fatal problem. The pipeline carries on after reporting it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// The outcome has no usable case id and is left out.
    MissingCaseId { test: String },

    /// No outcome could be mapped; nothing is sent.
    NothingToPublish,

    /// The service accepted the batch but returned no results.
    NoResultsReturned { submitted: usize },

    /// Runs could not be listed, so stale runs were left open.
    StaleRunsUnavailable { message: String },

    /// Closing one stale run failed.
    StaleRunNotClosed { run_id: u64, message: String },

    /// Some closures were still in flight when the wait expired and were
    /// cancelled.
    StaleRunCloseTimedOut { pending: usize, wait_secs: u64 },

    /// Uploading one screenshot failed.
    AttachmentFailed {
        test: String,
        path: PathBuf,
        message: String,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::MissingCaseId { test } => {
                write!(f, "'{}' has no case id and will not be published", test)
            }
            Warning::NothingToPublish => f.write_str("No results to publish"),
            Warning::NoResultsReturned { submitted } => write!(
                f,
                "Submitted {} results but the service returned none",
                submitted
            ),
            Warning::StaleRunsUnavailable { message } => {
                write!(f, "Could not list runs to close stale ones: {}", message)
            }
            Warning::StaleRunNotClosed { run_id, message } => {
                write!(f, "Could not close stale run R{}: {}", run_id, message)
            }
            Warning::StaleRunCloseTimedOut { pending, wait_secs } => write!(
                f,
                "{} stale run closures abandoned after {}s",
                pending, wait_secs
            ),
            Warning::AttachmentFailed {
                test,
                path,
                message,
            } => write!(
                f,
                "Could not attach {} to '{}': {}",
                path.display(),
                test,
                message
            ),
        }
    }
}

/// Receives progress from the publishing pipeline.
pub trait Reporter: Send + Sync {
    /// The connectivity check succeeded.
    fn on_connected(&self, host: &str, user: &User);

    /// A project, plan or suite was resolved.
    fn on_resolved(&self, kind: EntityKind, name: &str, id: u64);

    /// A stale run was closed.
    fn on_stale_run_closed(&self, run: &Run);

    /// The target run is ready.
    fn on_run_ready(&self, run: &Run, origin: RunOrigin);

    fn on_warning(&self, warning: &Warning);

    /// Results were published.
    fn on_published(&self, summary: &PublishSummary);
}

/// A reporter that does nothing (for testing or when output is not needed).
pub struct NullReporter;

impl Reporter for NullReporter {
    fn on_connected(&self, _host: &str, _user: &User) {}
    fn on_resolved(&self, _kind: EntityKind, _name: &str, _id: u64) {}
    fn on_stale_run_closed(&self, _run: &Run) {}
    fn on_run_ready(&self, _run: &Run, _origin: RunOrigin) {}
    fn on_warning(&self, _warning: &Warning) {}
    fn on_published(&self, _summary: &PublishSummary) {}
}

/// Console reporter that prints progress lines to the terminal.
pub struct ConsoleReporter {
    verbose: bool,
}

impl ConsoleReporter {
    /// Create a new console reporter.
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl Reporter for ConsoleReporter {
    fn on_connected(&self, host: &str, user: &User) {
        println!(
            "{} {} as {}",
            console::style("Connected to").dim(),
            host,
            console::style(&user.name).bold()
        );
    }

    fn on_resolved(&self, kind: EntityKind, name: &str, id: u64) {
        println!("{:<8} {} ({})", console::style(kind.title()).cyan(), name, id);
    }

    fn on_stale_run_closed(&self, run: &Run) {
        if self.verbose {
            println!("Closed stale run: {} (R{})", run.name, run.id);
        }
    }

    fn on_run_ready(&self, run: &Run, origin: RunOrigin) {
        let verb = match origin {
            RunOrigin::Created => "Created run",
            RunOrigin::PlanEntry => "Added plan entry run",
        };
        println!(
            "{}: {} (R{})",
            console::style(verb).cyan(),
            run.name,
            run.id
        );
        if let Some(url) = &run.url {
            println!("  {}", console::style(url).dim());
        }
    }

    fn on_warning(&self, warning: &Warning) {
        println!("{} {}", console::style("WARN").yellow().bold(), warning);
    }

    fn on_published(&self, summary: &PublishSummary) {
        println!();
        println!(
            "{}",
            console::style(format!(
                "Published {} results to run R{}",
                summary.returned, summary.run_id
            ))
            .green()
            .bold()
        );
        if summary.skipped > 0 {
            println!(
                "  Skipped:     {}",
                console::style(summary.skipped).yellow()
            );
        }
        if summary.attachments_uploaded > 0 || summary.attachments_failed > 0 {
            println!(
                "  Attachments: {}",
                console::style(summary.attachments_uploaded).green()
            );
        }
        if summary.attachments_failed > 0 {
            println!(
                "  Failed:      {}",
                console::style(summary.attachments_failed).red()
            );
        }
    }
}

#[cfg(test)]
pub(crate) mod recording {
    use std::sync::Mutex;

    use super::*;

    /// Reporter that keeps everything it receives, for assertions.
    #[derive(Default)]
    pub(crate) struct RecordingReporter {
        pub lines: Mutex<Vec<String>>,
        pub warnings: Mutex<Vec<Warning>>,
        pub summaries: Mutex<Vec<PublishSummary>>,
    }

    impl RecordingReporter {
        pub fn lines(&self) -> Vec<String> {
            self.lines.lock().unwrap().clone()
        }

        pub fn warnings(&self) -> Vec<Warning> {
            self.warnings.lock().unwrap().clone()
        }

        pub fn summaries(&self) -> Vec<PublishSummary> {
            self.summaries.lock().unwrap().clone()
        }
    }

    impl Reporter for RecordingReporter {
        fn on_connected(&self, host: &str, user: &User) {
            self.lines
                .lock()
                .unwrap()
                .push(format!("connected {} {}", host, user.email));
        }

        fn on_resolved(&self, kind: EntityKind, name: &str, id: u64) {
            self.lines
                .lock()
                .unwrap()
                .push(format!("{} {} ({})", kind, name, id));
        }

        fn on_stale_run_closed(&self, run: &Run) {
            self.lines.lock().unwrap().push(format!("closed {}", run.id));
        }

        fn on_run_ready(&self, run: &Run, origin: RunOrigin) {
            self.lines
                .lock()
                .unwrap()
                .push(format!("run {} {:?}", run.id, origin));
        }

        fn on_warning(&self, warning: &Warning) {
            self.warnings.lock().unwrap().push(warning.clone());
        }

        fn on_published(&self, summary: &PublishSummary) {
            self.summaries.lock().unwrap().push(summary.clone());
        }
    }
}

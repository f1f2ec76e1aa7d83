//! JUnit XML ingestion.
//!
//! Turns a JUnit report into [`Outcome`]s so that any runner able to write
//! JUnit can publish without a dedicated integration.
//!
//! # Mapping
//!
//! | JUnit | Outcome |
//! |-------|---------|
//! | `<testcase name="C123 login works">` | case id `123` (first `C<digits>` token, else 0) |
//! | `<failure>` / `<error>` | Failed, message attribute and body become errors |
//! | `<skipped>` | Blocked |
//! | none of the above | Passed |
//! | `[[ATTACHMENT\|path]]` line in `<system-out>` | screenshot (relative to the report) |

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Result, bail};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use regex::Regex;

use super::{Outcome, Status};

static CASE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bC(\d+)\b").expect("case id pattern is valid"));

static ATTACHMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\[ATTACHMENT\|([^\]]+)\]\]").expect("attachment pattern is valid")
});

/// Extracts the case id from a test name, or 0 when the name carries none.
pub fn case_id_from_name(name: &str) -> i64 {
    CASE_ID
        .captures(name)
        .and_then(|cap| cap[1].parse().ok())
        .unwrap_or(0)
}

/// Element whose text content is being collected.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Capture {
    Failure,
    SystemOut,
}

/// A `<testcase>` being assembled while its children are read.
struct PendingCase {
    outcome: Outcome,
    failure_text: String,
    system_out: String,
}

impl PendingCase {
    fn new(name: String) -> Self {
        let case_id = case_id_from_name(&name);
        Self {
            outcome: Outcome::new(name, case_id, Status::passed()),
            failure_text: String::new(),
            system_out: String::new(),
        }
    }

    fn finish(mut self, base_dir: &Path) -> Outcome {
        let body = self.failure_text.trim();
        if !body.is_empty() {
            self.outcome.errors.push(body.to_string());
        }
        for cap in ATTACHMENT.captures_iter(&self.system_out) {
            let path = PathBuf::from(cap[1].trim());
            let path = if path.is_absolute() {
                path
            } else {
                base_dir.join(path)
            };
            self.outcome.screenshots.push(path);
        }
        self.outcome
    }
}

/// Parses a JUnit XML document into outcomes, in document order.
///
/// Relative attachment paths are resolved against `base_dir`.
pub fn parse_junit(content: &str, base_dir: &Path) -> Result<Vec<Outcome>> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut outcomes = Vec::new();
    let mut current: Option<PendingCase> = None;
    let mut capture: Option<Capture> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"testcase" => current = Some(PendingCase::new(attribute(&e, "name")?)),
                b"failure" | b"error" | b"skipped" | b"system-out" => {
                    if let Some(case) = current.as_mut() {
                        capture = apply_child(case, &e)?;
                    }
                }
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"testcase" => {
                    let case = PendingCase::new(attribute(&e, "name")?);
                    outcomes.push(case.finish(base_dir));
                }
                b"failure" | b"error" | b"skipped" => {
                    if let Some(case) = current.as_mut() {
                        apply_child(case, &e)?;
                    }
                }
                _ => {}
            },
            Event::Text(t) => {
                if let (Some(case), Some(target)) = (current.as_mut(), capture) {
                    append_text(case, target, &t.unescape()?);
                }
            }
            Event::CData(c) => {
                if let (Some(case), Some(target)) = (current.as_mut(), capture) {
                    append_text(case, target, &String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"testcase" => {
                    if let Some(case) = current.take() {
                        outcomes.push(case.finish(base_dir));
                    }
                    capture = None;
                }
                b"failure" | b"error" | b"system-out" => capture = None,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if current.is_some() {
        bail!("Unterminated <testcase> element");
    }

    Ok(outcomes)
}

/// Applies a child element of `<testcase>` and returns what its text feeds.
fn apply_child(case: &mut PendingCase, e: &BytesStart<'_>) -> Result<Option<Capture>> {
    match e.name().as_ref() {
        b"failure" | b"error" => {
            case.outcome.status = Status::failed();
            if let Some(message) = optional_attribute(e, "message")?
                && !message.is_empty()
            {
                case.outcome.errors.push(message);
            }
            Ok(Some(Capture::Failure))
        }
        b"skipped" => {
            if case.outcome.status.id != Status::FAILED {
                case.outcome.status = Status::blocked();
            }
            Ok(None)
        }
        b"system-out" => Ok(Some(Capture::SystemOut)),
        _ => Ok(None),
    }
}

fn append_text(case: &mut PendingCase, target: Capture, text: &str) {
    let buffer = match target {
        Capture::Failure => &mut case.failure_text,
        Capture::SystemOut => &mut case.system_out,
    };
    if !buffer.is_empty() {
        buffer.push('\n');
    }
    buffer.push_str(text);
}

fn attribute(e: &BytesStart<'_>, key: &str) -> Result<String> {
    match optional_attribute(e, key)? {
        Some(value) => Ok(value),
        None => bail!(
            "<{}> is missing the '{}' attribute",
            String::from_utf8_lossy(e.name().as_ref()),
            key
        ),
    }
}

fn optional_attribute(e: &BytesStart<'_>, key: &str) -> Result<Option<String>> {
    match e.try_get_attribute(key)? {
        Some(attr) => Ok(Some(attr.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

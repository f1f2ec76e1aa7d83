//! Identifier resolution.
//!
//! Operators name their targets the way the web UI shows them: by name
//! ("Website QA") or by prefixed id ("P12" for a project, "R7" for a plan,
//! "S3" for a suite). The resolver turns either form into the numeric id the
//! API expects.
//!
//! Resolution is fail-fast: a target that cannot be found is a
//! [`PublishError::Resolution`], because nothing downstream can proceed
//! without it. Plan and suite are optional groupings; when neither a name
//! nor an id was requested they resolve to `None` without a remote call.

use std::fmt;

use tracing::debug;

use crate::error::{PublishError, PublishResult, Stage};
use crate::gateway::{Named, TestRailApi};
use crate::report::Reporter;

/// Kind of entity being resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Project,
    Plan,
    Suite,
}

impl EntityKind {
    /// Letter the service's UI puts in front of ids of this kind.
    pub fn prefix(self) -> char {
        match self {
            EntityKind::Project => 'P',
            EntityKind::Plan => 'R',
            EntityKind::Suite => 'S',
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            EntityKind::Project => "Project",
            EntityKind::Plan => "Plan",
            EntityKind::Suite => "Suite",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Project => f.write_str("project"),
            EntityKind::Plan => f.write_str("plan"),
            EntityKind::Suite => f.write_str("suite"),
        }
    }
}

/// A name-or-id pair as written in configuration. Blank values are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    pub name: Option<String>,
    pub id: Option<String>,
}

impl Selector {
    pub fn new(name: Option<String>, id: Option<String>) -> Self {
        let clean = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            name: clean(name),
            id: clean(id),
        }
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        Self::new(Some(name.into()), None)
    }

    pub fn by_id(id: impl Into<String>) -> Self {
        Self::new(None, Some(id.into()))
    }

    /// Whether the operator asked for this entity at all.
    pub fn is_requested(&self) -> bool {
        self.name.is_some() || self.id.is_some()
    }

    /// What to print when the selector matches nothing.
    fn describe(&self) -> String {
        match (&self.id, &self.name) {
            (Some(id), _) => id.clone(),
            (None, Some(name)) => format!("'{}'", name),
            (None, None) => "(not specified)".to_string(),
        }
    }
}

/// Parses an id such as `"P12"` or `"12"` for the given kind.
pub fn parse_id(kind: EntityKind, raw: &str) -> Option<u64> {
    let raw = raw.trim();
    let digits = raw
        .strip_prefix(kind.prefix())
        .or_else(|| raw.strip_prefix(kind.prefix().to_ascii_lowercase()))
        .unwrap_or(raw);
    digits.parse().ok()
}

/// Returns the first item matching `predicate`, in list order.
pub fn find_entity<T, P>(items: &[T], predicate: P) -> Option<&T>
where
    P: Fn(&T) -> bool,
{
    items.iter().find(|item| predicate(item))
}

/// Matches a selector against a fetched list. An id takes precedence over a name.
pub fn match_selector<'a, T: Named>(
    kind: EntityKind,
    items: &'a [T],
    selector: &Selector,
) -> PublishResult<&'a T> {
    let not_found = || PublishError::Resolution {
        kind,
        identifier: selector.describe(),
    };

    let found = match (&selector.id, &selector.name) {
        (Some(raw), _) => {
            let id = parse_id(kind, raw).ok_or_else(not_found)?;
            find_entity(items, |item| item.id() == id)
        }
        (None, Some(name)) => find_entity(items, |item| item.name() == name),
        (None, None) => None,
    };

    found.ok_or_else(not_found)
}

/// Resolves configured targets against the service.
pub struct Resolver<'a, A: ?Sized, R: ?Sized> {
    api: &'a A,
    reporter: &'a R,
}

impl<'a, A, R> Resolver<'a, A, R>
where
    A: TestRailApi + ?Sized,
    R: Reporter + ?Sized,
{
    pub fn new(api: &'a A, reporter: &'a R) -> Self {
        Self { api, reporter }
    }

    /// Resolves the project. A project is always required.
    pub async fn resolve_project(&self, selector: &Selector) -> PublishResult<u64> {
        if !selector.is_requested() {
            return Err(PublishError::Resolution {
                kind: EntityKind::Project,
                identifier: selector.describe(),
            });
        }

        let projects = self
            .api
            .get_projects()
            .await
            .map_err(PublishError::remote(Stage::Resolving(EntityKind::Project)))?;
        let project = match_selector(EntityKind::Project, &projects, selector)?;

        self.confirm(EntityKind::Project, project);
        Ok(project.id())
    }

    /// Resolves the plan within a project, if one was requested.
    pub async fn resolve_plan(
        &self,
        project_id: u64,
        selector: &Selector,
    ) -> PublishResult<Option<u64>> {
        if !selector.is_requested() {
            debug!("no plan requested");
            return Ok(None);
        }

        let plans = self
            .api
            .get_plans(project_id)
            .await
            .map_err(PublishError::remote(Stage::Resolving(EntityKind::Plan)))?;
        let plan = match_selector(EntityKind::Plan, &plans, selector)?;

        self.confirm(EntityKind::Plan, plan);
        Ok(Some(plan.id()))
    }

    /// Resolves the suite within a project, if one was requested.
    pub async fn resolve_suite(
        &self,
        project_id: u64,
        selector: &Selector,
    ) -> PublishResult<Option<u64>> {
        if !selector.is_requested() {
            debug!("no suite requested");
            return Ok(None);
        }

        let suites = self
            .api
            .get_suites(project_id)
            .await
            .map_err(PublishError::remote(Stage::Resolving(EntityKind::Suite)))?;
        let suite = match_selector(EntityKind::Suite, &suites, selector)?;

        self.confirm(EntityKind::Suite, suite);
        Ok(Some(suite.id()))
    }

    fn confirm<T: Named>(&self, kind: EntityKind, entity: &T) {
        debug!(%kind, id = entity.id(), name = entity.name(), "resolved");
        self.reporter.on_resolved(kind, entity.name(), entity.id());
    }
}

//! Validation orchestration
//!
//! Collects violations from the model's own invariants, the identifier
//! allocator and a shape validator, and decides with a caller-chosen minimum
//! severity whether the vocabulary fails.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::VocabContext;
use crate::error::VocabError;
use crate::expand::expand;
use crate::model::Model;
use crate::shapes::{ShapeSet, ShapeValidator};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    #[default]
    Violation,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Violation => "violation",
        };
        f.write_str(s)
    }
}

impl FromStr for Severity {
    type Err = VocabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" | "warn" => Ok(Severity::Warning),
            "violation" | "error" => Ok(Severity::Violation),
            other => Err(VocabError::InvalidArgument(format!(
                "unknown severity \"{}\", expected info, warning or violation",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViolationKind {
    MissingField,
    MalformedIri,
    UnknownPrefix,
    InvalidValue,
    DuplicateIri,
    DuplicateLanguage,
    Conflict,
    IdWidth,
    IdOutOfRange,
    WrongContributor,
    Placeholder,
    Cycle,
    NoTopConcept,
    EmptyCollection,
    DanglingReference,
    Provenance,
    Deprecation,
    RedundantHierarchy,
    Removed,
    Shape,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ViolationKind::MissingField => "missing field",
            ViolationKind::MalformedIri => "malformed IRI",
            ViolationKind::UnknownPrefix => "unknown prefix",
            ViolationKind::InvalidValue => "invalid value",
            ViolationKind::DuplicateIri => "duplicate IRI",
            ViolationKind::DuplicateLanguage => "duplicate language",
            ViolationKind::Conflict => "conflicting values",
            ViolationKind::IdWidth => "ID width",
            ViolationKind::IdOutOfRange => "ID out of range",
            ViolationKind::WrongContributor => "wrong contributor",
            ViolationKind::Placeholder => "placeholder IRI",
            ViolationKind::Cycle => "cycle",
            ViolationKind::NoTopConcept => "no top concept",
            ViolationKind::EmptyCollection => "empty collection",
            ViolationKind::DanglingReference => "dangling reference",
            ViolationKind::Provenance => "provenance",
            ViolationKind::Deprecation => "deprecation",
            ViolationKind::RedundantHierarchy => "redundant hierarchy",
            ViolationKind::Removed => "removed entity",
            ViolationKind::Shape => "shape",
        };
        f.write_str(s)
    }
}

/// One problem, located precisely enough to fix it without a debugger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub severity: Severity,
    pub kind: ViolationKind,
    /// Entity IRI or a row locator like "Concepts row 5"
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub message: String,
}

impl Violation {
    pub fn new(
        severity: Severity,
        kind: ViolationKind,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Violation {
            severity,
            kind,
            subject: subject.into(),
            field: None,
            value: None,
            message: message.into(),
        }
    }

    pub fn violation(
        kind: ViolationKind,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(Severity::Violation, kind, subject, message)
    }

    pub fn warning(
        kind: ViolationKind,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(Severity::Warning, kind, subject, message)
    }

    pub fn info(kind: ViolationKind, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, kind, subject, message)
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.subject)?;
        if let Some(field) = &self.field {
            write!(f, " ({})", field)?;
        }
        write!(f, ": {}: {}", self.kind, self.message)?;
        if let Some(value) = &self.value {
            write!(f, " [value: {:?}]", value)?;
        }
        Ok(())
    }
}

/// All violations found for one vocabulary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, violation: Violation) {
        self.violations.push(violation);
    }

    pub fn extend(&mut self, violations: impl IntoIterator<Item = Violation>) {
        self.violations.extend(violations);
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.violations
            .iter()
            .filter(|v| v.severity == severity)
            .count()
    }

    pub fn has_kind(&self, kind: ViolationKind) -> bool {
        self.violations.iter().any(|v| v.kind == kind)
    }

    /// Whether any violation is at least `min` severe
    pub fn fails_at(&self, min: Severity) -> bool {
        self.violations.iter().any(|v| v.severity >= min)
    }

    /// Only the violations at least `min` severe
    pub fn at_least(&self, min: Severity) -> ValidationReport {
        ValidationReport {
            violations: self
                .violations
                .iter()
                .filter(|v| v.severity >= min)
                .cloned()
                .collect(),
        }
    }

    /// Most severe first, then by subject
    pub fn sort(&mut self) {
        self.violations.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| a.subject.cmp(&b.subject))
                .then_with(|| a.kind.cmp(&b.kind))
        });
    }

    /// "2 violations, 1 warning, 0 infos"
    pub fn summary(&self) -> String {
        format!(
            "{} violations, {} warnings, {} infos",
            self.count(Severity::Violation),
            self.count(Severity::Warning),
            self.count(Severity::Info)
        )
    }

    /// Turn the report into an error if it fails at `min`
    pub fn into_result(self, min: Severity) -> Result<ValidationReport, VocabError> {
        if self.fails_at(min) {
            Err(VocabError::Validation(self))
        } else {
            Ok(self)
        }
    }

    /// Emit non-failing entries through the log
    pub fn log(&self) {
        for v in &self.violations {
            match v.severity {
                Severity::Info => debug!("{}", v),
                Severity::Warning => warn!("{}", v),
                Severity::Violation => warn!("{}", v),
            }
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for v in &self.violations {
            writeln!(f, "  {}", v)?;
        }
        Ok(())
    }
}

/// Runs every check for one vocabulary
pub struct Orchestrator<'a> {
    ctx: &'a VocabContext,
    shape_validator: &'a dyn ShapeValidator,
    shapes: ShapeSet,
    min_severity: Severity,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        ctx: &'a VocabContext,
        shape_validator: &'a dyn ShapeValidator,
        shapes: ShapeSet,
        min_severity: Severity,
    ) -> Self {
        Orchestrator {
            ctx,
            shape_validator,
            shapes,
            min_severity,
        }
    }

    /// Collect the full report without deciding pass or fail
    pub fn run(&self, model: &Model) -> ValidationReport {
        let mut report = ValidationReport::new();
        report.extend(model.validate_invariants(self.ctx));

        let observed = model.observed_ids(self.ctx);
        report.extend(self.ctx.allocator.verify(
            &observed,
            self.ctx.overrides.committer.as_deref(),
            self.ctx.baseline_ids.as_ref(),
        ));

        let graph = expand(&model.to_graph(self.ctx));
        report.extend(
            self.shape_validator
                .validate(&graph, &self.shapes, self.min_severity),
        );
        report.sort();
        info!(
            "Validated \"{}\" against {}: {}",
            self.ctx.name,
            self.shapes.name,
            report.summary()
        );
        report
    }

    /// Run and fail with a [`VocabError::Validation`] at the minimum severity
    pub fn check(&self, model: &Model) -> Result<ValidationReport, VocabError> {
        self.run(model).into_result(self.min_severity)
    }
}

use std::cmp::Ordering;

use crate::document::{ConfigDocument, Number, Value};
use crate::schema::{Rule, RuleFault, RuleRecord, RuleSet, ValueType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
}

/// Category of a finding; fixes its severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueKind {
    MissingParameter,
    TypeMismatch,
    RangeViolation,
    RuleFault,
}

impl IssueKind {
    pub fn severity(self) -> Severity {
        match self {
            IssueKind::MissingParameter => Severity::Warning,
            IssueKind::TypeMismatch | IssueKind::RangeViolation | IssueKind::RuleFault => {
                Severity::Error
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIssue {
    pub parameter: String,
    pub kind: IssueKind,
    pub severity: Severity,
    pub message: String,
    pub location: Option<Location>,
}

impl ValidationIssue {
    pub fn new(parameter: String, kind: IssueKind, message: String) -> Self {
        Self {
            parameter,
            kind,
            severity: kind.severity(),
            message,
            location: None,
        }
    }
}

/// Outcome of one validation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// True when no rule produced an error. Warnings never fail a run.
    pub fn is_valid(&self) -> bool {
        self.errors().next().is_none()
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }
}

/// Evaluates every rule against the document, collecting all findings.
pub fn validate_config(document: &ConfigDocument, rules: &RuleSet) -> ValidationReport {
    let mut issues = Vec::new();

    for (index, record) in rules.iter().enumerate() {
        match evaluate_record(document, record) {
            Ok(found) => issues.extend(found),
            Err(fault) => {
                let parameter = record
                    .parameter_hint()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("rules[{index}]"));
                let message = format!("Error validating parameter '{parameter}': {fault}");
                issues.push(ValidationIssue::new(parameter, IssueKind::RuleFault, message));
            }
        }
    }

    ValidationReport { issues }
}

/// A missing parameter short-circuits before `type` is decoded; bounds are
/// only decoded for numeric types.
fn evaluate_record(
    document: &ConfigDocument,
    record: &RuleRecord,
) -> Result<Vec<ValidationIssue>, RuleFault> {
    let parameter = record.parameter()?;
    let value = match lookup(document, parameter) {
        Ok(value) => value,
        Err(missing) => return Ok(vec![missing]),
    };

    let Some(value_type) = record.value_type()? else {
        return Ok(Vec::new());
    };
    if let Some(mismatch) = type_mismatch(parameter, value, value_type) {
        return Ok(vec![mismatch]);
    }

    let mut issues = Vec::new();
    if value_type.is_numeric() {
        let rule = Rule {
            parameter: parameter.to_string(),
            value_type: Some(value_type),
            min: record.bound("min")?,
            max: record.bound("max")?,
        };
        check_range(parameter, value, &rule, &mut issues);
    }
    Ok(issues)
}

/// Checks one resolved rule. A null value counts as missing.
pub fn check_rule(document: &ConfigDocument, rule: &Rule) -> Vec<ValidationIssue> {
    let parameter = &rule.parameter;
    let value = match lookup(document, parameter) {
        Ok(value) => value,
        Err(missing) => return vec![missing],
    };

    let Some(value_type) = rule.value_type else {
        return Vec::new();
    };
    if let Some(mismatch) = type_mismatch(parameter, value, value_type) {
        return vec![mismatch];
    }

    let mut issues = Vec::new();
    // String and list rules are satisfied by the type match alone.
    if value_type.is_numeric() {
        check_range(parameter, value, rule, &mut issues);
    }
    issues
}

fn lookup<'a>(document: &'a ConfigDocument, parameter: &str) -> Result<&'a Value, ValidationIssue> {
    match document.get(parameter) {
        Some(value) if !value.is_null() => Ok(value),
        _ => Err(ValidationIssue::new(
            parameter.to_string(),
            IssueKind::MissingParameter,
            format!("Parameter '{parameter}' not found in configuration."),
        )),
    }
}

fn type_mismatch(parameter: &str, value: &Value, value_type: ValueType) -> Option<ValidationIssue> {
    if value_type.accepts(value.kind()) {
        return None;
    }
    Some(ValidationIssue::new(
        parameter.to_string(),
        IssueKind::TypeMismatch,
        format!(
            "Parameter '{parameter}' has incorrect type. Expected {value_type}, got {}.",
            value.kind()
        ),
    ))
}

fn check_range(parameter: &str, value: &Value, rule: &Rule, issues: &mut Vec<ValidationIssue>) {
    let Some(number) = value.as_number() else {
        return;
    };

    if let Some(min) = rule.min {
        if is_ordered(number, min, Ordering::Less) {
            issues.push(range_issue(parameter, number, "less than minimum", min));
        }
    }
    if let Some(max) = rule.max {
        if is_ordered(number, max, Ordering::Greater) {
            issues.push(range_issue(parameter, number, "greater than maximum", max));
        }
    }
}

fn is_ordered(value: Number, bound: Number, expected: Ordering) -> bool {
    value.compare(bound) == Some(expected)
}

fn range_issue(parameter: &str, value: Number, relation: &str, bound: Number) -> ValidationIssue {
    ValidationIssue::new(
        parameter.to_string(),
        IssueKind::RangeViolation,
        format!("Parameter '{parameter}' is out of range. Value {value} is {relation} {bound}."),
    )
}

/// Fills in source positions for issues whose parameter appears as a key in
/// the raw configuration text. Missing parameters are left without one.
pub fn attach_locations(source: &str, mut issues: Vec<ValidationIssue>) -> Vec<ValidationIssue> {
    for issue in &mut issues {
        if issue.kind != IssueKind::MissingParameter {
            issue.location = find_location(source, &issue.parameter);
        }
    }
    issues
}

fn find_location(source: &str, parameter: &str) -> Option<Location> {
    if parameter.is_empty() {
        return None;
    }
    let quoted = [format!("\"{parameter}\""), format!("'{parameter}'")];
    let bare_key = format!("{parameter}:");

    for (idx, line) in source.lines().enumerate() {
        let column = quoted
            .iter()
            .find_map(|needle| quoted_key_column(line, needle))
            .or_else(|| {
                let indent = line.len() - line.trim_start().len();
                line.trim_start().starts_with(&bare_key).then_some(indent)
            });
        if let Some(column) = column {
            return Some(Location {
                line: idx + 1,
                column: column + 1,
            });
        }
    }
    None
}

/// Byte offset of `needle` where it is used as a key, i.e. followed by `:`.
fn quoted_key_column(line: &str, needle: &str) -> Option<usize> {
    line.match_indices(needle)
        .find(|(start, _)| line[start + needle.len()..].trim_start().starts_with(':'))
        .map(|(start, _)| start)
}

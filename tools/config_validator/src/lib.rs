//! Rule-based checks of configuration parameter presence, type and range.
//!
//! The crate performs no I/O: callers hand over a decoded [`ConfigDocument`]
//! and [`RuleSet`] and get back a [`ValidationReport`].

pub mod document;
pub mod schema;
pub mod validation;

pub use document::{ConfigDocument, Kind, Number, Value};
pub use schema::{Rule, RuleFault, RuleRecord, RuleSet, ValueType};
pub use validation::{
    IssueKind, Location, Severity, ValidationIssue, ValidationReport, attach_locations,
    check_rule, validate_config,
};

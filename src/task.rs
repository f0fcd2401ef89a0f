//! Task records for the board.
//!
//! A `TaskDraft` is unvalidated input from the editor surface or a decoder;
//! `TaskRules` turns it into a `ValidDraft` using the configured columns,
//! and the board stamps an id on it to make a `Task`.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use ulid::{Generator, Ulid};

use crate::config::BoardConfig;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Low,
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    /// Recognizes English names and the legacy `baixa`/`media`/`alta` values.
    pub fn parse_lenient(raw: &str) -> Option<Priority> {
        match raw.trim().to_lowercase().as_str() {
            "low" | "baixa" => Some(Priority::Low),
            "medium" | "media" | "média" => Some(Priority::Medium),
            "high" | "alta" => Some(Priority::High),
            _ => None,
        }
    }

    /// Lenient parse; anything unrecognized becomes `Low`.
    pub fn coerce(raw: &str) -> Priority {
        match Priority::parse_lenient(raw) {
            Some(priority) => priority,
            None => {
                if !raw.trim().is_empty() {
                    tracing::warn!(value = raw, "unknown priority, using low");
                }
                Priority::Low
            }
        }
    }

    /// Sort rank: high first.
    pub fn rank(&self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }

    pub fn next(&self) -> Priority {
        match self {
            Priority::Low => Priority::Medium,
            Priority::Medium => Priority::High,
            Priority::High => Priority::Low,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Priority::parse_lenient(s).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "unknown priority '{}' (expected low, medium or high)",
                s.trim()
            ))
        })
    }
}

/// Column identifier a task belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Status(String);

impl Status {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Status {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// How to treat a due date that does not parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueDatePolicy {
    /// Reject with `Error::InvalidDueDate`
    Strict,
    /// Drop the date and log a warning
    Lenient,
}

/// Unvalidated task input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDraft {
    pub title: String,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub due_date: Option<String>,
    pub completed: bool,
    pub tags: Vec<String>,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn priority(mut self, priority: impl Into<String>) -> Self {
        self.priority = Some(priority.into());
        self
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn due(mut self, due: impl Into<String>) -> Self {
        self.due_date = Some(due.into());
        self
    }

    pub fn completed(mut self, completed: bool) -> Self {
        self.completed = completed;
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Draft pre-filled from an existing task, as the editor opens it.
    pub fn from_task(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            priority: Some(task.priority.as_str().to_string()),
            status: Some(task.status.as_str().to_string()),
            due_date: task.due_date.map(|date| date.format("%Y-%m-%d").to_string()),
            completed: task.completed,
            tags: task.tags.clone(),
        }
    }
}

/// A draft that passed validation; everything but the id of a `Task`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidDraft {
    pub title: String,
    pub priority: Priority,
    pub status: Status,
    pub due_date: Option<NaiveDate>,
    pub completed: bool,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub priority: Priority,
    pub status: Status,
    pub due_date: Option<NaiveDate>,
    pub completed: bool,
    pub tags: Vec<String>,
    /// Derived from `due_date` and the board's current day.
    #[serde(default)]
    pub expired: bool,
}

impl Task {
    pub fn from_valid(id: String, draft: ValidDraft) -> Self {
        Self {
            id,
            title: draft.title,
            priority: draft.priority,
            status: draft.status,
            due_date: draft.due_date,
            completed: draft.completed,
            tags: draft.tags,
            expired: false,
        }
    }

    /// Overwrite every editable field, keeping the id.
    pub fn apply(&mut self, draft: ValidDraft) {
        self.title = draft.title;
        self.priority = draft.priority;
        self.status = draft.status;
        self.due_date = draft.due_date;
        self.completed = draft.completed;
        self.tags = draft.tags;
    }
}

/// Parse a due date: `YYYY-MM-DD`, RFC 3339 or `YYYY-MM-DDTHH:MM[:SS]`
/// (time of day dropped), or `DD/MM/YYYY`.
pub fn parse_due_date(raw: &str) -> Option<NaiveDate> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.date_naive());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
            return Some(ts.date());
        }
    }
    NaiveDate::parse_from_str(value, "%d/%m/%Y").ok()
}

/// Trim, split on `;`, drop empties and duplicates keeping first-entered order.
pub fn normalize_tags<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut tags = Vec::new();
    for entry in raw {
        for piece in entry.as_ref().split(';') {
            let tag = piece.trim();
            if tag.is_empty() {
                continue;
            }
            if seen.insert(tag.to_string()) {
                tags.push(tag.to_string());
            }
        }
    }
    tags
}

/// Validation rules derived from the board configuration.
#[derive(Debug, Clone)]
pub struct TaskRules {
    columns: Vec<Status>,
    default_status: Status,
    aliases: BTreeMap<String, String>,
    due_policy: DueDatePolicy,
}

impl TaskRules {
    pub fn from_config(config: &BoardConfig) -> Self {
        Self {
            columns: config
                .columns
                .iter()
                .map(|column| Status::new(column.id.clone()))
                .collect(),
            default_status: Status::new(config.default_status.trim()),
            aliases: config
                .status_aliases
                .iter()
                .map(|(alias, target)| (alias.trim().to_lowercase(), target.trim().to_string()))
                .collect(),
            due_policy: if config.strict_due_dates {
                DueDatePolicy::Strict
            } else {
                DueDatePolicy::Lenient
            },
        }
    }

    pub fn with_due_policy(mut self, policy: DueDatePolicy) -> Self {
        self.due_policy = policy;
        self
    }

    pub fn due_policy(&self) -> DueDatePolicy {
        self.due_policy
    }

    pub fn columns(&self) -> &[Status] {
        &self.columns
    }

    pub fn default_status(&self) -> &Status {
        &self.default_status
    }

    /// Resolve a raw status through aliases to a configured column.
    pub fn resolve_status(&self, raw: &str) -> Option<Status> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        let target = self
            .aliases
            .get(&trimmed.to_lowercase())
            .map(String::as_str)
            .unwrap_or(trimmed);
        self.columns
            .iter()
            .find(|column| column.as_str().eq_ignore_ascii_case(target))
            .cloned()
    }

    /// Resolve or fall back to the default column.
    pub fn coerce_status(&self, raw: Option<&str>) -> Status {
        match raw {
            None => self.default_status.clone(),
            Some(value) => match self.resolve_status(value) {
                Some(status) => status,
                None => {
                    if !value.trim().is_empty() {
                        tracing::warn!(
                            value,
                            fallback = %self.default_status,
                            "unknown status, using default column"
                        );
                    }
                    self.default_status.clone()
                }
            },
        }
    }

    /// Resolve a move destination; unknown columns are an error.
    pub fn column(&self, raw: &str) -> Result<Status> {
        self.resolve_status(raw)
            .ok_or_else(|| Error::UnknownColumn(raw.trim().to_string()))
    }

    pub fn validate(&self, draft: &TaskDraft) -> Result<ValidDraft> {
        self.validate_with(draft, self.due_policy)
    }

    pub fn validate_with(&self, draft: &TaskDraft, policy: DueDatePolicy) -> Result<ValidDraft> {
        let title = draft.title.trim();
        if title.is_empty() {
            return Err(Error::EmptyTitle);
        }

        let due_date = match draft.due_date.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => match parse_due_date(raw) {
                Some(date) => Some(date),
                None => match policy {
                    DueDatePolicy::Strict => return Err(Error::InvalidDueDate(raw.to_string())),
                    DueDatePolicy::Lenient => {
                        tracing::warn!(value = raw, "unparsable due date dropped");
                        None
                    }
                },
            },
        };

        Ok(ValidDraft {
            title: title.to_string(),
            priority: draft
                .priority
                .as_deref()
                .map(Priority::coerce)
                .unwrap_or_default(),
            status: self.coerce_status(draft.status.as_deref()),
            due_date,
            completed: draft.completed,
            tags: normalize_tags(&draft.tags),
        })
    }
}

/// Mints `<prefix>-<ulid>` ids, lowercase and monotonic within the process.
pub struct IdGenerator {
    prefix: String,
    generator: Generator,
}

impl IdGenerator {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.trim().to_string(),
            generator: Generator::new(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn next_id(&mut self) -> String {
        let ulid = self.generator.generate().unwrap_or_else(|_| Ulid::new());
        format!("{}-{}", self.prefix, ulid.to_string().to_ascii_lowercase())
    }
}

impl fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdGenerator")
            .field("prefix", &self.prefix)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> TaskRules {
        TaskRules::from_config(&BoardConfig::default())
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn priority_is_lenient() {
        assert_eq!(Priority::coerce("HIGH"), Priority::High);
        assert_eq!(Priority::coerce("alta"), Priority::High);
        assert_eq!(Priority::coerce("média"), Priority::Medium);
        assert_eq!(Priority::coerce("media"), Priority::Medium);
        assert_eq!(Priority::coerce("baixa"), Priority::Low);
        assert_eq!(Priority::coerce("urgent"), Priority::Low);
        assert!("urgent".parse::<Priority>().is_err());
        assert_eq!("Medium".parse::<Priority>().unwrap(), Priority::Medium);
    }

    #[test]
    fn empty_title_rejected() {
        let err = rules().validate(&TaskDraft::new("   ")).unwrap_err();
        assert!(matches!(err, Error::EmptyTitle));
    }

    #[test]
    fn defaults_fill_missing_fields() {
        let valid = rules().validate(&TaskDraft::new("  Write docs ")).unwrap();
        assert_eq!(valid.title, "Write docs");
        assert_eq!(valid.priority, Priority::Low);
        assert_eq!(valid.status.as_str(), "pending");
        assert_eq!(valid.due_date, None);
        assert!(!valid.completed);
        assert!(valid.tags.is_empty());
    }

    #[test]
    fn status_aliases_and_unknowns() {
        let rules = rules();
        assert_eq!(rules.coerce_status(Some("pendente")).as_str(), "pending");
        assert_eq!(rules.coerce_status(Some("DOING")).as_str(), "doing");
        assert_eq!(rules.coerce_status(Some("archived")).as_str(), "pending");
        assert!(matches!(
            rules.column("archived"),
            Err(Error::UnknownColumn(name)) if name == "archived"
        ));
    }

    #[test]
    fn due_date_formats() {
        assert_eq!(parse_due_date("2024-05-01"), Some(date(2024, 5, 1)));
        assert_eq!(
            parse_due_date("2024-05-01T23:30:00-03:00"),
            Some(date(2024, 5, 1))
        );
        assert_eq!(parse_due_date("2024-05-01T08:15"), Some(date(2024, 5, 1)));
        assert_eq!(parse_due_date("01/05/2024"), Some(date(2024, 5, 1)));
        assert_eq!(parse_due_date("2024-02-30"), None);
        assert_eq!(parse_due_date("tomorrow"), None);
        assert_eq!(parse_due_date("   "), None);
    }

    #[test]
    fn due_date_policy() {
        let draft = TaskDraft::new("Pay rent").due("next week");
        let strict = rules().with_due_policy(DueDatePolicy::Strict);
        assert!(matches!(
            strict.validate(&draft),
            Err(Error::InvalidDueDate(value)) if value == "next week"
        ));

        let lenient = rules().with_due_policy(DueDatePolicy::Lenient);
        assert_eq!(lenient.validate(&draft).unwrap().due_date, None);

        let blank = TaskDraft::new("Pay rent").due("  ");
        assert_eq!(strict.validate(&blank).unwrap().due_date, None);
    }

    #[test]
    fn tags_are_normalized() {
        let tags = normalize_tags(["  work ", "", "home;errand", "work", "errand ; "]);
        assert_eq!(tags, vec!["work", "home", "errand"]);
    }

    #[test]
    fn draft_from_task_round_trips_through_rules() {
        let valid = rules()
            .validate(
                &TaskDraft::new("Ship")
                    .priority("high")
                    .status("doing")
                    .due("2024-06-10")
                    .tag("release"),
            )
            .unwrap();
        let task = Task::from_valid("card-1".to_string(), valid.clone());
        let again = rules().validate(&TaskDraft::from_task(&task)).unwrap();
        assert_eq!(again, valid);
    }

    #[test]
    fn ids_are_prefixed_unique_and_ordered() {
        let mut ids = IdGenerator::new("card");
        let first = ids.next_id();
        let second = ids.next_id();
        assert!(first.starts_with("card-"));
        assert_eq!(first.len(), "card-".len() + 26);
        assert_eq!(first, first.to_ascii_lowercase());
        assert_ne!(first, second);
        assert!(first < second);
    }
}

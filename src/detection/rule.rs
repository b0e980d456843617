// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Detection rules
//!
//! A rule names one or more searches and combines them with a condition.
//! Searches test fields of a flattened [`Event`]:
//!
//! ```yaml
//! detection:
//!   selection:
//!     result.head.title|contains: 'sign in'
//!     result.forms[*].fields[*].type: password
//!   filter:
//!     url|startswith: 'https://login.microsoftonline.com/'
//!   condition: selection and not filter
//! ```
//!
//! A `[*]` segment in a field name matches any array index.

use std::collections::BTreeMap;
use std::path::Path;

use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use serde_json::Value;
use serde_yaml::Value as Yaml;

use super::condition::Condition;
use super::flatten::Event;
use crate::error::{Error, Result};

/// Where a rule's events come from
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LogSource {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub service: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RuleDocument {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    level: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    logsource: Option<LogSource>,
    detection: serde_yaml::Mapping,
}

/// A parsed detection rule
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: String,
    pub level: String,
    pub tags: Vec<String>,
    pub logsource: Option<LogSource>,
    pub detection: Detection,
}

impl Rule {
    /// Parse a rule from YAML text
    pub fn from_yaml(source: &str) -> Result<Self> {
        let doc: Yaml = serde_yaml::from_str(source)?;
        Self::from_document(doc, Path::new("<inline>"))
    }

    /// Build a rule from one YAML document. `path` is only used in errors.
    pub fn from_document(doc: Yaml, path: &Path) -> Result<Self> {
        let doc: RuleDocument =
            serde_yaml::from_value(doc).map_err(|e| Error::rule(path, e.to_string()))?;
        let detection = Detection::parse(&doc.detection, path)?;

        Ok(Self {
            id: doc.id,
            title: doc.title,
            description: doc.description,
            status: doc.status,
            level: doc.level,
            tags: doc.tags,
            logsource: doc.logsource,
            detection,
        })
    }
}

/// Named searches and the conditions over them
#[derive(Debug, Clone)]
pub struct Detection {
    pub searches: BTreeMap<String, Search>,
    pub conditions: Vec<Condition>,
}

impl Detection {
    fn parse(mapping: &serde_yaml::Mapping, path: &Path) -> Result<Self> {
        let mut searches = BTreeMap::new();
        let mut conditions = Vec::new();

        for (key, value) in mapping {
            let name = key
                .as_str()
                .ok_or_else(|| Error::rule(path, "detection keys must be strings"))?;

            match name {
                "condition" => conditions = parse_conditions(value, path)?,
                "timeframe" => return Err(Error::rule(path, "timeframe is not supported")),
                _ => {
                    let search = Search::parse(value).map_err(|reason| {
                        Error::rule(path, format!("search '{}': {}", name, reason))
                    })?;
                    searches.insert(name.to_string(), search);
                }
            }
        }

        if conditions.is_empty() {
            return Err(Error::rule(path, "detection has no condition"));
        }
        for condition in &conditions {
            for name in condition.identifiers() {
                if !searches.contains_key(name) {
                    return Err(Error::rule(path, format!("condition references unknown search '{}'", name)));
                }
            }
        }

        Ok(Self {
            searches,
            conditions,
        })
    }

    /// Evaluate every search against `event`
    pub fn search_results(&self, event: &Event) -> BTreeMap<String, bool> {
        self.searches
            .iter()
            .map(|(name, search)| (name.clone(), search.matches(event)))
            .collect()
    }
}

fn parse_conditions(value: &Yaml, path: &Path) -> Result<Vec<Condition>> {
    let parse = |text: &str| Condition::parse(text).map_err(|e| Error::rule(path, e.to_string()));

    match value {
        Yaml::String(text) => Ok(vec![parse(text.as_str())?]),
        Yaml::Sequence(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .ok_or_else(|| Error::rule(path, "condition list entries must be strings"))
                    .and_then(parse)
            })
            .collect(),
        _ => Err(Error::rule(path, "condition must be a string or a list of strings")),
    }
}

/// One named search
#[derive(Debug, Clone)]
pub enum Search {
    /// Every field matcher must match
    Fields(Vec<FieldMatcher>),
    /// Any of the field groups must match
    AnyOf(Vec<Vec<FieldMatcher>>),
    /// Any event value contains any keyword
    Keywords(Vec<Regex>),
}

impl Search {
    fn parse(value: &Yaml) -> std::result::Result<Self, String> {
        match value {
            Yaml::Mapping(map) => Ok(Search::Fields(parse_field_map(map)?)),
            Yaml::Sequence(items) if items.iter().all(Yaml::is_mapping) => {
                let groups = items
                    .iter()
                    .filter_map(Yaml::as_mapping)
                    .map(parse_field_map)
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(Search::AnyOf(groups))
            }
            Yaml::Sequence(items) => {
                let keywords = items
                    .iter()
                    .map(|item| {
                        scalar_text(item)
                            .ok_or_else(|| "keyword lists may only contain scalars".to_string())
                            .and_then(|text| glob_regex(&text, Position::Contains, false))
                    })
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(Search::Keywords(keywords))
            }
            _ => Err("a search must be a map, a list of maps or a list of keywords".into()),
        }
    }

    /// Whether the search matches `event`
    pub fn matches(&self, event: &Event) -> bool {
        match self {
            Search::Fields(fields) => fields.iter().all(|f| f.matches(event)),
            Search::AnyOf(groups) => groups.iter().any(|g| g.iter().all(|f| f.matches(event))),
            Search::Keywords(keywords) => event
                .values()
                .filter_map(value_text)
                .any(|text| keywords.iter().any(|k| k.is_match(&text))),
        }
    }
}

fn parse_field_map(map: &serde_yaml::Mapping) -> std::result::Result<Vec<FieldMatcher>, String> {
    map.iter()
        .map(|(key, value)| {
            let key = key.as_str().ok_or_else(|| "field names must be strings".to_string())?;
            FieldMatcher::parse(key, value)
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    Exact,
    Contains,
    StartsWith,
    EndsWith,
}

/// Numeric comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Comparison {
    fn holds(self, left: f64, right: f64) -> bool {
        match self {
            Comparison::Gt => left > right,
            Comparison::Gte => left >= right,
            Comparison::Lt => left < right,
            Comparison::Lte => left <= right,
        }
    }
}

/// Test applied to one field value
#[derive(Debug, Clone)]
pub enum ValueMatcher {
    /// Wildcard pattern, compiled
    Pattern(Regex),
    /// Regular expression from a `re` modifier
    Regex(Regex),
    /// Number comparison
    Compare(Comparison, f64),
    /// Field absent, null or empty
    Null,
    /// Field presence
    Exists(bool),
}

impl ValueMatcher {
    fn matches_value(&self, value: &Value) -> bool {
        match self {
            ValueMatcher::Pattern(re) | ValueMatcher::Regex(re) => {
                value_text(value).map(|t| re.is_match(&t)).unwrap_or(false)
            }
            ValueMatcher::Compare(op, right) => value_number(value)
                .map(|left| op.holds(left, *right))
                .unwrap_or(false),
            ValueMatcher::Null => value.is_null() || value.as_str() == Some(""),
            ValueMatcher::Exists(_) => true,
        }
    }

    fn matches_field(&self, found: &[&Value]) -> bool {
        match self {
            ValueMatcher::Exists(expected) => found.is_empty() != *expected,
            ValueMatcher::Null if found.is_empty() => true,
            _ => found.iter().any(|v| self.matches_value(v)),
        }
    }
}

#[derive(Debug, Clone)]
enum FieldPath {
    Exact(String),
    Indexed(Regex),
}

/// A `field|modifiers: values` entry
#[derive(Debug, Clone)]
pub struct FieldMatcher {
    pub field: String,
    path: FieldPath,
    pub values: Vec<ValueMatcher>,
    /// Every value must match instead of any
    pub all: bool,
}

impl FieldMatcher {
    fn parse(key: &str, value: &Yaml) -> std::result::Result<Self, String> {
        let mut parts = key.split('|');
        let field = parts.next().unwrap_or_default().to_string();
        if field.is_empty() {
            return Err("empty field name".into());
        }

        let mut position = Position::Exact;
        let mut regex = false;
        let mut all = false;
        let mut cased = false;
        let mut exists = false;
        let mut comparison = None;

        for modifier in parts {
            match modifier {
                "contains" => position = Position::Contains,
                "startswith" => position = Position::StartsWith,
                "endswith" => position = Position::EndsWith,
                "re" => regex = true,
                "all" => all = true,
                "cased" => cased = true,
                "exists" => exists = true,
                "gt" => comparison = Some(Comparison::Gt),
                "gte" => comparison = Some(Comparison::Gte),
                "lt" => comparison = Some(Comparison::Lt),
                "lte" => comparison = Some(Comparison::Lte),
                other => return Err(format!("unknown modifier '{}' on {}", other, field)),
            }
        }

        let raw: Vec<&Yaml> = match value {
            Yaml::Sequence(items) => items.iter().collect(),
            single => vec![single],
        };
        if raw.is_empty() {
            return Err(format!("no values for {}", field));
        }

        let values = raw
            .into_iter()
            .map(|v| -> std::result::Result<ValueMatcher, String> {
                if exists {
                    return v
                        .as_bool()
                        .map(ValueMatcher::Exists)
                        .ok_or_else(|| format!("{}|exists expects true or false", field));
                }
                if let Some(op) = comparison {
                    return v
                        .as_f64()
                        .map(|n| ValueMatcher::Compare(op, n))
                        .ok_or_else(|| format!("{} comparison expects a number", field));
                }
                if v.is_null() {
                    return Ok(ValueMatcher::Null);
                }

                let text = scalar_text(v).ok_or_else(|| format!("{} values must be scalars", field))?;
                if regex {
                    Regex::new(&text)
                        .map(ValueMatcher::Regex)
                        .map_err(|e| format!("invalid regex for {}: {}", field, e))
                } else {
                    glob_regex(&text, position, cased).map(ValueMatcher::Pattern)
                }
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let path = if field.contains("[*]") {
            let pattern = format!("^{}$", regex::escape(&field).replace(r"\[\*\]", r"\[\d+\]"));
            FieldPath::Indexed(Regex::new(&pattern).map_err(|e| e.to_string())?)
        } else {
            FieldPath::Exact(field.clone())
        };

        Ok(Self {
            field,
            path,
            values,
            all,
        })
    }

    fn lookup<'a>(&self, event: &'a Event) -> Vec<&'a Value> {
        match &self.path {
            FieldPath::Exact(name) => event.get(name).into_iter().collect(),
            FieldPath::Indexed(re) => event
                .iter()
                .filter(|(key, _)| re.is_match(key))
                .map(|(_, value)| value)
                .collect(),
        }
    }

    /// Whether the field satisfies this matcher
    pub fn matches(&self, event: &Event) -> bool {
        let found = self.lookup(event);
        if self.all {
            self.values.iter().all(|m| m.matches_field(&found))
        } else {
            self.values.iter().any(|m| m.matches_field(&found))
        }
    }
}

fn scalar_text(value: &Yaml) -> Option<String> {
    match value {
        Yaml::String(s) => Some(s.clone()),
        Yaml::Number(n) => Some(n.to_string()),
        Yaml::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn value_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Compile a wildcard value. `*` and `?` are wildcards; `\*`, `\?` and
/// `\\` are literals.
fn glob_regex(text: &str, position: Position, cased: bool) -> std::result::Result<Regex, String> {
    let mut pattern = String::from("^");
    if matches!(position, Position::Contains | Position::EndsWith) {
        pattern.push_str(".*");
    }

    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.peek() {
                Some(&next @ ('*' | '?' | '\\')) => {
                    pattern.push_str(&regex::escape(&next.to_string()));
                    chars.next();
                }
                _ => pattern.push_str(r"\\"),
            },
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            other => pattern.push_str(&regex::escape(&other.to_string())),
        }
    }

    if matches!(position, Position::Contains | Position::StartsWith) {
        pattern.push_str(".*");
    }
    pattern.push('$');

    RegexBuilder::new(&pattern)
        .case_insensitive(!cased)
        .dot_matches_new_line(true)
        .build()
        .map_err(|e| e.to_string())
}

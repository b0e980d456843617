// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Rule loading and evaluation over task results

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_yaml::Value as Yaml;
use tracing::{debug, info, warn};

use super::flatten::{flatten, Event};
use super::rule::Rule;
use crate::engine::TaskResult;
use crate::error::Result;

/// Outcome of one rule against one event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleResult {
    pub rule_id: String,
    pub title: String,
    pub level: String,
    pub matched: bool,
    /// Outcome of every named search
    pub search_results: BTreeMap<String, bool>,
    /// Outcome of every condition, in rule order
    pub condition_results: Vec<bool>,
}

/// Kind of a YAML document found in the rules directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Rule,
    Config,
    Unknown,
}

impl DocumentKind {
    /// Classify a document by its top-level keys
    pub fn of(doc: &Yaml) -> Self {
        let Some(map) = doc.as_mapping() else {
            return DocumentKind::Unknown;
        };
        let has = |key: &str| map.contains_key(key);

        if has("detection") {
            DocumentKind::Rule
        } else if has("fieldmappings") || has("backends") || has("logsources") {
            DocumentKind::Config
        } else {
            DocumentKind::Unknown
        }
    }
}

/// A loaded set of rules
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Load every `.yml`/`.yaml` file under `dir`, recursively.
    ///
    /// A missing path or a path that is not a directory gives an empty set.
    /// Files that fail to read or parse are logged and skipped.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();

        let meta = match fs::metadata(dir) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(rules_dir = %dir.display(), "no rules directory found; detection disabled");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        if !meta.is_dir() {
            warn!(rules_dir = %dir.display(), "rules path is not a directory; detection disabled");
            return Ok(Self::default());
        }

        let mut files = Vec::new();
        collect_yaml_files(dir, &mut files)?;
        files.sort();

        let mut rules = Vec::new();
        for path in files {
            rules.extend(load_file(&path));
        }

        if rules.is_empty() {
            info!(rules_dir = %dir.display(), "no rules loaded; detection disabled");
        } else {
            info!(rule_count = rules.len(), "detection rules loaded");
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Serialize, flatten and evaluate a task result. Matches are logged at
    /// warn level.
    pub fn evaluate(&self, result: &TaskResult) -> Result<Vec<RuleResult>> {
        if self.rules.is_empty() {
            debug!("no detection rules, skipping evaluation");
            return Ok(Vec::new());
        }

        let event = flatten(&result.to_value()?);
        let results = self.evaluate_event(&event);

        for r in results.iter().filter(|r| r.matched) {
            warn!(
                rule_id = %r.rule_id,
                rule_title = %r.title,
                level = %r.level,
                url = %result.url,
                "detection rule matched"
            );
        }
        Ok(results)
    }

    /// Evaluate every rule against a flattened event
    pub fn evaluate_event(&self, event: &Event) -> Vec<RuleResult> {
        self.rules
            .iter()
            .map(|rule| {
                let search_results = rule.detection.search_results(event);
                let condition_results: Vec<bool> = rule
                    .detection
                    .conditions
                    .iter()
                    .map(|c| c.evaluate(&search_results))
                    .collect();
                let matched = condition_results.iter().any(|m| *m);

                debug!(
                    rule_id = %rule.id,
                    matched,
                    ?search_results,
                    ?condition_results,
                    "rule evaluated"
                );

                RuleResult {
                    rule_id: rule.id.clone(),
                    title: rule.title.clone(),
                    level: rule.level.clone(),
                    matched,
                    search_results,
                    condition_results,
                }
            })
            .collect()
    }
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("yml") || e.eq_ignore_ascii_case("yaml"))
        .unwrap_or(false)
}

fn collect_yaml_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        // Symlinked directories are not followed
        if entry.file_type()?.is_dir() {
            collect_yaml_files(&path, out)?;
        } else if is_yaml(&path) {
            out.push(path);
        }
    }
    Ok(())
}

/// Rules from one file; a file may hold several YAML documents
fn load_file(path: &Path) -> Vec<Rule> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            warn!(file = %path.display(), "failed to read rule file: {}", e);
            return Vec::new();
        }
    };

    let mut rules = Vec::new();
    for document in serde_yaml::Deserializer::from_str(&contents) {
        let doc = match Yaml::deserialize(document) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(file = %path.display(), "failed to parse rule file: {}", e);
                break;
            }
        };

        match DocumentKind::of(&doc) {
            DocumentKind::Rule => match Rule::from_document(doc, path) {
                Ok(rule) => {
                    debug!(id = %rule.id, title = %rule.title, file = %path.display(), "loaded rule");
                    rules.push(rule);
                }
                Err(e) => warn!(file = %path.display(), "failed to parse rule: {}", e),
            },
            DocumentKind::Config => {
                debug!(file = %path.display(), "ignoring rule config document")
            }
            DocumentKind::Unknown => {
                debug!(file = %path.display(), "unknown rule document type, ignoring")
            }
        }
    }
    rules
}

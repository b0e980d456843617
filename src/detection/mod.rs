// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Detection rules over task results
//!
//! Results are serialized to JSON and flattened into dotted paths such as
//! `result.head.title`, then matched by YAML rules in the Sigma style.

mod condition;
mod evaluator;
mod flatten;
mod rule;

pub use condition::{wildcard_match, Condition, Selector};
pub use evaluator::{DocumentKind, RuleResult, RuleSet};
pub use flatten::{flatten, Event};
pub use rule::{Comparison, Detection, FieldMatcher, LogSource, Rule, Search, ValueMatcher};

// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Form model, input classification and ranking
//!
//! Forms are discovered from a single page snapshot (see
//! [`crate::browser::scripts::FORM_SNAPSHOT_SCRIPT`]). Each form and input
//! keeps a [`LiveHandle`] into the live DOM for later interaction; handles
//! never appear in serialized output.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::network::Visit;

/// Input type that never counts toward scoring or labeling
pub const INPUT_HIDDEN: &str = "hidden";

/// Opaque locator into the live page (an absolute XPath)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct LiveHandle(String);

impl LiveHandle {
    pub(crate) fn new(xpath: impl Into<String>) -> Self {
        Self(xpath.into())
    }

    /// XPath expression for this handle
    pub fn xpath(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// What kind of value an input expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputKind {
    Unknown,
    Email,
    Phone,
    Password,
    Name,
    FirstName,
    MiddleName,
    LastName,
}

impl InputKind {
    /// Classify a single hint string (label, placeholder, id or class)
    pub fn from_hint(hint: &str) -> InputKind {
        let s = hint.to_lowercase();

        if s.contains("email") {
            InputKind::Email
        } else if s.contains("password") {
            InputKind::Password
        } else if s.contains("phone") {
            InputKind::Phone
        } else if s.contains("first") && s.contains("name") {
            InputKind::FirstName
        } else if s.contains("middle") && s.contains("name") {
            InputKind::MiddleName
        } else if s.contains("last") && s.contains("name") {
            InputKind::LastName
        } else if s.contains("name") {
            InputKind::Name
        } else {
            InputKind::Unknown
        }
    }
}

/// A form field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Input {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub class: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub placeholder: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub input_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
    #[serde(skip)]
    pub(crate) handle: LiveHandle,
}

impl Input {
    /// Check if this is a hidden input
    pub fn is_hidden(&self) -> bool {
        self.input_type == INPUT_HIDDEN
    }

    /// Guess the expected value from label, placeholder, id and class, in
    /// that order. The first hint that yields a kind wins.
    pub fn classify(&self) -> InputKind {
        [&self.label, &self.placeholder, &self.id, &self.class]
            .into_iter()
            .map(|hint| InputKind::from_hint(hint))
            .find(|kind| *kind != InputKind::Unknown)
            .unwrap_or(InputKind::Unknown)
    }

    /// Kind used when filling. Native `email`/`password` (and `tel`) inputs
    /// classify directly; `text` inputs go through [`Input::classify`];
    /// anything else is left alone.
    pub fn fill_kind(&self) -> InputKind {
        match self.input_type.as_str() {
            "email" => InputKind::Email,
            "password" => InputKind::Password,
            "tel" => InputKind::Phone,
            "text" => self.classify(),
            _ => InputKind::Unknown,
        }
    }

    /// Live locator of this input
    pub fn handle(&self) -> &LiveHandle {
        &self.handle
    }
}

impl fmt::Display for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.id.is_empty() {
            write!(f, "{}", self.id)
        } else if !self.class.is_empty() {
            write!(f, "{}", self.class)
        } else {
            write!(f, "{}", self.handle.xpath())
        }
    }
}

/// An HTML form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Form {
    pub action: String,
    pub method: String,
    pub class: String,
    pub id: String,
    #[serde(rename = "fields", default)]
    pub inputs: Vec<Input>,
    #[serde(skip)]
    pub(crate) handle: LiveHandle,
}

impl Form {
    /// Rank score for submission order.
    ///
    /// Password +50, email +20, the first three text inputs +10 and any
    /// further text input -5, every other visible input +5. Forms with two
    /// to four visible inputs get +15. Hidden inputs are ignored.
    pub fn score(&self) -> i32 {
        let mut score = 0;
        let mut visible = 0;
        let mut text = 0;

        for input in self.inputs.iter().filter(|i| !i.is_hidden()) {
            match input.input_type.as_str() {
                "password" => score += 50,
                "email" => score += 20,
                "text" => {
                    text += 1;
                    score += if text <= 3 { 10 } else { -5 };
                }
                _ => score += 5,
            }
            visible += 1;
        }

        if (2..=4).contains(&visible) {
            score += 15;
        }

        score
    }

    /// True if every input is hidden (vacuously true for no inputs)
    pub fn all_inputs_hidden(&self) -> bool {
        self.inputs.iter().all(Input::is_hidden)
    }

    /// First input that is not hidden
    pub fn first_visible_input(&self) -> Option<&Input> {
        self.inputs.iter().find(|i| !i.is_hidden())
    }

    /// Choose the element to submit through.
    ///
    /// The last filled input wins. Without one, the first visible input is
    /// used. A form with no inputs, or only hidden ones, has no trigger and
    /// is skipped.
    pub fn submit_trigger<'a>(&'a self, last_filled: Option<&'a LiveHandle>) -> Option<&'a LiveHandle> {
        last_filled
            .filter(|h| !h.is_empty())
            .or_else(|| self.first_visible_input().map(Input::handle))
    }

    /// Live locator of this form
    pub fn handle(&self) -> &LiveHandle {
        &self.handle
    }
}

impl fmt::Display for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.id.is_empty() {
            write!(f, "{}", self.id)
        } else if !self.class.is_empty() {
            write!(f, "{}", self.class)
        } else {
            write!(f, "{}", self.handle.xpath())
        }
    }
}

/// Sort forms by descending score; equal scores keep document order
pub fn rank_forms(forms: &[Form]) -> Vec<&Form> {
    let mut ranked: Vec<&Form> = forms.iter().collect();
    ranked.sort_by_key(|f| std::cmp::Reverse(f.score()));
    ranked
}

/// The visit produced by submitting one form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSubmission {
    pub method: String,
    #[serde(flatten)]
    pub visit: Visit,
}

/// Raw page snapshot returned by the form discovery script
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FormSnapshot {
    #[serde(default)]
    pub forms: Vec<RawForm>,
    #[serde(default)]
    pub labels: Vec<RawLabel>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawForm {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub xpath: String,
    #[serde(default)]
    pub inputs: Vec<RawInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawInput {
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub placeholder: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub input_type: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub xpath: String,
    /// Text of the nearest enclosing `label`, if any
    #[serde(default)]
    pub enclosing_label: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawLabel {
    #[serde(rename = "for", default)]
    pub for_id: String,
    #[serde(default)]
    pub text: String,
}

/// Labels indexed by their `for` attribute
#[derive(Debug, Default)]
pub struct LabelIndex {
    by_for: HashMap<String, String>,
}

impl LabelIndex {
    pub fn new(labels: &[RawLabel]) -> Self {
        let mut by_for = HashMap::with_capacity(labels.len());
        for label in labels.iter().filter(|l| !l.for_id.is_empty()) {
            by_for
                .entry(label.for_id.clone())
                .or_insert_with(|| label.text.clone());
        }
        Self { by_for }
    }

    /// Label text for an input: a `label[for=id]` anywhere in the document
    /// first, then the enclosing label. Hidden inputs are never labeled.
    pub fn resolve(&self, input: &RawInput) -> String {
        if input.input_type == INPUT_HIDDEN {
            return String::new();
        }

        let text = (!input.id.is_empty())
            .then(|| self.by_for.get(&input.id))
            .flatten()
            .or(input.enclosing_label.as_ref());

        text.map(|t| t.trim().to_string()).unwrap_or_default()
    }
}

impl FormSnapshot {
    /// Build forms, resolving labels and normalizing method and placeholder
    pub fn into_forms(self) -> Vec<Form> {
        let labels = LabelIndex::new(&self.labels);

        self.forms
            .into_iter()
            .map(|raw| Form {
                action: raw.action,
                method: raw.method.to_uppercase(),
                class: raw.class,
                id: raw.id,
                inputs: raw
                    .inputs
                    .into_iter()
                    .map(|input| Input {
                        label: labels.resolve(&input),
                        placeholder: input.placeholder.trim().to_string(),
                        class: input.class,
                        id: input.id,
                        name: input.name,
                        input_type: input.input_type,
                        value: input.value,
                        handle: LiveHandle::new(input.xpath),
                    })
                    .collect(),
                handle: LiveHandle::new(raw.xpath),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(input_type: &str) -> Input {
        Input {
            input_type: input_type.to_string(),
            ..Default::default()
        }
    }

    fn form(types: &[&str]) -> Form {
        Form {
            inputs: types.iter().map(|t| input(t)).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_login_form_score() {
        assert_eq!(form(&["email", "password"]).score(), 85);
    }

    #[test]
    fn test_many_text_inputs_score() {
        assert_eq!(form(&["text", "text", "text", "text", "text"]).score(), 20);
    }

    #[test]
    fn test_hidden_inputs_do_not_count() {
        assert_eq!(form(&["hidden", "password"]).score(), 50);
        assert_eq!(form(&["hidden", "hidden"]).score(), 0);
        assert_eq!(form(&["submit", "checkbox", "hidden"]).score(), 25);
    }

    #[test]
    fn test_rank_is_stable() {
        let mut search = form(&["text"]);
        search.id = "search".into();
        let mut login = form(&["email", "password", "hidden"]);
        login.id = "login".into();
        let mut other = form(&["text"]);
        other.id = "other".into();

        let forms = vec![search, login, other];
        let ranked: Vec<&str> = rank_forms(&forms).iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ranked, vec!["login", "search", "other"]);
    }

    #[test]
    fn test_classification_order() {
        let mut i = input("text");
        i.label = "Email or phone".into();
        assert_eq!(i.classify(), InputKind::Email);

        i.label = "Your first name".into();
        assert_eq!(i.classify(), InputKind::FirstName);

        i.label = "Middle Name".into();
        assert_eq!(i.classify(), InputKind::MiddleName);

        i.label = "LAST_NAME".into();
        assert_eq!(i.classify(), InputKind::LastName);

        i.label = "Username".into();
        assert_eq!(i.classify(), InputKind::Name);

        i.label = "Mobile phone".into();
        assert_eq!(i.classify(), InputKind::Phone);
    }

    #[test]
    fn test_classification_falls_through_hints() {
        let i = Input {
            input_type: "text".into(),
            label: "Enter here".into(),
            placeholder: "".into(),
            id: "user-password".into(),
            class: "email".into(),
            ..Default::default()
        };
        assert_eq!(i.classify(), InputKind::Password);

        let unknown = Input {
            input_type: "text".into(),
            label: "Search".into(),
            ..Default::default()
        };
        assert_eq!(unknown.classify(), InputKind::Unknown);
    }

    #[test]
    fn test_fill_kind_uses_native_type() {
        let mut i = input("email");
        i.label = "Password".into();
        assert_eq!(i.fill_kind(), InputKind::Email);
        assert_eq!(input("password").fill_kind(), InputKind::Password);
        assert_eq!(input("checkbox").fill_kind(), InputKind::Unknown);

        let mut hidden = input("hidden");
        hidden.name = "email".into();
        hidden.id = "email".into();
        assert_eq!(hidden.fill_kind(), InputKind::Unknown);
    }

    #[test]
    fn test_label_for_elsewhere_in_document() {
        let snapshot = FormSnapshot {
            forms: vec![RawForm {
                method: "post".into(),
                inputs: vec![RawInput {
                    id: "x".into(),
                    input_type: "text".into(),
                    placeholder: "  you@example.com ".into(),
                    enclosing_label: Some("Wrapper".into()),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            labels: vec![RawLabel {
                for_id: "x".into(),
                text: "  Email address \n".into(),
            }],
        };

        let forms = snapshot.into_forms();
        assert_eq!(forms[0].method, "POST");
        assert_eq!(forms[0].inputs[0].label, "Email address");
        assert_eq!(forms[0].inputs[0].placeholder, "you@example.com");
    }

    #[test]
    fn test_label_enclosing_fallback_and_hidden() {
        let index = LabelIndex::new(&[RawLabel {
            for_id: "other".into(),
            text: "Other".into(),
        }]);

        let nested = RawInput {
            id: "y".into(),
            input_type: "text".into(),
            enclosing_label: Some(" Search: ".into()),
            ..Default::default()
        };
        assert_eq!(index.resolve(&nested), "Search:");

        let hidden = RawInput {
            id: "other".into(),
            input_type: "hidden".into(),
            ..Default::default()
        };
        assert_eq!(index.resolve(&hidden), "");

        let no_id = RawInput {
            input_type: "text".into(),
            ..Default::default()
        };
        assert_eq!(index.resolve(&no_id), "");
    }

    #[test]
    fn test_submit_trigger_policy() {
        let mut f = form(&["hidden", "checkbox", "text"]);
        f.inputs[1].handle = LiveHandle::new("/html/body/form/input[2]");

        let filled = LiveHandle::new("/html/body/form/input[3]");
        assert_eq!(f.submit_trigger(Some(&filled)), Some(&filled));

        // nothing filled: first visible input
        assert_eq!(
            f.submit_trigger(None).map(LiveHandle::xpath),
            Some("/html/body/form/input[2]")
        );

        // only hidden inputs: skipped
        let hidden = form(&["hidden", "hidden"]);
        assert!(hidden.all_inputs_hidden());
        assert_eq!(hidden.submit_trigger(None), None);

        // no inputs at all: skipped
        assert_eq!(Form::default().submit_trigger(None), None);
    }

    #[test]
    fn test_handles_are_not_serialized() {
        let mut f = form(&["email"]);
        f.handle = LiveHandle::new("/html/body/form");
        f.inputs[0].handle = LiveHandle::new("/html/body/form/input");

        let json = serde_json::to_string(&f).unwrap();
        assert!(!json.contains("/html/body"));
        assert!(json.contains("\"fields\""));
        assert!(json.contains("\"type\":\"email\""));
    }

    #[test]
    fn test_display_prefers_id_then_class() {
        let mut f = form(&[]);
        f.handle = LiveHandle::new("/html/body/form[2]");
        assert_eq!(f.to_string(), "/html/body/form[2]");
        f.class = "block-form".into();
        assert_eq!(f.to_string(), "block-form");
        f.id = "login-form".into();
        assert_eq!(f.to_string(), "login-form");
    }
}

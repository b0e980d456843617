// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Tasks and their results

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value;
use tokio::sync::oneshot;
use uuid::Uuid;

use super::analyze::AnalyzeResult;
use super::collect::CollectResult;
use super::screenshot::ScreenshotResult;
use crate::browser::{dimensions, user_agent, DEFAULT_VIEWPORT};
use crate::error::{Error, Result};

/// Free-form task parameters
pub type Params = HashMap<String, Value>;

/// Per-query wait budget in milliseconds
pub const PARAM_WAIT: &str = "wait";
/// Maximum number of form submissions
pub const PARAM_MAX_FORM_SUBMITS: &str = "max-form-submits";
/// Run the clipboard probe
pub const PARAM_CLIPBOARD: &str = "clipboard";
/// Run form interactions
pub const PARAM_FORMS: &str = "forms";
/// Fetch and hash the favicon
pub const PARAM_FAVICON_HASH: &str = "favicon-hash";

/// Work a task can ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Analyze,
    Collect,
    Screenshot,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Analyze => "analyze",
            Action::Collect => "collect",
            Action::Screenshot => "screenshot",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "analyze" => Ok(Action::Analyze),
            "collect" => Ok(Action::Collect),
            "screenshot" => Ok(Action::Screenshot),
            other => Err(Error::UnknownAction(other.to_string())),
        }
    }
}

/// Where a task's result goes
#[derive(Debug, Default)]
pub enum Delivery {
    /// The engine's shared results stream
    #[default]
    Shared,
    /// A specific caller
    Reply(oneshot::Sender<TaskResult>),
}

/// An analysis request
#[derive(Debug)]
pub struct Task {
    id: Uuid,
    action: String,
    url: String,
    params: Params,
    width: u32,
    height: u32,
    user_agent: String,
    received: DateTime<Utc>,
    started: Instant,
    delivery: Delivery,
}

impl Task {
    /// Create a task. URLs without an `http://` or `https://` scheme get
    /// `http://` prepended.
    pub fn new(action: impl Into<String>, input: &str) -> Self {
        let url = if input.starts_with("http://") || input.starts_with("https://") {
            input.to_string()
        } else {
            format!("http://{}", input)
        };

        Self {
            id: Uuid::new_v4(),
            action: action.into(),
            url,
            params: Params::new(),
            width: DEFAULT_VIEWPORT.0,
            height: DEFAULT_VIEWPORT.1,
            user_agent: String::new(),
            received: Utc::now(),
            started: Instant::now(),
            delivery: Delivery::Shared,
        }
    }

    /// Merge parameters
    pub fn with_params(mut self, params: Params) -> Self {
        self.params.extend(params);
        self
    }

    /// Set one parameter
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Viewport from a device profile (`desktop`/`mobile` x `small`/`medium`/`large`)
    pub fn device(mut self, device_type: &str, device_size: &str) -> Self {
        (self.width, self.height) = dimensions(device_type, device_size);
        self
    }

    /// Explicit viewport
    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// User agent from a device type and alias
    pub fn user_agent_alias(mut self, device_type: &str, alias: &str) -> Self {
        self.user_agent = user_agent(device_type, alias).unwrap_or_default().to_string();
        self
    }

    /// Explicit user agent string
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Deliver the result to the returned receiver instead of the shared stream
    pub fn with_reply(mut self) -> (Self, oneshot::Receiver<TaskResult>) {
        let (tx, rx) = oneshot::channel();
        self.delivery = Delivery::Reply(tx);
        (self, rx)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Viewport as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// User agent; empty means the browser default
    pub fn user_agent_str(&self) -> &str {
        &self.user_agent
    }

    /// When the task was created
    pub fn received(&self) -> DateTime<Utc> {
        self.received
    }

    /// Time since the task was created
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Whether the result goes to a private receiver
    pub fn has_reply(&self) -> bool {
        matches!(self.delivery, Delivery::Reply(_))
    }

    /// Integer parameter; missing or non-integer values give `default`
    pub fn int_param(&self, key: &str, default: i64) -> i64 {
        self.params.get(key).and_then(Value::as_i64).unwrap_or(default)
    }

    /// Boolean parameter; missing or non-boolean values give `default`
    pub fn bool_param(&self, key: &str, default: bool) -> bool {
        self.params.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    pub(crate) fn take_delivery(&mut self) -> Delivery {
        std::mem::take(&mut self.delivery)
    }
}

/// Action-specific result payload
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Analyze(Box<AnalyzeResult>),
    Collect(Box<CollectResult>),
    Screenshot(ScreenshotResult),
}

/// Outcome of one task
#[derive(Debug, Serialize)]
pub struct TaskResult {
    pub action: String,
    /// Time from task creation to completion, serialized as nanoseconds
    #[serde(serialize_with = "serialize_nanos")]
    pub elapsed: Duration,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_error"
    )]
    pub error: Option<Error>,
    pub url: String,
    pub result: Option<Payload>,
}

impl TaskResult {
    /// Successful result
    pub fn success(task: &Task, payload: Payload) -> Self {
        Self {
            action: task.action.clone(),
            elapsed: task.elapsed(),
            error: None,
            url: task.url.clone(),
            result: Some(payload),
        }
    }

    /// Failed result
    pub fn failure(task: &Task, error: Error) -> Self {
        Self {
            action: task.action.clone(),
            elapsed: task.elapsed(),
            error: Some(error),
            url: task.url.clone(),
            result: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Serialize as a single JSON line
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serialize as indented JSON
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Serialize into a JSON tree
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

fn serialize_nanos<S: Serializer>(elapsed: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX))
}

fn serialize_error<S: Serializer>(error: &Option<Error>, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    match error {
        Some(e) => serializer.serialize_str(&e.to_string()),
        None => serializer.serialize_none(),
    }
}

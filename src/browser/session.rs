// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Browser session provider
//!
//! Owns one Chrome connection, either launched locally or attached to a
//! remote DevTools endpoint, and hands out isolated tabs. Every tab lives in
//! its own browser context so cookies, storage and permissions never leak
//! between tasks.

use std::sync::atomic::{AtomicU64, Ordering};

use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::{Browser, BrowserConfig, Handler, Page};
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::{SessionConfig, SessionMode, DEFAULT_VIEWPORT};
use crate::error::{Error, Result};

/// Session counters
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionStats {
    pub tabs_opened: u64,
    pub tabs_closed: u64,
}

/// A running browser connection
pub struct BrowserSession {
    config: SessionConfig,
    browser: RwLock<Option<Browser>>,
    handler: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
    tabs_opened: AtomicU64,
    tabs_closed: AtomicU64,
}

/// A page inside its own browser context
pub struct Tab {
    page: Page,
    context_id: Option<BrowserContextId>,
}

impl Tab {
    /// Get reference to the page
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Browser context the page was created in
    pub fn context_id(&self) -> Option<&BrowserContextId> {
        self.context_id.as_ref()
    }
}

impl std::ops::Deref for Tab {
    type Target = Page;

    fn deref(&self) -> &Self::Target {
        &self.page
    }
}

impl BrowserSession {
    /// Launch or connect according to `config`
    pub async fn start(config: SessionConfig) -> Result<Self> {
        let (browser, handler) = match &config.mode {
            SessionMode::Local { headless } => Self::launch(&config, *headless).await?,
            SessionMode::Remote { .. } => Self::connect(&config).await?,
        };

        let handler = spawn_handler_task(handler);
        info!(local = config.is_local(), "browser session started");

        Ok(Self {
            config,
            browser: RwLock::new(Some(browser)),
            handler: Mutex::new(Some(handler)),
            cancel: CancellationToken::new(),
            tabs_opened: AtomicU64::new(0),
            tabs_closed: AtomicU64::new(0),
        })
    }

    async fn launch(config: &SessionConfig, headless: bool) -> Result<(Browser, Handler)> {
        let (width, height) = DEFAULT_VIEWPORT;
        let mut builder = BrowserConfig::builder()
            .window_size(width, height)
            .launch_timeout(config.launch_timeout)
            .request_timeout(config.request_timeout);

        if !headless {
            builder = builder.with_head();
        }
        if config.no_sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(path) = &config.executable {
            builder = builder.chrome_executable(path);
        }

        let browser_config = builder.build().map_err(Error::SessionStart)?;
        Browser::launch(browser_config)
            .await
            .map_err(|e| Error::SessionStart(e.to_string()))
    }

    async fn connect(config: &SessionConfig) -> Result<(Browser, Handler)> {
        let version_url = config
            .remote_url()
            .ok_or_else(|| Error::SessionStart("no remote endpoint configured".into()))?;

        let ws_url = discover_websocket_url(&version_url)
            .await
            .map_err(|e| Error::SessionStart(format!("{}: {}", version_url, e)))?;
        debug!(%ws_url, "discovered DevTools endpoint");

        let connect = Browser::connect(ws_url);
        match tokio::time::timeout(config.launch_timeout, connect).await {
            Ok(res) => res.map_err(|e| Error::SessionStart(e.to_string())),
            Err(_) => Err(Error::SessionStart(format!(
                "connecting to {} timed out",
                version_url
            ))),
        }
    }

    /// Session configuration
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Child token, cancelled when the session closes
    pub fn child_token(&self) -> CancellationToken {
        self.cancel.child_token()
    }

    /// Whether the session has been closed
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Open a blank tab in a fresh browser context
    pub async fn new_tab(&self) -> Result<Tab> {
        let guard = self.browser.read().await;
        let browser = guard.as_ref().ok_or_else(|| Error::other("browser session closed"))?;

        let context_id = browser
            .execute(CreateBrowserContextParams::default())
            .await?
            .result
            .browser_context_id;

        let params = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id.clone())
            .build()
            .map_err(Error::other)?;

        let page = match browser.new_page(params).await {
            Ok(page) => page,
            Err(e) => {
                let _ = browser
                    .execute(DisposeBrowserContextParams::new(context_id))
                    .await;
                return Err(e.into());
            }
        };

        self.tabs_opened.fetch_add(1, Ordering::Relaxed);
        Ok(Tab {
            page,
            context_id: Some(context_id),
        })
    }

    /// Close a tab and dispose of its browser context
    pub async fn close_tab(&self, tab: Tab) {
        let Tab { page, context_id } = tab;

        if let Err(e) = page.close().await {
            debug!("closing tab failed: {}", e);
        }

        if let Some(id) = context_id {
            if let Some(browser) = self.browser.read().await.as_ref() {
                if let Err(e) = browser.execute(DisposeBrowserContextParams::new(id)).await {
                    debug!("disposing browser context failed: {}", e);
                }
            }
        }

        self.tabs_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Session counters
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            tabs_opened: self.tabs_opened.load(Ordering::Relaxed),
            tabs_closed: self.tabs_closed.load(Ordering::Relaxed),
        }
    }

    /// Cancel outstanding work and release the browser.
    ///
    /// A local browser process is closed; a remote one is only disconnected.
    pub async fn close(&self) {
        self.cancel.cancel();

        if let Some(mut browser) = self.browser.write().await.take() {
            if self.config.is_local() {
                if let Err(e) = browser.close().await {
                    warn!("closing browser failed: {}", e);
                }
                if let Err(e) = browser.wait().await {
                    debug!("waiting for browser exit failed: {}", e);
                }
            }
        }

        if let Some(handler) = self.handler.lock().take() {
            handler.abort();
        }

        info!(
            tabs_opened = self.tabs_opened.load(Ordering::Relaxed),
            "browser session closed"
        );
    }
}

/// Resolve `webSocketDebuggerUrl` from a `/json/version` endpoint
pub async fn discover_websocket_url(version_url: &str) -> Result<String> {
    let json: serde_json::Value = reqwest::get(version_url).await?.json().await?;

    json.get("webSocketDebuggerUrl")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| Error::other("no webSocketDebuggerUrl in response"))
}

fn spawn_handler_task(mut handler: Handler) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                debug!("browser handler event error: {}", e);
            }
        }
        debug!("browser handler finished");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_discover_websocket_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/version"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Browser": "HeadlessChrome/120.0.0.0",
                "webSocketDebuggerUrl": "ws://127.0.0.1:9222/devtools/browser/abc"
            })))
            .mount(&server)
            .await;

        let url = format!("{}/json/version", server.uri());
        assert_eq!(
            discover_websocket_url(&url).await.unwrap(),
            "ws://127.0.0.1:9222/devtools/browser/abc"
        );
    }

    #[tokio::test]
    async fn test_discover_without_debugger_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/version"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let url = format!("{}/json/version", server.uri());
        assert!(discover_websocket_url(&url).await.is_err());
    }

    #[tokio::test]
    async fn test_remote_start_failure_is_session_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let address = server.address();
        let config = SessionConfig::new().remote(address.ip().to_string(), address.port());

        match BrowserSession::start(config).await {
            Err(Error::SessionStart(_)) => {}
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("session should not start"),
        }
    }
}

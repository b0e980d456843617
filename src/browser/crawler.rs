// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Navigation capture for one tab
//!
//! The crawler installs one long-lived network listener on its page and
//! routes events into whichever [`Capture`] is active. Every navigation,
//! including ones triggered by form submission, goes through
//! [`Crawler::capture`] so its traffic is recorded the same way.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventLoadingFinished, EventRequestWillBeSent, EventResponseReceived,
    GetResponseBodyParams, RequestId, Response, SecurityDetails,
};
use chromiumoxide::Page;
use futures::stream::{self, Stream, StreamExt};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::config::DEFAULT_VIEWPORT;
use crate::error::{Error, ErrorContext, Result};
use crate::network::{
    BodySource, Capture, CertificateInfo, Headers, LoadingFinished, NetworkEvent,
    RedirectResponse, RequestSent, ResponseReceived, Visit,
};

/// Crawler configuration
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Viewport width
    pub width: u32,
    /// Viewport height
    pub height: u32,
    /// User agent override (`None` keeps the browser default)
    pub user_agent: Option<String>,
    /// Pause after the page action so queued network events are routed
    pub event_flush: Duration,
    /// Upper bound on waiting for outstanding body fetches
    pub body_settle: Duration,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_VIEWPORT.0,
            height: DEFAULT_VIEWPORT.1,
            user_agent: None,
            event_flush: Duration::from_millis(100),
            body_settle: Duration::from_secs(5),
        }
    }
}

impl CrawlerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set viewport
    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set user agent; an empty string keeps the browser default
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        let ua = user_agent.into();
        self.user_agent = (!ua.is_empty()).then_some(ua);
        self
    }

    /// Set body fetch settle timeout
    pub fn body_settle(mut self, settle: Duration) -> Self {
        self.body_settle = settle;
        self
    }

    /// Set event flush pause
    pub fn event_flush(mut self, flush: Duration) -> Self {
        self.event_flush = flush;
        self
    }
}

/// Where the page ended up after a captured action
#[derive(Debug, Clone, Default)]
pub struct PageState {
    pub location: String,
    pub body: String,
}

type EventStream = Pin<Box<dyn Stream<Item = NetworkEvent> + Send>>;

/// Captures navigations of one page
pub struct Crawler {
    page: Page,
    config: CrawlerConfig,
    current: Arc<Mutex<Option<Arc<Capture>>>>,
    listener: Option<JoinHandle<()>>,
    history: Vec<Visit>,
}

impl Crawler {
    /// Create a crawler for a page
    pub fn new(page: Page, config: CrawlerConfig) -> Self {
        Self {
            page,
            config,
            current: Arc::new(Mutex::new(None)),
            listener: None,
            history: Vec::new(),
        }
    }

    /// The page this crawler drives
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Crawler configuration
    pub fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    /// Install the network listener. Calling this again is a no-op.
    pub async fn setup_listeners(&mut self) -> Result<()> {
        if self.listener.is_some() {
            return Ok(());
        }

        let requests: EventStream = self
            .page
            .event_listener::<EventRequestWillBeSent>()
            .await?
            .map(|ev| NetworkEvent::Request(request_sent(&ev)))
            .boxed();
        let responses: EventStream = self
            .page
            .event_listener::<EventResponseReceived>()
            .await?
            .map(|ev| NetworkEvent::Response(response_received(&ev)))
            .boxed();
        let finished: EventStream = self
            .page
            .event_listener::<EventLoadingFinished>()
            .await?
            .map(|ev| {
                NetworkEvent::Finished(LoadingFinished {
                    request_id: ev.request_id.inner().clone(),
                })
            })
            .boxed();

        let mut events = stream::select_all(vec![requests, responses, finished]);
        let current = Arc::clone(&self.current);
        let bodies: Arc<dyn BodySource> = Arc::new(PageBodies {
            page: self.page.clone(),
        });

        self.listener = Some(tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let capture = current.lock().clone();
                match capture {
                    Some(capture) => capture.handle(event, &bodies),
                    None => trace!(request_id = event.request_id(), "network event outside capture"),
                }
            }
            debug!("network listener finished");
        }));

        Ok(())
    }

    /// Navigate to `url` and capture the visit
    pub async fn visit(&mut self, url: &str) -> Result<Visit> {
        let width = i64::from(self.config.width);
        let height = i64::from(self.config.height);
        let user_agent = self.config.user_agent.clone();
        let target = url.to_string();

        let visit = self
            .capture(url, move |page| async move {
                page.execute(EnableParams::default()).await?;
                page.execute(SetDeviceMetricsOverrideParams::new(width, height, 1.0, false))
                    .await?;
                if let Some(ua) = user_agent {
                    page.set_user_agent(ua).await?;
                }

                page.goto(target.as_str()).await.with_url(&target)?;
                let location = page.url().await?.unwrap_or_default();
                let body = page.content().await?;

                Ok(Some(PageState { location, body }))
            })
            .await?;

        visit.ok_or(Error::NoVisit)
    }

    /// Run `action` while capturing network traffic.
    ///
    /// The action returns the resulting page state, or `None` when it did
    /// nothing worth recording, in which case the capture is discarded.
    /// A finished visit is appended to the history and returned.
    pub async fn capture<F, Fut>(&mut self, requested_url: &str, action: F) -> Result<Option<Visit>>
    where
        F: FnOnce(Page) -> Fut,
        Fut: Future<Output = Result<Option<PageState>>>,
    {
        self.setup_listeners().await?;

        let capture = Capture::new(requested_url);
        let active = ActiveCapture::claim(&self.current, &capture)?;

        let outcome = action(self.page.clone()).await;

        tokio::time::sleep(self.config.event_flush).await;
        drop(active);

        match outcome {
            Ok(Some(state)) => {
                let visit = capture
                    .finish(self.config.body_settle, state.location, state.body)
                    .await;
                debug!(
                    url = %visit.requested_url,
                    location = %visit.location,
                    assets = visit.assets.len(),
                    redirects = visit.redirect_locations.len(),
                    "visit captured"
                );
                self.history.push(visit.clone());
                Ok(Some(visit))
            }
            Ok(None) => {
                capture.drain(Duration::ZERO).await;
                Ok(None)
            }
            Err(e) => {
                capture.drain(Duration::ZERO).await;
                Err(e)
            }
        }
    }

    /// Most recent visit
    pub fn last_visit(&self) -> Option<&Visit> {
        self.history.last()
    }

    /// All visits in capture order
    pub fn history(&self) -> &[Visit] {
        &self.history
    }
}

/// Holds the crawler's capture slot; the slot is emptied on drop, so a
/// cancelled capture does not block the next one.
struct ActiveCapture {
    slot: Arc<Mutex<Option<Arc<Capture>>>>,
}

impl ActiveCapture {
    fn claim(slot: &Arc<Mutex<Option<Arc<Capture>>>>, capture: &Arc<Capture>) -> Result<Self> {
        let mut current = slot.lock();
        if current.is_some() {
            return Err(Error::CaptureInProgress);
        }
        *current = Some(Arc::clone(capture));
        Ok(Self {
            slot: Arc::clone(slot),
        })
    }
}

impl Drop for ActiveCapture {
    fn drop(&mut self) {
        self.slot.lock().take();
    }
}

impl Drop for Crawler {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

/// Fetches bodies through `Network.getResponseBody`
struct PageBodies {
    page: Page,
}

#[async_trait]
impl BodySource for PageBodies {
    async fn response_body(&self, request_id: &str) -> Result<String> {
        let res = self
            .page
            .execute(GetResponseBodyParams::new(RequestId::new(request_id)))
            .await?;

        if res.result.base64_encoded {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(res.result.body.as_bytes())
                .map_err(|e| Error::other(format!("invalid base64 body: {}", e)))?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        } else {
            Ok(res.result.body.clone())
        }
    }
}

fn headers_map(headers: &chromiumoxide::cdp::browser_protocol::network::Headers) -> Headers {
    headers.inner().as_object().cloned().unwrap_or_default()
}

fn certificate(details: Option<&SecurityDetails>) -> Option<CertificateInfo> {
    let d = details?;
    CertificateInfo::from_parts(
        &d.protocol,
        &d.issuer,
        &d.subject_name,
        *d.valid_from.inner(),
        *d.valid_to.inner(),
        d.san_list.clone(),
    )
}

fn redirect_response(response: &Response) -> RedirectResponse {
    RedirectResponse {
        status: response.status,
        headers: headers_map(&response.headers),
    }
}

fn request_sent(ev: &EventRequestWillBeSent) -> RequestSent {
    RequestSent {
        request_id: ev.request_id.inner().clone(),
        url: ev.request.url.clone(),
        resource_type: ev.r#type.as_ref().map(|t| t.as_ref().to_string()),
        initiator_type: ev.initiator.r#type.as_ref().to_string(),
        initiator_url: ev.initiator.url.clone(),
        headers: headers_map(&ev.request.headers),
        redirect_response: ev.redirect_response.as_ref().map(redirect_response),
    }
}

fn response_received(ev: &EventResponseReceived) -> ResponseReceived {
    ResponseReceived {
        request_id: ev.request_id.inner().clone(),
        status: ev.response.status,
        headers: headers_map(&ev.response.headers),
        certificate: certificate(ev.response.security_details.as_ref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = CrawlerConfig::new()
            .viewport(390, 844)
            .user_agent("")
            .body_settle(Duration::from_secs(1));

        assert_eq!((config.width, config.height), (390, 844));
        assert_eq!(config.user_agent, None);
        assert_eq!(config.body_settle, Duration::from_secs(1));

        let config = config.user_agent("pisces-test");
        assert_eq!(config.user_agent.as_deref(), Some("pisces-test"));
    }

    #[test]
    fn test_capture_slot_freed_on_drop() {
        let slot = Arc::new(Mutex::new(None));
        let first = Capture::new("http://example.com/");

        let active = ActiveCapture::claim(&slot, &first).unwrap();
        let second = Capture::new("http://example.org/");
        assert!(matches!(
            ActiveCapture::claim(&slot, &second),
            Err(Error::CaptureInProgress)
        ));

        // A capture future dropped mid-action drops its guard too
        drop(active);
        assert!(slot.lock().is_none());
        assert!(ActiveCapture::claim(&slot, &second).is_ok());
        assert!(slot.lock().is_none());
    }
}
